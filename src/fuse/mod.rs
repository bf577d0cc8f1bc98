//! FUSE host adapter: translates kernel requests into calls on the
//! operation contract.

mod convert;
mod mount;
mod types;

pub use mount::{mount, MountedVolume};

use convert::{
    conflict_to_lock, info_to_fileattr, info_to_filetype, lock_length, mode_to_attributes,
    op_error_to_libc, open_flags_to_request, time_or_now, BLOCK_SIZE,
};
use types::{child_logical, InodeData, InodeTable};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyLock, ReplyOpen, ReplyStatfs, ReplyWrite,
    Request, TimeOrNow,
};
use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::SEPARATOR;
use crate::engine::{ContextArena, RequestContext};
use crate::operations::{
    CreateRequest, FileAccess, FileAttributes, FileInformation, FileMode, FileSystemOperations,
    OpResult,
};

/// renameat2 flags the kernel forwards.
const RENAME_NOREPLACE: u32 = 1;
const RENAME_EXCHANGE: u32 = 2;

const DEFAULT_TTL: Duration = Duration::from_secs(1);

thread_local! {
    static READ_BUFFER: RefCell<Vec<u8>> = RefCell::new(Vec::with_capacity(128 * 1024));
}

pub struct FlexFuse<F: FileSystemOperations> {
    ops: Arc<F>,
    inodes: RwLock<InodeTable>,
    // FUSE reserves inode 1 for the root
    next_ino: Mutex<u64>,
    contexts: ContextArena,
    /// Logical path each open handle was opened under.
    open_paths: RwLock<HashMap<u64, String>>,
    ttl: Duration,
    uid: u32,
    gid: u32,
}

impl<F: FileSystemOperations> FlexFuse<F> {
    pub fn new(ops: Arc<F>) -> Self {
        FlexFuse {
            ops,
            inodes: RwLock::new(InodeTable::new()),
            next_ino: Mutex::new(2),
            contexts: ContextArena::new(),
            open_paths: RwLock::new(HashMap::new()),
            ttl: DEFAULT_TTL,
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }

    fn alloc_inode(&self) -> u64 {
        let mut next = self.next_ino.lock();
        let ino = *next;
        *next = next.wrapping_add(1).max(2);
        ino
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.inodes.write().logical_path(ino)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<String, i32> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        if name.contains(SEPARATOR) {
            return Err(libc::EINVAL);
        }
        let parent = self.path_of(parent).ok_or(libc::ENOENT)?;
        Ok(child_logical(&parent, name))
    }

    /// Bind `name` under `parent` to an inode and build its attributes.
    fn remember(&self, parent: u64, name: &OsStr, logical: String, info: &FileInformation) -> FileAttr {
        let mut inodes = self.inodes.write();
        let ino = inodes
            .lookup_child(parent, name)
            .unwrap_or_else(|| self.alloc_inode());
        inodes.insert(InodeData {
            inode: ino,
            parent,
            name: name.to_os_string(),
            logical,
        });
        info_to_fileattr(info, ino, self.uid, self.gid)
    }

    fn attr_of(&self, ino: u64, logical: &str, ctx: &RequestContext) -> OpResult<FileAttr> {
        let info = self.ops.get_file_information(logical, ctx)?;
        Ok(info_to_fileattr(&info, ino, self.uid, self.gid))
    }

    fn open_context(&self, fh: u64) -> Option<(String, Arc<RwLock<RequestContext>>)> {
        let ctx = self.contexts.get(fh)?;
        let path = self.open_paths.read().get(&fh).cloned()?;
        Some((path, ctx))
    }

    fn register_open(&self, logical: String, ctx: RequestContext) -> u64 {
        let fh = self.contexts.insert(ctx);
        self.open_paths.write().insert(fh, logical);
        fh
    }

    /// Run Cleanup then Close for a handle the kernel is done with.
    fn close_open(&self, fh: u64) -> OpResult<()> {
        let path = self.open_paths.write().remove(&fh);
        let (Some(path), Some(ctx)) = (path, self.contexts.remove(fh)) else {
            return Ok(());
        };
        let mut ctx = ctx.write();
        let cleaned = self.ops.cleanup(&path, &mut ctx);
        self.ops.close_file(&path, &mut ctx)?;
        cleaned
    }

    /// Delete via the delete-on-close protocol: check, mark, then clean up.
    fn delete(&self, logical: &str, is_directory: bool) -> OpResult<()> {
        let mut ctx = if is_directory {
            RequestContext::for_directory()
        } else {
            RequestContext::new()
        };
        if is_directory {
            self.ops.delete_directory(logical, &ctx)?;
        } else {
            self.ops.delete_file(logical, &ctx)?;
        }
        ctx.set_delete_on_close(true);
        self.ops.cleanup(logical, &mut ctx)?;
        self.ops.close_file(logical, &mut ctx)
    }
}

impl<F: FileSystemOperations> Filesystem for FlexFuse<F> {
    fn init(
        &mut self,
        _req: &Request,
        _config: &mut KernelConfig,
    ) -> std::result::Result<(), libc::c_int> {
        self.ops.mounted().map_err(|e| op_error_to_libc(&e))
    }

    fn destroy(&mut self) {
        if let Err(e) = self.ops.unmounted() {
            tracing::warn!("unmount notification failed: {}", e);
        }
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let logical = match self.child_path(parent, name) {
            Ok(logical) => logical,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        match self.ops.get_file_information(&logical, &RequestContext::new()) {
            Ok(info) => {
                let attr = self.remember(parent, name, logical, &info);
                reply.entry(&self.ttl, &attr, 0);
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(logical) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.attr_of(ino, &logical, &RequestContext::new()) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(logical) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let ctx = fh
            .and_then(|fh| self.contexts.get(fh))
            .unwrap_or_else(|| Arc::new(RwLock::new(RequestContext::new())));
        let ctx = ctx.read();

        let result = (|| {
            if let Some(size) = size {
                self.ops.set_end_of_file(&logical, size, &ctx)?;
            }
            let (atime, mtime) = (time_or_now(atime), time_or_now(mtime));
            if atime.is_some() || mtime.is_some() || crtime.is_some() {
                self.ops.set_file_time(&logical, crtime, atime, mtime, &ctx)?;
            }
            if let Some(mode) = mode {
                self.ops
                    .set_file_attributes(&logical, mode_to_attributes(mode), &ctx)?;
            }
            self.attr_of(ino, &logical, &ctx)
        })();

        match result {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(logical) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let (access, mode) = open_flags_to_request(flags);
        let mut ctx = RequestContext::new();
        match self
            .ops
            .create_file(&logical, &CreateRequest::new(access, mode), &mut ctx)
        {
            Ok(_) => {
                let fh = self.register_open(logical, ctx);
                reply.opened(fh, 0);
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(logical) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut ctx = RequestContext::for_directory();
        let request = CreateRequest::new(
            FileAccess::READ_DATA | FileAccess::SYNCHRONIZE,
            FileMode::Open,
        );
        match self.ops.create_file(&logical, &request, &mut ctx) {
            Ok(_) => {
                let fh = self.register_open(logical, ctx);
                reply.opened(fh, 0);
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        tracing::trace!("read(ino={}, fh={}, offset={}, size={})", ino, fh, offset, size);
        let Some((logical, ctx)) = self.open_context(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let ctx = ctx.read();

        READ_BUFFER.with(|buffer| {
            let mut buf = buffer.borrow_mut();
            buf.resize(size as usize, 0u8);
            match self
                .ops
                .read_file(&logical, &mut buf[..], offset.max(0) as u64, &ctx)
            {
                Ok(n) => reply.data(&buf[..n]),
                Err(e) => reply.error(op_error_to_libc(&e)),
            }
        });
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        tracing::trace!("write(ino={}, fh={}, offset={}, len={})", ino, fh, offset, data.len());
        let Some((logical, ctx)) = self.open_context(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let ctx = ctx.read();
        match self
            .ops
            .write_file(&logical, data, offset.max(0) as u64, &ctx)
        {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn flush(&mut self, _req: &Request, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        let Some((logical, ctx)) = self.open_context(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let result = self.ops.flush_file_buffers(&logical, &ctx.read());
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn fsync(&mut self, _req: &Request, _ino: u64, fh: u64, _datasync: bool, reply: ReplyEmpty) {
        let Some((logical, ctx)) = self.open_context(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let result = self.ops.flush_file_buffers(&logical, &ctx.read());
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.close_open(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn releasedir(&mut self, _req: &Request, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        match self.close_open(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let logical = match self.child_path(parent, name) {
            Ok(logical) => logical,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let (access, open_mode) = open_flags_to_request(flags | libc::O_CREAT);
        let request = CreateRequest::new(access | FileAccess::GENERIC_WRITE, open_mode)
            .with_attributes(mode_to_attributes(mode));
        let mut ctx = RequestContext::new();

        let result = self
            .ops
            .create_file(&logical, &request, &mut ctx)
            .and_then(|_| self.ops.get_file_information(&logical, &ctx));
        match result {
            Ok(info) => {
                let attr = self.remember(parent, name, logical.clone(), &info);
                let fh = self.register_open(logical, ctx);
                reply.created(&self.ttl, &attr, 0, fh, flags as u32);
            }
            Err(e) => {
                let _ = self.ops.close_file(&logical, &mut ctx);
                reply.error(op_error_to_libc(&e));
            }
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let logical = match self.child_path(parent, name) {
            Ok(logical) => logical,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let mut ctx = RequestContext::for_directory();
        let request = CreateRequest::new(FileAccess::GENERIC_WRITE, FileMode::CreateNew)
            .with_attributes(FileAttributes::DIRECTORY);
        let result = self
            .ops
            .create_file(&logical, &request, &mut ctx)
            .and_then(|_| self.ops.cleanup(&logical, &mut ctx))
            .and_then(|_| self.ops.close_file(&logical, &mut ctx))
            .and_then(|_| self.ops.get_file_information(&logical, &ctx));
        match result {
            Ok(info) => {
                let attr = self.remember(parent, name, logical, &info);
                reply.entry(&self.ttl, &attr, 0);
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let logical = match self.child_path(parent, name) {
            Ok(logical) => logical,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        match self.delete(&logical, false) {
            Ok(()) => {
                self.inodes.write().remove_child(parent, name);
                reply.ok();
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let logical = match self.child_path(parent, name) {
            Ok(logical) => logical,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        match self.delete(&logical, true) {
            Ok(()) => {
                self.inodes.write().remove_child(parent, name);
                reply.ok();
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        if flags & RENAME_EXCHANGE != 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let paths = self
            .child_path(parent, name)
            .and_then(|old| Ok((old, self.child_path(newparent, newname)?)));
        let (old_logical, new_logical) = match paths {
            Ok(paths) => paths,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let mut ctx = RequestContext::new();
        let result = self
            .ops
            .get_file_information(&old_logical, &ctx)
            .and_then(|info| {
                ctx.set_directory(info.is_directory());
                let replace = flags & RENAME_NOREPLACE == 0;
                self.ops
                    .move_file(&old_logical, &new_logical, replace, &mut ctx)
            });
        match result {
            Ok(()) => {
                let mut inodes = self.inodes.write();
                match inodes.lookup_child(parent, name) {
                    Some(ino) => inodes.rename(ino, newparent, newname, new_logical),
                    None => inodes.remove_child(newparent, newname),
                }
                reply.ok();
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(logical) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let ctx = self
            .contexts
            .get(fh)
            .unwrap_or_else(|| Arc::new(RwLock::new(RequestContext::for_directory())));

        let listing = match self.ops.find_files(&logical, &ctx.read()) {
            Ok(listing) => listing,
            Err(e) => {
                reply.error(op_error_to_libc(&e));
                return;
            }
        };

        let parent_ino = self
            .inodes
            .read()
            .peek(ino)
            .map_or(ino, |inode| inode.parent);
        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];
        for info in &listing {
            let name = OsStr::new(&info.file_name);
            let child = child_logical(&logical, &info.file_name);
            let attr = self.remember(ino, name, child, info);
            entries.push((attr.ino, info_to_filetype(info), info.file_name.clone()));
        }

        for (idx, (child_ino, file_type, name)) in
            entries.into_iter().enumerate().skip(offset.max(0) as usize)
        {
            if reply.add(child_ino, (idx + 1) as i64, file_type, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let ctx = RequestContext::new();
        let result = self.ops.get_disk_free_space(&ctx).and_then(|space| {
            let volume = self.ops.get_volume_information(&ctx)?;
            Ok((space, volume))
        });
        match result {
            Ok((space, volume)) => {
                let block = BLOCK_SIZE as u64;
                reply.statfs(
                    space.total_bytes / block,
                    space.total_free_bytes / block,
                    space.free_bytes_available / block,
                    0,
                    0,
                    BLOCK_SIZE,
                    volume.max_component_length,
                    BLOCK_SIZE,
                );
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn getlk(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _lock_owner: u64,
        start: u64,
        end: u64,
        _typ: i32,
        _pid: u32,
        reply: ReplyLock,
    ) {
        let Some((logical, ctx)) = self.open_context(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let ctx = ctx.read();
        let length = lock_length(start, end);
        match self.ops.test_lock(&logical, start, length, &ctx) {
            Ok(None) => reply.locked(start, end, libc::F_UNLCK as i32, 0),
            Ok(Some(conflict)) => {
                let (start, end, typ) = conflict_to_lock(&conflict);
                // The holder is another open in this process, not a remote pid
                reply.locked(start, end, typ, 0);
            }
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }

    fn setlk(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _lock_owner: u64,
        start: u64,
        end: u64,
        typ: i32,
        _pid: u32,
        _sleep: bool,
        reply: ReplyEmpty,
    ) {
        let Some((logical, ctx)) = self.open_context(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let ctx = ctx.read();
        let length = lock_length(start, end);
        let result = if typ == libc::F_UNLCK as i32 {
            self.ops.unlock_file(&logical, start, length, &ctx)
        } else {
            self.ops.lock_file(&logical, start, length, &ctx)
        };
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(op_error_to_libc(&e)),
        }
    }
}
