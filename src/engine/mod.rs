//! The file-operation engine: the operation contract implemented against
//! resolved physical paths.

mod context;
mod convert;
mod create;
mod namespace;
mod platform;
mod transfer;

pub use context::{ContextArena, OpenHandle, RequestContext};

use std::sync::Arc;
use std::time::SystemTime;

use crate::config::{MappingTable, ROOT, SEPARATOR};
use crate::merge::DirectoryMerger;
use crate::operations::{
    CreateRequest, DiskSpace, Disposition, FileAttributes, FileInformation, FileSystemFeatures,
    FileSystemOperations, LockConflict, OpError, OpResult, VolumeInfo,
};
use crate::resolver::PathResolver;
use crate::space::DiskSpaceAggregator;

pub const VOLUME_LABEL: &str = "FlexFS";
pub const FILE_SYSTEM_NAME: &str = "NTFS";
pub const MAX_COMPONENT_LENGTH: u32 = 255;

/// Union-of-directories file system over an immutable mapping table.
#[derive(Debug)]
pub struct FlexFs {
    pub(crate) resolver: PathResolver,
    merger: DirectoryMerger,
    space: DiskSpaceAggregator,
    span: tracing::Span,
}

impl FlexFs {
    pub fn new(table: MappingTable) -> Self {
        Self::from_shared(Arc::new(table))
    }

    pub fn from_shared(table: Arc<MappingTable>) -> Self {
        let resolver = PathResolver::new(table);
        FlexFs {
            merger: DirectoryMerger::new(resolver.clone()),
            resolver,
            space: DiskSpaceAggregator::new(),
            span: tracing::debug_span!("flexfs"),
        }
    }

    /// Log every operation outcome inside `span`.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_space_aggregator(mut self, space: DiskSpaceAggregator) -> Self {
        self.space = space;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn table(&self) -> &MappingTable {
        self.resolver.table()
    }

    fn trace<T>(&self, method: &str, path: &str, result: OpResult<T>) -> OpResult<T> {
        let _entered = self.span.enter();
        match &result {
            Ok(_) => tracing::debug!("{}('{}') -> Success", method, path),
            Err(OpError::Io(e)) => {
                tracing::warn!("{}('{}') -> InternalError: {}", method, path, e)
            }
            Err(e) => tracing::debug!("{}('{}') -> {}", method, path, e.status()),
        }
        result
    }
}

/// Host paths may carry a trailing separator; the engine works without one.
fn canonical(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        ROOT
    } else {
        trimmed
    }
}

impl FileSystemOperations for FlexFs {
    fn create_file(
        &self,
        path: &str,
        request: &CreateRequest,
        ctx: &mut RequestContext,
    ) -> OpResult<Disposition> {
        let path = canonical(path);
        let result = self.create(path, request, ctx);
        let _entered = self.span.enter();
        tracing::debug!(
            "CreateFile('{}', access={:#x}, share={:#x}, mode={:?}, attributes={:#x}) -> {:?}",
            path,
            request.access.bits(),
            request.share.bits(),
            request.mode,
            request.attributes.bits(),
            result.as_ref().map_err(|e| e.status())
        );
        result
    }

    fn cleanup(&self, path: &str, ctx: &mut RequestContext) -> OpResult<()> {
        let path = canonical(path);
        ctx.release();
        let result = if ctx.delete_on_close() {
            self.remove_entry(path, ctx.is_directory())
        } else {
            Ok(())
        };
        self.trace("Cleanup", path, result)
    }

    fn close_file(&self, path: &str, ctx: &mut RequestContext) -> OpResult<()> {
        ctx.release();
        self.trace("CloseFile", path, Ok(()))
    }

    fn read_file(
        &self,
        path: &str,
        buffer: &mut [u8],
        offset: u64,
        ctx: &RequestContext,
    ) -> OpResult<usize> {
        let path = canonical(path);
        self.trace("ReadFile", path, self.read(path, buffer, offset, ctx))
    }

    fn write_file(
        &self,
        path: &str,
        data: &[u8],
        offset: u64,
        ctx: &RequestContext,
    ) -> OpResult<usize> {
        let path = canonical(path);
        self.trace("WriteFile", path, self.write(path, data, offset, ctx))
    }

    fn flush_file_buffers(&self, path: &str, ctx: &RequestContext) -> OpResult<()> {
        let path = canonical(path);
        self.trace("FlushFileBuffers", path, self.flush(path, ctx))
    }

    fn get_file_information(
        &self,
        path: &str,
        _ctx: &RequestContext,
    ) -> OpResult<FileInformation> {
        let path = canonical(path);
        self.trace("GetFileInformation", path, self.information(path))
    }

    fn find_files_with_pattern(
        &self,
        path: &str,
        pattern: &str,
        _ctx: &RequestContext,
    ) -> OpResult<Vec<FileInformation>> {
        let path = canonical(path);
        self.trace("FindFiles", path, self.merger.list_entries(path, pattern))
    }

    fn set_file_attributes(
        &self,
        path: &str,
        attributes: FileAttributes,
        _ctx: &RequestContext,
    ) -> OpResult<()> {
        let path = canonical(path);
        self.trace("SetFileAttributes", path, self.set_attributes(path, attributes))
    }

    fn set_file_time(
        &self,
        path: &str,
        creation: Option<SystemTime>,
        last_access: Option<SystemTime>,
        last_write: Option<SystemTime>,
        _ctx: &RequestContext,
    ) -> OpResult<()> {
        let path = canonical(path);
        let result = self.set_times(path, creation, last_access, last_write);
        self.trace("SetFileTime", path, result)
    }

    fn delete_file(&self, path: &str, _ctx: &RequestContext) -> OpResult<()> {
        let path = canonical(path);
        self.trace("DeleteFile", path, self.check_delete_file(path))
    }

    fn delete_directory(&self, path: &str, _ctx: &RequestContext) -> OpResult<()> {
        let path = canonical(path);
        self.trace("DeleteDirectory", path, self.check_delete_directory(path))
    }

    fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
        replace: bool,
        ctx: &mut RequestContext,
    ) -> OpResult<()> {
        let old_path = canonical(old_path);
        let new_path = canonical(new_path);
        let result = self.rename(old_path, new_path, replace, ctx);
        let _entered = self.span.enter();
        tracing::debug!(
            "MoveFile('{}', '{}', replace={}) -> {:?}",
            old_path,
            new_path,
            replace,
            result.as_ref().map_err(|e| e.status())
        );
        result
    }

    fn set_end_of_file(&self, path: &str, length: u64, ctx: &RequestContext) -> OpResult<()> {
        let path = canonical(path);
        self.trace("SetEndOfFile", path, self.set_length(path, length, ctx))
    }

    fn set_allocation_size(
        &self,
        path: &str,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<()> {
        let path = canonical(path);
        self.trace("SetAllocationSize", path, self.set_length(path, length, ctx))
    }

    fn lock_file(
        &self,
        path: &str,
        offset: u64,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<()> {
        let path = canonical(path);
        self.trace("LockFile", path, self.lock(path, offset, length, ctx))
    }

    fn unlock_file(
        &self,
        path: &str,
        offset: u64,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<()> {
        let path = canonical(path);
        self.trace("UnlockFile", path, self.unlock(path, offset, length, ctx))
    }

    fn test_lock(
        &self,
        path: &str,
        offset: u64,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<Option<LockConflict>> {
        let path = canonical(path);
        self.trace("TestLock", path, self.query_lock(path, offset, length, ctx))
    }

    fn get_disk_free_space(&self, _ctx: &RequestContext) -> OpResult<DiskSpace> {
        let space = self.space.aggregate(self.resolver.table());
        self.trace("GetDiskFreeSpace", ROOT, Ok(space))
    }

    fn get_volume_information(&self, _ctx: &RequestContext) -> OpResult<VolumeInfo> {
        let info = VolumeInfo {
            volume_label: VOLUME_LABEL.to_string(),
            file_system_name: FILE_SYSTEM_NAME.to_string(),
            features: FileSystemFeatures::CASE_PRESERVED_NAMES
                | FileSystemFeatures::CASE_SENSITIVE_SEARCH
                | FileSystemFeatures::PERSISTENT_ACLS
                | FileSystemFeatures::SUPPORTS_REMOTE_STORAGE
                | FileSystemFeatures::UNICODE_ON_DISK,
            max_component_length: MAX_COMPONENT_LENGTH,
        };
        self.trace("GetVolumeInformation", ROOT, Ok(info))
    }

    fn mounted(&self) -> OpResult<()> {
        let _entered = self.span.enter();
        tracing::info!(
            "Mounted union of {} mapping rule(s)",
            self.resolver.table().len()
        );
        Ok(())
    }

    fn unmounted(&self) -> OpResult<()> {
        let _entered = self.span.enter();
        tracing::info!("Unmounted");
        Ok(())
    }
}
