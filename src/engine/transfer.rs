use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::context::RequestContext;
use super::convert::open_error;
use super::{platform, FlexFs};
use crate::operations::{LockConflict, OpError, OpResult, Status};

impl FlexFs {
    pub(super) fn read(
        &self,
        logical: &str,
        buffer: &mut [u8],
        offset: u64,
        ctx: &RequestContext,
    ) -> OpResult<usize> {
        if let Some(handle) = ctx.handle() {
            return Ok(handle.with_file(|file| read_at(file, buffer, offset))?);
        }

        // No bound stream (memory-mapped or metadata-only open): one-shot read
        let path = self.resolver.resolve_one(logical)?;
        let mut file = File::open(&path).map_err(|e| open_failure(e, &path))?;
        Ok(read_at(&mut file, buffer, offset)?)
    }

    pub(super) fn write(
        &self,
        logical: &str,
        data: &[u8],
        offset: u64,
        ctx: &RequestContext,
    ) -> OpResult<usize> {
        let result = if let Some(handle) = ctx.handle() {
            handle.with_file(|file| write_at(file, data, offset))
        } else {
            let path = self.resolver.resolve_one(logical)?;
            let mut file = OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|e| open_failure(e, &path))?;
            write_at(&mut file, data, offset)
        };

        result.map(|()| data.len()).map_err(|e| {
            tracing::warn!("write to {} failed: {}", logical, e);
            OpError::from(Status::DiskFull)
        })
    }

    pub(super) fn flush(&self, logical: &str, ctx: &RequestContext) -> OpResult<()> {
        let Some(handle) = ctx.handle() else {
            return Ok(());
        };
        if !handle.writable() {
            return Ok(());
        }
        handle.with_file(|file| file.sync_all()).map_err(|e| {
            tracing::warn!("flush of {} failed: {}", logical, e);
            Status::DiskFull.into()
        })
    }

    pub(super) fn set_length(
        &self,
        logical: &str,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<()> {
        let result = if let Some(handle) = ctx.handle() {
            handle.with_file(|file| file.set_len(length))
        } else {
            let path = self.resolver.resolve_one(logical)?;
            let file = OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|e| open_failure(e, &path))?;
            file.set_len(length)
        };

        result.map_err(|e| {
            tracing::warn!("resize of {} to {} failed: {}", logical, length, e);
            Status::DiskFull.into()
        })
    }

    pub(super) fn lock(
        &self,
        logical: &str,
        offset: u64,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<()> {
        let handle = ctx.handle().ok_or(Status::AccessDenied)?;
        handle
            .with_file(|file| platform::lock_range(file, offset, length, handle.writable()))
            .map_err(|e| {
                tracing::debug!("lock of {} [{}+{}] refused: {}", logical, offset, length, e);
                Status::AccessDenied.into()
            })
    }

    pub(super) fn unlock(
        &self,
        logical: &str,
        offset: u64,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<()> {
        let handle = ctx.handle().ok_or(Status::AccessDenied)?;
        handle
            .with_file(|file| platform::unlock_range(file, offset, length))
            .map_err(|e| {
                tracing::debug!("unlock of {} [{}+{}] refused: {}", logical, offset, length, e);
                Status::AccessDenied.into()
            })
    }

    pub(super) fn query_lock(
        &self,
        logical: &str,
        offset: u64,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<Option<LockConflict>> {
        let handle = ctx.handle().ok_or(Status::AccessDenied)?;
        handle
            .with_file(|file| platform::test_range(file, offset, length, handle.writable()))
            .map_err(|e| {
                tracing::debug!("lock query on {} [{}+{}] failed: {}", logical, offset, length, e);
                Status::AccessDenied.into()
            })
    }
}

/// One-shot streams open existing files, so a missing file is NotFound
/// unless its parent is missing too.
fn open_failure(e: io::Error, path: &Path) -> OpError {
    if e.kind() == io::ErrorKind::NotFound && path.parent().is_some_and(|p| p.exists()) {
        return Status::NotFound.into();
    }
    open_error(e)
}

/// Fill `buffer` from `offset` until it is full or the file ends.
fn read_at(file: &mut File, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn write_at(file: &mut File, data: &[u8], offset: u64) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)
}
