//! The operation contract a host driver invokes, with its outcome vocabulary
//! and request value types.

mod status;
mod types;

pub use status::{status_of, OpError, OpResult, Status};
pub use types::{
    CreateRequest, DiskSpace, Disposition, FileAccess, FileAttributes, FileInformation, FileMode,
    FileShare, FileSystemFeatures, LockConflict, VolumeInfo,
};
#[cfg(unix)]
pub use types::OWNER_WRITE;

use std::time::SystemTime;

use crate::engine::RequestContext;

/// A named data stream of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInformation {
    pub name: String,
    pub length: u64,
}

/// Operations a host driver dispatches against the union volume.
///
/// Every path argument is a logical path (`\`-separated, rooted at `\`).
/// Implementations must tolerate concurrent calls; per-open state travels in
/// the caller-owned [`RequestContext`].
pub trait FileSystemOperations: Send + Sync {
    fn create_file(
        &self,
        path: &str,
        request: &CreateRequest,
        ctx: &mut RequestContext,
    ) -> OpResult<Disposition>;

    /// Last handle to the file went away. Performs deferred deletion.
    fn cleanup(&self, path: &str, ctx: &mut RequestContext) -> OpResult<()>;

    fn close_file(&self, path: &str, ctx: &mut RequestContext) -> OpResult<()>;

    fn read_file(
        &self,
        path: &str,
        buffer: &mut [u8],
        offset: u64,
        ctx: &RequestContext,
    ) -> OpResult<usize>;

    fn write_file(
        &self,
        path: &str,
        data: &[u8],
        offset: u64,
        ctx: &RequestContext,
    ) -> OpResult<usize>;

    fn flush_file_buffers(&self, path: &str, ctx: &RequestContext) -> OpResult<()>;

    fn get_file_information(&self, path: &str, ctx: &RequestContext)
        -> OpResult<FileInformation>;

    fn find_files(&self, path: &str, ctx: &RequestContext) -> OpResult<Vec<FileInformation>> {
        self.find_files_with_pattern(path, "*", ctx)
    }

    fn find_files_with_pattern(
        &self,
        path: &str,
        pattern: &str,
        ctx: &RequestContext,
    ) -> OpResult<Vec<FileInformation>>;

    fn set_file_attributes(
        &self,
        path: &str,
        attributes: FileAttributes,
        ctx: &RequestContext,
    ) -> OpResult<()>;

    fn set_file_time(
        &self,
        path: &str,
        creation: Option<SystemTime>,
        last_access: Option<SystemTime>,
        last_write: Option<SystemTime>,
        ctx: &RequestContext,
    ) -> OpResult<()>;

    /// Validate that the file can be deleted. Removal happens at cleanup.
    fn delete_file(&self, path: &str, ctx: &RequestContext) -> OpResult<()>;

    /// Validate that the directory can be deleted. Removal happens at cleanup.
    fn delete_directory(&self, path: &str, ctx: &RequestContext) -> OpResult<()>;

    fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
        replace: bool,
        ctx: &mut RequestContext,
    ) -> OpResult<()>;

    fn set_end_of_file(&self, path: &str, length: u64, ctx: &RequestContext) -> OpResult<()>;

    fn set_allocation_size(&self, path: &str, length: u64, ctx: &RequestContext)
        -> OpResult<()>;

    fn lock_file(&self, path: &str, offset: u64, length: u64, ctx: &RequestContext)
        -> OpResult<()>;

    fn unlock_file(
        &self,
        path: &str,
        offset: u64,
        length: u64,
        ctx: &RequestContext,
    ) -> OpResult<()>;

    /// Report a lock held through another open that would block locking
    /// the range. Locks held through `ctx` itself never conflict.
    fn test_lock(
        &self,
        _path: &str,
        _offset: u64,
        _length: u64,
        _ctx: &RequestContext,
    ) -> OpResult<Option<LockConflict>> {
        Err(Status::NotImplemented.into())
    }

    fn get_disk_free_space(&self, ctx: &RequestContext) -> OpResult<DiskSpace>;

    fn get_volume_information(&self, ctx: &RequestContext) -> OpResult<VolumeInfo>;

    fn get_file_security(&self, _path: &str, _ctx: &RequestContext) -> OpResult<Vec<u8>> {
        Err(Status::NotImplemented.into())
    }

    fn set_file_security(
        &self,
        _path: &str,
        _descriptor: &[u8],
        _ctx: &RequestContext,
    ) -> OpResult<()> {
        Err(Status::NotImplemented.into())
    }

    fn find_streams(
        &self,
        _path: &str,
        _ctx: &RequestContext,
    ) -> OpResult<Vec<StreamInformation>> {
        Err(Status::NotImplemented.into())
    }

    fn mounted(&self) -> OpResult<()> {
        Ok(())
    }

    fn unmounted(&self) -> OpResult<()> {
        Ok(())
    }
}
