use fuser::{FileAttr, FileType};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::operations::{
    FileAccess, FileAttributes, FileInformation, FileMode, LockConflict, OpError, Status,
    OWNER_WRITE,
};

pub(crate) const BLOCK_SIZE: u32 = 4096;

/// Map an engine status to the errno the kernel expects.
pub(crate) fn status_to_libc(status: Status) -> i32 {
    match status {
        Status::Success => 0,
        Status::NotFound | Status::PathNotFound | Status::PathNotMapped => libc::ENOENT,
        Status::AlreadyExists | Status::FileExists => libc::EEXIST,
        Status::NotADirectory => libc::ENOTDIR,
        Status::AccessDenied => libc::EACCES,
        Status::SharingViolation => libc::EBUSY,
        Status::DirectoryNotEmpty => libc::ENOTEMPTY,
        Status::DiskFull => libc::ENOSPC,
        Status::ConfigParseError => libc::EINVAL,
        Status::NotImplemented => libc::ENOSYS,
        Status::InternalError => libc::EIO,
    }
}

pub(crate) fn op_error_to_libc(e: &OpError) -> i32 {
    match e {
        OpError::Status(status) => status_to_libc(*status),
        OpError::Io(e) => io_error_to_libc(e),
    }
}

/// Raw OS codes are the most accurate; fall back to the stable kinds.
pub(crate) fn io_error_to_libc(e: &io::Error) -> i32 {
    if let Some(code) = e.raw_os_error() {
        return code;
    }

    match e.kind() {
        io::ErrorKind::NotFound => libc::ENOENT,
        io::ErrorKind::PermissionDenied => libc::EACCES,
        io::ErrorKind::AlreadyExists => libc::EEXIST,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => libc::EINVAL,
        io::ErrorKind::Interrupted => libc::EINTR,
        io::ErrorKind::WriteZero => libc::ENOSPC,
        io::ErrorKind::OutOfMemory => libc::ENOMEM,
        io::ErrorKind::WouldBlock => libc::EAGAIN,
        io::ErrorKind::Unsupported => libc::ENOTSUP,
        _ => libc::EIO,
    }
}

pub(crate) fn info_to_filetype(info: &FileInformation) -> FileType {
    if info.is_directory() {
        FileType::Directory
    } else {
        FileType::RegularFile
    }
}

pub(crate) fn info_to_fileattr(info: &FileInformation, ino: u64, uid: u32, gid: u32) -> FileAttr {
    let directory = info.is_directory();
    let mut perm: u16 = if directory { 0o755 } else { 0o644 };
    if info.attributes.contains(FileAttributes::READONLY) {
        perm &= !0o222;
    }

    let atime = info.last_access_time.unwrap_or(UNIX_EPOCH);
    let mtime = info.last_write_time.unwrap_or(atime);

    FileAttr {
        ino,
        size: info.length,
        blocks: info.length.div_ceil(512),
        atime,
        mtime,
        ctime: mtime,
        crtime: info.creation_time.unwrap_or(UNIX_EPOCH),
        kind: info_to_filetype(info),
        perm,
        nlink: if directory { 2 } else { 1 },
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

/// Translate POSIX open flags into the access mask and creation mode of
/// the operation contract.
pub(crate) fn open_flags_to_request(flags: i32) -> (FileAccess, FileMode) {
    let access = match flags & libc::O_ACCMODE {
        libc::O_WRONLY => FileAccess::GENERIC_WRITE,
        libc::O_RDWR => FileAccess::GENERIC_READ | FileAccess::GENERIC_WRITE,
        _ => FileAccess::GENERIC_READ,
    };

    let create = flags & libc::O_CREAT != 0;
    let exclusive = flags & libc::O_EXCL != 0;
    let truncate = flags & libc::O_TRUNC != 0;
    let mode = match (create, exclusive, truncate) {
        (true, true, _) => FileMode::CreateNew,
        (true, false, true) => FileMode::Create,
        (true, false, false) => FileMode::OpenOrCreate,
        (false, _, true) => FileMode::Truncate,
        (false, _, false) => FileMode::Open,
    };
    (access, mode)
}

/// Attributes implied by a POSIX permission mode.
pub(crate) fn mode_to_attributes(mode: u32) -> FileAttributes {
    if mode & OWNER_WRITE == 0 {
        FileAttributes::READONLY
    } else {
        FileAttributes::NORMAL
    }
}

pub(crate) fn time_or_now(time: Option<fuser::TimeOrNow>) -> Option<SystemTime> {
    time.map(|t| match t {
        fuser::TimeOrNow::SpecificTime(t) => t,
        fuser::TimeOrNow::Now => SystemTime::now(),
    })
}

/// fcntl length for an inclusive `[start, end]` range; 0 reaches to end of file.
pub(crate) fn lock_length(start: u64, end: u64) -> u64 {
    if end >= i64::MAX as u64 || end < start {
        0
    } else {
        end - start + 1
    }
}

/// The `(start, end, type)` triple getlk reports for a conflicting lock.
pub(crate) fn conflict_to_lock(conflict: &LockConflict) -> (u64, u64, i32) {
    let end = match conflict.length {
        0 => i64::MAX as u64,
        length => conflict.offset.saturating_add(length - 1),
    };
    let typ = if conflict.exclusive {
        libc::F_WRLCK as i32
    } else {
        libc::F_RDLCK as i32
    };
    (conflict.offset, end, typ)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_to_libc() {
        assert_eq!(status_to_libc(Status::NotFound), libc::ENOENT);
        assert_eq!(status_to_libc(Status::FileExists), libc::EEXIST);
        assert_eq!(status_to_libc(Status::DirectoryNotEmpty), libc::ENOTEMPTY);
        assert_eq!(status_to_libc(Status::SharingViolation), libc::EBUSY);
        assert_eq!(status_to_libc(Status::NotImplemented), libc::ENOSYS);
    }

    #[test]
    fn test_io_error_prefers_raw_code() {
        let e = io::Error::from_raw_os_error(libc::EROFS);
        assert_eq!(io_error_to_libc(&e), libc::EROFS);
        let e = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(io_error_to_libc(&e), libc::EACCES);
    }

    #[test]
    fn test_open_flags() {
        let (access, mode) = open_flags_to_request(libc::O_RDONLY);
        assert_eq!(access, FileAccess::GENERIC_READ);
        assert_eq!(mode, FileMode::Open);

        let (access, mode) = open_flags_to_request(libc::O_WRONLY | libc::O_CREAT | libc::O_EXCL);
        assert!(access.wants_write());
        assert_eq!(mode, FileMode::CreateNew);

        let (_, mode) = open_flags_to_request(libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC);
        assert_eq!(mode, FileMode::Create);

        let (_, mode) = open_flags_to_request(libc::O_RDWR | libc::O_TRUNC);
        assert_eq!(mode, FileMode::Truncate);
    }

    #[test]
    fn test_readonly_strips_write_bits() {
        let mut info = FileInformation::synthetic_directory("docs");
        let attr = info_to_fileattr(&info, 7, 1000, 1000);
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.perm, 0o755);

        info.attributes = FileAttributes::READONLY;
        info.length = 1000;
        let attr = info_to_fileattr(&info, 8, 1000, 1000);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm, 0o444);
        assert_eq!(attr.blocks, 2);
    }

    #[test]
    fn test_missing_write_time_falls_back_to_access() {
        let mut info = FileInformation::synthetic_directory("docs");
        let accessed = UNIX_EPOCH + Duration::from_secs(1_000);
        info.last_access_time = Some(accessed);
        info.last_write_time = None;
        let attr = info_to_fileattr(&info, 2, 0, 0);
        assert_eq!(attr.mtime, accessed);
    }

    #[test]
    fn test_lock_length() {
        assert_eq!(lock_length(0, 9), 10);
        assert_eq!(lock_length(100, u64::MAX), 0);
        assert_eq!(lock_length(5, i64::MAX as u64), 0);
    }

    #[test]
    fn test_conflict_to_lock() {
        let bounded = LockConflict {
            offset: 10,
            length: 5,
            exclusive: true,
        };
        assert_eq!(conflict_to_lock(&bounded), (10, 14, libc::F_WRLCK as i32));

        let to_end = LockConflict {
            offset: 0,
            length: 0,
            exclusive: false,
        };
        assert_eq!(
            conflict_to_lock(&to_end),
            (0, i64::MAX as u64, libc::F_RDLCK as i32)
        );
    }

    #[test]
    fn test_mode_to_attributes() {
        assert_eq!(mode_to_attributes(0o444), FileAttributes::READONLY);
        assert_eq!(mode_to_attributes(0o644), FileAttributes::NORMAL);
        // Group and other write bits do not make a file writable for its owner
        assert_eq!(mode_to_attributes(0o466), FileAttributes::READONLY);
    }
}
