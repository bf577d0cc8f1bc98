//! Storage calls whose shape differs between unix and Windows hosts.

use std::fs::{File, FileTimes, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::operations::{FileAttributes, FileShare, LockConflict};

#[cfg(unix)]
mod imp {
    use super::*;
    use crate::operations::OWNER_WRITE;
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::io::AsRawFd;

    // Open-file-description locks belong to the stream, not the process,
    // so two opens in this process still conflict.
    #[cfg(target_os = "linux")]
    const SET_LOCK: libc::c_int = libc::F_OFD_SETLK;
    #[cfg(target_os = "linux")]
    const GET_LOCK: libc::c_int = libc::F_OFD_GETLK;
    #[cfg(not(target_os = "linux"))]
    const SET_LOCK: libc::c_int = libc::F_SETLK;
    #[cfg(not(target_os = "linux"))]
    const GET_LOCK: libc::c_int = libc::F_GETLK;

    pub fn configure_open(_opts: &mut OpenOptions, _share: FileShare, _attributes: FileAttributes) {}

    pub fn is_sharing_violation(_e: &io::Error) -> bool {
        false
    }

    pub fn is_directory_not_empty(e: &io::Error) -> bool {
        e.raw_os_error() == Some(libc::ENOTEMPTY)
    }

    pub fn is_cross_device(e: &io::Error) -> bool {
        e.raw_os_error() == Some(libc::EXDEV)
    }

    /// Only the read-only bit has a unix counterpart: the owner write bit.
    pub fn set_attributes(path: &Path, attributes: FileAttributes) -> io::Result<()> {
        let mut perms = std::fs::metadata(path)?.permissions();
        let mode = perms.mode();
        let new_mode = if attributes.contains(FileAttributes::READONLY) {
            mode & !OWNER_WRITE
        } else {
            mode | OWNER_WRITE
        };
        if new_mode != mode {
            perms.set_mode(new_mode);
            std::fs::set_permissions(path, perms)?;
        }
        Ok(())
    }

    pub fn open_for_times(path: &Path) -> io::Result<File> {
        File::open(path)
    }

    pub fn set_creation_time(times: FileTimes, _created: SystemTime) -> FileTimes {
        times
    }

    fn range(lock_type: libc::c_int, offset: u64, length: u64) -> io::Result<libc::flock> {
        let start = libc::off_t::try_from(offset)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        let len = libc::off_t::try_from(length)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

        // SAFETY: flock is plain old data; l_pid must stay zero for OFD locks
        let mut lock: libc::flock = unsafe { std::mem::zeroed() };
        lock.l_type = lock_type as libc::c_short;
        lock.l_whence = libc::SEEK_SET as libc::c_short;
        lock.l_start = start;
        lock.l_len = len;
        Ok(lock)
    }

    fn fcntl(file: &File, cmd: libc::c_int, lock: &mut libc::flock) -> io::Result<()> {
        // SAFETY: the descriptor is owned by `file` and outlives the call
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), cmd, lock as *mut libc::flock) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn lock_type(writable: bool) -> libc::c_int {
        if writable {
            libc::F_WRLCK as libc::c_int
        } else {
            libc::F_RDLCK as libc::c_int
        }
    }

    pub fn lock_range(file: &File, offset: u64, length: u64, writable: bool) -> io::Result<()> {
        let mut lock = range(lock_type(writable), offset, length)?;
        fcntl(file, SET_LOCK, &mut lock)
    }

    pub fn unlock_range(file: &File, offset: u64, length: u64) -> io::Result<()> {
        let mut lock = range(libc::F_UNLCK as libc::c_int, offset, length)?;
        fcntl(file, SET_LOCK, &mut lock)
    }

    pub fn test_range(
        file: &File,
        offset: u64,
        length: u64,
        writable: bool,
    ) -> io::Result<Option<LockConflict>> {
        let mut lock = range(lock_type(writable), offset, length)?;
        fcntl(file, GET_LOCK, &mut lock)?;
        if lock.l_type == libc::F_UNLCK as libc::c_short {
            return Ok(None);
        }
        Ok(Some(LockConflict {
            offset: u64::try_from(lock.l_start).unwrap_or(0),
            length: u64::try_from(lock.l_len).unwrap_or(0),
            exclusive: lock.l_type == libc::F_WRLCK as libc::c_short,
        }))
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use std::os::windows::fs::{FileTimesExt, OpenOptionsExt};
    use std::os::windows::io::AsRawHandle;
    use windows::core::HSTRING;
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::Storage::FileSystem::{
        LockFile, SetFileAttributesW, UnlockFile, FILE_FLAGS_AND_ATTRIBUTES,
    };

    const ERROR_SHARING_VIOLATION: i32 = 32;
    const ERROR_LOCK_VIOLATION: i32 = 33;
    const ERROR_NOT_SAME_DEVICE: i32 = 17;
    const ERROR_DIR_NOT_EMPTY: i32 = 145;
    const FILE_WRITE_ATTRIBUTES: u32 = 0x100;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    /// NORMAL is only valid on its own.
    fn effective_bits(attributes: FileAttributes) -> u32 {
        let mut attributes = attributes;
        if attributes.bits() != FileAttributes::NORMAL.bits() {
            attributes.remove(FileAttributes::NORMAL);
        }
        attributes.bits()
    }

    pub fn configure_open(opts: &mut OpenOptions, share: FileShare, attributes: FileAttributes) {
        opts.share_mode(share.bits());
        opts.attributes(effective_bits(attributes));
    }

    pub fn is_sharing_violation(e: &io::Error) -> bool {
        matches!(
            e.raw_os_error(),
            Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
        )
    }

    pub fn is_directory_not_empty(e: &io::Error) -> bool {
        e.raw_os_error() == Some(ERROR_DIR_NOT_EMPTY)
    }

    pub fn is_cross_device(e: &io::Error) -> bool {
        e.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE)
    }

    pub fn set_attributes(path: &Path, attributes: FileAttributes) -> io::Result<()> {
        let wide = HSTRING::from(path);
        // SAFETY: `wide` is a valid NUL-terminated string for the call's duration
        unsafe { SetFileAttributesW(&wide, FILE_FLAGS_AND_ATTRIBUTES(effective_bits(attributes))) }
            .map_err(io::Error::from)
    }

    pub fn open_for_times(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .access_mode(FILE_WRITE_ATTRIBUTES)
            .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
            .open(path)
    }

    pub fn set_creation_time(times: FileTimes, created: SystemTime) -> FileTimes {
        times.set_created(created)
    }

    fn split(value: u64) -> (u32, u32) {
        (value as u32, (value >> 32) as u32)
    }

    pub fn lock_range(file: &File, offset: u64, length: u64, _writable: bool) -> io::Result<()> {
        let (offset_low, offset_high) = split(offset);
        let (len_low, len_high) = split(length);
        // SAFETY: the handle is owned by `file` and outlives the call
        unsafe {
            LockFile(
                HANDLE(file.as_raw_handle()),
                offset_low,
                offset_high,
                len_low,
                len_high,
            )
        }
        .map_err(io::Error::from)
    }

    pub fn unlock_range(file: &File, offset: u64, length: u64) -> io::Result<()> {
        let (offset_low, offset_high) = split(offset);
        let (len_low, len_high) = split(length);
        // SAFETY: the handle is owned by `file` and outlives the call
        unsafe {
            UnlockFile(
                HANDLE(file.as_raw_handle()),
                offset_low,
                offset_high,
                len_low,
                len_high,
            )
        }
        .map_err(io::Error::from)
    }

    /// Windows has no lock query; try the range and give it back.
    pub fn test_range(
        file: &File,
        offset: u64,
        length: u64,
        _writable: bool,
    ) -> io::Result<Option<LockConflict>> {
        match lock_range(file, offset, length, true) {
            Ok(()) => unlock_range(file, offset, length).map(|()| None),
            Err(_) => Ok(Some(LockConflict {
                offset,
                length,
                exclusive: true,
            })),
        }
    }
}

pub(crate) use imp::{
    configure_open, is_cross_device, is_directory_not_empty, is_sharing_violation, lock_range,
    set_attributes, test_range, unlock_range,
};

/// Apply whichever of the three timestamps are given.
pub(crate) fn set_times(
    path: &Path,
    creation: Option<SystemTime>,
    last_access: Option<SystemTime>,
    last_write: Option<SystemTime>,
) -> io::Result<()> {
    if creation.is_none() && last_access.is_none() && last_write.is_none() {
        return Ok(());
    }

    let mut times = FileTimes::new();
    if let Some(accessed) = last_access {
        times = times.set_accessed(accessed);
    }
    if let Some(modified) = last_write {
        times = times.set_modified(modified);
    }
    if let Some(created) = creation {
        times = imp::set_creation_time(times, created);
    }

    imp::open_for_times(path)?.set_times(times)
}
