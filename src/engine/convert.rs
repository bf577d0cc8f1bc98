use std::io;
use std::path::Path;

use super::platform;
use crate::operations::{OpError, Status};

/// Translate a failure to open or create a stream at `path`.
///
/// Existence has already been checked by the caller, so a not-found error
/// here means the parent directory is missing.
pub(crate) fn open_error(e: io::Error) -> OpError {
    if platform::is_sharing_violation(&e) {
        return Status::SharingViolation.into();
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Status::AccessDenied.into(),
        io::ErrorKind::NotFound => Status::PathNotFound.into(),
        io::ErrorKind::AlreadyExists => Status::FileExists.into(),
        _ => OpError::Io(e),
    }
}

/// Translate a failure of a metadata or namespace call on `path`.
pub(crate) fn storage_error(e: io::Error, path: &Path) -> OpError {
    if platform::is_sharing_violation(&e) {
        return Status::SharingViolation.into();
    }
    if platform::is_directory_not_empty(&e) {
        return Status::DirectoryNotEmpty.into();
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Status::AccessDenied.into(),
        io::ErrorKind::NotFound if parent_missing(path) => Status::PathNotFound.into(),
        io::ErrorKind::NotFound => Status::NotFound.into(),
        _ => OpError::Io(e),
    }
}

/// Only permission failures are translated; everything else propagates.
pub(crate) fn permission_error(e: io::Error) -> OpError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => Status::AccessDenied.into(),
        _ => OpError::Io(e),
    }
}

fn parent_missing(path: &Path) -> bool {
    path.parent().is_some_and(|parent| !parent.exists())
}

/// Final component of a logical path; the root names itself.
pub(crate) fn logical_file_name(logical: &str) -> &str {
    match logical.rsplit(crate::config::SEPARATOR).next() {
        Some(name) if !name.is_empty() => name,
        _ => crate::config::ROOT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_mapping() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(open_error(denied).status(), Status::AccessDenied);

        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(open_error(missing).status(), Status::PathNotFound);

        let other = io::Error::new(io::ErrorKind::Other, "device on fire");
        assert_eq!(open_error(other).status(), Status::InternalError);
    }

    #[test]
    fn test_storage_error_distinguishes_missing_parent() {
        let temp_dir = tempfile::tempdir().unwrap();

        let err = storage_error(
            io::Error::from(io::ErrorKind::NotFound),
            &temp_dir.path().join("absent.txt"),
        );
        assert_eq!(err.status(), Status::NotFound);

        let err = storage_error(
            io::Error::from(io::ErrorKind::NotFound),
            &temp_dir.path().join("no").join("absent.txt"),
        );
        assert_eq!(err.status(), Status::PathNotFound);
    }

    #[test]
    fn test_logical_file_name() {
        assert_eq!(logical_file_name("\\docs\\a.txt"), "a.txt");
        assert_eq!(logical_file_name("\\docs"), "docs");
        assert_eq!(logical_file_name("\\"), "\\");
    }
}
