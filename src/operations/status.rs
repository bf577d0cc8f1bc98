use std::fmt;
use thiserror::Error;

/// Closed outcome vocabulary reported across the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    NotFound,
    PathNotFound,
    AlreadyExists,
    FileExists,
    NotADirectory,
    AccessDenied,
    SharingViolation,
    DirectoryNotEmpty,
    DiskFull,
    ConfigParseError,
    PathNotMapped,
    NotImplemented,
    /// Generic engine fault: an un-translated storage failure reached the host.
    InternalError,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure of a single file-system operation.
#[derive(Error, Debug)]
pub enum OpError {
    /// A storage condition translated into the outcome vocabulary.
    #[error("{0}")]
    Status(Status),

    /// A storage failure nobody anticipated; hosts treat it as an engine fault.
    #[error("unexpected storage failure: {0}")]
    Io(#[from] std::io::Error),
}

impl OpError {
    pub fn status(&self) -> Status {
        match self {
            OpError::Status(status) => *status,
            OpError::Io(_) => Status::InternalError,
        }
    }
}

impl From<Status> for OpError {
    fn from(status: Status) -> Self {
        OpError::Status(status)
    }
}

pub type OpResult<T> = std::result::Result<T, OpError>;

/// Collapse an operation result onto the outcome vocabulary.
pub fn status_of<T>(result: &OpResult<T>) -> Status {
    match result {
        Ok(_) => Status::Success,
        Err(e) => e.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_status_of_results() {
        let ok: OpResult<u32> = Ok(3);
        assert_eq!(status_of(&ok), Status::Success);

        let denied: OpResult<()> = Err(Status::AccessDenied.into());
        assert_eq!(status_of(&denied), Status::AccessDenied);

        let raw: OpResult<()> = Err(io::Error::new(io::ErrorKind::Other, "boom").into());
        assert_eq!(status_of(&raw), Status::InternalError);
    }

    #[test]
    fn test_display_uses_variant_name() {
        assert_eq!(Status::DirectoryNotEmpty.to_string(), "DirectoryNotEmpty");
        assert_eq!(
            OpError::from(Status::FileExists).to_string(),
            "FileExists"
        );
    }
}
