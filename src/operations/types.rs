use std::fs::Metadata;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::time::SystemTime;

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $value:expr,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            $($(#[$fmeta])* pub const $flag: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn from_bits(bits: u32) -> Self {
                $name(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// All bits of `other` are set.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Any bit of `other` is set.
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                $name(self.0 & rhs.0)
            }
        }
    };
}

flag_set! {
    /// Requested access mask, using the host's access-right bit values.
    FileAccess {
        READ_DATA = 0x0000_0001,
        WRITE_DATA = 0x0000_0002,
        APPEND_DATA = 0x0000_0004,
        READ_EXTENDED_ATTRIBUTES = 0x0000_0008,
        WRITE_EXTENDED_ATTRIBUTES = 0x0000_0010,
        EXECUTE = 0x0000_0020,
        DELETE_CHILD = 0x0000_0040,
        READ_ATTRIBUTES = 0x0000_0080,
        WRITE_ATTRIBUTES = 0x0000_0100,
        DELETE = 0x0001_0000,
        READ_PERMISSIONS = 0x0002_0000,
        CHANGE_PERMISSIONS = 0x0004_0000,
        SET_OWNERSHIP = 0x0008_0000,
        SYNCHRONIZE = 0x0010_0000,
        GENERIC_ALL = 0x1000_0000,
        GENERIC_EXECUTE = 0x2000_0000,
        GENERIC_WRITE = 0x4000_0000,
        GENERIC_READ = 0x8000_0000,
    }
}

impl FileAccess {
    /// Bits that touch file contents rather than metadata.
    pub const DATA_ACCESS: FileAccess = FileAccess(
        Self::READ_DATA.0
            | Self::WRITE_DATA.0
            | Self::APPEND_DATA.0
            | Self::EXECUTE.0
            | Self::GENERIC_EXECUTE.0
            | Self::GENERIC_WRITE.0
            | Self::GENERIC_READ.0,
    );

    /// Bits that imply the stream has to be writable.
    pub const DATA_WRITE_ACCESS: FileAccess = FileAccess(
        Self::WRITE_DATA.0 | Self::APPEND_DATA.0 | Self::DELETE.0 | Self::GENERIC_WRITE.0,
    );

    /// Only attributes, security or directory handles are wanted.
    pub fn is_metadata_only(self) -> bool {
        !self.intersects(Self::DATA_ACCESS)
    }

    pub fn wants_write(self) -> bool {
        self.intersects(Self::DATA_WRITE_ACCESS)
    }
}

flag_set! {
    /// Share mode granted to other openers of the same file.
    FileShare {
        READ = 0x1,
        WRITE = 0x2,
        DELETE = 0x4,
    }
}

impl FileShare {
    pub const ALL: FileShare = FileShare(0x7);
}

flag_set! {
    /// File attribute bits as stored by the host platform.
    FileAttributes {
        READONLY = 0x0000_0001,
        HIDDEN = 0x0000_0002,
        SYSTEM = 0x0000_0004,
        DIRECTORY = 0x0000_0010,
        ARCHIVE = 0x0000_0020,
        NORMAL = 0x0000_0080,
        TEMPORARY = 0x0000_0100,
        SPARSE_FILE = 0x0000_0200,
        REPARSE_POINT = 0x0000_0400,
        COMPRESSED = 0x0000_0800,
        OFFLINE = 0x0000_1000,
        NOT_CONTENT_INDEXED = 0x0000_2000,
        ENCRYPTED = 0x0000_4000,
    }
}

flag_set! {
    /// Capabilities advertised by the volume.
    FileSystemFeatures {
        CASE_SENSITIVE_SEARCH = 0x0000_0001,
        CASE_PRESERVED_NAMES = 0x0000_0002,
        UNICODE_ON_DISK = 0x0000_0004,
        PERSISTENT_ACLS = 0x0000_0008,
        SUPPORTS_REMOTE_STORAGE = 0x0000_0100,
    }
}

/// How `create_file` treats an existing or missing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Fail if the target exists.
    CreateNew,
    /// Create, truncating any existing file.
    Create,
    /// Fail if the target is missing.
    Open,
    OpenOrCreate,
    /// Open and truncate; fail if missing.
    Truncate,
    /// Open or create, positioned for appending.
    Append,
}

impl FileMode {
    /// Modes that may bring a new file into existence.
    pub fn may_create(self) -> bool {
        matches!(
            self,
            FileMode::CreateNew | FileMode::Create | FileMode::OpenOrCreate | FileMode::Append
        )
    }
}

/// Parameters of a create/open request.
#[derive(Debug, Clone, Copy)]
pub struct CreateRequest {
    pub access: FileAccess,
    pub share: FileShare,
    pub mode: FileMode,
    pub attributes: FileAttributes,
}

impl CreateRequest {
    pub fn new(access: FileAccess, mode: FileMode) -> Self {
        CreateRequest {
            access,
            share: FileShare::ALL,
            mode,
            attributes: FileAttributes::NORMAL,
        }
    }

    pub fn with_share(mut self, share: FileShare) -> Self {
        self.share = share;
        self
    }

    pub fn with_attributes(mut self, attributes: FileAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// What a successful `create_file` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Opened,
    Created,
    /// A creating mode found the file already present and opened it.
    Existing,
}

/// One directory entry or stat result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInformation {
    pub file_name: String,
    pub attributes: FileAttributes,
    pub creation_time: Option<SystemTime>,
    pub last_access_time: Option<SystemTime>,
    pub last_write_time: Option<SystemTime>,
    pub length: u64,
}

impl FileInformation {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }

    /// Describe a physical entry from its metadata.
    pub fn from_metadata(name: impl Into<String>, meta: &Metadata) -> Self {
        FileInformation {
            file_name: name.into(),
            attributes: attributes_of(meta),
            creation_time: meta.created().ok(),
            last_access_time: meta.accessed().ok(),
            last_write_time: meta.modified().ok(),
            length: if meta.is_dir() { 0 } else { meta.len() },
        }
    }

    /// A directory entry with no physical backing.
    pub fn synthetic_directory(name: impl Into<String>) -> Self {
        FileInformation {
            file_name: name.into(),
            attributes: FileAttributes::DIRECTORY,
            creation_time: None,
            last_access_time: Some(SystemTime::now()),
            last_write_time: None,
            length: 0,
        }
    }
}

#[cfg(windows)]
fn attributes_of(meta: &Metadata) -> FileAttributes {
    use std::os::windows::fs::MetadataExt;
    FileAttributes::from_bits(meta.file_attributes())
}

#[cfg(unix)]
fn attributes_of(meta: &Metadata) -> FileAttributes {
    use std::os::unix::fs::PermissionsExt;

    let mut attributes = FileAttributes::empty();
    if meta.is_dir() {
        attributes |= FileAttributes::DIRECTORY;
    }
    // Read-only tracks the owner write bit
    if meta.permissions().mode() & OWNER_WRITE == 0 {
        attributes |= FileAttributes::READONLY;
    }
    if attributes.is_empty() {
        attributes = FileAttributes::NORMAL;
    }
    attributes
}

/// Owner write permission, the bit the read-only attribute maps onto.
#[cfg(unix)]
pub const OWNER_WRITE: u32 = 0o200;

/// A byte range held through another open that blocks a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConflict {
    pub offset: u64,
    /// Zero means the range runs to the end of the file.
    pub length: u64,
    pub exclusive: bool,
}

/// Aggregated space figures, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskSpace {
    /// Free bytes available to the calling user.
    pub free_bytes_available: u64,
    pub total_bytes: u64,
    pub total_free_bytes: u64,
}

impl DiskSpace {
    pub fn saturating_add(self, other: DiskSpace) -> DiskSpace {
        DiskSpace {
            free_bytes_available: self
                .free_bytes_available
                .saturating_add(other.free_bytes_available),
            total_bytes: self.total_bytes.saturating_add(other.total_bytes),
            total_free_bytes: self.total_free_bytes.saturating_add(other.total_free_bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub volume_label: String,
    pub file_system_name: String,
    pub features: FileSystemFeatures,
    pub max_component_length: u32,
}
