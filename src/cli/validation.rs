use std::path::PathBuf;

use crate::error::{FlexError, Result};

/// Where the volume should appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountTarget {
    /// A drive letter, upper-cased.
    Drive(char),
    Directory(PathBuf),
}

/// Parse the mount argument: `Q`, `Q:` or `Q:\` name a drive, anything else
/// is a directory.
pub fn parse_mount_target(mount: &str) -> Result<MountTarget> {
    let mount = mount.trim();
    if mount.is_empty() {
        return Err(FlexError::Args("Mount target cannot be empty".to_string()));
    }

    let mut chars = mount.chars();
    let first = chars.next().unwrap_or_default();
    let rest = chars.as_str();
    if matches!(rest, "" | ":" | ":\\" | ":/") {
        if !first.is_ascii_alphabetic() {
            return Err(FlexError::Args(format!(
                "'{}' is not a valid drive letter",
                mount
            )));
        }
        return Ok(MountTarget::Drive(first.to_ascii_uppercase()));
    }

    let path = PathBuf::from(mount);
    if path.is_file() {
        return Err(FlexError::Args(format!(
            "Mount point {} is a file",
            path.display()
        )));
    }
    Ok(MountTarget::Directory(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case("Q", 'Q')]
    #[case("q", 'Q')]
    #[case("m:", 'M')]
    #[case("z:\\", 'Z')]
    fn test_drive_designators(#[case] mount: &str, #[case] letter: char) {
        assert_eq!(parse_mount_target(mount).unwrap(), MountTarget::Drive(letter));
    }

    #[rstest]
    #[case("")]
    #[case("  ")]
    #[case("1")]
    #[case("#:")]
    fn test_invalid_targets(#[case] mount: &str) {
        assert!(parse_mount_target(mount).is_err());
    }

    #[test]
    fn test_directory_target() {
        assert_eq!(
            parse_mount_target("/mnt/flex").unwrap(),
            MountTarget::Directory(PathBuf::from("/mnt/flex"))
        );
    }

    #[test]
    fn test_file_is_not_a_mount_point() {
        let file = NamedTempFile::new().unwrap();
        let target = file.path().to_string_lossy().into_owned();
        assert!(parse_mount_target(&target).is_err());
    }
}
