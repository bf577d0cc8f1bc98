use std::fs;
use std::path::Path;
use std::time::SystemTime;

use super::context::RequestContext;
use super::convert::{logical_file_name, permission_error, storage_error};
use super::{platform, FlexFs};
use crate::config::{ROOT, SEPARATOR};
use crate::operations::{FileAttributes, FileInformation, OpResult, Status};

impl FlexFs {
    pub(super) fn information(&self, logical: &str) -> OpResult<FileInformation> {
        if self.resolver.is_virtual_directory(logical) {
            return Ok(FileInformation::synthetic_directory(logical_file_name(logical)));
        }
        let path = self.resolver.resolve_one(logical)?;
        let meta = fs::metadata(&path).map_err(|e| storage_error(e, &path))?;
        Ok(FileInformation::from_metadata(logical_file_name(logical), &meta))
    }

    pub(super) fn set_attributes(&self, logical: &str, attributes: FileAttributes) -> OpResult<()> {
        if self.resolver.is_virtual_directory(logical) {
            return Err(Status::AccessDenied.into());
        }
        let path = self.resolver.resolve_one(logical)?;
        platform::set_attributes(&path, attributes).map_err(|e| storage_error(e, &path))
    }

    pub(super) fn set_times(
        &self,
        logical: &str,
        creation: Option<SystemTime>,
        last_access: Option<SystemTime>,
        last_write: Option<SystemTime>,
    ) -> OpResult<()> {
        if self.resolver.is_virtual_directory(logical) {
            return Err(Status::AccessDenied.into());
        }
        let path = self.resolver.resolve_one(logical)?;
        platform::set_times(&path, creation, last_access, last_write)
            .map_err(|e| storage_error(e, &path))
    }

    pub(super) fn check_delete_file(&self, logical: &str) -> OpResult<()> {
        if self.resolver.is_virtual_directory(logical) {
            return Err(Status::AccessDenied.into());
        }
        let path = self.resolver.resolve_one(logical)?;
        if path.is_dir() {
            return Err(Status::AccessDenied.into());
        }
        if !path.exists() {
            return Err(Status::NotFound.into());
        }
        Ok(())
    }

    pub(super) fn check_delete_directory(&self, logical: &str) -> OpResult<()> {
        if logical == ROOT || self.resolver.is_virtual_directory(logical) {
            return Err(Status::AccessDenied.into());
        }
        // Configured keys beneath the directory keep it non-empty
        let prefix = format!("{}{}", logical, SEPARATOR);
        if self
            .resolver
            .table()
            .rules()
            .iter()
            .any(|rule| rule.logical_path().starts_with(prefix.as_str()))
        {
            return Err(Status::DirectoryNotEmpty.into());
        }

        let path = self.resolver.resolve_one(logical)?;
        let mut entries = fs::read_dir(&path).map_err(|e| storage_error(e, &path))?;
        if entries.next().is_some() {
            return Err(Status::DirectoryNotEmpty.into());
        }
        Ok(())
    }

    /// Remove whatever a delete-on-close open pointed at.
    pub(super) fn remove_entry(&self, logical: &str, is_directory: bool) -> OpResult<()> {
        let path = self.resolver.resolve_one(logical)?;
        let removed = if is_directory {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| storage_error(e, &path))
    }

    pub(super) fn rename(
        &self,
        old_logical: &str,
        new_logical: &str,
        replace: bool,
        ctx: &mut RequestContext,
    ) -> OpResult<()> {
        ctx.release();

        if self.resolver.is_virtual_directory(old_logical)
            || self.resolver.is_virtual_directory(new_logical)
        {
            return Err(Status::AccessDenied.into());
        }

        let old_path = self.resolver.resolve_one(old_logical)?;
        let new_path = self.resolver.resolve_one(new_logical)?;

        let is_directory = ctx.is_directory();
        let exists = if is_directory {
            new_path.is_dir()
        } else {
            new_path.is_file()
        };

        if exists {
            if !replace {
                return Err(Status::FileExists.into());
            }
            // Directory destinations are never replaced
            if is_directory {
                return Err(Status::AccessDenied.into());
            }
            fs::remove_file(&new_path).map_err(permission_error)?;
        }

        move_entry(&old_path, &new_path, is_directory)
    }
}

fn move_entry(from: &Path, to: &Path, is_directory: bool) -> OpResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if !is_directory && platform::is_cross_device(&e) => {
            tracing::debug!(
                "{} and {} are on different volumes, copying",
                from.display(),
                to.display()
            );
            copy_then_remove(from, to)
        }
        Err(e) => Err(permission_error(e)),
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> OpResult<()> {
    fs::copy(from, to).map_err(permission_error)?;
    if let Err(e) = fs::remove_file(from) {
        // Leave a single copy behind rather than two
        if let Err(rollback) = fs::remove_file(to) {
            tracing::warn!("Failed to remove partial copy {}: {}", to.display(), rollback);
        }
        return Err(permission_error(e));
    }
    Ok(())
}
