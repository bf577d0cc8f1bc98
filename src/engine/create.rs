use std::fs::{self, OpenOptions};
use std::path::Path;

use super::context::{OpenHandle, RequestContext};
use super::convert::{open_error, permission_error, storage_error};
use super::{platform, FlexFs};
use crate::operations::{
    CreateRequest, Disposition, FileAccess, FileAttributes, FileMode, OpResult, Status,
};

impl FlexFs {
    pub(super) fn create(
        &self,
        logical: &str,
        request: &CreateRequest,
        ctx: &mut RequestContext,
    ) -> OpResult<Disposition> {
        if self.resolver.is_virtual_directory(logical) {
            if request.mode == FileMode::CreateNew {
                return Err(Status::FileExists.into());
            }
            ctx.set_directory(true);
            return Ok(Disposition::Opened);
        }

        let path = self.resolver.resolve_one(logical)?;
        if ctx.is_directory() {
            open_directory(&path, request.mode)
        } else {
            open_file(&path, request, ctx)
        }
    }
}

fn open_directory(path: &Path, mode: FileMode) -> OpResult<Disposition> {
    match mode {
        FileMode::CreateNew => {
            if path.is_dir() {
                return Err(Status::FileExists.into());
            }
            if path.exists() {
                return Err(Status::AlreadyExists.into());
            }
            fs::create_dir_all(path).map_err(permission_error)?;
            Ok(Disposition::Created)
        }
        mode if mode.may_create() && !path.exists() => {
            fs::create_dir_all(path).map_err(permission_error)?;
            Ok(Disposition::Created)
        }
        _ => {
            if !path.is_dir() {
                return match fs::metadata(path) {
                    Ok(_) => Err(Status::NotADirectory.into()),
                    Err(_) => Err(Status::PathNotFound.into()),
                };
            }
            // The directory must also be listable
            let mut entries = fs::read_dir(path).map_err(permission_error)?;
            if let Some(Err(e)) = entries.next() {
                return Err(permission_error(e));
            }
            Ok(Disposition::Opened)
        }
    }
}

fn open_file(path: &Path, request: &CreateRequest, ctx: &mut RequestContext) -> OpResult<Disposition> {
    // Probe failures count as absence
    let (exists, is_dir) = match fs::metadata(path) {
        Ok(meta) => (true, meta.is_dir()),
        Err(_) => (false, false),
    };
    let access = request.access;

    match request.mode {
        FileMode::Open => {
            if !exists {
                return Err(Status::NotFound.into());
            }
            if access.is_metadata_only() || is_dir {
                if is_dir
                    && access.contains(FileAccess::DELETE)
                    && !access.contains(FileAccess::SYNCHRONIZE)
                {
                    // A delete request aimed at a directory through the file path
                    return Err(Status::AccessDenied.into());
                }
                ctx.set_directory(is_dir);
                return Ok(Disposition::Opened);
            }
        }
        FileMode::CreateNew if exists => return Err(Status::FileExists.into()),
        FileMode::Truncate if !exists => return Err(Status::NotFound.into()),
        _ => {}
    }

    if is_dir {
        return Err(Status::AccessDenied.into());
    }

    let writable = access.wants_write() || request.mode != FileMode::Open;
    let mut attributes = request.attributes;
    if matches!(request.mode, FileMode::CreateNew | FileMode::Create) {
        attributes |= FileAttributes::ARCHIVE;
    }

    let mut opts = OpenOptions::new();
    opts.read(true).write(writable);
    match request.mode {
        FileMode::CreateNew => {
            opts.create_new(true);
        }
        FileMode::Create => {
            opts.create(true).truncate(true);
        }
        FileMode::OpenOrCreate | FileMode::Append => {
            opts.create(true);
        }
        FileMode::Truncate => {
            opts.truncate(true);
        }
        FileMode::Open => {}
    }
    platform::configure_open(&mut opts, request.share, attributes);

    let file = opts.open(path).map_err(open_error)?;

    if !exists {
        // Attributes of files that were already there are left alone
        platform::set_attributes(path, attributes).map_err(|e| storage_error(e, path))?;
    }

    ctx.set_directory(false);
    ctx.bind(OpenHandle::new(file, writable));

    let disposition = match (exists, request.mode) {
        (true, FileMode::Create | FileMode::OpenOrCreate | FileMode::Append) => {
            Disposition::Existing
        }
        (true, _) => Disposition::Opened,
        (false, _) => Disposition::Created,
    };
    Ok(disposition)
}
