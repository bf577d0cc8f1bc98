use fuser::{BackgroundSession, MountOption};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::FlexFuse;
use crate::error::{FlexError, Result};
use crate::operations::FileSystemOperations;

/// A live mount; dropping it unmounts as well.
pub struct MountedVolume {
    session: BackgroundSession,
    mount_point: PathBuf,
}

impl MountedVolume {
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Unmount and wait for the session thread to finish.
    pub fn unmount(self) {
        tracing::info!("Unmounting {}", self.mount_point.display());
        self.session.join();
    }
}

/// Mount `ops` at `mount_point`, serving requests on a background thread.
pub fn mount<F>(ops: Arc<F>, mount_point: &Path) -> Result<MountedVolume>
where
    F: FileSystemOperations + 'static,
{
    fs::create_dir_all(mount_point).map_err(|e| {
        FlexError::Fuse(format!(
            "Failed to create mount directory {}: {}",
            mount_point.display(),
            e
        ))
    })?;

    let options = vec![
        MountOption::FSName("flexfs".to_string()),
        MountOption::Subtype("flexfs".to_string()),
        MountOption::AutoUnmount,
    ];

    tracing::info!("Mounting FUSE filesystem at {}", mount_point.display());

    let session = fuser::spawn_mount2(FlexFuse::new(ops), mount_point, &options)
        .map_err(|e| FlexError::Fuse(format!("FUSE mount failed: {}", e)))?;

    Ok(MountedVolume {
        session,
        mount_point: mount_point.to_path_buf(),
    })
}
