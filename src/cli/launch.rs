use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::Result;

/// Re-launch this executable in the background for `mount`, serving the
/// mapping at `config_path`. Returns the child's pid.
pub fn spawn_detached(mount: &str, config_path: &Path) -> Result<u32> {
    // The child may not share our working directory
    let config_path = absolute_config(config_path)?;
    let exe = std::env::current_exe()?;

    let child = Command::new(exe)
        .arg(mount)
        .arg("--conf")
        .arg(&config_path)
        .arg("--detached")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    tracing::debug!(
        "Launched background instance {} with {}",
        child.id(),
        config_path.display()
    );
    Ok(child.id())
}

fn absolute_config(config_path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(config_path)?)
}

/// Leave the launching terminal's session so its hangup does not reach us.
#[cfg(unix)]
pub fn detach_session() -> Result<()> {
    match nix::unistd::setsid() {
        Ok(_) => Ok(()),
        // Already a process group leader
        Err(nix::errno::Errno::EPERM) => Ok(()),
        Err(e) => Err(std::io::Error::from(e).into()),
    }
}

#[cfg(not(unix))]
pub fn detach_session() -> Result<()> {
    Ok(())
}
