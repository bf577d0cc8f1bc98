use clap::Parser;

use flexfs::cli::{self, launch, Args, MountTarget};
use flexfs::config::load_mapping;
use flexfs::error::{self, FlexError};
use flexfs::MappingTable;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => {
            std::process::exit(code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> error::Result<i32> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("FLEXFS_LOG").unwrap_or_else(|_| args.log_filter().to_string()),
        )
        .init();

    if args.detached {
        launch::detach_session()?;
    }

    let target = cli::parse_mount_target(&args.mount)?;
    let config_path = args.config_path();
    // Parse before going to the background so mistakes are reported here
    let table = load_mapping(&config_path)?;

    if !args.runs_in_foreground() {
        let pid = launch::spawn_detached(&args.mount, &config_path)?;
        println!("FlexFS running in the background (pid {})", pid);
        return Ok(0);
    }

    serve(target, table).await
}

#[cfg(unix)]
async fn serve(target: MountTarget, table: MappingTable) -> error::Result<i32> {
    use flexfs::FlexFs;
    use std::sync::Arc;

    let mount_point = match target {
        MountTarget::Directory(path) => path,
        MountTarget::Drive(letter) => {
            return Err(FlexError::Unsupported(format!(
                "drive {}: needs a Windows host driver; mount on a directory instead",
                letter
            )));
        }
    };

    let span = tracing::info_span!("flexfs", mount = %mount_point.display());
    let fs = Arc::new(FlexFs::new(table).with_span(span));
    let volume = flexfs::fuse::mount(fs, &mount_point)?;
    println!("FlexFS mounted at {}", volume.mount_point().display());

    wait_for_shutdown().await;
    volume.unmount();
    Ok(0)
}

#[cfg(not(unix))]
async fn serve(target: MountTarget, _table: MappingTable) -> error::Result<i32> {
    Err(FlexError::Unsupported(format!(
        "no host driver is available on this platform to mount {:?}",
        target
    )))
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    tracing::info!("Shutdown requested");
}
