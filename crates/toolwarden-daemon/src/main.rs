use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use toolwarden_core::config::{Config, ConfigPaths};
use toolwarden_core::ipc::{resolve_pid_path, resolve_socket_path};
use toolwarden_core::paths::RootContext;

use policy_engine::Gatekeeper;

mod handler;
mod ipc;
mod state;

use state::DaemonState;

#[derive(Parser, Debug)]
#[command(name = "toolwarden-daemon", version, about = "toolwarden socket service")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config)?;
    toolwarden_core::logging::init(&config.logging.level);

    let context = RootContext::from_process(&config)?;
    let gatekeeper = Arc::new(
        Gatekeeper::from_config(&config, &context).context("build allowed root set")?,
    );
    let state = Arc::new(DaemonState::new(gatekeeper, &config, &context));

    let socket_path = resolve_socket_path();
    let pid_path = resolve_pid_path();
    let listener = ipc::bind(&socket_path).await?;
    write_pid_file(&pid_path)?;
    info!(socket = %socket_path.display(), "toolwarden daemon listening");

    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let outcome = tokio::select! {
        result = ipc::serve(listener, state) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
        _ = terminate.recv() => Ok(()),
    };

    cleanup(&socket_path, &pid_path);
    if let Err(err) = &outcome {
        error!(error = %err, "daemon stopped");
    } else {
        info!("toolwarden daemon stopped");
    }
    outcome
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => ConfigPaths::resolve()?.config_path,
    };
    let mut config = Config::load_or_default(&path)?;
    config.apply_env_overrides(std::env::vars())?;
    Ok(config)
}

fn write_pid_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create pid dir {}", parent.display()))?;
    }
    let pid = std::process::id();
    std::fs::write(path, pid.to_string())
        .with_context(|| format!("write pid file {}", path.display()))?;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("set pid permissions {}", path.display()))?;
    Ok(())
}

fn cleanup(socket_path: &Path, pid_path: &Path) {
    for path in [socket_path, pid_path] {
        if let Err(err) = std::fs::remove_file(path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                error!(path = %path.display(), error = %err, "cleanup failed");
            }
        }
    }
}
