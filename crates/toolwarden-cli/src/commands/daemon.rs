use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};

use toolwarden_core::ipc::{
    resolve_pid_path, resolve_socket_path, send_request, ToolRequest, ToolResponse,
};

use reporting::human::{render_error, render_status};
use reporting::json::render_json;

#[derive(Debug)]
pub enum DaemonAction {
    Start {
        socket: Option<PathBuf>,
        pid: Option<PathBuf>,
        config: Option<PathBuf>,
    },
    Stop {
        pid: Option<PathBuf>,
    },
    Ping {
        socket: Option<PathBuf>,
    },
    Status {
        socket: Option<PathBuf>,
        json: bool,
    },
    SocketPath,
    PidPath,
}

pub fn execute(action: DaemonAction) -> Result<()> {
    match action {
        DaemonAction::Start {
            socket,
            pid,
            config,
        } => start_daemon(socket, pid, config),
        DaemonAction::Stop { pid } => stop_daemon(pid),
        DaemonAction::Ping { socket } => ping(socket),
        DaemonAction::Status { socket, json } => status(socket, json),
        DaemonAction::SocketPath => {
            println!("{}", resolve_socket_path().display());
            Ok(())
        }
        DaemonAction::PidPath => {
            println!("{}", resolve_pid_path().display());
            Ok(())
        }
    }
}

fn start_daemon(socket: Option<PathBuf>, pid: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let mut cmd = Command::new("toolwarden-daemon");
    if let Some(socket) = socket {
        cmd.env("TOOLWARDEN_SOCKET", socket);
    }
    if let Some(pid) = pid {
        cmd.env("TOOLWARDEN_PID", pid);
    }
    if let Some(config) = config {
        cmd.arg("--config").arg(config);
    }
    cmd.spawn().context("start toolwarden-daemon")?;
    println!("toolwarden daemon started.");
    Ok(())
}

fn stop_daemon(pid_override: Option<PathBuf>) -> Result<()> {
    let pid_path = pid_override.unwrap_or_else(resolve_pid_path);
    let pid_text = std::fs::read_to_string(&pid_path)
        .with_context(|| format!("read pid file {}", pid_path.display()))?;
    let pid: i32 = pid_text.trim().parse().context("parse pid")?;
    if pid <= 0 {
        return Err(anyhow::anyhow!("invalid pid {pid} in {}", pid_path.display()));
    }
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        return Err(anyhow::anyhow!("failed to stop daemon with pid {pid}"));
    }
    println!("toolwarden daemon stopped.");
    Ok(())
}

fn ping(socket_override: Option<PathBuf>) -> Result<()> {
    let socket = socket_override.unwrap_or_else(resolve_socket_path);
    match send_request(&socket, &ToolRequest::Ping)? {
        ToolResponse::Pong => {
            println!("toolwarden daemon is healthy.");
            Ok(())
        }
        ToolResponse::Error(error) => Err(anyhow::anyhow!(render_error(&error))),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

fn status(socket_override: Option<PathBuf>, json: bool) -> Result<()> {
    let socket = socket_override.unwrap_or_else(resolve_socket_path);
    match send_request(&socket, &ToolRequest::Status)? {
        ToolResponse::Status(payload) => {
            if json {
                println!("{}", render_json(&payload));
            } else {
                println!("{}", render_status(&payload));
            }
            Ok(())
        }
        ToolResponse::Error(error) => Err(anyhow::anyhow!(render_error(&error))),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}
