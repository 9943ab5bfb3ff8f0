use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use toolwarden_core::ipc::{ErrorPayload, ToolRequest, ToolResponse};

use crate::handler::{handle_request, internal_error};
use crate::state::DaemonState;

/// Binds the socket with owner-only permissions, replacing a stale one.
/// Fails if another daemon is still answering on it.
pub async fn bind(socket_path: &Path) -> Result<UnixListener> {
    if let Some(parent) = socket_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create socket dir {}", parent.display()))?;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .with_context(|| format!("set socket dir permissions {}", parent.display()))?;
        }
    }
    if socket_path.exists() {
        if UnixStream::connect(socket_path).await.is_ok() {
            return Err(anyhow::anyhow!(
                "a daemon is already listening on {}",
                socket_path.display()
            ));
        }
        fs::remove_file(socket_path)
            .with_context(|| format!("remove stale socket {}", socket_path.display()))?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("bind socket {}", socket_path.display()))?;
    fs::set_permissions(socket_path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("set socket permissions {}", socket_path.display()))?;
    Ok(listener)
}

pub async fn serve(listener: UnixListener, state: Arc<DaemonState>) -> Result<()> {
    loop {
        let (stream, _) = listener.accept().await.context("accept connection")?;
        if let Err(err) = check_peer_uid(&stream) {
            warn!(error = %err, "rejected connection");
            continue;
        }
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state).await {
                debug!(error = %err, "connection closed with error");
            }
        });
    }
}

/// One JSON request per line, one JSON response per line, until EOF.
async fn handle_connection(stream: UnixStream, state: Arc<DaemonState>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request_id = Uuid::new_v4();
        let response = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => {
                let span = tracing::info_span!("request", id = %request_id, kind = request.name());
                async {
                    info!("request received");
                    handle_request(&state, request).await
                }
                .instrument(span)
                .await
            }
            Err(err) => {
                warn!(id = %request_id, error = %err, "malformed request");
                ToolResponse::Error(ErrorPayload {
                    kind: "InvalidRequest".to_string(),
                    details: "Request is not valid JSON for a known tool".to_string(),
                    program: None,
                    category: None,
                })
            }
        };

        let payload = serde_json::to_string(&response)
            .or_else(|_| serde_json::to_string(&ToolResponse::Error(internal_error())))
            .context("serialize response")?;
        write_half.write_all(payload.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;
    }
    Ok(())
}

fn check_peer_uid(stream: &UnixStream) -> Result<()> {
    let cred = stream.peer_cred().context("read peer credentials")?;
    let current = unsafe { libc::geteuid() };
    if cred.uid() != current {
        return Err(anyhow::anyhow!("unauthorized peer uid {}", cred.uid()));
    }
    Ok(())
}
