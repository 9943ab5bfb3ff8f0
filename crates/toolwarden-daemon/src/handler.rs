use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use toolwarden_core::error::GatewayError;
use toolwarden_core::ipc::{ErrorPayload, ToolRequest, ToolResponse};

use fs_gateway::FilesystemGateway;

use crate::state::DaemonState;

pub async fn handle_request(state: &Arc<DaemonState>, request: ToolRequest) -> ToolResponse {
    let response = match request {
        ToolRequest::Ping => ToolResponse::Pong,
        ToolRequest::Status => ToolResponse::Status(state.status()),
        ToolRequest::CheckPath(payload) => {
            let gatekeeper = state.gatekeeper.clone();
            let decision =
                blocking(move || Ok(gatekeeper.authorize_path(&payload.path))).await;
            if let Ok(decision) = &decision {
                state.record(|stats| reporting::record_path(stats, decision));
            }
            respond(state, decision)
        }
        ToolRequest::CheckCommand(payload) => {
            let decision = state.gatekeeper.authorize_command(&payload.command);
            state.record(|stats| reporting::record_command(stats, &decision));
            respond(state, Ok(decision))
        }
        ToolRequest::ReadFile(payload) => {
            let result = filesystem(state, move |fs| fs.read_file(&payload.path, &payload.encoding)).await;
            respond(state, result)
        }
        ToolRequest::WriteFile(payload) => {
            let result = filesystem(state, move |fs| {
                fs.write_file(&payload.path, &payload.content, payload.create_dirs)
            })
            .await;
            respond(state, result)
        }
        ToolRequest::ListDirectory(payload) => {
            let result = filesystem(state, move |fs| {
                fs.list_directory(&payload.path, payload.show_hidden, payload.recursive)
            })
            .await;
            respond(state, result)
        }
        ToolRequest::CreateDirectory(payload) => {
            let result =
                filesystem(state, move |fs| fs.create_directory(&payload.path, payload.parents)).await;
            respond(state, result)
        }
        ToolRequest::DeletePath(payload) => {
            let result =
                filesystem(state, move |fs| fs.delete_path(&payload.path, payload.recursive)).await;
            respond(state, result)
        }
        ToolRequest::PathInfo(payload) => {
            let result = filesystem(state, move |fs| fs.path_info(&payload.path)).await;
            respond(state, result)
        }
        ToolRequest::Execute(payload) => {
            let result = state
                .terminal
                .execute(
                    &payload.command,
                    payload.working_dir.as_deref(),
                    payload.timeout_secs,
                )
                .await;
            respond(state, result)
        }
        ToolRequest::CurrentDirectory => {
            let terminal = state.terminal.clone();
            let result = blocking(move || terminal.current_directory()).await;
            respond(state, result)
        }
        ToolRequest::Environment => {
            let listing = state.terminal.environment();
            respond(state, Ok(listing))
        }
    };
    state.request_served();
    response
}

/// Runs a filesystem operation, authorization included, off the async workers.
async fn filesystem<T, F>(state: &Arc<DaemonState>, op: F) -> Result<T, GatewayError>
where
    T: Send + 'static,
    F: FnOnce(&FilesystemGateway) -> Result<T, GatewayError> + Send + 'static,
{
    let gateway = state.filesystem.clone();
    blocking(move || op(&gateway)).await
}

async fn blocking<T, F>(op: F) -> Result<T, GatewayError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, GatewayError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| GatewayError::Io(format!("worker task failed: {err}")))?
}

fn respond<T: Serialize>(state: &DaemonState, result: Result<T, GatewayError>) -> ToolResponse {
    match result {
        Ok(value) => match serde_json::to_value(&value) {
            Ok(value) => ToolResponse::Output(value),
            Err(err) => {
                error!(error = %err, "failed to serialize response");
                ToolResponse::Error(internal_error())
            }
        },
        Err(err) => {
            debug!(error = %err, "request failed");
            state.record(|stats| reporting::record_refusal(stats, &err));
            ToolResponse::Error(reporting::error_payload(&err))
        }
    }
}

pub fn internal_error() -> ErrorPayload {
    ErrorPayload {
        kind: "InternalError".to_string(),
        details: "Request could not be completed".to_string(),
        program: None,
        category: None,
    }
}
