use std::io::{BufRead, BufReader, BufWriter, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFilePayload {
    pub path: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFilePayload {
    pub path: String,
    pub content: String,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDirectoryPayload {
    #[serde(default = "default_dir")]
    pub path: String,
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDirectoryPayload {
    pub path: String,
    #[serde(default = "default_true")]
    pub parents: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePathPayload {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPayload {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutePayload {
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStats {
    pub path_checks: u64,
    pub paths_denied: u64,
    pub resolution_errors: u64,
    pub command_checks: u64,
    pub commands_blocked: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    pub started_at: OffsetDateTime,
    pub uptime_seconds: u64,
    pub requests_served: u64,
    pub stats: DecisionStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ToolRequest {
    Ping,
    Status,
    CheckPath(PathPayload),
    CheckCommand(CommandPayload),
    ReadFile(ReadFilePayload),
    WriteFile(WriteFilePayload),
    ListDirectory(ListDirectoryPayload),
    CreateDirectory(CreateDirectoryPayload),
    DeletePath(DeletePathPayload),
    PathInfo(PathPayload),
    Execute(ExecutePayload),
    CurrentDirectory,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ToolResponse {
    Pong,
    Status(StatusPayload),
    Output(serde_json::Value),
    Error(ErrorPayload),
}

impl ToolRequest {
    /// Short name used in log lines; never includes request arguments.
    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::Ping => "ping",
            ToolRequest::Status => "status",
            ToolRequest::CheckPath(_) => "check_path",
            ToolRequest::CheckCommand(_) => "check_command",
            ToolRequest::ReadFile(_) => "read_file",
            ToolRequest::WriteFile(_) => "write_file",
            ToolRequest::ListDirectory(_) => "list_directory",
            ToolRequest::CreateDirectory(_) => "create_directory",
            ToolRequest::DeletePath(_) => "delete_path",
            ToolRequest::PathInfo(_) => "path_info",
            ToolRequest::Execute(_) => "execute",
            ToolRequest::CurrentDirectory => "current_directory",
            ToolRequest::Environment => "environment",
        }
    }
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}

pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime).join("toolwarden").join("toolwarden.sock");
    }
    PathBuf::from("/tmp").join("toolwarden.sock")
}

pub fn default_pid_path() -> PathBuf {
    if let Ok(runtime) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime).join("toolwarden").join("toolwarden.pid");
    }
    PathBuf::from("/tmp").join("toolwarden.pid")
}

pub fn resolve_socket_path() -> PathBuf {
    if let Ok(value) = std::env::var("TOOLWARDEN_SOCKET") {
        return PathBuf::from(value);
    }
    default_socket_path()
}

pub fn resolve_pid_path() -> PathBuf {
    if let Ok(value) = std::env::var("TOOLWARDEN_PID") {
        return PathBuf::from(value);
    }
    default_pid_path()
}

pub fn send_request(socket_path: &Path, request: &ToolRequest) -> Result<ToolResponse> {
    let stream = UnixStream::connect(socket_path)
        .with_context(|| format!("connect to daemon at {}", socket_path.display()))?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let payload = serde_json::to_string(request).context("serialize request")?;
    writer.write_all(payload.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let response = serde_json::from_str(&line).context("parse response")?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_fill_in() {
        let request: ToolRequest =
            serde_json::from_str(r#"{"type":"ListDirectory","payload":{}}"#).unwrap();
        assert_eq!(
            request,
            ToolRequest::ListDirectory(ListDirectoryPayload {
                path: ".".to_string(),
                show_hidden: false,
                recursive: false,
            })
        );

        let request: ToolRequest =
            serde_json::from_str(r#"{"type":"ReadFile","payload":{"path":"~/a.scad"}}"#).unwrap();
        assert_eq!(
            request,
            ToolRequest::ReadFile(ReadFilePayload {
                path: "~/a.scad".to_string(),
                encoding: "utf-8".to_string(),
            })
        );
    }

    #[test]
    fn unit_requests_parse_without_payload() {
        let request: ToolRequest = serde_json::from_str(r#"{"type":"Environment"}"#).unwrap();
        assert_eq!(request, ToolRequest::Environment);
        assert_eq!(request.name(), "environment");
    }

    #[test]
    fn error_payload_omits_empty_fields() {
        let payload = ErrorPayload {
            kind: "AccessDenied".to_string(),
            details: "Path is outside allowed directories".to_string(),
            program: None,
            category: None,
        };
        let value = serde_json::to_value(ToolResponse::Error(payload)).unwrap();
        assert_eq!(value["type"], "Error");
        assert!(value["payload"].get("program").is_none());
    }
}
