use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DenyCategory;

#[derive(Debug, Error)]
pub enum ToolWardenError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no usable allowed root directory")]
    EmptyRootSet,
    #[error("io error: {0}")]
    Io(String),
}

/// Refusals handed back to gateways by the gatekeeper.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AccessError {
    #[error("access denied: {detail}")]
    AccessDenied { detail: String },
    #[error("path resolution failed: {detail}")]
    ResolutionError { detail: String },
    #[error("command '{program}' is blocked ({category})")]
    CommandBlocked {
        program: String,
        category: DenyCategory,
    },
}

/// Everything a filesystem or terminal operation can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("a file already exists at {0}")]
    ExistsAsFile(String),
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("cannot decode file with {encoding} encoding, try 'binary' encoding")]
    Encoding { encoding: String },
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("io error: {0}")]
    Io(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Access(AccessError::AccessDenied { .. }) => "AccessDenied",
            GatewayError::Access(AccessError::ResolutionError { .. }) => "ResolutionError",
            GatewayError::Access(AccessError::CommandBlocked { .. }) => "CommandBlocked",
            GatewayError::NotFound(_) => "NotFound",
            GatewayError::NotAFile(_) => "NotAFile",
            GatewayError::NotADirectory(_) => "NotADirectory",
            GatewayError::ExistsAsFile(_) => "ExistsAsFile",
            GatewayError::DirectoryNotEmpty(_) => "DirectoryNotEmpty",
            GatewayError::Encoding { .. } => "EncodingError",
            GatewayError::TooLarge { .. } => "TooLarge",
            GatewayError::InvalidRequest(_) => "InvalidRequest",
            GatewayError::Io(_) => "IoError",
        }
    }

    pub fn io(context: &str, err: std::io::Error) -> Self {
        GatewayError::Io(format!("{context}: {err}"))
    }
}
