use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use toolwarden_core::error::AccessError;
use toolwarden_core::types::{CommandDenyRule, RootKind};

const OUTSIDE_DETAIL: &str = "Path is outside allowed directories";
const PARENT_OUTSIDE_DETAIL: &str = "Path does not exist and its nearest existing parent is outside allowed directories";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathReason {
    Ok,
    OutsideAllowedRoots,
    DoesNotExistAndParentDisallowed,
    ResolutionError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDecision {
    pub requested_path: String,
    pub resolved_path: Option<PathBuf>,
    pub exists: bool,
    pub allowed: bool,
    pub reason: PathReason,
    pub root: Option<RootKind>,
    /// Resolution failure cause, for the operator log only.
    #[serde(skip)]
    pub detail: Option<String>,
}

/// A path the gatekeeper let through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedPath {
    pub path: PathBuf,
    pub exists: bool,
    pub root: RootKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDecision {
    pub requested_command: String,
    pub extracted_tokens: Vec<String>,
    pub blocked: bool,
    pub matched_rule: Option<CommandDenyRule>,
}

impl PathDecision {
    pub(crate) fn resolution_error(requested: &str, detail: impl Into<String>) -> Self {
        Self {
            requested_path: requested.to_string(),
            resolved_path: None,
            exists: false,
            allowed: false,
            reason: PathReason::ResolutionError,
            root: None,
            detail: Some(detail.into()),
        }
    }

    pub fn into_result(self) -> Result<AuthorizedPath, AccessError> {
        match (self.reason, self.resolved_path, self.root) {
            (PathReason::Ok, Some(path), Some(root)) => Ok(AuthorizedPath {
                path,
                exists: self.exists,
                root,
            }),
            (PathReason::Ok, _, _) => Err(AccessError::ResolutionError {
                detail: "decision is missing its resolved path".to_string(),
            }),
            (PathReason::OutsideAllowedRoots, _, _) => Err(AccessError::AccessDenied {
                detail: OUTSIDE_DETAIL.to_string(),
            }),
            (PathReason::DoesNotExistAndParentDisallowed, _, _) => {
                Err(AccessError::AccessDenied {
                    detail: PARENT_OUTSIDE_DETAIL.to_string(),
                })
            }
            (PathReason::ResolutionError, _, _) => Err(AccessError::ResolutionError {
                detail: self
                    .detail
                    .unwrap_or_else(|| "path could not be resolved".to_string()),
            }),
        }
    }
}

impl CommandDecision {
    pub fn into_result(self) -> Result<Vec<String>, AccessError> {
        match self.matched_rule {
            Some(rule) => Err(AccessError::CommandBlocked {
                program: rule.program,
                category: rule.category,
            }),
            None => Ok(self.extracted_tokens),
        }
    }
}
