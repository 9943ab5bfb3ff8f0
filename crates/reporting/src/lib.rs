use toolwarden_core::error::{AccessError, GatewayError};
use toolwarden_core::ipc::{DecisionStats, ErrorPayload};

use policy_engine::{CommandDecision, PathDecision, PathReason};

pub mod human;
pub mod json;
pub mod redact;

/// Shown instead of the resolver's own message, which may name host paths.
const RESOLUTION_FAILED: &str = "Path could not be resolved";

/// Converts a gateway failure into what the caller is allowed to see.
pub fn error_payload(err: &GatewayError) -> ErrorPayload {
    match err {
        GatewayError::Access(AccessError::ResolutionError { .. }) => ErrorPayload {
            kind: "InternalError".to_string(),
            details: RESOLUTION_FAILED.to_string(),
            program: None,
            category: None,
        },
        GatewayError::Access(AccessError::CommandBlocked { program, category }) => ErrorPayload {
            kind: err.kind().to_string(),
            details: format!("Command '{program}' is blocked ({category})"),
            program: Some(program.clone()),
            category: Some(category.to_string()),
        },
        GatewayError::Access(AccessError::AccessDenied { detail }) => ErrorPayload {
            kind: err.kind().to_string(),
            details: detail.clone(),
            program: None,
            category: None,
        },
        other => ErrorPayload {
            kind: other.kind().to_string(),
            details: other.to_string(),
            program: None,
            category: None,
        },
    }
}

pub fn record_path(stats: &mut DecisionStats, decision: &PathDecision) {
    stats.path_checks = stats.path_checks.saturating_add(1);
    match decision.reason {
        PathReason::Ok => {}
        PathReason::ResolutionError => {
            stats.resolution_errors = stats.resolution_errors.saturating_add(1)
        }
        PathReason::OutsideAllowedRoots | PathReason::DoesNotExistAndParentDisallowed => {
            stats.paths_denied = stats.paths_denied.saturating_add(1)
        }
    }
}

pub fn record_command(stats: &mut DecisionStats, decision: &CommandDecision) {
    stats.command_checks = stats.command_checks.saturating_add(1);
    if decision.blocked {
        stats.commands_blocked = stats.commands_blocked.saturating_add(1);
    }
}

/// Counts an access refusal that surfaced from a gateway operation.
pub fn record_refusal(stats: &mut DecisionStats, err: &GatewayError) {
    match err {
        GatewayError::Access(AccessError::AccessDenied { .. }) => {
            stats.path_checks = stats.path_checks.saturating_add(1);
            stats.paths_denied = stats.paths_denied.saturating_add(1);
        }
        GatewayError::Access(AccessError::ResolutionError { .. }) => {
            stats.path_checks = stats.path_checks.saturating_add(1);
            stats.resolution_errors = stats.resolution_errors.saturating_add(1);
        }
        GatewayError::Access(AccessError::CommandBlocked { .. }) => {
            stats.command_checks = stats.command_checks.saturating_add(1);
            stats.commands_blocked = stats.commands_blocked.saturating_add(1);
        }
        _ => {}
    }
}
