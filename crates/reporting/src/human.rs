use std::path::Path;

use time::Duration;

use toolwarden_core::ipc::{ErrorPayload, StatusPayload};

use policy_engine::{CommandDecision, PathDecision, PathReason};

use crate::redact::redact_path;

pub fn render_path_decision(decision: &PathDecision, home: Option<&Path>) -> String {
    let verdict = if decision.allowed { "allowed" } else { "denied" };
    let mut lines = vec![format!("{verdict}: {}", decision.requested_path)];
    if let Some(resolved) = &decision.resolved_path {
        let state = if decision.exists { "" } else { " (does not exist yet)" };
        lines.push(format!("  resolved: {}{state}", redact_path(resolved, home)));
    }
    match (decision.reason, decision.root) {
        (PathReason::Ok, Some(root)) => lines.push(format!("  root: {root}")),
        (PathReason::Ok, None) => {}
        (PathReason::OutsideAllowedRoots, _) => {
            lines.push("  reason: outside allowed directories".to_string())
        }
        (PathReason::DoesNotExistAndParentDisallowed, _) => {
            lines.push("  reason: nearest existing parent is outside allowed directories".to_string())
        }
        (PathReason::ResolutionError, _) => lines.push("  reason: path could not be resolved".to_string()),
    }
    lines.join("\n")
}

pub fn render_command_decision(decision: &CommandDecision) -> String {
    let mut lines = Vec::new();
    match &decision.matched_rule {
        Some(rule) => lines.push(format!("blocked: '{}' ({})", rule.program, rule.category)),
        None => lines.push("allowed".to_string()),
    }
    if !decision.extracted_tokens.is_empty() {
        lines.push(format!("  programs: {}", decision.extracted_tokens.join(", ")));
    }
    lines.join("\n")
}

pub fn render_status(status: &StatusPayload) -> String {
    let uptime = format_duration(Duration::seconds(status.uptime_seconds as i64));
    let stats = &status.stats;
    format!(
        "Daemon up for {uptime}, {requests} requests served.\n\
         Paths checked: {paths} ({denied} denied, {errors} unresolvable)\n\
         Commands checked: {commands} ({blocked} blocked)",
        requests = status.requests_served,
        paths = stats.path_checks,
        denied = stats.paths_denied,
        errors = stats.resolution_errors,
        commands = stats.command_checks,
        blocked = stats.commands_blocked,
    )
}

pub fn render_error(payload: &ErrorPayload) -> String {
    format!("{}: {}", payload.kind, payload.details)
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.whole_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
