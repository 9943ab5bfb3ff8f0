use std::collections::BTreeMap;

use tracing::{info, warn};

use toolwarden_core::config::Config;
use toolwarden_core::error::ToolWardenError;
use toolwarden_core::paths::{AllowedRootSet, RootContext};

mod decision;
pub mod denylist;
pub mod rules;

pub use decision::{AuthorizedPath, CommandDecision, PathDecision, PathReason};
pub use denylist::{Denylist, DEFAULT_DENYLIST};
pub use rules::environment::{EnvironmentRedactor, REDACTION_MASK, SENSITIVE_KEYWORDS};
pub use rules::filesystem::{FinalComponent, PathAuthorizer};
pub use rules::process::CommandAuthorizer;

/// Every authorization the tool surface makes goes through here. Built once
/// at startup and never mutated, so it can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    paths: PathAuthorizer,
    commands: CommandAuthorizer,
    redactor: EnvironmentRedactor,
}

impl Gatekeeper {
    pub fn from_config(config: &Config, context: &RootContext) -> Result<Self, ToolWardenError> {
        let roots = AllowedRootSet::from_context(context, &config.toolwarden)?;
        for root in roots.roots() {
            info!(root = %root.kind, "allowed root registered");
        }
        Ok(Self::with_parts(
            PathAuthorizer::new(roots, context),
            CommandAuthorizer::new(Denylist::with_extras(&config.terminal.extra_denylist)),
            EnvironmentRedactor::with_extras(config.redaction.extra_keywords.as_slice()),
        ))
    }

    pub fn with_parts(
        paths: PathAuthorizer,
        commands: CommandAuthorizer,
        redactor: EnvironmentRedactor,
    ) -> Self {
        Self {
            paths,
            commands,
            redactor,
        }
    }

    pub fn roots(&self) -> &AllowedRootSet {
        self.paths.roots()
    }

    pub fn authorize_path(&self, raw: &str) -> PathDecision {
        let decision = self.paths.authorize(raw);
        audit_path(&decision);
        decision
    }

    /// For operations on a directory entry itself (delete, lstat): a
    /// trailing symlink is not followed.
    pub fn authorize_path_entry(&self, raw: &str) -> PathDecision {
        let decision = self.paths.authorize_entry(raw);
        audit_path(&decision);
        decision
    }

    pub fn authorize_command(&self, command: &str) -> CommandDecision {
        let decision = self.commands.authorize(command);
        if let Some(rule) = &decision.matched_rule {
            warn!(program = %rule.program, category = %rule.category, "command blocked");
        }
        decision
    }

    pub fn redact_environment<I, K, V>(&self, snapshot: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.redactor.redact(snapshot)
    }
}

fn audit_path(decision: &PathDecision) {
    match decision.reason {
        PathReason::Ok => {}
        PathReason::ResolutionError => {
            warn!(reason = ?decision.reason, "path could not be resolved")
        }
        _ => info!(reason = ?decision.reason, "path denied"),
    }
}
