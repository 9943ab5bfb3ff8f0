use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use toolwarden_core::config::TerminalConfig;
use toolwarden_core::error::GatewayError;

use policy_engine::{AuthorizedPath, Gatekeeper};

pub mod command;
pub mod env;
pub mod lifecycle;

use command::RunnerCommand;
pub use lifecycle::ExecutionResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentDirectory {
    pub current_directory: PathBuf,
    pub is_allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentListing {
    pub environment_variables: BTreeMap<String, String>,
    pub count: usize,
}

/// Runs caller-supplied command lines after the gatekeeper has screened
/// both the line and the working directory.
#[derive(Debug, Clone)]
pub struct TerminalGateway {
    gatekeeper: Arc<Gatekeeper>,
    workspace_dir: PathBuf,
    default_timeout: Duration,
    max_output_length: usize,
}

impl TerminalGateway {
    pub fn new(gatekeeper: Arc<Gatekeeper>, workspace_dir: PathBuf, settings: &TerminalConfig) -> Self {
        Self {
            gatekeeper,
            workspace_dir,
            default_timeout: Duration::from_secs(settings.command_timeout_secs),
            max_output_length: settings.max_output_length,
        }
    }

    pub async fn execute(
        &self,
        line: &str,
        working_dir: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Result<ExecutionResult, GatewayError> {
        if line.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("Empty command".to_string()));
        }
        self.gatekeeper.authorize_command(line).into_result()?;

        let timeout = match timeout_secs {
            Some(0) => {
                return Err(GatewayError::InvalidRequest(
                    "timeout must be at least one second".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => self.default_timeout,
        };

        let requested_dir = working_dir
            .map(str::to_string)
            .unwrap_or_else(|| self.workspace_dir.display().to_string());
        let gatekeeper = self.gatekeeper.clone();
        let cwd = tokio::task::spawn_blocking(move || authorize_working_dir(&gatekeeper, &requested_dir))
            .await
            .map_err(|err| GatewayError::Io(format!("authorization task failed: {err}")))??;

        let env = env::sanitize_env(&env::capture_env());
        let command = RunnerCommand::from_line(line, cwd.path, env, timeout)?;
        info!(program = %command.program, timeout_secs = timeout.as_secs(), "executing command");
        lifecycle::run(line, &command, self.max_output_length).await
    }

    pub fn current_directory(&self) -> Result<CurrentDirectory, GatewayError> {
        let cwd = std::env::current_dir().map_err(|err| GatewayError::io("read current directory", err))?;
        let decision = self.gatekeeper.authorize_path(&cwd.to_string_lossy());
        Ok(CurrentDirectory {
            current_directory: decision.resolved_path.unwrap_or(cwd),
            is_allowed: decision.allowed,
        })
    }

    pub fn environment(&self) -> EnvironmentListing {
        let environment_variables = self.gatekeeper.redact_environment(env::capture_env());
        debug!(count = environment_variables.len(), "environment listed");
        EnvironmentListing {
            count: environment_variables.len(),
            environment_variables,
        }
    }
}

fn authorize_working_dir(gatekeeper: &Gatekeeper, raw: &str) -> Result<AuthorizedPath, GatewayError> {
    let target = gatekeeper.authorize_path(raw).into_result()?;
    if !target.exists {
        return Err(GatewayError::NotFound(format!("Directory does not exist: {raw}")));
    }
    if !target.path.is_dir() {
        return Err(GatewayError::NotADirectory(raw.to_string()));
    }
    Ok(target)
}
