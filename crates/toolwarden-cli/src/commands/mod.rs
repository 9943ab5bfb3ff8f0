use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::debug;

use toolwarden_core::config::{Config, ConfigPaths};
use toolwarden_core::error::GatewayError;
use toolwarden_core::paths::RootContext;

use fs_gateway::FilesystemGateway;
use policy_engine::Gatekeeper;
use reporting::human::render_error;
use reporting::json::render_json;
use runner::TerminalGateway;

pub mod check;
pub mod config;
pub mod daemon;
pub mod exec;
pub mod fs;

/// Effective configuration plus the gatekeeper built from it.
pub struct Session {
    pub config: Config,
    pub context: RootContext,
    pub gatekeeper: Arc<Gatekeeper>,
    pub json: bool,
}

/// Config file (or defaults) with environment overrides applied.
pub fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let config_path = match config_path {
        Some(path) => path,
        None => ConfigPaths::resolve()?.config_path,
    };
    let mut config = Config::load_or_default(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    config.apply_env_overrides(std::env::vars())?;
    Ok(config)
}

impl Session {
    pub fn open(config: Config, json: bool) -> Result<Self> {
        let context = RootContext::from_process(&config)?;
        let gatekeeper = Gatekeeper::from_config(&config, &context)
            .context("build allowed root set")?;
        debug!(roots = gatekeeper.roots().roots().len(), "session opened");
        Ok(Self {
            config,
            context,
            gatekeeper: Arc::new(gatekeeper),
            json,
        })
    }

    pub fn filesystem(&self) -> FilesystemGateway {
        FilesystemGateway::new(self.gatekeeper.clone(), &self.config.filesystem)
    }

    pub fn terminal(&self) -> TerminalGateway {
        TerminalGateway::new(
            self.gatekeeper.clone(),
            self.context.workspace_dir.clone(),
            &self.config.terminal,
        )
    }

    /// Prints a gateway result, or turns its error into the caller-facing
    /// payload and fails.
    pub fn emit<T: Serialize>(&self, result: Result<T, GatewayError>) -> Result<()> {
        match result {
            Ok(value) => {
                println!("{}", render_json(&value));
                Ok(())
            }
            Err(err) => {
                let payload = reporting::error_payload(&err);
                if self.json {
                    println!("{}", render_json(&payload));
                }
                Err(anyhow!(render_error(&payload)))
            }
        }
    }
}
