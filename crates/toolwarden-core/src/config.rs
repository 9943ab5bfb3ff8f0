use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::types::DenyCategory;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub toolwarden: ToolWardenConfig,
    pub terminal: TerminalConfig,
    pub filesystem: FilesystemConfig,
    pub redaction: RedactionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolWardenConfig {
    /// Workspace root. Relative values are taken from the process cwd.
    pub workspace_dir: String,
    pub allow_home: bool,
    pub allow_cwd: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub command_timeout_secs: u64,
    pub max_output_length: usize,
    /// Additional programs for an existing deny category. Built-in entries
    /// cannot be removed from here.
    pub extra_denylist: Vec<DenyRuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyRuleConfig {
    pub program: String,
    pub category: DenyCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    pub max_read_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub extra_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for ToolWardenConfig {
    fn default() -> Self {
        Self {
            workspace_dir: "./workspace".to_string(),
            allow_home: true,
            allow_cwd: true,
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 120,
            max_output_length: 10_000,
            extra_denylist: Vec::new(),
        }
    }
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            max_read_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("parse config TOML")?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let output = toml::to_string_pretty(self).context("render config TOML")?;
        Ok(output)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Loads the file if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default_config());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let contents = self.to_toml_string()?;
        fs::write(path, contents).with_context(|| format!("write config at {}", path.display()))?;
        Ok(())
    }

    /// Applies `WORKSPACE_DIR`, `COMMAND_TIMEOUT`, `MAX_OUTPUT_LENGTH` and
    /// `LOG_LEVEL` from the given variables. Unrelated variables are ignored.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            match name.as_str() {
                "WORKSPACE_DIR" if !value.trim().is_empty() => {
                    self.toolwarden.workspace_dir = value;
                }
                "COMMAND_TIMEOUT" => {
                    self.terminal.command_timeout_secs = value
                        .trim()
                        .parse()
                        .with_context(|| format!("parse COMMAND_TIMEOUT={value}"))?;
                }
                "MAX_OUTPUT_LENGTH" => {
                    self.terminal.max_output_length = value
                        .trim()
                        .parse()
                        .with_context(|| format!("parse MAX_OUTPUT_LENGTH={value}"))?;
                }
                "LOG_LEVEL" if !value.trim().is_empty() => {
                    self.logging.level = value.trim().to_lowercase();
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Absolute workspace path, anchored at `cwd` when configured relative.
    pub fn workspace_path(&self, cwd: &Path) -> PathBuf {
        let configured = PathBuf::from(&self.toolwarden.workspace_dir);
        if configured.is_absolute() {
            configured
        } else {
            cwd.join(configured)
        }
    }

    pub fn models_dir(&self, cwd: &Path) -> PathBuf {
        self.workspace_path(cwd).join("models")
    }

    /// Creates the workspace and its `models` directory.
    pub fn ensure_workspace(&self, cwd: &Path) -> Result<PathBuf> {
        let workspace = self.workspace_path(cwd);
        let models = self.models_dir(cwd);
        fs::create_dir_all(&models)
            .with_context(|| format!("create workspace {}", workspace.display()))?;
        Ok(workspace)
    }
}

impl ConfigPaths {
    pub fn resolve() -> Result<Self> {
        let project_dirs = ProjectDirs::from("io", "toolwarden", "toolwarden")
            .ok_or_else(|| anyhow::anyhow!("unable to determine project directories"))?;
        let config_dir = project_dirs.config_dir();
        let data_dir = project_dirs.data_dir();
        Ok(Self {
            config_path: config_dir.join("config.toml"),
            data_dir: data_dir.to_path_buf(),
        })
    }
}
