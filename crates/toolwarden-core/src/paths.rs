use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use tracing::{debug, warn};

use crate::config::{Config, ToolWardenConfig};
use crate::error::ToolWardenError;
use crate::types::RootKind;

/// System directories that may never become (or contain) an allowed root.
pub const PROTECTED_SYSTEM_DIRS: &[&str] = &[
    "/etc",
    "/sys",
    "/proc",
    "/dev",
    "/boot",
    "/root",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/var/log",
    "/var/run",
    "/run",
];

/// Host directories the root set is derived from. Handed in explicitly so
/// nothing downstream reads ambient process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootContext {
    pub workspace_dir: PathBuf,
    pub home_dir: Option<PathBuf>,
    pub cwd: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoot {
    pub kind: RootKind,
    pub path: PathBuf,
}

/// Canonical directories under which operations are permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRootSet {
    roots: Vec<AllowedRoot>,
}

impl RootContext {
    /// Reads the home directory and cwd of the running process and creates
    /// the configured workspace.
    pub fn from_process(config: &Config) -> Result<Self> {
        let cwd = std::env::current_dir().context("read current directory")?;
        let workspace_dir = config.ensure_workspace(&cwd)?;
        let home_dir = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Ok(Self {
            workspace_dir,
            home_dir,
            cwd,
        })
    }
}

impl AllowedRootSet {
    /// Builds the set from the workspace, home and cwd candidates. Candidates
    /// that cannot be canonicalized, or land on `/` or inside a protected
    /// system directory once symlinks are resolved, are dropped.
    pub fn from_context(
        context: &RootContext,
        settings: &ToolWardenConfig,
    ) -> Result<Self, ToolWardenError> {
        let mut candidates = vec![(RootKind::Workspace, context.workspace_dir.clone())];
        if settings.allow_home {
            if let Some(home) = &context.home_dir {
                candidates.push((RootKind::Home, home.clone()));
            }
        }
        if settings.allow_cwd {
            candidates.push((RootKind::Cwd, context.cwd.clone()));
        }
        Self::from_candidates(candidates)
    }

    pub fn from_candidates<I>(candidates: I) -> Result<Self, ToolWardenError>
    where
        I: IntoIterator<Item = (RootKind, PathBuf)>,
    {
        let mut roots: Vec<AllowedRoot> = Vec::new();
        for (kind, candidate) in candidates {
            let canonical = match fs::canonicalize(&candidate) {
                Ok(path) => path,
                Err(err) => {
                    warn!(root = %kind, error = %err, "dropping allowed root that cannot be resolved");
                    continue;
                }
            };
            if !canonical.is_dir() {
                warn!(root = %kind, "dropping allowed root that is not a directory");
                continue;
            }
            if is_protected(&canonical) {
                warn!(root = %kind, path = %canonical.display(), "dropping allowed root inside a protected system directory");
                continue;
            }
            if contains_protected(&canonical) {
                warn!(root = %kind, path = %canonical.display(), "dropping allowed root that contains a protected system directory");
                continue;
            }
            if roots.iter().any(|root| root.path == canonical) {
                debug!(root = %kind, "allowed root duplicates an earlier entry");
                continue;
            }
            roots.push(AllowedRoot {
                kind,
                path: canonical,
            });
        }

        if roots.is_empty() {
            return Err(ToolWardenError::EmptyRootSet);
        }
        Ok(Self { roots })
    }

    pub fn roots(&self) -> &[AllowedRoot] {
        &self.roots
    }

    /// First root containing `path`, compared by whole path components.
    pub fn containing(&self, path: &Path) -> Option<&AllowedRoot> {
        self.roots.iter().find(|root| path.starts_with(&root.path))
    }

    pub fn is_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| root.path == path)
    }
}

/// True for the filesystem root and anything at or below a protected
/// system directory, under its literal or its symlink-resolved name.
pub fn is_protected(path: &Path) -> bool {
    if path.parent().is_none() {
        return true;
    }
    PROTECTED_SYSTEM_DIRS.iter().any(|dir| {
        let dir = Path::new(dir);
        if path.starts_with(dir) {
            return true;
        }
        match fs::canonicalize(dir) {
            Ok(real) => real.parent().is_some() && path.starts_with(real),
            Err(_) => false,
        }
    })
}

/// True when a protected system directory, under its literal or its
/// symlink-resolved name, lies at or below `path`.
pub fn contains_protected(path: &Path) -> bool {
    PROTECTED_SYSTEM_DIRS.iter().any(|dir| {
        let dir = Path::new(dir);
        if dir.starts_with(path) {
            return true;
        }
        match fs::canonicalize(dir) {
            Ok(real) => real.starts_with(path),
            Err(_) => false,
        }
    })
}
