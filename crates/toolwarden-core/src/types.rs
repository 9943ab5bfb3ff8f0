use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a program sits on the command denylist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyCategory {
    PrivilegeEscalation,
    PermissionChange,
    SystemManagement,
    DiskOperation,
    Firewall,
    UserManagement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDenyRule {
    pub program: String,
    pub category: DenyCategory,
}

/// Which configured directory an allowed root came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    Workspace,
    Home,
    Cwd,
}

impl DenyCategory {
    pub const ALL: [DenyCategory; 6] = [
        DenyCategory::PrivilegeEscalation,
        DenyCategory::PermissionChange,
        DenyCategory::SystemManagement,
        DenyCategory::DiskOperation,
        DenyCategory::Firewall,
        DenyCategory::UserManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DenyCategory::PrivilegeEscalation => "privilege-escalation",
            DenyCategory::PermissionChange => "permission-change",
            DenyCategory::SystemManagement => "system-management",
            DenyCategory::DiskOperation => "disk-operation",
            DenyCategory::Firewall => "firewall",
            DenyCategory::UserManagement => "user-management",
        }
    }
}

impl fmt::Display for DenyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DenyCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        DenyCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| format!("unknown deny category: {value}"))
    }
}

impl CommandDenyRule {
    pub fn new(program: impl Into<String>, category: DenyCategory) -> Self {
        Self {
            program: program.into(),
            category,
        }
    }
}

impl RootKind {
    pub fn label(&self) -> &'static str {
        match self {
            RootKind::Workspace => "workspace",
            RootKind::Home => "home",
            RootKind::Cwd => "cwd",
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
