use std::collections::HashMap;

use toolwarden_core::config::DenyRuleConfig;
use toolwarden_core::types::{CommandDenyRule, DenyCategory};

/// Programs that need (or grant) elevated privileges. Entries may be added
/// per category but never removed.
pub const DEFAULT_DENYLIST: &[(&str, DenyCategory)] = &[
    ("sudo", DenyCategory::PrivilegeEscalation),
    ("su", DenyCategory::PrivilegeEscalation),
    ("doas", DenyCategory::PrivilegeEscalation),
    ("pkexec", DenyCategory::PrivilegeEscalation),
    ("chmod", DenyCategory::PermissionChange),
    ("chown", DenyCategory::PermissionChange),
    ("chgrp", DenyCategory::PermissionChange),
    ("systemctl", DenyCategory::SystemManagement),
    ("service", DenyCategory::SystemManagement),
    ("reboot", DenyCategory::SystemManagement),
    ("shutdown", DenyCategory::SystemManagement),
    ("poweroff", DenyCategory::SystemManagement),
    ("halt", DenyCategory::SystemManagement),
    ("mkfs", DenyCategory::DiskOperation),
    ("fdisk", DenyCategory::DiskOperation),
    ("parted", DenyCategory::DiskOperation),
    ("gdisk", DenyCategory::DiskOperation),
    ("mount", DenyCategory::DiskOperation),
    ("umount", DenyCategory::DiskOperation),
    ("iptables", DenyCategory::Firewall),
    ("ufw", DenyCategory::Firewall),
    ("firewall-cmd", DenyCategory::Firewall),
    ("useradd", DenyCategory::UserManagement),
    ("usermod", DenyCategory::UserManagement),
    ("userdel", DenyCategory::UserManagement),
    ("groupadd", DenyCategory::UserManagement),
    ("groupmod", DenyCategory::UserManagement),
    ("groupdel", DenyCategory::UserManagement),
    ("passwd", DenyCategory::UserManagement),
];

/// Program name (lowercase) to rule, built-ins first, then configured extras.
#[derive(Debug, Clone)]
pub struct Denylist {
    rules: HashMap<String, CommandDenyRule>,
}

impl Denylist {
    pub fn with_extras(extras: &[DenyRuleConfig]) -> Self {
        let mut rules = HashMap::new();
        for (program, category) in DEFAULT_DENYLIST {
            rules.insert(
                (*program).to_string(),
                CommandDenyRule::new(*program, *category),
            );
        }
        for extra in extras {
            let program = extra.program.trim().to_lowercase();
            if program.is_empty() {
                continue;
            }
            rules
                .entry(program.clone())
                .or_insert_with(|| CommandDenyRule::new(program, extra.category));
        }
        Self { rules }
    }

    pub fn lookup(&self, program: &str) -> Option<&CommandDenyRule> {
        self.rules.get(program)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for Denylist {
    fn default() -> Self {
        Self::with_extras(&[])
    }
}
