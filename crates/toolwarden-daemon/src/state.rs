use std::sync::{Arc, Mutex};

use time::OffsetDateTime;

use toolwarden_core::config::Config;
use toolwarden_core::ipc::{DecisionStats, StatusPayload};
use toolwarden_core::paths::RootContext;

use fs_gateway::FilesystemGateway;
use policy_engine::Gatekeeper;
use runner::TerminalGateway;

#[derive(Debug, Default)]
struct Counters {
    requests_served: u64,
    stats: DecisionStats,
}

/// Shared by every connection task. Only the counters change after start.
#[derive(Debug)]
pub struct DaemonState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub filesystem: FilesystemGateway,
    pub terminal: TerminalGateway,
    pub started_at: OffsetDateTime,
    counters: Mutex<Counters>,
}

impl DaemonState {
    pub fn new(gatekeeper: Arc<Gatekeeper>, config: &Config, context: &RootContext) -> Self {
        Self {
            filesystem: FilesystemGateway::new(gatekeeper.clone(), &config.filesystem),
            terminal: TerminalGateway::new(
                gatekeeper.clone(),
                context.workspace_dir.clone(),
                &config.terminal,
            ),
            gatekeeper,
            started_at: OffsetDateTime::now_utc(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn record<F: FnOnce(&mut DecisionStats)>(&self, update: F) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut counters.stats);
    }

    pub fn request_served(&self) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters.requests_served = counters.requests_served.saturating_add(1);
    }

    pub fn status(&self) -> StatusPayload {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let uptime = OffsetDateTime::now_utc() - self.started_at;
        StatusPayload {
            started_at: self.started_at,
            uptime_seconds: uptime.whole_seconds().max(0) as u64,
            requests_served: counters.requests_served,
            stats: counters.stats.clone(),
        }
    }
}
