pub mod config;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod paths;
pub mod types;

pub use config::{Config, ConfigPaths, DenyRuleConfig};
pub use error::{AccessError, GatewayError, ToolWardenError};
pub use ipc::{ErrorPayload, ToolRequest, ToolResponse};
pub use paths::{AllowedRoot, AllowedRootSet, RootContext};
pub use types::{CommandDenyRule, DenyCategory, RootKind};
