//! CLI command handlers.

pub mod config;
pub mod list;
pub mod show;
pub mod sweep;
pub mod teardown;
pub mod watch;

use detective_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration after discovery and merging.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}
