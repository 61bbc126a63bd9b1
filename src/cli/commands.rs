use clap::Subcommand;

use super::config::ConfigArgs;
use super::replay::ReplayArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Replay a recorded page session through the collector
    Replay(ReplayArgs),

    /// Inspect or validate the collector configuration
    Config(ConfigArgs),
}
