//! Configuration for the voxbridge chunk translator.
//!
//! Settings persist to disk as a RON file, can be overridden from the
//! command line via clap and are reloaded on demand. Unknown fields are
//! ignored and missing ones fall back to defaults.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE, Config, DebugConfig, LightConfig, SchedulerConfig, ViewConfig, WorldConfig,
    default_config_dir,
};
pub use error::ConfigError;
