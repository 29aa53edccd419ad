//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// voxbridge command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "voxbridge", about = "Chunk translation and lighting")]
pub struct CliArgs {
    /// Render radius in chunks.
    #[arg(long)]
    pub radius: Option<u32>,

    /// Lowest block y of the world.
    #[arg(long, allow_hyphen_values = true)]
    pub min_y: Option<i32>,

    /// World height in blocks.
    #[arg(long)]
    pub height: Option<u32>,

    /// Light cache capacity.
    #[arg(long)]
    pub cache_entries: Option<usize>,

    /// Light worker threads (0 = inline).
    #[arg(long)]
    pub worker_threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of ticks the demo session runs.
    #[arg(long, default_value_t = 100)]
    pub ticks: u32,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(r) = args.radius {
            self.view.radius = r;
        }
        if let Some(y) = args.min_y {
            self.world.min_y = y;
        }
        if let Some(h) = args.height {
            self.world.height = h;
        }
        if let Some(n) = args.cache_entries {
            self.light.cache_entries = n;
        }
        if let Some(n) = args.worker_threads {
            self.light.worker_threads = n;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs::parse_from(["voxbridge", "--radius", "4", "--min-y", "-128", "--worker-threads", "0"]);
        config.apply_cli_overrides(&args);
        assert_eq!(config.view.radius, 4);
        assert_eq!(config.world.min_y, -128);
        assert_eq!(config.light.worker_threads, 0);
        // Non-overridden fields retain defaults
        assert_eq!(config.world.height, 384);
        assert_eq!(config.light.cache_entries, 4096);
        assert_eq!(args.ticks, 100);
    }

    #[test]
    fn test_cli_no_override() {
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, Config::default());
    }
}
