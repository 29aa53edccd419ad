//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration.
pub const CONFIG_FILE: &str = "config.ron";

/// Top-level translator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Vertical extent of the destination world.
    pub world: WorldConfig,
    /// Render/load window settings.
    pub view: ViewConfig,
    /// Per-tick work budgets.
    pub scheduler: SchedulerConfig,
    /// Light cache and worker settings.
    pub light: LightConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World height configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Lowest block `y`. Must be a multiple of 16.
    pub min_y: i32,
    /// Total height in blocks. Must be a multiple of 16.
    pub height: u32,
}

/// View window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Render radius in chunks (Chebyshev distance).
    pub radius: u32,
    /// Move the client's chunk cache center to the player when a chunk is
    /// announced inside the load window but outside the render window.
    pub recenter_outside_render: bool,
}

/// Scheduler budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Dirty chunks converted and sent per tick.
    pub chunks_per_tick: usize,
    /// Pending relights processed per tick.
    pub light_updates_per_tick: usize,
    /// Maximum offsets in one sub-chunk request batch.
    pub sub_chunk_batch_size: usize,
}

/// Light cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightConfig {
    /// Maximum cached light results (0 disables caching).
    pub cache_entries: usize,
    /// Light worker threads (0 computes on the calling thread).
    pub worker_threads: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            min_y: -64,
            height: 384,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            radius: 8,
            recenter_outside_render: true,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chunks_per_tick: 4,
            light_updates_per_tick: 8,
            sub_chunk_batch_size: 256,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            cache_entries: 4096,
            worker_threads: 2,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl WorldConfig {
    /// Number of 16-block sections in a column.
    pub fn section_count(&self) -> usize {
        (self.height / 16) as usize
    }
}

/// Platform config directory for voxbridge, if the platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voxbridge"))
}

// --- Load / Save / Reload ---

impl WorldConfig {
    /// Section-aligned, non-empty world geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.height == 0 || self.height % 16 != 0 || self.min_y.rem_euclid(16) != 0 {
            return Err(ConfigError::InvalidWorld {
                min_y: self.min_y,
                height: self.height,
            });
        }
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
    let config: Config = ron::from_str(&text).map_err(ConfigError::ParseError)?;
    config.world.validate()?;
    Ok(config)
}

impl Config {
    /// Reads `config.ron` from `config_dir`, writing the defaults there first
    /// when the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            let defaults = Config::default();
            defaults.save(config_dir)?;
            log::info!("Wrote default voxbridge config to {}", path.display());
            return Ok(defaults);
        }
        let config = read_config(&path)?;
        log::info!(
            "Loaded {} (world {}..{}, radius {})",
            path.display(),
            config.world.min_y,
            config.world.min_y + config.world.height as i32,
            config.view.radius
        );
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;
        let pretty = ron::ser::PrettyConfig::new().depth_limit(2);
        let text = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;
        std::fs::write(config_dir.join(CONFIG_FILE), text).map_err(ConfigError::WriteError)
    }

    /// Re-reads the file; `Some` only when it differs from `self`.
    ///
    /// World geometry cannot change under a live store, so callers should only
    /// pick up the view, scheduler and debug sections from the result.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_dir.join(CONFIG_FILE))?;
        if fresh == *self {
            return Ok(None);
        }
        if fresh.world != self.world {
            log::warn!("World geometry changed on disk; takes effect on restart");
        }
        log::debug!("Config reloaded with changes");
        Ok(Some(fresh))
    }
}
