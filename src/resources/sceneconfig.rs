//! Demo runner configuration resource.
//!
//! Settings loaded from an INI file. Every key is optional; missing keys keep
//! their defaults.
//!
//! # Configuration File Format
//!
//! ```ini
//! [demo]
//! members = 16
//! ticks = 600
//! seed = 42
//! reorder_every = 30
//!
//! [time]
//! fixed_delta = 0.016666
//! time_scale = 1.0
//!
//! [log]
//! filter = info
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

const DEFAULT_MEMBERS: u32 = 16;
const DEFAULT_TICKS: u64 = 600;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_REORDER_EVERY: u64 = 30;
const DEFAULT_FIXED_DELTA: f32 = 1.0 / 60.0;
const DEFAULT_TIME_SCALE: f32 = 1.0;
const DEFAULT_CONFIG_PATH: &str = "./scenekit.ini";

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Number of demo members to spawn.
    pub members: u32,
    /// Number of ticks to run before tearing down.
    pub ticks: u64,
    /// Seed for the demo's random priorities.
    pub seed: u64,
    /// Shuffle one member's priorities every this many ticks (0 disables).
    pub reorder_every: u64,
    /// Unscaled seconds per tick.
    pub fixed_delta: f32,
    pub time_scale: f32,
    /// `env_logger` filter; `None` falls back to `RUST_LOG` / "info".
    pub log_filter: Option<String>,
    pub config_path: PathBuf,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneConfig {
    pub fn new() -> Self {
        Self {
            members: DEFAULT_MEMBERS,
            ticks: DEFAULT_TICKS,
            seed: DEFAULT_SEED,
            reorder_every: DEFAULT_REORDER_EVERY,
            fixed_delta: DEFAULT_FIXED_DELTA,
            time_scale: DEFAULT_TIME_SCALE,
            log_filter: None,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current values.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;
        self.apply(&config)?;

        info!(
            "Loaded config: members={}, ticks={}, seed={}, reorder_every={}, dt={}, scale={}",
            self.members,
            self.ticks,
            self.seed,
            self.reorder_every,
            self.fixed_delta,
            self.time_scale
        );
        Ok(())
    }

    /// Load configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        self.apply(&config)
    }

    fn apply(&mut self, config: &Ini) -> Result<(), String> {
        // [demo] section
        if let Some(members) = config.getuint("demo", "members")? {
            self.members = u32::try_from(members)
                .map_err(|_| format!("demo.members is out of range, got {}", members))?;
        }
        if let Some(ticks) = config.getuint("demo", "ticks")? {
            self.ticks = ticks;
        }
        if let Some(seed) = config.getuint("demo", "seed")? {
            self.seed = seed;
        }
        if let Some(every) = config.getuint("demo", "reorder_every")? {
            self.reorder_every = every;
        }

        // [time] section
        if let Some(dt) = config.getfloat("time", "fixed_delta")? {
            if dt <= 0.0 {
                return Err(format!("time.fixed_delta must be positive, got {}", dt));
            }
            self.fixed_delta = dt as f32;
        }
        if let Some(scale) = config.getfloat("time", "time_scale")? {
            if scale < 0.0 {
                return Err(format!("time.time_scale must not be negative, got {}", scale));
            }
            self.time_scale = scale as f32;
        }

        // [log] section
        if let Some(filter) = config.get("log", "filter") {
            self.log_filter = Some(filter);
        }
        Ok(())
    }

    /// Save configuration to the INI file.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        config.set("demo", "members", Some(self.members.to_string()));
        config.set("demo", "ticks", Some(self.ticks.to_string()));
        config.set("demo", "seed", Some(self.seed.to_string()));
        config.set("demo", "reorder_every", Some(self.reorder_every.to_string()));
        config.set("time", "fixed_delta", Some(self.fixed_delta.to_string()));
        config.set("time", "time_scale", Some(self.time_scale.to_string()));
        if let Some(filter) = &self.log_filter {
            config.set("log", "filter", Some(filter.clone()));
        }

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);
        Ok(())
    }
}
