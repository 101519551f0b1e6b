//! Runtime configuration (TOML).
//!
//! The file path comes from `DRILL_CONFIG_PATH`. Every field is optional; a
//! missing variable, unreadable file or invalid TOML leaves the defaults in
//! place and logs why.

use std::path::{Path, PathBuf};
use serde::Deserialize;
use tracing::{error, info};

use crate::drill_engine::{curriculum::BUILTIN_TRACKS, error::Result, persistence::STORAGE_KEY};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DrillConfig {
    /// Tracks to load, in order. The first track's rules apply to all.
    pub tracks: Vec<String>,
    /// Progress blob file.
    pub storage_path: PathBuf,
    /// Fixed seed for reproducible rounds; entropy when absent.
    pub rng_seed: Option<u64>,
    /// Unlock every stage on bootstrap.
    pub teacher_mode: bool,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            tracks: BUILTIN_TRACKS.iter().map(|t| t.to_string()).collect(),
            storage_path: PathBuf::from(format!("{STORAGE_KEY}.json")),
            rng_seed: None,
            teacher_mode: false,
        }
    }
}

pub fn parse_config(toml_text: &str) -> Result<DrillConfig> {
    Ok(toml::from_str(toml_text)?)
}

pub fn load_config(path: &Path) -> Result<DrillConfig> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Config from `DRILL_CONFIG_PATH`, or defaults.
pub fn load_config_from_env() -> DrillConfig {
    let Ok(path) = std::env::var("DRILL_CONFIG_PATH") else {
        return DrillConfig::default();
    };
    match load_config(Path::new(&path)) {
        Ok(cfg) => {
            info!(target: "arith_drill_gen", %path, "Loaded drill config (TOML)");
            cfg
        }
        Err(e) => {
            error!(target: "arith_drill_gen", %path, error = %e, "Failed to load TOML config; using defaults");
            DrillConfig::default()
        }
    }
}
