//! Engine configuration using TOML
//!
//! Stored in ~/.config/tetrs-arena/engine.toml (or platform equivalent).
//! Every section has defaults, so a partial file is fine.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::board::{BOARD_HEIGHT, BOARD_WIDTH};
use crate::error::ConfigError;
use crate::randomizer::RandomizerKind;
use crate::score::ScoringPolicy;
use crate::session::SessionRules;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a terminated session's final frame stays queryable
    pub retention_secs: u64,
    pub randomizer: RandomizerKind,
    /// Give solo sessions autonomous gravity too (room sessions always get it)
    pub solo_autotick: bool,
    /// Master seed; random when unset
    pub seed: Option<u64>,
    pub board: BoardSettings,
    pub scoring: ScoringPolicy,
    pub gravity: GravitySettings,
}

/// Board dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    pub width: usize,
    pub height: usize,
}

/// Gravity cadence: `max(floor, base - (level - 1) * step)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravitySettings {
    pub base_ms: u64,
    pub step_ms: u64,
    pub floor_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_secs: 30,
            randomizer: RandomizerKind::default(),
            solo_autotick: false,
            seed: None,
            board: BoardSettings::default(),
            scoring: ScoringPolicy::default(),
            gravity: GravitySettings::default(),
        }
    }
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            width: BOARD_WIDTH,
            height: BOARD_HEIGHT,
        }
    }
}

impl Default for GravitySettings {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            step_ms: 150,
            floor_ms: 200,
        }
    }
}

impl EngineConfig {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "tetrs", "tetrs-arena").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("engine.toml"))
    }

    /// Load from the default location. A missing file gives the defaults;
    /// a malformed one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let dir = Self::config_dir().ok_or(ConfigError::NoConfigDir)?;
        fs::create_dir_all(&dir)?;
        let path = dir.join("engine.toml");
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn session_rules(&self) -> SessionRules {
        SessionRules {
            width: self.board.width,
            height: self.board.height,
            scoring: self.scoring.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!((config.board.width, config.board.height), (10, 20));
        assert_eq!(config.retention(), Duration::from_secs(30));
        assert_eq!(config.scoring.hard_drop_bonus, 10);
        assert_eq!(config.gravity.floor_ms, 200);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            retention_secs = 5
            randomizer = "seven_bag"

            [gravity]
            base_ms = 800

            [scoring]
            hard_drop_bonus = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.retention_secs, 5);
        assert_eq!(config.randomizer, RandomizerKind::SevenBag);
        assert_eq!(config.gravity.base_ms, 800);
        assert_eq!(config.gravity.step_ms, 150);
        assert_eq!(config.scoring.hard_drop_bonus, 0);
        assert_eq!(config.scoring.tetris, 800);
        assert_eq!(config.board.width, 10);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(matches!(
            EngineConfig::from_toml("retention_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = EngineConfig::default();
        config.seed = Some(99);
        let text = toml::to_string_pretty(&config).unwrap();
        let back = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(back.seed, Some(99));
        assert_eq!(back.gravity, config.gravity);
    }
}
