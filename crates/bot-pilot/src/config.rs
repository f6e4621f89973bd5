//! Configuration file loading for the pilot.
//!
//! Settings live in `pilot.toml` in the working directory unless another
//! path is given. Every field has a default, so a missing file or an empty
//! table is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::intake::{DEFAULT_CAPACITY, DEFAULT_VARIANTS};
use crate::session::SessionSettings;
use crate::uci_client::Clock;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server mode: playing challengers on the matchmaking service.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Engine launched for every game.
    pub engine: PathBuf,
    /// Posted to the player chat at the start of each game.
    pub greeting: Option<String>,
    /// Challenges waiting for a decision beyond this are declined.
    pub max_pending_challenges: usize,
    /// Games played at once; further game starts are refused.
    pub max_concurrent_games: usize,
    /// Variant keys the bot accepts.
    pub variants: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            engine: PathBuf::from("./engine"),
            greeting: Some("Good luck, have fun!".to_string()),
            max_pending_challenges: DEFAULT_CAPACITY,
            max_concurrent_games: 1,
            variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            engine: self.engine.clone(),
            greeting: self.greeting.clone().filter(|g| !g.is_empty()),
        }
    }
}

/// Self-play defaults; command-line flags take precedence.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SelfPlayConfig {
    pub games: u32,
    /// Concurrent games. Unset means one per CPU.
    pub parallel: Option<usize>,
    pub wtime: u64,
    pub btime: u64,
    pub winc: u64,
    pub binc: u64,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            games: 40,
            parallel: None,
            wtime: 0,
            btime: 0,
            winc: 0,
            binc: 0,
        }
    }
}

impl SelfPlayConfig {
    pub fn clock(&self) -> Clock {
        Clock::new(self.wtime, self.btime, self.winc, self.binc)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct PilotConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub selfplay: SelfPlayConfig,
}

impl PilotConfig {
    /// Loads the configuration from [`Self::config_path()`].
    ///
    /// # Errors
    ///
    /// See [`Self::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads the configuration at `path`, or the defaults if there is no
    /// file there.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file exists but cannot be read,
    /// or [`ConfigError::Parse`] if the file contains invalid TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Returns `pilot.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("pilot.toml")
    }
}
