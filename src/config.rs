//! Configuration management for the staking flow

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use crate::error::{FlowResult, StakeFlowError};
use crate::game::{GameCatalog, GameDescriptor};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStakeConfig {
    /// Network wait bounds
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Attempt admission rules
    #[serde(default)]
    pub guard: GuardConfig,
    /// Extra or overriding game lobbies
    #[serde(default)]
    pub games: Vec<GameDescriptor>,
}

/// Default bounds on the two network-dependent waits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// How long to wait for the one-shot seat acknowledgement
    pub seat_ack_timeout_ms: u64,
    /// How long to wait for an opponent once seated
    pub matchmaking_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            seat_ack_timeout_ms: 12_000,
            matchmaking_timeout_ms: 30_000,
        }
    }
}

/// Attempt admission rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Refuse a second attempt for a participant while one is in flight
    pub reject_concurrent_attempts: bool,
}

impl TableStakeConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> FlowResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| StakeFlowError::Configuration {
            message: format!("Failed to read config file: {}", e),
            field: "config_file".to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML configuration
    pub fn from_toml_str(content: &str) -> FlowResult<Self> {
        let config: TableStakeConfig = toml::from_str(content).map_err(|e| {
            StakeFlowError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                field: "config_format".to_string(),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> FlowResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| StakeFlowError::Configuration {
            message: format!("Failed to serialize config: {}", e),
            field: "config_serialization".to_string(),
        })?;

        fs::write(path, content).map_err(|e| StakeFlowError::Configuration {
            message: format!("Failed to write config file: {}", e),
            field: "config_write".to_string(),
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> FlowResult<()> {
        if self.timeouts.seat_ack_timeout_ms == 0 {
            return Err(StakeFlowError::Configuration {
                message: "Seat-ack timeout must be greater than 0".to_string(),
                field: "timeouts.seat_ack_timeout_ms".to_string(),
            });
        }

        if self.timeouts.matchmaking_timeout_ms == 0 {
            return Err(StakeFlowError::Configuration {
                message: "Matchmaking timeout must be greater than 0".to_string(),
                field: "timeouts.matchmaking_timeout_ms".to_string(),
            });
        }

        if self.timeouts.matchmaking_timeout_ms < self.timeouts.seat_ack_timeout_ms {
            return Err(StakeFlowError::Configuration {
                message: "Matchmaking timeout must not be shorter than the seat-ack timeout".to_string(),
                field: "timeouts".to_string(),
            });
        }

        for game in &self.games {
            game.validate()?;
        }

        Ok(())
    }

    /// Built-in lobbies with the configured ones layered on top
    pub fn catalog(&self) -> FlowResult<GameCatalog> {
        let mut catalog = GameCatalog::builtin();
        for game in &self.games {
            catalog.register(game.clone())?;
        }
        Ok(catalog)
    }

    /// Short waits for local testing against a dev coordinator
    pub fn development() -> Self {
        Self {
            timeouts: TimeoutConfig {
                seat_ack_timeout_ms: 3_000,
                matchmaking_timeout_ms: 10_000,
            },
            guard: GuardConfig {
                reject_concurrent_attempts: true,
            },
            games: Vec::new(),
        }
    }
}
