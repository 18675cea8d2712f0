//! Per-game parameters for the generic staking flow

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::config::TimeoutConfig;
use crate::error::{FlowResult, StakeFlowError};

/// Smallest table the coordinator will seat
pub const MIN_PLAYERS: u8 = 2;
/// Largest table any lobby offers
pub const MAX_PLAYERS: u8 = 8;

/// Describes one game lobby: what it is called on the wire, how many seats a
/// table has, and how long each network wait may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDescriptor {
    /// Game type sent in the seat request
    pub game_type: String,
    /// Seats per table
    pub max_players: u8,
    /// Override of the global seat-ack timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_ack_timeout_ms: Option<u64>,
    /// Override of the global matchmaking timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matchmaking_timeout_ms: Option<u64>,
    /// Tag recorded as `game` in ledger metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_game_tag: Option<String>,
}

impl GameDescriptor {
    pub fn new(game_type: impl Into<String>, max_players: u8) -> Self {
        Self {
            game_type: game_type.into(),
            max_players,
            seat_ack_timeout_ms: None,
            matchmaking_timeout_ms: None,
            ledger_game_tag: None,
        }
    }

    pub fn with_timeouts(mut self, seat_ack_ms: u64, matchmaking_ms: u64) -> Self {
        self.seat_ack_timeout_ms = Some(seat_ack_ms);
        self.matchmaking_timeout_ms = Some(matchmaking_ms);
        self
    }

    pub fn with_matchmaking_timeout(mut self, matchmaking_ms: u64) -> Self {
        self.matchmaking_timeout_ms = Some(matchmaking_ms);
        self
    }

    pub fn ledger_game(&self) -> String {
        self.ledger_game_tag
            .clone()
            .unwrap_or_else(|| format!("{}-online", self.game_type))
    }

    /// Key under which the last joined table is remembered for this game
    pub fn table_hint_key(&self) -> String {
        format!("{}:current_table", self.game_type)
    }

    pub fn seat_ack_timeout(&self, defaults: &TimeoutConfig) -> Duration {
        Duration::from_millis(self.seat_ack_timeout_ms.unwrap_or(defaults.seat_ack_timeout_ms))
    }

    pub fn matchmaking_timeout(&self, defaults: &TimeoutConfig) -> Duration {
        Duration::from_millis(self.matchmaking_timeout_ms.unwrap_or(defaults.matchmaking_timeout_ms))
    }

    pub fn validate(&self) -> FlowResult<()> {
        if self.game_type.trim().is_empty() {
            return Err(StakeFlowError::Configuration {
                message: "Game type cannot be empty".to_string(),
                field: "games.game_type".to_string(),
            });
        }

        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(StakeFlowError::Configuration {
                message: format!(
                    "{} seats must be between {} and {}, got {}",
                    self.game_type, MIN_PLAYERS, MAX_PLAYERS, self.max_players
                ),
                field: "games.max_players".to_string(),
            });
        }

        if self.seat_ack_timeout_ms == Some(0) || self.matchmaking_timeout_ms == Some(0) {
            return Err(StakeFlowError::Configuration {
                message: format!("{} timeouts must be greater than 0", self.game_type),
                field: "games.timeouts".to_string(),
            });
        }

        Ok(())
    }
}
