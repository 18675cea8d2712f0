//! SeatRequest and SeatAck payloads

use serde::{Deserialize, Serialize};
use crate::error::{FlowResult, StakeFlowError};
use super::{validate_identifier, ParticipantId, PlayerInfo};

/// One-shot request for a seat at a pending table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRequest {
    pub participant_id: ParticipantId,
    pub game_type: String,
    pub stake: u64,
    pub token: String,
    pub max_players: u8,
    pub player_name: String,
    #[serde(default)]
    pub avatar: String,
    pub mode: String,
    #[serde(rename = "tableId", skip_serializing_if = "Option::is_none")]
    pub table_hint: Option<String>,
    /// Game-specific parameters (variant, ball set, board size...)
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl SeatRequest {
    /// Wire fields that flattened game parameters may not reuse
    pub const RESERVED_FIELDS: [&'static str; 9] = [
        "participantId", "gameType", "stake", "token", "maxPlayers",
        "playerName", "avatar", "mode", "tableId",
    ];

    pub fn validate(&self) -> FlowResult<()> {
        if self.game_type.is_empty() {
            return Err(StakeFlowError::Validation {
                message: "Game type cannot be empty".to_string(),
                field: Some("gameType".to_string()),
            });
        }

        if self.max_players < 2 {
            return Err(StakeFlowError::Validation {
                message: format!("A table needs at least 2 seats, got {}", self.max_players),
                field: Some("maxPlayers".to_string()),
            });
        }

        if let Some(hint) = &self.table_hint {
            validate_identifier(hint, "tableId")?;
        }

        if let Some(key) = self.params.keys().find(|k| Self::RESERVED_FIELDS.contains(&k.as_str())) {
            return Err(StakeFlowError::Validation {
                message: format!("Game parameter {key:?} collides with a seat request field"),
                field: Some(key.clone()),
            });
        }

        Ok(())
    }
}

/// The single acknowledgement to a SeatRequest
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeatAck {
    pub success: bool,
    pub table_id: Option<String>,
    pub players: Vec<PlayerInfo>,
    pub ready: Vec<String>,
    pub max_players: Option<u8>,
    pub current_turn: Option<String>,
    pub message: Option<String>,
}

impl SeatAck {
    pub fn accepted(table_id: impl Into<String>) -> Self {
        Self {
            success: true,
            table_id: Some(table_id.into()),
            ..Default::default()
        }
    }

    pub fn rejected(message: Option<String>) -> Self {
        Self {
            success: false,
            message,
            ..Default::default()
        }
    }

    /// Table granted by this ack. A success without a table id is not a seat.
    pub fn seated_table(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.table_id.as_deref().filter(|id| !id.is_empty())
    }
}
