//! Lobby protocol payloads exchanged over the match channel

pub mod seat;
pub mod lobby;


pub use seat::{SeatRequest, SeatAck};
pub use lobby::{LobbySnapshot, MatchStart};

use std::fmt;
use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::error::{FlowResult, StakeFlowError};

// Protocol-level event names
pub const REGISTER_EVENT: &str = "register";
pub const SEAT_TABLE_EVENT: &str = "seatTable";
pub const CONFIRM_READY_EVENT: &str = "confirmReady";
pub const LEAVE_LOBBY_EVENT: &str = "leaveLobby";
pub const LOBBY_UPDATE_EVENT: &str = "lobbyUpdate";
pub const GAME_START_EVENT: &str = "gameStart";

static IDENTIFIER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn identifier_pattern() -> &'static Regex {
    IDENTIFIER_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.:@-]{1,128}$").expect("identifier pattern is a valid regex")
    })
}

/// Check that a participant or table identifier is safe to put on the wire
pub fn validate_identifier(value: &str, field: &str) -> FlowResult<()> {
    if identifier_pattern().is_match(value) {
        Ok(())
    } else {
        Err(StakeFlowError::Validation {
            message: format!("Invalid {field}: {value:?}"),
            field: Some(field.to_string()),
        })
    }
}

/// Stable local participant identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> FlowResult<Self> {
        let id = id.into();
        validate_identifier(&id, "participant_id")?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token amount a participant commits to enter a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub token: String,
    pub amount: u64,
}

impl Stake {
    pub fn new(token: impl Into<String>, amount: u64) -> FlowResult<Self> {
        let stake = Self {
            token: token.into(),
            amount,
        };
        stake.validate()?;
        Ok(stake)
    }

    /// Zero stakes skip the balance check and the debit entirely
    pub fn requires_escrow(&self) -> bool {
        self.amount > 0
    }

    /// Amount as a signed ledger value
    pub fn signed_amount(&self) -> FlowResult<i64> {
        i64::try_from(self.amount).map_err(|_| StakeFlowError::Validation {
            message: format!("Stake amount {} exceeds the ledger range", self.amount),
            field: Some("stake.amount".to_string()),
        })
    }

    pub fn validate(&self) -> FlowResult<()> {
        if self.token.trim().is_empty() {
            return Err(StakeFlowError::Validation {
                message: "Stake token cannot be empty".to_string(),
                field: Some("stake.token".to_string()),
            });
        }
        self.signed_amount()?;
        Ok(())
    }
}

/// A seated or waiting player as reported by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl PlayerInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Push subscriptions offered by the match channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    LobbyUpdate,
    GameStart,
}

impl Topic {
    pub fn event_name(&self) -> &'static str {
        match self {
            Topic::LobbyUpdate => LOBBY_UPDATE_EVENT,
            Topic::GameStart => GAME_START_EVENT,
        }
    }
}

/// Server-pushed events
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    LobbyUpdate(LobbySnapshot),
    GameStart(MatchStart),
}

impl InboundEvent {
    pub fn topic(&self) -> Topic {
        match self {
            InboundEvent::LobbyUpdate(_) => Topic::LobbyUpdate,
            InboundEvent::GameStart(_) => Topic::GameStart,
        }
    }

    pub fn table_id(&self) -> &str {
        match self {
            InboundEvent::LobbyUpdate(snapshot) => &snapshot.table_id,
            InboundEvent::GameStart(start) => &start.table_id,
        }
    }

    /// Decode a raw pushed frame by protocol event name
    pub fn parse(event_name: &str, payload: serde_json::Value) -> FlowResult<Self> {
        match event_name {
            LOBBY_UPDATE_EVENT => Ok(InboundEvent::LobbyUpdate(serde_json::from_value(payload)?)),
            GAME_START_EVENT => Ok(InboundEvent::GameStart(serde_json::from_value(payload)?)),
            other => Err(StakeFlowError::Validation {
                message: format!("Unknown inbound event {other:?}"),
                field: Some("event".to_string()),
            }),
        }
    }
}

/// Fire-and-forget events sent to the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundEvent {
    Register {
        #[serde(rename = "playerId")]
        participant_id: ParticipantId,
    },
    #[serde(rename_all = "camelCase")]
    ConfirmReady {
        participant_id: ParticipantId,
        table_id: String,
    },
    #[serde(rename_all = "camelCase")]
    LeaveLobby {
        participant_id: ParticipantId,
        table_id: String,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::Register { .. } => REGISTER_EVENT,
            OutboundEvent::ConfirmReady { .. } => CONFIRM_READY_EVENT,
            OutboundEvent::LeaveLobby { .. } => LEAVE_LOBBY_EVENT,
        }
    }

    pub fn to_payload(&self) -> FlowResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
