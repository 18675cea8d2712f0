//! Lobby snapshot and match start pushes

use serde::{Deserialize, Serialize};
use super::PlayerInfo;

/// Current occupants of a pending table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LobbySnapshot {
    pub table_id: String,
    pub players: Vec<PlayerInfo>,
    pub ready: Vec<String>,
    pub current_turn: Option<String>,
    pub max_players: Option<u8>,
}

impl LobbySnapshot {
    /// Players other than `participant_id`
    pub fn opponents<'a>(&'a self, participant_id: &'a str) -> impl Iterator<Item = &'a PlayerInfo> + 'a {
        self.players.iter().filter(move |p| p.id != participant_id)
    }
}

/// Terminal push: the table is full and play has begun
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchStart {
    pub table_id: String,
    pub players: Vec<PlayerInfo>,
    pub current_turn: Option<String>,
}
