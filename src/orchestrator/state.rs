//! Attempt states and the caller-visible status snapshot

use std::fmt;
use serde::Serialize;
use crate::events::PlayerInfo;

/// Status line texts shown while an attempt progresses
pub mod messages {
    pub const CHECKING_ACCOUNT: &str = "Checking your account…";
    pub const CHECKING_BALANCE: &str = "Checking balance…";
    pub const RESERVING_STAKE: &str = "Reserving stake…";
    pub const JOINING_ARENA: &str = "Joining the online arena…";
    pub const WAITING_FOR_PLAYERS: &str = "Waiting for another player…";
    pub const OPPONENT_JOINED: &str = "Opponent joined. Locking seats…";
    pub const MATCH_FOUND: &str = "Match found. Launching game…";
    pub const REFUNDING: &str = "Refunding your stake…";
    pub const CANCELLED: &str = "Matchmaking cancelled.";
}

/// Saga states. `MatchStarting` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    #[default]
    Idle,
    VerifyingAccount,
    CheckingBalance,
    DebitingStake,
    AwaitingSeatAck,
    WaitingForOpponents,
    MatchStarting,
    Refunding,
    Cancelled,
}

impl MatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchState::MatchStarting | MatchState::Cancelled)
    }

    /// Whether the attempt is still searching for a match
    pub fn is_matching(&self) -> bool {
        !matches!(self, MatchState::Idle | MatchState::MatchStarting | MatchState::Cancelled)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchState::Idle => "idle",
            MatchState::VerifyingAccount => "verifying_account",
            MatchState::CheckingBalance => "checking_balance",
            MatchState::DebitingStake => "debiting_stake",
            MatchState::AwaitingSeatAck => "awaiting_seat_ack",
            MatchState::WaitingForOpponents => "waiting_for_opponents",
            MatchState::MatchStarting => "match_starting",
            MatchState::Refunding => "refunding",
            MatchState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot of an attempt, published on every change
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FlowStatus {
    pub state: MatchState,
    pub matching: bool,
    pub message: String,
    pub error: Option<String>,
    pub table_id: Option<String>,
    pub players: Vec<PlayerInfo>,
    pub ready: Vec<String>,
    pub current_turn: Option<String>,
    pub max_players: u8,
    pub online_count: usize,
}

impl FlowStatus {
    pub fn new(max_players: u8) -> Self {
        Self {
            max_players,
            ..Default::default()
        }
    }

    /// Drop lobby details once the attempt has left its table
    pub(crate) fn clear_lobby(&mut self) {
        self.table_id = None;
        self.players.clear();
        self.ready.clear();
        self.current_turn = None;
        self.online_count = 0;
    }
}
