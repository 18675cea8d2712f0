//! TableStake - staked matchmaking with exactly-once escrow settlement
//!
//! TableStake takes a participant from "wants to play for a stake" to either a
//! started match or a full refund:
//! - Identity resolution and a pre-debit balance check
//! - A single stake debit held as a pending escrow
//! - Seat negotiation with a remote lobby coordinator over a message channel
//! - Compensating refunds on rejection, timeout or cancellation

pub mod error;
pub mod config;
pub mod events;
pub mod game;
pub mod wallet;
pub mod channel;
pub mod store;
pub mod orchestrator;
pub mod observability;

// Re-export commonly used types for convenience
pub use error::{FlowResult, NetworkError, RefundReason, StakeFlowError};

// Re-export wire payloads
pub use events::{
    InboundEvent, LobbySnapshot, MatchStart, OutboundEvent, ParticipantId, PlayerInfo, SeatAck,
    SeatRequest, Stake, Topic,
};

// Re-export game lobby descriptors
pub use game::{GameCatalog, GameDescriptor};

// Re-export wallet collaborators
pub use wallet::{
    AccountGuard, BalanceGate, IdentityProvider, Ledger, LedgerEntry, PendingDebit,
    StakeLedgerClient, TransactionKind,
};

// Re-export channel and store ports
pub use channel::{ChannelTransport, MatchChannel, SubscriptionId};
pub use store::{FileTableHintStore, InMemoryTableHintStore, TableHintStore};

// Re-export the orchestrator surface
pub use orchestrator::{
    AttemptOutcome, FlowStatus, MatchCallbacks, MatchHandle, MatchOrchestrator, MatchRequest,
    MatchStarted, MatchState, NoopCallbacks, OrchestratorDeps, RefundStatus,
};

// Re-export configuration interfaces
pub use config::{GuardConfig, TableStakeConfig, TimeoutConfig};

pub use observability::{MetricsSnapshot, SettlementMetrics};
