//! Stake debit and compensating refund bookkeeping

use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;
use crate::error::{ErrorContext, NetworkError, RefundReason, StakeFlowError};
use crate::events::{ParticipantId, Stake};

/// Ledger entry tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Stake,
    StakeRefund,
}

/// Audit metadata attached to every stake entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub game: String,
    pub players: u8,
    pub participant_id: String,
    pub debit_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RefundReason>,
}

/// A signed ledger record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub participant_id: ParticipantId,
    /// Negative for debits, positive for refunds
    pub amount: i64,
    pub token: String,
    pub kind: TransactionKind,
    pub metadata: TransactionMetadata,
}

/// Wallet backend. Balance arithmetic and persistence live behind it.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_balance(&self, participant_id: &ParticipantId) -> Result<u64, NetworkError>;

    async fn record_transaction(&self, entry: LedgerEntry) -> Result<(), NetworkError>;
}

/// An accepted stake debit that has not yet been consumed or refunded.
///
/// Deliberately not `Clone`: refunding or consuming takes it by value, so a
/// single debit can be resolved only once.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingDebit {
    debit_id: Uuid,
    participant_id: ParticipantId,
    amount: u64,
    token: String,
    issued_at: DateTime<Utc>,
}

impl PendingDebit {
    pub fn debit_id(&self) -> Uuid {
        self.debit_id
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Stake that ended up in a started match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedStake {
    pub debit_id: Uuid,
    pub table_id: String,
    pub amount: u64,
    pub token: String,
}

/// Records stake debits and refunds for one game lobby
#[derive(Clone)]
pub struct StakeLedgerClient {
    ledger: Arc<dyn Ledger>,
    game: String,
    players: u8,
}

impl StakeLedgerClient {
    pub fn new(ledger: Arc<dyn Ledger>, game: impl Into<String>, players: u8) -> Self {
        Self {
            ledger,
            game: game.into(),
            players,
        }
    }

    fn metadata(
        &self,
        participant_id: &ParticipantId,
        debit_id: Uuid,
        table_id: Option<&str>,
        reason: Option<RefundReason>,
    ) -> TransactionMetadata {
        TransactionMetadata {
            game: self.game.clone(),
            players: self.players,
            participant_id: participant_id.to_string(),
            debit_id,
            table_id: table_id.map(str::to_string),
            reason,
        }
    }

    /// Record the negative `stake` entry. No retry: a failure ends the attempt.
    pub async fn debit(
        &self,
        participant_id: &ParticipantId,
        stake: &Stake,
    ) -> Result<PendingDebit, StakeFlowError> {
        let signed = stake.signed_amount()?;
        let debit_id = Uuid::new_v4();

        let entry = LedgerEntry {
            participant_id: participant_id.clone(),
            amount: -signed,
            token: stake.token.clone(),
            kind: TransactionKind::Stake,
            metadata: self.metadata(participant_id, debit_id, None, None),
        };

        self.ledger
            .record_transaction(entry)
            .await
            .map_err(|source| StakeFlowError::DebitFailure { source })?;

        info!(
            participant_id = %participant_id,
            amount = stake.amount,
            token = %stake.token,
            %debit_id,
            game = %self.game,
            "Stake debited"
        );

        Ok(PendingDebit {
            debit_id,
            participant_id: participant_id.clone(),
            amount: stake.amount,
            token: stake.token.clone(),
            issued_at: Utc::now(),
        })
    }

    /// Record the positive `stake_refund` entry mirroring `debit`.
    ///
    /// Best-effort: a failed refund is logged and reported as `false`, the
    /// debit is gone either way.
    pub async fn refund(&self, debit: PendingDebit, reason: RefundReason, table_id: Option<&str>) -> bool {
        let amount = match i64::try_from(debit.amount) {
            Ok(amount) => amount,
            Err(_) => {
                error!(debit_id = %debit.debit_id, amount = debit.amount, "Refund amount out of ledger range");
                return false;
            }
        };

        let entry = LedgerEntry {
            participant_id: debit.participant_id.clone(),
            amount,
            token: debit.token.clone(),
            kind: TransactionKind::StakeRefund,
            metadata: self.metadata(&debit.participant_id, debit.debit_id, table_id, Some(reason)),
        };

        match self.ledger.record_transaction(entry).await {
            Ok(()) => {
                info!(
                    participant_id = %debit.participant_id,
                    amount = debit.amount,
                    token = %debit.token,
                    debit_id = %debit.debit_id,
                    %reason,
                    "Stake refunded"
                );
                true
            }
            Err(source) => {
                let context = ErrorContext::new("stake_ledger", "refund")
                    .with_metadata("participant_id", debit.participant_id.as_str())
                    .with_metadata("debit_id", &debit.debit_id.to_string())
                    .with_metadata("table_id", table_id.unwrap_or(""))
                    .with_metadata("reason", reason.as_str());
                error!(
                    error = %source,
                    correlation_id = %context.correlation_id,
                    metadata = ?context.metadata,
                    amount = debit.amount,
                    token = %debit.token,
                    "Stake refund failed; escrow needs manual reconciliation"
                );
                false
            }
        }
    }

    /// Resolve the debit into a started match. No ledger entry is written.
    pub fn consume(&self, debit: PendingDebit, table_id: &str) -> ConsumedStake {
        info!(
            participant_id = %debit.participant_id,
            debit_id = %debit.debit_id,
            table_id,
            amount = debit.amount,
            "Stake consumed by match"
        );
        ConsumedStake {
            debit_id: debit.debit_id,
            table_id: table_id.to_string(),
            amount: debit.amount,
            token: debit.token,
        }
    }
}

impl std::fmt::Debug for StakeLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakeLedgerClient")
            .field("game", &self.game)
            .field("players", &self.players)
            .finish()
    }
}
