//! Caller-facing handle, callbacks and outcome of one attempt

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::error::StakeFlowError;
use crate::events::{ParticipantId, PlayerInfo};
use crate::wallet::ConsumedStake;
use super::state::FlowStatus;

/// Delivered to the caller when the coordinator starts the match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchStarted {
    pub participant_id: ParticipantId,
    pub table_id: String,
    pub players: Vec<PlayerInfo>,
    pub current_turn: Option<String>,
    pub max_players: u8,
    /// The escrowed stake now owned by the match, if the attempt had one
    pub stake: Option<ConsumedStake>,
}

/// What happened to the escrowed stake of a failed or cancelled attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    /// No debit existed
    NotRequired,
    Refunded,
    /// The refund entry could not be recorded; needs reconciliation
    RefundFailed,
    /// The attempt task ended abnormally
    Unknown,
}

/// Terminal result of an attempt
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Started(MatchStarted),
    Failed {
        error: StakeFlowError,
        refund: RefundStatus,
    },
    /// Ended by `cleanup()`
    Cancelled {
        refund: RefundStatus,
    },
}

impl AttemptOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, AttemptOutcome::Started(_))
    }

    pub fn error(&self) -> Option<&StakeFlowError> {
        match self {
            AttemptOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn refund(&self) -> RefundStatus {
        match self {
            AttemptOutcome::Started(_) => RefundStatus::NotRequired,
            AttemptOutcome::Failed { refund, .. } | AttemptOutcome::Cancelled { refund } => *refund,
        }
    }
}

/// Notifications from a running attempt. All methods default to no-ops.
///
/// Invoked from the attempt's task; keep them short and non-blocking.
pub trait MatchCallbacks: Send + Sync {
    fn on_status(&self, _status: &FlowStatus) {}

    fn on_match_start(&self, _started: &MatchStarted) {}

    fn on_failure(&self, _error: &StakeFlowError) {}
}

/// Callbacks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl MatchCallbacks for NoopCallbacks {}

/// Handle to a running attempt.
///
/// Dropping the handle does not stop the attempt: its timers still bound it
/// and any debit is still refunded on failure.
#[derive(Debug)]
pub struct MatchHandle {
    attempt_id: Uuid,
    cancel: CancellationToken,
    status: watch::Receiver<FlowStatus>,
    task: Option<JoinHandle<AttemptOutcome>>,
    outcome: Option<AttemptOutcome>,
}

impl MatchHandle {
    pub(crate) fn new(
        attempt_id: Uuid,
        cancel: CancellationToken,
        status: watch::Receiver<FlowStatus>,
        task: JoinHandle<AttemptOutcome>,
    ) -> Self {
        Self {
            attempt_id,
            cancel,
            status,
            task: Some(task),
            outcome: None,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// Request cancellation. Safe from any state; only the first call has an
    /// effect. Returns whether this call issued the cancellation.
    pub fn cleanup(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Latest published status
    pub fn status(&self) -> FlowStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn subscribe_status(&self) -> watch::Receiver<FlowStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some() || self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the terminal outcome. Can be awaited repeatedly.
    pub async fn wait(&mut self) -> AttemptOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let outcome = match self.task.take() {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => AttemptOutcome::Failed {
                    error: StakeFlowError::Internal {
                        message: format!("attempt task ended abnormally: {join_error}"),
                    },
                    refund: RefundStatus::Unknown,
                },
            },
            None => AttemptOutcome::Failed {
                error: StakeFlowError::Internal {
                    message: "attempt outcome already taken".to_string(),
                },
                refund: RefundStatus::Unknown,
            },
        };

        self.outcome = Some(outcome.clone());
        outcome
    }
}
