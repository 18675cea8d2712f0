//! Pre-debit funds check

use std::sync::Arc;
use tracing::debug;
use crate::error::StakeFlowError;
use crate::events::ParticipantId;
use super::ledger::Ledger;

/// Result of a balance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCheck {
    pub sufficient: bool,
    pub balance: u64,
}

/// Read-only balance query run before any irreversible action
#[derive(Clone)]
pub struct BalanceGate {
    ledger: Arc<dyn Ledger>,
}

impl BalanceGate {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn check(&self, participant_id: &ParticipantId, required: u64) -> Result<BalanceCheck, StakeFlowError> {
        let balance = self
            .ledger
            .get_balance(participant_id)
            .await
            .map_err(|source| StakeFlowError::BalanceQuery { source })?;

        let check = BalanceCheck {
            sufficient: balance >= required,
            balance,
        };
        debug!(participant_id = %participant_id, balance, required, sufficient = check.sufficient, "Balance checked");
        Ok(check)
    }
}

impl std::fmt::Debug for BalanceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceGate").finish_non_exhaustive()
    }
}
