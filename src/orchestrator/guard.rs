//! Opt-in guard against overlapping attempts by one participant

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::{FlowResult, StakeFlowError};
use crate::events::ParticipantId;

/// Participants with an attempt currently in flight
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    active: Mutex<HashSet<ParticipantId>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, HashSet<ParticipantId>> {
        // The set stays consistent even if a holder panicked
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the participant for the lifetime of the returned ticket
    pub fn try_acquire(self: &Arc<Self>, participant_id: &ParticipantId) -> FlowResult<InFlightTicket> {
        if !self.active().insert(participant_id.clone()) {
            return Err(StakeFlowError::AttemptInFlight {
                participant_id: participant_id.to_string(),
            });
        }
        Ok(InFlightTicket {
            registry: Arc::clone(self),
            participant_id: participant_id.clone(),
        })
    }

    pub fn is_active(&self, participant_id: &ParticipantId) -> bool {
        self.active().contains(participant_id)
    }

    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }
}

/// Releases the participant when dropped
#[derive(Debug)]
pub struct InFlightTicket {
    registry: Arc<InFlightRegistry>,
    participant_id: ParticipantId,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.registry.active().remove(&self.participant_id);
    }
}
