//! Participant identity resolution

use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use crate::error::{NetworkError, StakeFlowError};
use crate::events::ParticipantId;

/// External identity service. May create an account on first use.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn ensure_account(&self) -> Result<String, NetworkError>;
}

/// Resolves the stable local participant id once and reuses it
pub struct AccountGuard {
    provider: Arc<dyn IdentityProvider>,
    resolved: OnceCell<ParticipantId>,
}

impl AccountGuard {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            resolved: OnceCell::new(),
        }
    }

    /// Idempotent: the provider is only consulted until it succeeds once
    pub async fn resolve(&self) -> Result<ParticipantId, StakeFlowError> {
        let id = self
            .resolved
            .get_or_try_init(|| async {
                let raw = self.provider.ensure_account().await.map_err(|source| {
                    warn!(error = %source, "Identity provider failed");
                    StakeFlowError::AccountResolution { source }
                })?;

                ParticipantId::new(raw.trim()).map_err(|_| StakeFlowError::AccountResolution {
                    source: NetworkError::InvalidResponse {
                        message: format!("Unusable participant id {raw:?}"),
                    },
                })
            })
            .await?;

        debug!(participant_id = %id, "Participant resolved");
        Ok(id.clone())
    }

    /// Cached id, if one was resolved already
    pub fn cached(&self) -> Option<&ParticipantId> {
        self.resolved.get()
    }
}

impl std::fmt::Debug for AccountGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountGuard")
            .field("resolved", &self.resolved.get())
            .finish()
    }
}
