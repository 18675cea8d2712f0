//! Match channel: thin wrapper over the lobby message protocol

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use crate::error::{NetworkError, StakeFlowError};
use crate::events::{InboundEvent, OutboundEvent, ParticipantId, SeatAck, SeatRequest, Topic};

/// Handle returned by a transport subscription
pub type SubscriptionId = u64;

/// Bidirectional message transport to the remote lobby coordinator.
///
/// Acknowledgements are at-most-once: the transport may drop `ack` without
/// ever answering. Pushed events are forwarded to every live subscriber of
/// their topic until it is unsubscribed.
pub trait ChannelTransport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Fire-and-forget send
    fn emit(&self, event: OutboundEvent) -> Result<(), NetworkError>;

    /// Send `seatTable`; the coordinator's answer is delivered through `ack`
    fn seat_table(&self, request: SeatRequest, ack: oneshot::Sender<SeatAck>) -> Result<(), NetworkError>;

    fn subscribe(&self, topic: Topic, sink: mpsc::UnboundedSender<InboundEvent>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Per-attempt view of the transport that owns its subscriptions
pub struct MatchChannel {
    transport: Arc<dyn ChannelTransport>,
    subscriptions: Vec<SubscriptionId>,
}

impl MatchChannel {
    pub fn new(transport: Arc<dyn ChannelTransport>) -> Self {
        Self {
            transport,
            subscriptions: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn send(&self, event: OutboundEvent) {
        let name = event.name();
        if let Err(error) = self.transport.emit(event) {
            warn!(event = name, %error, "Channel emit failed");
        } else {
            debug!(event = name, "Channel event sent");
        }
    }

    /// Announce presence to the coordinator
    pub fn register(&self, participant_id: &ParticipantId) {
        self.send(OutboundEvent::Register {
            participant_id: participant_id.clone(),
        });
    }

    /// Send the seat request. Exactly one ack is expected on the returned
    /// receiver, but the caller must bound the wait itself.
    pub fn request_seat(&self, request: SeatRequest) -> Result<oneshot::Receiver<SeatAck>, StakeFlowError> {
        request.validate()?;
        let (ack_tx, ack_rx) = oneshot::channel();
        self.transport.seat_table(request, ack_tx).map_err(|error| {
            warn!(%error, "Seat request could not be sent");
            StakeFlowError::ChannelUnavailable
        })?;
        Ok(ack_rx)
    }

    pub fn on_lobby_snapshot(&mut self, sink: mpsc::UnboundedSender<InboundEvent>) -> SubscriptionId {
        self.subscribe(Topic::LobbyUpdate, sink)
    }

    pub fn on_match_start(&mut self, sink: mpsc::UnboundedSender<InboundEvent>) -> SubscriptionId {
        self.subscribe(Topic::GameStart, sink)
    }

    fn subscribe(&mut self, topic: Topic, sink: mpsc::UnboundedSender<InboundEvent>) -> SubscriptionId {
        let id = self.transport.subscribe(topic, sink);
        self.subscriptions.push(id);
        debug!(topic = topic.event_name(), subscription = id, "Subscribed");
        id
    }

    /// Tell the coordinator the local side is ready once seated
    pub fn confirm_ready(&self, participant_id: &ParticipantId, table_id: &str) {
        self.send(OutboundEvent::ConfirmReady {
            participant_id: participant_id.clone(),
            table_id: table_id.to_string(),
        });
    }

    /// Best-effort notice that a pending table is being abandoned
    pub fn leave(&self, participant_id: &ParticipantId, table_id: &str) {
        self.send(OutboundEvent::LeaveLobby {
            participant_id: participant_id.clone(),
            table_id: table_id.to_string(),
        });
    }

    /// Drop every subscription this channel made. Returns how many were live.
    pub fn unsubscribe_all(&mut self) -> usize {
        let count = self.subscriptions.len();
        for id in self.subscriptions.drain(..) {
            self.transport.unsubscribe(id);
        }
        count
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for MatchChannel {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

impl std::fmt::Debug for MatchChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchChannel")
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}
