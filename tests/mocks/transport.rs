//! Mock lobby coordinator transport

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use tablestake::{
    ChannelTransport, InboundEvent, LobbySnapshot, MatchStart, NetworkError, OutboundEvent,
    SeatAck, SeatRequest, SubscriptionId, Topic,
};

/// Transport that records everything sent and lets tests play the coordinator
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    emitted: Mutex<Vec<OutboundEvent>>,
    seat_requests: Mutex<Vec<SeatRequest>>,
    pending_acks: Mutex<VecDeque<oneshot::Sender<SeatAck>>>,
    /// Answer every seat request immediately with this ack
    auto_ack: Mutex<Option<SeatAck>>,
    subscribers: Mutex<HashMap<SubscriptionId, (Topic, mpsc::UnboundedSender<InboundEvent>)>>,
    next_subscription: AtomicU64,
}

impl MockTransport {
    /// Create a connected transport
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            emitted: Mutex::new(Vec::new()),
            seat_requests: Mutex::new(Vec::new()),
            pending_acks: Mutex::new(VecDeque::new()),
            auto_ack: Mutex::new(None),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn disconnected() -> Self {
        let transport = Self::new();
        transport.set_connected(false);
        transport
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn with_auto_ack(self, ack: SeatAck) -> Self {
        *self.auto_ack.lock().unwrap() = Some(ack);
        self
    }

    /// Answer the oldest unanswered seat request. Returns false if nobody
    /// is listening for it anymore.
    pub fn ack(&self, ack: SeatAck) -> bool {
        match self.pending_acks.lock().unwrap().pop_front() {
            Some(sender) => sender.send(ack).is_ok(),
            None => false,
        }
    }

    /// Lose the oldest seat acknowledgement without answering
    pub fn drop_ack(&self) -> bool {
        self.pending_acks.lock().unwrap().pop_front().is_some()
    }

    /// Deliver a pushed event to every live subscriber of its topic
    pub fn push(&self, event: InboundEvent) -> usize {
        let topic = event.topic();
        self.subscribers
            .lock()
            .unwrap()
            .values()
            .filter(|(subscribed, _)| *subscribed == topic)
            .filter(|(_, sink)| sink.send(event.clone()).is_ok())
            .count()
    }

    pub fn push_lobby(&self, snapshot: LobbySnapshot) -> usize {
        self.push(InboundEvent::LobbyUpdate(snapshot))
    }

    pub fn push_start(&self, start: MatchStart) -> usize {
        self.push(InboundEvent::GameStart(start))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn emitted(&self) -> Vec<OutboundEvent> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn emitted_names(&self) -> Vec<&'static str> {
        self.emitted.lock().unwrap().iter().map(OutboundEvent::name).collect()
    }

    /// How many times `name` was emitted
    pub fn emitted_count(&self, name: &str) -> usize {
        self.emitted_names().into_iter().filter(|emitted| *emitted == name).count()
    }

    pub fn seat_requests(&self) -> Vec<SeatRequest> {
        self.seat_requests.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OutboundEvent) -> Result<(), NetworkError> {
        if !self.is_connected() {
            return Err(NetworkError::ConnectionFailed {
                message: "socket closed".to_string(),
            });
        }
        self.emitted.lock().unwrap().push(event);
        Ok(())
    }

    fn seat_table(&self, request: SeatRequest, ack: oneshot::Sender<SeatAck>) -> Result<(), NetworkError> {
        if !self.is_connected() {
            return Err(NetworkError::ConnectionFailed {
                message: "socket closed".to_string(),
            });
        }
        self.seat_requests.lock().unwrap().push(request);

        let auto_ack = self.auto_ack.lock().unwrap().clone();
        match auto_ack {
            Some(answer) => {
                let _ = ack.send(answer);
            }
            None => self.pending_acks.lock().unwrap().push_back(ack),
        }
        Ok(())
    }

    fn subscribe(&self, topic: Topic, sink: mpsc::UnboundedSender<InboundEvent>) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().insert(id, (topic, sink));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().remove(&id);
    }
}
