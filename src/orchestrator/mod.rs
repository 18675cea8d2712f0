//! Staked matchmaking saga
//!
//! One attempt runs as a single task that owns its state: the pending debit,
//! the pending table, both deadlines and the channel subscriptions. Cancel
//! requests, the seat acknowledgement, lobby pushes and the two timers are all
//! multiplexed in one `select!` loop, so no two handlers of an attempt ever run
//! concurrently. Every exit path goes through `finalize` or `finish_started`,
//! which resolve the pending debit exactly once.

pub mod state;
pub mod handle;
pub mod guard;

pub use state::{messages, FlowStatus, MatchState};
pub use handle::{AttemptOutcome, MatchCallbacks, MatchHandle, MatchStarted, NoopCallbacks, RefundStatus};
pub use guard::{InFlightRegistry, InFlightTicket};

use std::sync::Arc;
use std::time::Duration;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;
use crate::channel::{ChannelTransport, MatchChannel};
use crate::config::{TableStakeConfig, TimeoutConfig};
use crate::error::{FlowResult, RefundReason, StakeFlowError};
use crate::events::{
    validate_identifier, InboundEvent, LobbySnapshot, MatchStart, ParticipantId, SeatAck,
    SeatRequest, Stake,
};
use crate::game::{GameCatalog, GameDescriptor, MAX_PLAYERS, MIN_PLAYERS};
use crate::observability::SettlementMetrics;
use crate::store::TableHintStore;
use crate::wallet::{AccountGuard, BalanceGate, IdentityProvider, Ledger, PendingDebit, StakeLedgerClient};

/// Seat request mode for public matchmaking
pub const ONLINE_MODE: &str = "online";

/// What the caller asks for when starting an attempt
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub game_type: String,
    pub stake: Stake,
    pub player_name: Option<String>,
    pub avatar: Option<String>,
    /// Table the caller would like to rejoin, if any
    pub table_hint: Option<String>,
    /// Overrides the lobby's seat count
    pub max_players: Option<u8>,
    /// Game-specific seat request parameters
    pub params: Map<String, Value>,
}

impl MatchRequest {
    pub fn new(game_type: impl Into<String>, stake: Stake) -> Self {
        Self {
            game_type: game_type.into(),
            stake,
            player_name: None,
            avatar: None,
            table_hint: None,
            max_players: None,
            params: Map::new(),
        }
    }

    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_table_hint(mut self, table_id: impl Into<String>) -> Self {
        self.table_hint = Some(table_id.into());
        self
    }

    pub fn with_max_players(mut self, max_players: u8) -> Self {
        self.max_players = Some(max_players);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> FlowResult<()> {
        self.stake.validate()?;

        if let Some(hint) = &self.table_hint {
            validate_identifier(hint, "table_hint")?;
        }

        if let Some(seats) = self.max_players {
            if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&seats) {
                return Err(StakeFlowError::Validation {
                    message: format!("Seat count must be between {MIN_PLAYERS} and {MAX_PLAYERS}, got {seats}"),
                    field: Some("max_players".to_string()),
                });
            }
        }

        if let Some(key) = self.params.keys().find(|k| SeatRequest::RESERVED_FIELDS.contains(&k.as_str())) {
            return Err(StakeFlowError::Validation {
                message: format!("Game parameter {key:?} collides with a seat request field"),
                field: Some(key.clone()),
            });
        }

        Ok(())
    }
}

/// External collaborators shared by every attempt
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub ledger: Arc<dyn Ledger>,
    pub transport: Arc<dyn ChannelTransport>,
    pub hints: Arc<dyn TableHintStore>,
}

/// Starts staked matchmaking attempts
pub struct MatchOrchestrator {
    accounts: Arc<AccountGuard>,
    ledger: Arc<dyn Ledger>,
    transport: Arc<dyn ChannelTransport>,
    hints: Arc<dyn TableHintStore>,
    catalog: GameCatalog,
    timeouts: TimeoutConfig,
    in_flight: Option<Arc<InFlightRegistry>>,
    metrics: Arc<SettlementMetrics>,
}

impl MatchOrchestrator {
    pub fn new(deps: OrchestratorDeps, config: TableStakeConfig) -> FlowResult<Self> {
        config.validate()?;
        let catalog = config.catalog()?;
        let in_flight = config
            .guard
            .reject_concurrent_attempts
            .then(|| Arc::new(InFlightRegistry::new()));

        Ok(Self {
            accounts: Arc::new(AccountGuard::new(deps.identity)),
            ledger: deps.ledger,
            transport: deps.transport,
            hints: deps.hints,
            catalog,
            timeouts: config.timeouts,
            in_flight,
            metrics: Arc::new(SettlementMetrics::new()),
        })
    }

    /// Share a metrics registry with other orchestrators
    pub fn with_metrics(mut self, metrics: Arc<SettlementMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<SettlementMetrics> {
        &self.metrics
    }

    pub fn catalog(&self) -> &GameCatalog {
        &self.catalog
    }

    /// Attempts currently holding the concurrency guard. Always 0 when the
    /// guard is disabled.
    pub fn active_attempts(&self) -> usize {
        self.in_flight.as_ref().map_or(0, |registry| registry.len())
    }

    /// Table most recently joined for `game_type`, if still remembered
    pub fn last_table_hint(&self, game_type: &str) -> FlowResult<Option<String>> {
        let descriptor = self.catalog.get(game_type)?;
        self.hints.get(&descriptor.table_hint_key())
    }

    /// Start an attempt on the current tokio runtime.
    ///
    /// Request validation and game lookup fail here, before anything touches
    /// the ledger. Everything later is reported through the handle.
    pub fn start(&self, request: MatchRequest, callbacks: Arc<dyn MatchCallbacks>) -> FlowResult<MatchHandle> {
        request.validate()?;
        let descriptor = self.catalog.get(&request.game_type)?.clone();
        let max_players = request.max_players.unwrap_or(descriptor.max_players);

        let attempt_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(FlowStatus::new(max_players));

        let span = info_span!(
            "match_attempt",
            %attempt_id,
            game = %descriptor.game_type,
            participant_id = tracing::field::Empty,
        );

        let attempt = Attempt {
            seat_ack_timeout: descriptor.seat_ack_timeout(&self.timeouts),
            matchmaking_timeout: descriptor.matchmaking_timeout(&self.timeouts),
            stakes: StakeLedgerClient::new(Arc::clone(&self.ledger), descriptor.ledger_game(), max_players),
            balance: BalanceGate::new(Arc::clone(&self.ledger)),
            accounts: Arc::clone(&self.accounts),
            channel: MatchChannel::new(Arc::clone(&self.transport)),
            hints: Arc::clone(&self.hints),
            in_flight: self.in_flight.clone(),
            metrics: Arc::clone(&self.metrics),
            callbacks,
            cancel: cancel.clone(),
            status_tx,
            status: FlowStatus::new(max_players),
            request,
            descriptor,
            max_players,
            participant_id: None,
            ticket: None,
            pending_debit: None,
            pending_table: None,
            remembered_table: None,
            seat_requested_at: None,
            seat_deadline: None,
            match_deadline: None,
            outcome: None,
        };

        let task = tokio::spawn(attempt.run().instrument(span));
        Ok(MatchHandle::new(attempt_id, cancel, status_rx, task))
    }
}

impl std::fmt::Debug for MatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchOrchestrator")
            .field("games", &self.catalog.len())
            .field("timeouts", &self.timeouts)
            .field("guarded", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

/// How a failed attempt ends
enum Termination {
    Failed(StakeFlowError),
    Cancelled,
}

impl From<StakeFlowError> for Termination {
    fn from(error: StakeFlowError) -> Self {
        Termination::Failed(error)
    }
}

/// Resolves when `deadline` passes; never when there is none
async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Next seat acknowledgement; pending once the receiver has been consumed
async fn next_ack(ack_rx: &mut Option<oneshot::Receiver<SeatAck>>) -> Result<SeatAck, oneshot::error::RecvError> {
    match ack_rx {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// State owned by one running attempt
struct Attempt {
    request: MatchRequest,
    descriptor: GameDescriptor,
    max_players: u8,
    seat_ack_timeout: Duration,
    matchmaking_timeout: Duration,

    accounts: Arc<AccountGuard>,
    balance: BalanceGate,
    stakes: StakeLedgerClient,
    channel: MatchChannel,
    hints: Arc<dyn TableHintStore>,
    in_flight: Option<Arc<InFlightRegistry>>,
    metrics: Arc<SettlementMetrics>,
    callbacks: Arc<dyn MatchCallbacks>,
    cancel: CancellationToken,
    status_tx: watch::Sender<FlowStatus>,

    status: FlowStatus,
    participant_id: Option<ParticipantId>,
    ticket: Option<InFlightTicket>,
    pending_debit: Option<PendingDebit>,
    pending_table: Option<String>,
    /// Table id this attempt wrote into the hint store
    remembered_table: Option<String>,
    seat_requested_at: Option<Instant>,
    seat_deadline: Option<Instant>,
    match_deadline: Option<Instant>,
    outcome: Option<AttemptOutcome>,
}

impl Attempt {
    async fn run(mut self) -> AttemptOutcome {
        self.metrics.record_attempt();
        info!(
            stake = self.request.stake.amount,
            token = %self.request.stake.token,
            max_players = self.max_players,
            "Match attempt started"
        );

        match self.prepare().await {
            Ok(participant_id) => self.negotiate(participant_id).await,
            Err(termination) => self.finalize(termination).await,
        }
    }

    /// Resolve the participant and escrow the stake
    async fn prepare(&mut self) -> Result<ParticipantId, Termination> {
        self.transition(MatchState::VerifyingAccount, messages::CHECKING_ACCOUNT);
        let participant_id = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Termination::Cancelled),
            resolved = self.accounts.resolve() => resolved?,
        };
        Span::current().record("participant_id", tracing::field::display(&participant_id));
        self.participant_id = Some(participant_id.clone());

        if let Some(registry) = &self.in_flight {
            self.ticket = Some(registry.try_acquire(&participant_id)?);
        }

        if !self.request.stake.requires_escrow() {
            debug!("Zero stake, skipping escrow");
            return Ok(participant_id);
        }

        let required = self.request.stake.amount;
        self.transition(MatchState::CheckingBalance, messages::CHECKING_BALANCE);
        let check = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Termination::Cancelled),
            check = self.balance.check(&participant_id, required) => check?,
        };
        if !check.sufficient {
            return Err(StakeFlowError::InsufficientBalance {
                required,
                balance: check.balance,
            }
            .into());
        }

        // The debit is awaited to completion even if a cancel arrives, so its
        // outcome is always known before deciding on a refund.
        self.transition(MatchState::DebitingStake, messages::RESERVING_STAKE);
        let debit = self.stakes.debit(&participant_id, &self.request.stake).await?;
        self.metrics.record_debit(debit.amount());
        self.pending_debit = Some(debit);

        if self.cancel.is_cancelled() {
            return Err(Termination::Cancelled);
        }
        Ok(participant_id)
    }

    /// Request a seat and wait for the match to start
    async fn negotiate(&mut self, participant_id: ParticipantId) -> AttemptOutcome {
        if !self.channel.is_connected() {
            return self.finalize(StakeFlowError::ChannelUnavailable.into()).await;
        }

        self.transition(MatchState::AwaitingSeatAck, messages::JOINING_ARENA);
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        self.channel.on_lobby_snapshot(inbound_tx.clone());
        self.channel.on_match_start(inbound_tx);

        let requested_at = Instant::now();
        self.seat_requested_at = Some(requested_at);
        self.seat_deadline = Some(requested_at + self.seat_ack_timeout);

        self.channel.register(&participant_id);
        let request = self.seat_request(&participant_id);
        let mut ack_rx = match self.channel.request_seat(request) {
            Ok(rx) => Some(rx),
            Err(error) => return self.finalize(error.into()).await,
        };
        debug!(timeout_ms = duration_ms(self.seat_ack_timeout), "Seat requested");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return self.finalize(Termination::Cancelled).await;
                }
                ack = next_ack(&mut ack_rx) => {
                    ack_rx = None;
                    match ack {
                        Ok(ack) => {
                            if let Err(error) = self.on_seat_ack(&participant_id, ack) {
                                return self.finalize(error.into()).await;
                            }
                        }
                        Err(_) => warn!("Seat acknowledgement dropped, waiting for the seat-ack deadline"),
                    }
                }
                Some(event) = inbound_rx.recv() => {
                    if let Some(outcome) = self.on_inbound(&participant_id, event) {
                        return outcome;
                    }
                }
                _ = wait_deadline(self.seat_deadline) => {
                    let error = StakeFlowError::SeatAckTimeout {
                        duration_ms: duration_ms(self.seat_ack_timeout),
                    };
                    return self.finalize(error.into()).await;
                }
                _ = wait_deadline(self.match_deadline) => {
                    let error = StakeFlowError::MatchmakingTimeout {
                        duration_ms: duration_ms(self.matchmaking_timeout),
                        table_id: self.pending_table.clone().unwrap_or_default(),
                    };
                    return self.finalize(error.into()).await;
                }
            }
        }
    }

    fn seat_request(&self, participant_id: &ParticipantId) -> SeatRequest {
        let player_name = self
            .request
            .player_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Player {participant_id}"));

        SeatRequest {
            participant_id: participant_id.clone(),
            game_type: self.descriptor.game_type.clone(),
            stake: self.request.stake.amount,
            token: self.request.stake.token.clone(),
            max_players: self.max_players,
            player_name,
            avatar: self.request.avatar.clone().unwrap_or_default(),
            mode: ONLINE_MODE.to_string(),
            table_hint: self.request.table_hint.clone(),
            params: self.request.params.clone(),
        }
    }

    fn on_seat_ack(&mut self, participant_id: &ParticipantId, ack: SeatAck) -> FlowResult<()> {
        if let Some(requested_at) = self.seat_requested_at.take() {
            self.metrics.record_seat_ack_latency(requested_at.elapsed());
        }
        self.seat_deadline = None;

        let table_id = match ack.seated_table().map(str::to_string) {
            Some(table_id) => table_id,
            None => return Err(StakeFlowError::SeatRejected { message: ack.message }),
        };

        self.pending_table = Some(table_id.clone());
        self.match_deadline = Some(Instant::now() + self.matchmaking_timeout);

        if let Some(max_players) = ack.max_players {
            self.status.max_players = max_players;
        }
        self.status.online_count = ack.players.len();
        self.status.table_id = Some(table_id.clone());
        self.status.players = ack.players;
        self.status.ready = ack.ready;
        self.status.current_turn = ack.current_turn;
        self.remember_table(&table_id);

        info!(table_id = %table_id, "Seat acknowledged");
        self.transition(MatchState::WaitingForOpponents, messages::WAITING_FOR_PLAYERS);
        self.channel.confirm_ready(participant_id, &table_id);
        Ok(())
    }

    fn on_inbound(&mut self, participant_id: &ParticipantId, event: InboundEvent) -> Option<AttemptOutcome> {
        let Some(table_id) = self.pending_table.as_deref() else {
            debug!(topic = event.topic().event_name(), table_id = event.table_id(), "Ignoring lobby event before seat ack");
            return None;
        };
        if event.table_id() != table_id {
            debug!(
                topic = event.topic().event_name(),
                expected = table_id,
                received = event.table_id(),
                "Ignoring stale lobby event"
            );
            return None;
        }

        match event {
            InboundEvent::LobbyUpdate(snapshot) => {
                self.on_lobby_snapshot(participant_id, snapshot);
                None
            }
            InboundEvent::GameStart(start) => Some(self.finish_started(participant_id, start)),
        }
    }

    fn on_lobby_snapshot(&mut self, participant_id: &ParticipantId, snapshot: LobbySnapshot) {
        let opponents = snapshot.opponents(participant_id.as_str()).count();

        if let Some(max_players) = snapshot.max_players {
            self.status.max_players = max_players;
        }
        self.status.online_count = snapshot.players.len();
        self.status.players = snapshot.players;
        self.status.ready = snapshot.ready;
        self.status.current_turn = snapshot.current_turn;
        let message = if opponents > 0 {
            messages::OPPONENT_JOINED
        } else {
            messages::WAITING_FOR_PLAYERS
        };
        self.status.message = message.to_string();

        debug!(players = self.status.online_count, opponents, "Lobby updated");
        self.publish();
    }

    /// Terminal success: the debit is consumed by the match, never refunded
    fn finish_started(&mut self, participant_id: &ParticipantId, start: MatchStart) -> AttemptOutcome {
        self.seat_deadline = None;
        self.match_deadline = None;

        let stake = self
            .pending_debit
            .take()
            .map(|debit| self.stakes.consume(debit, &start.table_id));
        self.channel.unsubscribe_all();
        self.ticket = None;
        self.metrics.record_match_started();

        self.status.players = start.players.clone();
        self.status.current_turn = start.current_turn.clone();
        self.transition(MatchState::MatchStarting, messages::MATCH_FOUND);

        let started = MatchStarted {
            participant_id: participant_id.clone(),
            table_id: start.table_id,
            players: start.players,
            current_turn: start.current_turn,
            max_players: self.status.max_players,
            stake,
        };
        info!(table_id = %started.table_id, players = started.players.len(), "Match started");
        self.callbacks.on_match_start(&started);

        let outcome = AttemptOutcome::Started(started);
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Terminal failure or cancellation. Only the first call has effects.
    async fn finalize(&mut self, termination: Termination) -> AttemptOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        self.seat_deadline = None;
        self.match_deadline = None;
        self.channel.unsubscribe_all();

        let table_id = self.pending_table.take();
        if let (Some(table_id), Some(participant_id)) = (&table_id, &self.participant_id) {
            self.channel.leave(participant_id, table_id);
        }
        self.forget_table();

        let refund = match self.pending_debit.take() {
            None => RefundStatus::NotRequired,
            Some(debit) => {
                let reason = match &termination {
                    Termination::Failed(error) => error.refund_reason().unwrap_or(RefundReason::ManualCleanup),
                    Termination::Cancelled => RefundReason::ManualCleanup,
                };
                self.transition(MatchState::Refunding, messages::REFUNDING);

                let amount = debit.amount();
                let refund_table = table_id.or_else(|| self.request.table_hint.clone());
                let refunded = self.stakes.refund(debit, reason, refund_table.as_deref()).await;
                self.metrics.record_refund(amount, refunded);
                if refunded {
                    RefundStatus::Refunded
                } else {
                    RefundStatus::RefundFailed
                }
            }
        };
        self.ticket = None;

        self.status.clear_lobby();
        let outcome = match termination {
            Termination::Cancelled => {
                self.metrics.record_cancellation();
                info!(?refund, "Match attempt cancelled");
                self.status.error = None;
                self.transition(MatchState::Cancelled, messages::CANCELLED);
                AttemptOutcome::Cancelled { refund }
            }
            Termination::Failed(error) => {
                match &error {
                    StakeFlowError::SeatRejected { .. } => self.metrics.record_seat_rejected(),
                    StakeFlowError::SeatAckTimeout { .. } => self.metrics.record_seat_ack_timeout(),
                    StakeFlowError::MatchmakingTimeout { .. } => self.metrics.record_matchmaking_timeout(),
                    _ => {}
                }
                self.metrics.record_failure();
                warn!(%error, timeout = error.is_timeout(), ?refund, "Match attempt failed");

                let message = error.user_message();
                self.status.error = Some(message.clone());
                self.transition(MatchState::Cancelled, &message);
                self.callbacks.on_failure(&error);
                AttemptOutcome::Failed { error, refund }
            }
        };

        self.outcome = Some(outcome.clone());
        outcome
    }

    fn remember_table(&mut self, table_id: &str) {
        match self.hints.set(&self.descriptor.table_hint_key(), table_id) {
            Ok(()) => self.remembered_table = Some(table_id.to_string()),
            Err(error) => warn!(%error, "Could not store table hint"),
        }
    }

    /// Clears the hint only while it still names the table this attempt stored
    fn forget_table(&mut self) {
        let Some(table_id) = self.remembered_table.take() else {
            return;
        };
        let key = self.descriptor.table_hint_key();
        match self.hints.get(&key) {
            Ok(Some(current)) if current == table_id => {
                if let Err(error) = self.hints.clear(&key) {
                    warn!(%error, "Could not clear table hint");
                }
            }
            Ok(_) => debug!(table_id = %table_id, "Table hint replaced by another attempt"),
            Err(error) => warn!(%error, "Could not read table hint"),
        }
    }

    fn transition(&mut self, state: MatchState, message: &str) {
        let previous = self.status.state;
        self.status.state = state;
        self.status.matching = state.is_matching();
        self.status.message = message.to_string();
        debug!(from = %previous, to = %state, "Attempt state changed");
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
        self.callbacks.on_status(&self.status);
    }
}
