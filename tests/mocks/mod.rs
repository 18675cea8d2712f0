//! Mock implementations for testing

pub mod transport;

pub use identity::MockIdentity;
pub use ledger::MockLedger;
pub use transport::MockTransport;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tablestake::{
    FlowStatus, InMemoryTableHintStore, MatchCallbacks, MatchOrchestrator, MatchStarted,
    MatchState, OrchestratorDeps, StakeFlowError, TableStakeConfig,
};

/// Participant id the mock identity resolves to
pub const PARTICIPANT: &str = "acct-1";

/// Every collaborator of an orchestrator, kept for inspection
pub struct Harness {
    pub identity: Arc<MockIdentity>,
    pub ledger: Arc<MockLedger>,
    pub transport: Arc<MockTransport>,
    pub hints: Arc<InMemoryTableHintStore>,
}

impl Harness {
    /// Connected transport, funded wallet
    pub fn new() -> Self {
        Self::with_parts(MockLedger::with_balance(1_000), MockTransport::new())
    }

    pub fn with_parts(ledger: MockLedger, transport: MockTransport) -> Self {
        Self {
            identity: Arc::new(MockIdentity::new(PARTICIPANT)),
            ledger: Arc::new(ledger),
            transport: Arc::new(transport),
            hints: Arc::new(InMemoryTableHintStore::new()),
        }
    }

    pub fn with_identity(mut self, identity: MockIdentity) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn deps(&self) -> OrchestratorDeps {
        OrchestratorDeps {
            identity: self.identity.clone(),
            ledger: self.ledger.clone(),
            transport: self.transport.clone(),
            hints: self.hints.clone(),
        }
    }

    pub fn orchestrator(&self) -> MatchOrchestrator {
        self.orchestrator_with(TableStakeConfig::default())
    }

    pub fn orchestrator_with(&self, config: TableStakeConfig) -> MatchOrchestrator {
        MatchOrchestrator::new(self.deps(), config).unwrap()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Callbacks that remember everything they were told
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    pub statuses: Mutex<Vec<FlowStatus>>,
    pub started: Mutex<Vec<MatchStarted>>,
    pub failures: Mutex<Vec<StakeFlowError>>,
}

impl RecordingCallbacks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Distinct states in the order they were published
    pub fn states(&self) -> Vec<MatchState> {
        let mut states: Vec<MatchState> = self.statuses.lock().unwrap().iter().map(|s| s.state).collect();
        states.dedup();
        states
    }

    pub fn started_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl MatchCallbacks for RecordingCallbacks {
    fn on_status(&self, status: &FlowStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn on_match_start(&self, started: &MatchStarted) {
        self.started.lock().unwrap().push(started.clone());
    }

    fn on_failure(&self, error: &StakeFlowError) {
        self.failures.lock().unwrap().push(error.clone());
    }
}

/// Let every spawned attempt run until it blocks. Needs paused time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
