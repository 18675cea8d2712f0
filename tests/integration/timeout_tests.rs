//! Seat-ack and matchmaking deadlines

use std::time::Duration;
use tokio::time::Instant;
use tablestake::{
    GameDescriptor, MatchRequest, MatchState, RefundReason, RefundStatus, SeatAck, Stake,
    StakeFlowError, TableStakeConfig,
};
use crate::mocks::{settle, Harness, MockLedger, MockTransport, RecordingCallbacks};

fn request(game: &str, amount: u64) -> MatchRequest {
    MatchRequest::new(game, Stake::new("TPC", amount).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_missing_seat_ack_times_out_and_refunds() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let began = Instant::now();

    let mut handle = orchestrator.start(request("chess", 30), RecordingCallbacks::new()).unwrap();
    let outcome = handle.wait().await;

    assert!(began.elapsed() >= Duration::from_millis(12_000));
    assert!(began.elapsed() < Duration::from_millis(30_000));
    assert!(matches!(
        outcome.error(),
        Some(StakeFlowError::SeatAckTimeout { duration_ms: 12_000 })
    ));
    assert_eq!(outcome.refund(), RefundStatus::Refunded);

    let refunds = harness.ledger.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].metadata.reason, Some(RefundReason::SeatAckTimeout));
    assert_eq!(refunds[0].metadata.table_id, None);

    assert_eq!(harness.transport.emitted_count("leaveLobby"), 0);
    assert_eq!(harness.transport.subscriber_count(), 0);
    assert!(handle.status().error.unwrap().contains("Timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_ack_is_bounded_by_seat_deadline() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let began = Instant::now();

    let mut handle = orchestrator.start(request("chess", 30), RecordingCallbacks::new()).unwrap();
    settle().await;
    assert!(harness.transport.drop_ack());
    settle().await;
    assert_eq!(handle.status().state, MatchState::AwaitingSeatAck);

    let outcome = handle.wait().await;
    assert!(began.elapsed() >= Duration::from_millis(12_000));
    assert!(matches!(outcome.error(), Some(StakeFlowError::SeatAckTimeout { .. })));
    assert_eq!(harness.ledger.refunds().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_ack_after_timeout_is_ignored() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator.start(request("chess", 30), RecordingCallbacks::new()).unwrap();
    handle.wait().await;

    assert!(!harness.transport.ack(SeatAck::accepted("tbl-late")));
    assert_eq!(harness.ledger.refunds().len(), 1);
    assert_eq!(orchestrator.last_table_hint("chess").unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_seat_ack_clears_seat_deadline() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator.start(request("chess", 30), RecordingCallbacks::new()).unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_millis(11_000)).await;
    assert!(harness.transport.ack(SeatAck::accepted("tbl-1")));

    // Past the first seat deadline, still waiting for an opponent
    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(handle.status().state, MatchState::WaitingForOpponents);

    let outcome = handle.wait().await;
    assert!(matches!(outcome.error(), Some(StakeFlowError::MatchmakingTimeout { .. })));
    assert_eq!(orchestrator.metrics().snapshot().seat_ack_timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_game_descriptor_overrides_timeouts() {
    let harness = Harness::with_parts(
        MockLedger::with_balance(100),
        MockTransport::new().with_auto_ack(SeatAck::accepted("tbl-c")),
    );
    let config = TableStakeConfig {
        games: vec![GameDescriptor::new("checkers", 2).with_timeouts(2_000, 5_000)],
        ..TableStakeConfig::default()
    };
    let orchestrator = harness.orchestrator_with(config);
    let began = Instant::now();

    let mut handle = orchestrator.start(request("checkers", 10), RecordingCallbacks::new()).unwrap();
    let outcome = handle.wait().await;

    assert!(began.elapsed() >= Duration::from_millis(5_000));
    assert!(began.elapsed() < Duration::from_millis(30_000));
    assert!(matches!(
        outcome.error(),
        Some(StakeFlowError::MatchmakingTimeout { duration_ms: 5_000, .. })
    ));
    assert_eq!(harness.ledger.stakes()[0].metadata.game, "checkers-online");
}

#[tokio::test(start_paused = true)]
async fn test_generic_lobby_waits_longer_for_opponents() {
    let harness = Harness::with_parts(
        MockLedger::with_balance(100),
        MockTransport::new().with_auto_ack(SeatAck::accepted("tbl-g")),
    );
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator.start(request("generic", 10), RecordingCallbacks::new()).unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_millis(31_000)).await;
    assert_eq!(handle.status().state, MatchState::WaitingForOpponents);

    let outcome = handle.wait().await;
    assert!(matches!(
        outcome.error(),
        Some(StakeFlowError::MatchmakingTimeout { duration_ms: 35_000, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_still_refunds_on_timeout() {
    let harness = Harness::with_parts(
        MockLedger::with_balance(100),
        MockTransport::new().with_auto_ack(SeatAck::accepted("tbl-1")),
    );
    let orchestrator = harness.orchestrator();

    let handle = orchestrator.start(request("chess", 25), RecordingCallbacks::new()).unwrap();
    drop(handle);
    tokio::time::sleep(Duration::from_millis(31_000)).await;

    assert_eq!(harness.ledger.refunds().len(), 1);
    assert_eq!(harness.ledger.balance(), 100);
}
