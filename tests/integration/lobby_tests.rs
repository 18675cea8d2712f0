//! Seat request contents and lobby traffic handling

use tablestake::orchestrator::messages;
use tablestake::{
    AttemptOutcome, LobbySnapshot, MatchRequest, MatchStart, MatchState, OutboundEvent,
    PlayerInfo, SeatAck, Stake, StakeFlowError,
};
use crate::mocks::{settle, Harness, MockLedger, MockTransport, RecordingCallbacks, PARTICIPANT};

fn request(game: &str, amount: u64) -> MatchRequest {
    MatchRequest::new(game, Stake::new("TPC", amount).unwrap())
}

fn seated_harness(table_id: &str) -> Harness {
    let ack = SeatAck {
        success: true,
        table_id: Some(table_id.to_string()),
        players: vec![PlayerInfo::new(PARTICIPANT).with_name("Alice")],
        ready: vec![PARTICIPANT.to_string()],
        max_players: Some(4),
        current_turn: None,
        message: None,
    };
    Harness::with_parts(MockLedger::with_balance(500), MockTransport::new().with_auto_ack(ack))
}

fn snapshot(table_id: &str, ids: &[&str]) -> LobbySnapshot {
    LobbySnapshot {
        table_id: table_id.to_string(),
        players: ids.iter().map(|id| PlayerInfo::new(*id)).collect(),
        ready: Vec::new(),
        current_turn: None,
        max_players: Some(4),
    }
}

fn start(table_id: &str) -> MatchStart {
    MatchStart {
        table_id: table_id.to_string(),
        players: vec![PlayerInfo::new(PARTICIPANT), PlayerInfo::new("acct-2")],
        current_turn: Some("acct-2".to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_seat_request_carries_lobby_parameters() {
    let harness = seated_harness("tbl-1");
    let orchestrator = harness.orchestrator();

    let request = request("snake", 25)
        .with_avatar("https://cdn.example/avatar.png")
        .with_table_hint("tbl-prev")
        .with_param("boardSize", 10);
    let mut handle = orchestrator.start(request, RecordingCallbacks::new()).unwrap();
    settle().await;

    let seat_requests = harness.transport.seat_requests();
    assert_eq!(seat_requests.len(), 1);
    let seat = &seat_requests[0];
    assert_eq!(seat.participant_id.as_str(), PARTICIPANT);
    assert_eq!(seat.game_type, "snake");
    assert_eq!(seat.stake, 25);
    assert_eq!(seat.token, "TPC");
    assert_eq!(seat.max_players, 4);
    assert_eq!(seat.player_name, "Player acct-1");
    assert_eq!(seat.mode, "online");
    assert_eq!(seat.table_hint.as_deref(), Some("tbl-prev"));

    let wire = serde_json::to_value(seat).unwrap();
    assert_eq!(wire["boardSize"], 10);
    assert_eq!(wire["tableId"], "tbl-prev");
    assert_eq!(wire["avatar"], "https://cdn.example/avatar.png");

    let stake = &harness.ledger.stakes()[0];
    assert_eq!(stake.metadata.game, "snake-online");
    assert_eq!(stake.metadata.players, 4);
    assert_eq!(stake.metadata.participant_id, PARTICIPANT);

    handle.cleanup();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_register_precedes_ready_confirmation() {
    let harness = seated_harness("tbl-1");
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator.start(request("ludo", 0), RecordingCallbacks::new()).unwrap();
    settle().await;

    let emitted = harness.transport.emitted();
    assert_eq!(emitted.len(), 2);
    assert!(matches!(&emitted[0], OutboundEvent::Register { participant_id } if participant_id.as_str() == PARTICIPANT));
    assert!(matches!(&emitted[1], OutboundEvent::ConfirmReady { table_id, .. } if table_id == "tbl-1"));

    handle.cleanup();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_ack_populates_status_and_table_hint() {
    let harness = seated_harness("tbl-1");
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator.start(request("ludo", 20), RecordingCallbacks::new()).unwrap();
    settle().await;

    let status = handle.status();
    assert_eq!(status.state, MatchState::WaitingForOpponents);
    assert!(status.matching);
    assert_eq!(status.message, messages::WAITING_FOR_PLAYERS);
    assert_eq!(status.table_id.as_deref(), Some("tbl-1"));
    assert_eq!(status.players.len(), 1);
    assert_eq!(status.ready, vec![PARTICIPANT.to_string()]);
    assert_eq!(status.max_players, 4);
    assert_eq!(status.online_count, 1);
    assert_eq!(orchestrator.last_table_hint("ludo").unwrap().as_deref(), Some("tbl-1"));

    handle.cleanup();
    handle.wait().await;
    assert_eq!(orchestrator.last_table_hint("ludo").unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_lobby_snapshot_reports_opponents() {
    let harness = seated_harness("tbl-1");
    let orchestrator = harness.orchestrator();
    let mut status_rx = {
        let mut handle = orchestrator.start(request("ludo", 20), RecordingCallbacks::new()).unwrap();
        settle().await;
        let rx = handle.subscribe_status();

        harness.transport.push_lobby(snapshot("tbl-1", &[PARTICIPANT]));
        settle().await;
        assert_eq!(handle.status().message, messages::WAITING_FOR_PLAYERS);

        harness.transport.push_lobby(snapshot("tbl-1", &[PARTICIPANT, "acct-2", "acct-3"]));
        settle().await;
        let status = handle.status();
        assert_eq!(status.message, messages::OPPONENT_JOINED);
        assert_eq!(status.online_count, 3);
        assert_eq!(status.state, MatchState::WaitingForOpponents);

        harness.transport.push_start(start("tbl-1"));
        assert!(handle.wait().await.is_started());
        rx
    };

    let last = status_rx.borrow_and_update().clone();
    assert_eq!(last.state, MatchState::MatchStarting);
    assert_eq!(last.message, messages::MATCH_FOUND);
    assert_eq!(last.current_turn.as_deref(), Some("acct-2"));
}

#[tokio::test(start_paused = true)]
async fn test_stale_table_messages_have_no_effect() {
    let harness = seated_harness("tbl-1");
    let orchestrator = harness.orchestrator();
    let callbacks = RecordingCallbacks::new();

    let mut handle = orchestrator.start(request("ludo", 20), callbacks.clone()).unwrap();
    settle().await;
    let before = handle.status();
    let published = callbacks.statuses.lock().unwrap().len();

    assert_eq!(harness.transport.push_lobby(snapshot("tbl-9", &[PARTICIPANT, "acct-2"])), 1);
    assert_eq!(harness.transport.push_start(start("tbl-9")), 1);
    settle().await;

    assert_eq!(handle.status(), before);
    assert_eq!(callbacks.statuses.lock().unwrap().len(), published);
    assert_eq!(callbacks.started_count(), 0);
    assert!(!handle.is_finished());

    harness.transport.push_start(start("tbl-1"));
    match handle.wait().await {
        AttemptOutcome::Started(started) => assert_eq!(started.table_id, "tbl-1"),
        other => panic!("expected a started match, got {other:?}"),
    }
    assert!(harness.ledger.refunds().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_before_seat_ack_is_ignored() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator.start(request("chess", 20), RecordingCallbacks::new()).unwrap();
    settle().await;
    assert_eq!(harness.transport.push_start(start("tbl-1")), 1);
    settle().await;
    assert_eq!(handle.status().state, MatchState::AwaitingSeatAck);

    handle.cleanup();
    assert!(matches!(handle.wait().await, AttemptOutcome::Cancelled { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_success_without_table_is_rejection() {
    let ack = SeatAck {
        success: true,
        table_id: None,
        ..SeatAck::default()
    };
    let harness = Harness::with_parts(MockLedger::with_balance(100), MockTransport::new().with_auto_ack(ack));
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator.start(request("chess", 20), RecordingCallbacks::new()).unwrap();
    let outcome = handle.wait().await;

    assert!(matches!(outcome.error(), Some(StakeFlowError::SeatRejected { .. })));
    assert_eq!(harness.ledger.refunds().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_blank_player_name_falls_back_to_participant() {
    let harness = seated_harness("tbl-1");
    let orchestrator = harness.orchestrator();

    let mut handle = orchestrator
        .start(request("chess", 0).with_player_name("   "), RecordingCallbacks::new())
        .unwrap();
    settle().await;
    assert_eq!(harness.transport.seat_requests()[0].player_name, "Player acct-1");

    let mut named = orchestrator
        .start(request("chess", 0).with_player_name(" Alice "), RecordingCallbacks::new())
        .unwrap();
    settle().await;
    assert_eq!(harness.transport.seat_requests()[1].player_name, "Alice");

    handle.cleanup();
    named.cleanup();
    handle.wait().await;
    named.wait().await;
}
