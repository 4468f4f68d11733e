#[allow(dead_code)]
mod common;

use roletrando_core::error::ErrorCode;
use roletrando_core::net::messages::{ClientMessage, ServerMessage, StateUpdateMsg, SubmitScoreMsg};
use roletrando_core::room::RoomStatus;
use roletrando_core::session::WheelPhase;
use roletrando_server::config::ServerConfig;

use common::{
    TestServer, ws_connect, ws_expect_close, ws_join, ws_read_server_msg, ws_send, ws_send_text,
    ws_try_read, ws_wait_for,
};

fn is_state(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::StateUpdate(_))
}

fn into_state(msg: ServerMessage) -> StateUpdateMsg {
    match msg {
        ServerMessage::StateUpdate(state) => state,
        other => panic!("Expected STATE_UPDATE, got: {other:?}"),
    }
}

fn expect_error(msg: ServerMessage, code: ErrorCode) {
    match msg {
        ServerMessage::Error(err) => assert_eq!(err.code, code, "{}", err.message),
        other => panic!("Expected ERROR {code:?}, got: {other:?}"),
    }
}

#[tokio::test]
async fn first_player_becomes_host() {
    let server = TestServer::new().await;
    let (mut ana, welcome) = ws_join(&server.ws_url("game", "AB12", "Ana")).await;
    assert_eq!(welcome.room_id, "AB12");
    assert!(!welcome.reconnected);

    let state = into_state(ws_read_server_msg(&mut ana).await);
    assert_eq!(state.room.status, RoomStatus::Waiting);
    assert_eq!(state.room.host_id, Some(welcome.player_id));
    assert_eq!(state.room.players.len(), 1);
    assert_eq!(state.room.players[0].name, "Ana");
    assert!(state.room.game_session.is_none());
}

#[tokio::test]
async fn lowercase_room_code_is_normalized() {
    let server = TestServer::new().await;
    let (_ana, welcome) = ws_join(&server.ws_url("quiz", "ab12", "Ana")).await;
    assert_eq!(welcome.room_id, "AB12");
}

#[tokio::test]
async fn host_starts_game_for_everyone() {
    let server = TestServer::new().await;
    let (mut ana, ana_welcome) = ws_join(&server.ws_url("game", "AB12", "Ana")).await;
    let (mut bruno, _) = ws_join(&server.ws_url("game", "AB12", "Bruno")).await;

    // Ana sees Bruno arrive
    let state = into_state(
        ws_wait_for(&mut ana, |m| {
            matches!(m, ServerMessage::StateUpdate(s) if s.room.players.len() == 2)
        })
        .await,
    );
    assert_eq!(state.room.players[1].name, "Bruno");
    let _ = ws_read_server_msg(&mut bruno).await;

    ws_send(&mut ana, &ClientMessage::StartGame).await;

    for stream in [&mut ana, &mut bruno] {
        assert_eq!(ws_read_server_msg(stream).await, ServerMessage::GameStart);
        let state = into_state(ws_read_server_msg(stream).await);
        assert_eq!(state.room.status, RoomStatus::Playing);
        assert_eq!(state.room.current_turn_index, 0);
        assert_eq!(state.current_player_turn_id, Some(ana_welcome.player_id));
        let wheel = state.room.game_session.unwrap();
        assert_eq!(wheel.phase, WheelPhase::AwaitingSpin);
        assert!(wheel.phrase.is_none());
    }
}

#[tokio::test]
async fn spin_value_is_the_same_for_every_player() {
    let server = TestServer::new().await;
    let (mut ana, _) = ws_join(&server.ws_url("game", "SP1N", "Ana")).await;
    let (mut bruno, _) = ws_join(&server.ws_url("game", "SP1N", "Bruno")).await;
    ws_send(&mut ana, &ClientMessage::StartGame).await;
    ws_send(&mut ana, &ClientMessage::SpinStart).await;

    let is_spin = |m: &ServerMessage| matches!(m, ServerMessage::SpinStart(_));
    let ana_spin = ws_wait_for(&mut ana, is_spin).await;
    let bruno_spin = ws_wait_for(&mut bruno, is_spin).await;
    assert_eq!(ana_spin, bruno_spin);

    // The drawn value is pending until SPIN_END
    let state = into_state(ws_wait_for(&mut bruno, is_state).await);
    let wheel = state.room.game_session.unwrap();
    assert_eq!(wheel.phase, WheelPhase::SpinPending);
    let ServerMessage::SpinStart(value) = ana_spin else {
        unreachable!();
    };
    assert_eq!(wheel.pending_spin_value, value);
}

#[tokio::test]
async fn out_of_turn_spin_is_rejected_privately() {
    let server = TestServer::new().await;
    let (mut ana, _) = ws_join(&server.ws_url("game", "TURN", "Ana")).await;
    let (mut bruno, _) = ws_join(&server.ws_url("game", "TURN", "Bruno")).await;
    ws_send(&mut ana, &ClientMessage::StartGame).await;
    ws_wait_for(&mut ana, |m| *m == ServerMessage::GameStart).await;
    ws_wait_for(&mut ana, is_state).await;
    ws_wait_for(&mut bruno, |m| *m == ServerMessage::GameStart).await;
    ws_wait_for(&mut bruno, is_state).await;

    ws_send(&mut bruno, &ClientMessage::SpinStart).await;
    expect_error(ws_read_server_msg(&mut bruno).await, ErrorCode::NotYourTurn);
    assert!(ws_try_read(&mut ana, 200).await.is_none());
}

#[tokio::test]
async fn only_host_can_start() {
    let server = TestServer::new().await;
    let (mut ana, _) = ws_join(&server.ws_url("quiz", "H0ST", "Ana")).await;
    let (mut bruno, _) = ws_join(&server.ws_url("quiz", "H0ST", "Bruno")).await;
    let _ = ws_read_server_msg(&mut bruno).await;

    ws_send(&mut bruno, &ClientMessage::StartGame).await;
    expect_error(ws_read_server_msg(&mut bruno).await, ErrorCode::NotHost);

    ws_send(&mut ana, &ClientMessage::StartGame).await;
    ws_wait_for(&mut ana, |m| *m == ServerMessage::GameStart).await;
    ws_send(&mut ana, &ClientMessage::StartGame).await;
    expect_error(
        ws_wait_for(&mut ana, |m| matches!(m, ServerMessage::Error(_))).await,
        ErrorCode::AlreadyStarted,
    );
}

#[tokio::test]
async fn reconnect_rebinds_the_same_player() {
    let server = TestServer::new().await;
    let url = server.ws_url("game", "RC01", "Ana");
    let (mut first, welcome) = ws_join(&url).await;
    let _ = ws_read_server_msg(&mut first).await;

    let (mut second, again) = ws_join(&url).await;
    assert!(again.reconnected);
    assert_eq!(again.player_id, welcome.player_id);

    let state = into_state(ws_read_server_msg(&mut second).await);
    assert_eq!(state.room.players.len(), 1);
    assert!(state.room.players[0].connected);

    // The replaced socket is closed by the server
    assert!(ws_expect_close(&mut first).await);

    // And its close does not mark Ana as disconnected
    let (mut bruno, _) = ws_join(&server.ws_url("game", "RC01", "Bruno")).await;
    let state = into_state(ws_read_server_msg(&mut bruno).await);
    assert!(state.room.players[0].connected);
}

#[tokio::test]
async fn create_mode_refuses_active_code() {
    let server = TestServer::new().await;
    let (_ana, _) = ws_join(&format!("{}?mode=create", server.ws_url("game", "DUPE", "Ana"))).await;

    let mut bruno = ws_connect(&format!(
        "{}?mode=create",
        server.ws_url("game", "DUPE", "Bruno")
    ))
    .await;
    expect_error(
        ws_read_server_msg(&mut bruno).await,
        ErrorCode::RoomAlreadyExists,
    );
    assert!(ws_expect_close(&mut bruno).await);
}

#[tokio::test]
async fn join_mode_requires_existing_room() {
    let server = TestServer::new().await;
    let mut ana = ws_connect(&format!("{}?mode=join", server.ws_url("quiz", "NONE", "Ana"))).await;
    expect_error(ws_read_server_msg(&mut ana).await, ErrorCode::RoomNotFound);
    assert!(ws_expect_close(&mut ana).await);
}

#[tokio::test]
async fn game_kind_must_match_live_room() {
    let server = TestServer::new().await;
    let (_ana, _) = ws_join(&server.ws_url("quiz", "KIND", "Ana")).await;
    let mut bruno = ws_connect(&server.ws_url("game", "KIND", "Bruno")).await;
    expect_error(ws_read_server_msg(&mut bruno).await, ErrorCode::RoomNotFound);
}

#[tokio::test]
async fn names_differing_only_in_case_conflict() {
    let server = TestServer::new().await;
    let (_ana, _) = ws_join(&server.ws_url("quiz", "NAME", "Ana")).await;
    let mut other = ws_connect(&server.ws_url("quiz", "NAME", "ANA")).await;
    expect_error(ws_read_server_msg(&mut other).await, ErrorCode::NameTaken);
}

#[tokio::test]
async fn wheel_room_is_full_at_three() {
    let server = TestServer::new().await;
    let mut streams = Vec::new();
    for name in ["Ana", "Bruno", "Carla"] {
        let (stream, _) = ws_join(&server.ws_url("game", "FULL", name)).await;
        streams.push(stream);
    }
    let mut late = ws_connect(&server.ws_url("game", "FULL", "Duda")).await;
    expect_error(ws_read_server_msg(&mut late).await, ErrorCode::RoomFull);
}

#[tokio::test]
async fn invalid_room_code_is_rejected() {
    let server = TestServer::new().await;
    let mut ana = ws_connect(&server.ws_url("game", "AB-1", "Ana")).await;
    expect_error(ws_read_server_msg(&mut ana).await, ErrorCode::InvalidIntent);
    assert!(ws_expect_close(&mut ana).await);
}

#[tokio::test]
async fn malformed_intent_keeps_connection_open() {
    let server = TestServer::new().await;
    let (mut ana, _) = ws_join(&server.ws_url("game", "BAD1", "Ana")).await;
    let _ = ws_read_server_msg(&mut ana).await;

    ws_send_text(&mut ana, r#"{"type":"FLY_AWAY"}"#).await;
    expect_error(ws_read_server_msg(&mut ana).await, ErrorCode::InvalidIntent);
    ws_send_text(&mut ana, r#"{"type":"GUESS","payload":"AB"}"#).await;
    expect_error(ws_read_server_msg(&mut ana).await, ErrorCode::InvalidIntent);
    ws_send_text(&mut ana, "not json").await;
    expect_error(ws_read_server_msg(&mut ana).await, ErrorCode::InvalidIntent);

    // Still connected and usable
    ws_send(&mut ana, &ClientMessage::StartGame).await;
    assert_eq!(ws_read_server_msg(&mut ana).await, ServerMessage::GameStart);
}

#[tokio::test]
async fn state_updates_carry_increasing_seq() {
    let server = TestServer::new().await;
    let (mut ana, _) = ws_join(&server.ws_url("quiz", "SEQ1", "Ana")).await;
    let first = into_state(ws_read_server_msg(&mut ana).await).seq;
    let (_bruno, _) = ws_join(&server.ws_url("quiz", "SEQ1", "Bruno")).await;
    let second = into_state(ws_read_server_msg(&mut ana).await).seq;
    assert!(second > first);
}

#[tokio::test]
async fn quiz_timeout_reveals_with_zero_for_silent_player() {
    let config = ServerConfig {
        rooms: roletrando_server::config::RoomsConfig {
            quiz_round_secs: 1,
            ..Default::default()
        },
        ..ServerConfig::default()
    };
    let server = TestServer::from_config(config).await;
    let (mut ana, ana_welcome) = ws_join(&server.ws_url("quiz", "QZ01", "Ana")).await;
    let (mut bruno, bruno_welcome) = ws_join(&server.ws_url("quiz", "QZ01", "Bruno")).await;

    ws_send(&mut ana, &ClientMessage::StartGame).await;
    ws_wait_for(&mut ana, |m| *m == ServerMessage::GameStart).await;
    ws_send(
        &mut ana,
        &ClientMessage::SubmitScore(SubmitScoreMsg { answer_index: 0 }),
    )
    .await;

    let is_reveal = |m: &ServerMessage| matches!(m, ServerMessage::RoundReveal(_));
    for stream in [&mut ana, &mut bruno] {
        let ServerMessage::RoundReveal(reveal) = ws_wait_for(stream, is_reveal).await else {
            unreachable!();
        };
        assert_eq!(reveal.question_index, 0);
        assert_eq!(reveal.round_scores.len(), 2);
        let bruno_score = reveal
            .round_scores
            .iter()
            .find(|s| s.player_id == bruno_welcome.player_id)
            .unwrap();
        assert_eq!(bruno_score.points, 0);
        assert!(
            reveal
                .round_scores
                .iter()
                .any(|s| s.player_id == ana_welcome.player_id)
        );
    }
}

#[tokio::test]
async fn second_answer_gets_already_answered() {
    let server = TestServer::new().await;
    let (mut ana, _) = ws_join(&server.ws_url("quiz", "QZ02", "Ana")).await;
    let (_bruno, _) = ws_join(&server.ws_url("quiz", "QZ02", "Bruno")).await;
    ws_send(&mut ana, &ClientMessage::StartGame).await;
    ws_wait_for(&mut ana, |m| *m == ServerMessage::GameStart).await;

    let answer = ClientMessage::SubmitScore(SubmitScoreMsg { answer_index: 0 });
    ws_send(&mut ana, &answer).await;
    ws_send(&mut ana, &answer).await;
    expect_error(
        ws_wait_for(&mut ana, |m| matches!(m, ServerMessage::Error(_))).await,
        ErrorCode::AlreadyAnswered,
    );
}

#[tokio::test]
async fn connection_cap_returns_503() {
    let config = ServerConfig {
        limits: roletrando_server::config::LimitsConfig {
            max_ws_connections: 1,
            ..Default::default()
        },
        ..ServerConfig::default()
    };
    let server = TestServer::from_config(config).await;
    let (_ana, _) = ws_join(&server.ws_url("game", "CAP1", "Ana")).await;

    let err = tokio_tungstenite::connect_async(server.ws_url("game", "CAP1", "Bruno"))
        .await
        .unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(resp) => {
            assert_eq!(resp.status(), 503);
        },
        other => panic!("Expected HTTP 503, got: {other:?}"),
    }
}
