#[allow(dead_code)]
mod common;

use common::TestServer;

use roletrando_client::{ClientError, JoinMode, ReconnectPolicy, RoomClient, RoomTarget};
use roletrando_core::error::ErrorCode;
use roletrando_core::net::messages::{ClientMessage, ServerMessage};
use roletrando_core::room::{GameKind, RoomStatus};

fn target(server: &TestServer, room: &str, name: &str) -> RoomTarget {
    RoomTarget::new(format!("ws://{}", server.addr), GameKind::Game, room, name)
}

#[tokio::test]
async fn clients_share_one_view_of_the_room() {
    let server = TestServer::new().await;
    let policy = ReconnectPolicy::default();

    let mut ana = RoomClient::connect(target(&server, "CL01", "Ana"), JoinMode::Create, policy)
        .await
        .unwrap();
    let mut bruno = RoomClient::connect(target(&server, "CL01", "Bruno"), JoinMode::Join, policy)
        .await
        .unwrap();

    ana.wait_for(|m| {
        matches!(m, ServerMessage::StateUpdate(u) if u.room.players.len() == 2)
    })
    .await
    .unwrap();
    assert!(ana.view().is_host());

    ana.send(&ClientMessage::StartGame).await.unwrap();
    for client in [&mut ana, &mut bruno] {
        client
            .wait_for(|m| {
                matches!(m, ServerMessage::StateUpdate(u) if u.room.status == RoomStatus::Playing)
            })
            .await
            .unwrap();
    }
    assert!(ana.view().is_my_turn());
    assert!(!bruno.view().is_my_turn());
    assert_eq!(ana.view().last_seq(), bruno.view().last_seq());

    ana.send(&ClientMessage::SpinStart).await.unwrap();
    let ServerMessage::SpinStart(value) = ana
        .wait_for(|m| matches!(m, ServerMessage::SpinStart(_)))
        .await
        .unwrap()
    else {
        unreachable!()
    };
    bruno
        .wait_for(|m| matches!(m, ServerMessage::SpinStart(_)))
        .await
        .unwrap();
    assert_eq!(bruno.view().spin_in_flight(), Some(value));
}

#[tokio::test]
async fn joining_a_missing_room_is_rejected() {
    let server = TestServer::new().await;
    let result = RoomClient::connect(
        target(&server, "NONE", "Ana"),
        JoinMode::Join,
        ReconnectPolicy::default(),
    )
    .await;
    match result {
        Err(ClientError::Rejected(err)) => assert_eq!(err.code, ErrorCode::RoomNotFound),
        other => panic!("Expected RoomNotFound, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn rejected_intents_reach_only_the_view_of_the_sender() {
    let server = TestServer::new().await;
    let policy = ReconnectPolicy::default();
    let mut ana = RoomClient::connect(target(&server, "CL02", "Ana"), JoinMode::Auto, policy)
        .await
        .unwrap();
    let mut bruno = RoomClient::connect(target(&server, "CL02", "Bruno"), JoinMode::Auto, policy)
        .await
        .unwrap();

    bruno.send(&ClientMessage::StartGame).await.unwrap();
    bruno
        .wait_for(|m| matches!(m, ServerMessage::Error(_)))
        .await
        .unwrap();
    assert_eq!(
        bruno.view().last_error().map(|e| e.code),
        Some(ErrorCode::NotHost)
    );

    ana.wait_for(|m| {
        matches!(m, ServerMessage::StateUpdate(u) if u.room.players.len() == 2)
    })
    .await
    .unwrap();
    assert!(ana.view().last_error().is_none());
}
