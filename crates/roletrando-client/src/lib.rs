//! Reference client for Roletrando rooms.
//!
//! [`client::RoomClient`] owns one WebSocket to a room and transparently
//! rebinds to the same seat after a dropped connection. [`view::ClientView`]
//! is the read-only room state it rebuilds from the server's broadcasts.

pub mod client;
pub mod view;

pub use client::{ClientError, JoinMode, ReconnectPolicy, RoomClient, RoomTarget};
pub use view::ClientView;
