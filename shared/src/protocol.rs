//! Wire protocol between clients and the authoritative server.
//!
//! Every exchange is one [`Message`] serialized with bincode. The enum is
//! closed: dispatch sites match exhaustively, so adding a variant is a
//! compile-time-checked change everywhere it is consumed.

use crate::world::World;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-bound topic carrying registration requests.
pub const REGISTRATION_TOPIC: &str = "registration";
/// Server-bound topic carrying per-tick player updates.
pub const UPDATE_TOPIC: &str = "updates";
/// Fanout topic carrying the authoritative world to every client.
pub const BROADCAST_TOPIC: &str = "broadcast";

/// How long a client waits for a `RegistrationAck` before giving up.
pub const REGISTRATION_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Message {
    /// Client asks to join, naming the ephemeral inbox it already
    /// subscribed to for the answer.
    RegistrationRequest { reply_topic: String },
    /// Server grants an identity and seeds the client with the current
    /// world.
    RegistrationAck { player_id: String, world: World },
    /// Client reports its predicted position and held direction.
    PlayerUpdate {
        player_id: String,
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
    },
    /// Authoritative world snapshot, broadcast every server tick.
    StateUpdate { world: World },
    /// Client leaves voluntarily.
    UnRegistration { player_id: String },
    /// Server tells a client its player no longer exists.
    GameOver,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] bincode::Error),
}

pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(message).map_err(ProtocolError::Encode)
}

pub fn decode(payload: &[u8]) -> Result<Message, ProtocolError> {
    bincode::deserialize(payload).map_err(ProtocolError::Decode)
}
