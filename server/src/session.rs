//! Session bookkeeping for registered players
//!
//! This module tracks which clients currently own a player in the arena,
//! including:
//! - Identity allocation (monotonically increasing `"p" + counter` ids)
//! - The reply topic each client provisioned for direct notifications
//! - Removal on voluntary unregistration or on being eaten
//!
//! The registry is only ever touched from the server tick thread, so it
//! needs no internal synchronization.

use log::info;
use std::collections::HashMap;

/// A registered client and its private notification channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Player identity owned by this client.
    pub player_id: String,
    /// Ephemeral topic the client listens on for `RegistrationAck` and
    /// `GameOver`.
    pub reply_topic: String,
}

/// Maps live player ids to the reply topics of the clients driving them.
///
/// Ids are never reused: the counter only moves forward, so a stale
/// `PlayerUpdate` for a long-gone player can never be mistaken for a new
/// one.
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    next_player_number: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
            next_player_number: 1,
        }
    }

    /// Allocates the next player id and records the client's reply topic.
    pub fn register(&mut self, reply_topic: &str) -> String {
        let player_id = format!("p{}", self.next_player_number);
        self.next_player_number += 1;

        info!("Registered {} (reply topic {})", player_id, reply_topic);
        self.sessions.insert(
            player_id.clone(),
            Session {
                player_id: player_id.clone(),
                reply_topic: reply_topic.to_string(),
            },
        );
        player_id
    }

    /// Removes and returns a session. Returns `None` if the id was never
    /// registered or is already gone, making removal idempotent.
    pub fn unregister(&mut self, player_id: &str) -> Option<Session> {
        let session = self.sessions.remove(player_id);
        if session.is_some() {
            info!("Unregistered {}", player_id);
        }
        session
    }

    /// Reply topic for a live player, if any.
    pub fn reply_topic(&self, player_id: &str) -> Option<&str> {
        self.sessions
            .get(player_id)
            .map(|session| session.reply_topic.as_str())
    }

    /// Removes and returns every session, for the server's shutdown
    /// notification sweep.
    pub fn drain(&mut self) -> Vec<Session> {
        self.sessions.drain().map(|(_, session)| session).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        SessionRegistry::new()
    }
}
