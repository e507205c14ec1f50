//! # Authoritative Arena Server
//!
//! This library runs the single source of truth for the shared arena. It
//! owns the canonical [`shared::World`], applies client events, resolves
//! eating each tick, and broadcasts the result so every client converges
//! on the same state.
//!
//! ## Architecture
//!
//! ### One mutation point
//! Fabric deliveries arrive on their own tasks, but are only decoded and
//! buffered there. Every world mutation happens inside the tick loop:
//! drain the inbound queue in arrival order, apply registrations,
//! movement and disconnects, resolve eating against the pre-tick
//! snapshot, broadcast. No locks guard the world because nothing else
//! ever touches it.
//!
//! ### Immutable snapshots
//! The world is a value: each tick installs a newly built snapshot and
//! the previous one stays valid for anyone still reading it.
//!
//! ### Fire-and-forget outputs
//! Broadcasts carry no acknowledgment and are never retried; a lost
//! update is superseded ~30 ms later by the next one. Only the private
//! `RegistrationAck` and `GameOver` notices target a single client, via
//! the reply topic recorded at registration.
//!
//! ## Module organization
//!
//! - [`game`] - the authoritative state and the pure eating resolution.
//! - [`session`] - player-id allocation and reply-topic bookkeeping.
//! - [`network`] - fabric subscriptions, the inbound queue, the tick
//!   loop and shutdown notification.

pub mod game;
pub mod network;
pub mod session;
