//! # Predictive Arena Client
//!
//! Client-side counterpart of the authoritative server: it keeps a local
//! copy of the [`shared::World`] that stays responsive regardless of
//! network latency, and reconciles it with the server's broadcasts.
//!
//! ## How it stays smooth
//!
//! ### Client-side prediction
//! The owned player moves every tick under the held direction without
//! waiting for the server. Input never feels laggy because nothing about
//! the local player round-trips the network.
//!
//! ### Reconciliation
//! Each broadcast replaces the client's view of every *other* entity and
//! adopts the server's mass for the owned player, while keeping the
//! locally predicted position. Growth and death always come from the
//! server; motion never rubber-bands on a stale broadcast.
//!
//! ### One mutation point
//! Like the server, fabric deliveries are only decoded and buffered on
//! their delivery tasks; the tick loop is the only place the local world
//! changes.
//!
//! ## Module organization
//!
//! - [`game`] - the predicted world and the merge rule.
//! - [`input`] - the last-write-wins direction slot and the autopilot.
//! - [`network`] - registration handshake, inbound queue, tick loop and
//!   teardown.

pub mod game;
pub mod input;
pub mod network;
