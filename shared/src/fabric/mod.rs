//! Messaging fabric the simulation talks through.
//!
//! The core never touches sockets directly: it publishes opaque payloads to
//! named topics and receives payloads from topics it subscribed to.
//! Delivery is asynchronous, at-least-once and unordered across topics;
//! consumers buffer payloads and interpret them on their own tick thread.
//!
//! Two implementations ship with the crate: [`LocalFabric`] wires
//! everything up inside one process (tests, bot swarms) and [`TcpFabric`]
//! joins a [`FabricHost`] relay over TCP with length-prefixed frames.

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

pub mod local;
pub mod tcp;

pub use local::LocalFabric;
pub use tcp::{FabricHost, TcpFabric};

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("failed to reach the fabric: {0}")]
    Connect(#[source] std::io::Error),
    #[error("fabric connection closed")]
    Closed,
}

/// Publish/subscribe contract required by the simulation managers.
///
/// Implementations must be cheap to share across tasks; publishing is
/// fire-and-forget and must never block the caller on network I/O.
pub trait Fabric: Send + Sync {
    /// Sends a payload to every current subscriber of `topic`. Publishing
    /// to a topic nobody listens on is a silent drop.
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), FabricError>;

    /// Starts delivering payloads published to `topic`. The receiver end
    /// is owned by the caller; dropping it ends the subscription.
    fn subscribe(&self, topic: &str) -> Result<UnboundedReceiver<Vec<u8>>, FabricError>;

    /// Allocates a fresh ephemeral topic name for a per-client inbox.
    fn create_inbox(&self) -> Result<String, FabricError>;

    /// Tears down an ephemeral topic. Idempotent: deleting an unknown
    /// topic is a no-op.
    fn delete_topic(&self, topic: &str) -> Result<(), FabricError>;
}
