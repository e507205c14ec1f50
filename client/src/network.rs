//! Client network layer: registration handshake, inbound queue, and the
//! predictive tick loop.
//!
//! Mirrors the server's concurrency discipline: fabric deliveries are
//! decoded on their delivery task and buffered; only [`Client::tick`]
//! interprets them, so the local world is mutated from a single thread.

use crate::game::ClientGameState;
use crate::input::DirectionHandle;
use log::{error, info, warn};
use shared::{
    decode, encode, Fabric, FabricError, Message, ProtocolError, World, BROADCAST_TOPIC,
    REGISTRATION_TIMEOUT_SECS, REGISTRATION_TOPIC, UPDATE_TOPIC,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{interval, timeout, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no registration ack within {0:?}; abandoning")]
    RegistrationTimeout(Duration),
    #[error(transparent)]
    Fabric(#[from] FabricError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One player's session: owns the predicted world and the fabric handles
/// provisioned for it.
pub struct Client {
    fabric: Arc<dyn Fabric>,
    game: ClientGameState,
    inbox: String,
    inbound_rx: UnboundedReceiver<Message>,
    tick_interval: Duration,
    alive: bool,
}

impl Client {
    /// Runs the registration handshake: provisions and subscribes the
    /// ephemeral inbox first, then asks the server to join and blocks
    /// until the ack arrives, bounded by [`REGISTRATION_TIMEOUT_SECS`].
    ///
    /// On timeout every provisioned topic is released and the attempt is
    /// abandoned, not retried.
    pub async fn register(
        fabric: Arc<dyn Fabric>,
        tick_interval: Duration,
    ) -> Result<Client, ClientError> {
        let bound = Duration::from_secs(REGISTRATION_TIMEOUT_SECS);
        Client::register_with_timeout(fabric, tick_interval, bound).await
    }

    /// [`Client::register`] with an explicit ack bound.
    pub async fn register_with_timeout(
        fabric: Arc<dyn Fabric>,
        tick_interval: Duration,
        bound: Duration,
    ) -> Result<Client, ClientError> {
        let inbox = fabric.create_inbox()?;
        let inbox_rx = fabric.subscribe(&inbox)?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = oneshot::channel();
        spawn_consumer(inbox_rx, inbound_tx.clone(), Some(ack_tx), inbox.clone());

        fabric.publish(
            REGISTRATION_TOPIC,
            encode(&Message::RegistrationRequest {
                reply_topic: inbox.clone(),
            })?,
        )?;

        let (player_id, world) = match timeout(bound, ack_rx).await {
            Ok(Ok(ack)) => ack,
            // Elapsed, or the inbox consumer died before completing us.
            _ => {
                let _ = fabric.delete_topic(&inbox);
                return Err(ClientError::RegistrationTimeout(bound));
            }
        };
        info!(
            "Registered as {} in a {}x{} arena with {} players",
            player_id,
            world.width,
            world.height,
            world.players.len()
        );

        let broadcast_rx = fabric.subscribe(BROADCAST_TOPIC)?;
        spawn_consumer(broadcast_rx, inbound_tx, None, BROADCAST_TOPIC.to_string());

        Ok(Client {
            fabric,
            game: ClientGameState::new(player_id, world),
            inbox,
            inbound_rx,
            tick_interval,
            alive: true,
        })
    }

    pub fn player_id(&self) -> &str {
        self.game.player_id()
    }

    pub fn world(&self) -> &World {
        self.game.world()
    }

    pub fn game(&self) -> &ClientGameState {
        &self.game
    }

    pub fn direction_handle(&self) -> DirectionHandle {
        self.game.direction_handle()
    }

    pub fn set_direction(&self, dx: f64, dy: f64) {
        self.game.set_direction(dx, dy);
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// One predictive step: drain buffered server messages in arrival
    /// order, then move the owned player and report upstream.
    ///
    /// Returns `false` once the session is over, either by `GameOver` or
    /// because the authoritative roster no longer contains us.
    pub fn tick(&mut self) -> bool {
        if !self.alive {
            return false;
        }

        while let Ok(message) = self.inbound_rx.try_recv() {
            match message {
                Message::StateUpdate { world } => {
                    if !self.game.merge_broadcast(world) {
                        info!("{} dropped from the roster; game over", self.player_id());
                        self.alive = false;
                    }
                }
                Message::GameOver => {
                    info!("Game over for {}", self.player_id());
                    self.alive = false;
                }
                _ => warn!("out-of-protocol message on a client topic; dropped"),
            }
        }
        if !self.alive {
            return false;
        }

        self.game.tick();

        if let Some(player) = self.game.world().player_by_id(self.game.player_id()) {
            let direction = self.game.direction();
            let update = Message::PlayerUpdate {
                player_id: player.id.clone(),
                x: player.x,
                y: player.y,
                dx: direction.dx,
                dy: direction.dy,
            };
            self.publish(UPDATE_TOPIC, &update);
        }
        true
    }

    /// Fixed-rate driver around [`Client::tick`]; returns when the
    /// session ends.
    pub async fn run(&mut self) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !self.tick() {
                break;
            }
        }
    }

    /// Graceful teardown: announce departure and release the inbox. Safe
    /// to call after the session already ended server-side; the server
    /// treats an unknown id as a no-op.
    pub fn terminate(&mut self) {
        self.publish(
            UPDATE_TOPIC,
            &Message::UnRegistration {
                player_id: self.player_id().to_string(),
            },
        );
        if let Err(e) = self.fabric.delete_topic(&self.inbox) {
            warn!("failed to release inbox {}: {}", self.inbox, e);
        }
        self.alive = false;
    }

    fn publish(&self, topic: &str, message: &Message) {
        match encode(message) {
            Ok(payload) => {
                if let Err(e) = self.fabric.publish(topic, payload) {
                    error!("failed to publish to {}: {}", topic, e);
                }
            }
            Err(e) => error!("failed to encode message for {}: {}", topic, e),
        }
    }
}

/// Forwards decoded payloads from a fabric subscription into the inbound
/// queue. The first `RegistrationAck` completes the handshake channel
/// instead; malformed payloads are logged and dropped.
fn spawn_consumer(
    mut delivery: UnboundedReceiver<Vec<u8>>,
    inbound: UnboundedSender<Message>,
    mut ack: Option<oneshot::Sender<(String, World)>>,
    topic: String,
) {
    tokio::spawn(async move {
        while let Some(payload) = delivery.recv().await {
            match decode(&payload) {
                Ok(Message::RegistrationAck { player_id, world }) => match ack.take() {
                    Some(tx) => {
                        let _ = tx.send((player_id, world));
                    }
                    None => warn!("unexpected registration ack on {}; dropped", topic),
                },
                Ok(message) => {
                    if inbound.send(message).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("dropping malformed payload on {}: {}", topic, e),
            }
        }
    });
}
