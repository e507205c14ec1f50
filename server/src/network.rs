//! Server network layer: fabric subscriptions, the inbound queue, and the
//! authoritative tick loop.
//!
//! Delivered payloads are decoded on their delivery task and appended to a
//! thread-safe queue; they are only interpreted inside [`Server::tick`].
//! All world mutation therefore happens on exactly one thread, and the
//! only cross-thread traffic is the enqueue of immutable message values.

use crate::game::GameState;
use crate::session::SessionRegistry;
use log::{error, info, warn};
use shared::{
    decode, encode, Fabric, FabricError, Message, World, BROADCAST_TOPIC, REGISTRATION_TOPIC,
    UPDATE_TOPIC,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval, MissedTickBehavior};

/// Authoritative server: owns the world, processes queued protocol events
/// once per tick, and broadcasts the result.
pub struct Server {
    fabric: Arc<dyn Fabric>,
    game: GameState,
    sessions: SessionRegistry,
    tick_interval: Duration,
    inbound_tx: UnboundedSender<Message>,
    inbound_rx: UnboundedReceiver<Message>,
}

impl Server {
    /// Subscribes to the server-bound topics and wires their deliveries
    /// into the inbound queue.
    pub fn new(
        fabric: Arc<dyn Fabric>,
        initial_world: World,
        tick_interval: Duration,
    ) -> Result<Self, FabricError> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let server = Server {
            fabric,
            game: GameState::new(initial_world),
            sessions: SessionRegistry::new(),
            tick_interval,
            inbound_tx,
            inbound_rx,
        };
        server.spawn_consumer(REGISTRATION_TOPIC)?;
        server.spawn_consumer(UPDATE_TOPIC)?;
        Ok(server)
    }

    /// Forwards decoded payloads from one fabric subscription into the
    /// inbound queue. A payload that fails to decode is logged and
    /// dropped; it must never stall the tick loop.
    fn spawn_consumer(&self, topic: &str) -> Result<(), FabricError> {
        let mut delivery = self.fabric.subscribe(topic)?;
        let inbound = self.inbound_tx.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            while let Some(payload) = delivery.recv().await {
                match decode(&payload) {
                    Ok(message) => {
                        if inbound.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("dropping malformed payload on {}: {}", topic, e),
                }
            }
        });
        Ok(())
    }

    pub fn world(&self) -> &World {
        self.game.world()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// One authoritative step: drain the inbound queue in arrival order,
    /// resolve eating, broadcast the new world, then notify the eaten.
    pub fn tick(&mut self) {
        while let Ok(message) = self.inbound_rx.try_recv() {
            self.handle_message(message);
        }

        self.game.tick();
        self.broadcast_state();
        self.notify_removed();
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::RegistrationRequest { reply_topic } => {
                self.register_player(reply_topic);
            }
            Message::PlayerUpdate {
                player_id,
                x,
                y,
                dx,
                dy,
            } => {
                self.game.apply_player_update(&player_id, x, y, dx, dy);
            }
            Message::UnRegistration { player_id } => {
                self.game.remove_player(&player_id);
                self.sessions.unregister(&player_id);
            }
            // Clients never address these to the server.
            Message::RegistrationAck { .. } | Message::StateUpdate { .. } | Message::GameOver => {
                warn!("out-of-protocol message on a server topic; dropped");
            }
        }
    }

    fn register_player(&mut self, reply_topic: String) {
        let player_id = self.sessions.register(&reply_topic);
        self.game.spawn_player(&player_id);
        let ack = Message::RegistrationAck {
            player_id,
            world: self.game.world().clone(),
        };
        self.publish(&reply_topic, &ack);
    }

    /// Fire-and-forget fanout of the authoritative world. A lost
    /// broadcast is superseded by the next tick's.
    fn broadcast_state(&self) {
        let update = Message::StateUpdate {
            world: self.game.world().clone(),
        };
        self.publish(BROADCAST_TOPIC, &update);
    }

    /// Tells each player eaten this tick that its game is over and drops
    /// its session.
    fn notify_removed(&mut self) {
        for eaten in self.game.players_to_remove() {
            info!("Player {} was eaten (mass {:.1})", eaten.id, eaten.mass);
            if let Some(session) = self.sessions.unregister(&eaten.id) {
                self.publish(&session.reply_topic, &Message::GameOver);
            }
        }
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

    /// Fixed-rate driver around [`Server::tick`]. Runs until cancelled.
    pub async fn run(&mut self) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Server running: {}x{} arena, {} foods, tick every {:?}",
            self.game.world().width,
            self.game.world().height,
            self.game.world().foods.len(),
            self.tick_interval
        );
        loop {
            ticker.tick().await;
            self.tick();
        }
    }

    /// Best-effort `GameOver` to every still-registered client. Called on
    /// graceful shutdown; there is no rollback of already-applied state.
    pub fn shutdown(&mut self) {
        let sessions = self.sessions.drain();
        info!("Shutting down; notifying {} client(s)", sessions.len());
        for session in sessions {
            self.publish(&session.reply_topic, &Message::GameOver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Food, LocalFabric, FOOD_MASS};

    fn test_world() -> World {
        World::new(1000, 1000, vec![], vec![Food::new("f1", 500.0, 500.0, FOOD_MASS)])
    }

    fn test_server(fabric: &LocalFabric) -> Server {
        Server::new(
            Arc::new(fabric.clone()),
            test_world(),
            Duration::from_millis(30),
        )
        .unwrap()
    }

    /// Lets the spawned consumer tasks move published payloads into the
    /// inbound queue before the next tick drains it.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    async fn next_message(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) -> Message {
        let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no delivery")
            .expect("subscription closed");
        decode(&payload).expect("undecodable message")
    }

    #[tokio::test]
    async fn test_registration_acks_with_identity_and_world() {
        let fabric = LocalFabric::new();
        let mut server = test_server(&fabric);

        let inbox = fabric.create_inbox().unwrap();
        let mut inbox_rx = fabric.subscribe(&inbox).unwrap();
        fabric
            .publish(
                REGISTRATION_TOPIC,
                encode(&Message::RegistrationRequest {
                    reply_topic: inbox.clone(),
                })
                .unwrap(),
            )
            .unwrap();
        settle().await;

        server.tick();

        match next_message(&mut inbox_rx).await {
            Message::RegistrationAck { player_id, world } => {
                assert_eq!(player_id, "p1");
                assert!(world.player_by_id("p1").is_some());
                assert_eq!(world.foods.len(), 1);
            }
            other => panic!("expected an ack, got {:?}", other),
        }
        assert_eq!(server.session_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_broadcasts_unconditionally() {
        let fabric = LocalFabric::new();
        let mut server = test_server(&fabric);
        let mut broadcast_rx = fabric.subscribe(BROADCAST_TOPIC).unwrap();

        // Nothing queued: the tick still publishes the current snapshot.
        server.tick();

        match next_message(&mut broadcast_rx).await {
            Message::StateUpdate { world } => {
                assert!(world.players.is_empty());
                assert_eq!(world.foods.len(), 1);
            }
            other => panic!("expected a state update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_stall_the_queue() {
        let fabric = LocalFabric::new();
        let mut server = test_server(&fabric);

        let inbox_a = fabric.create_inbox().unwrap();
        let mut rx_a = fabric.subscribe(&inbox_a).unwrap();
        let inbox_b = fabric.create_inbox().unwrap();
        let mut rx_b = fabric.subscribe(&inbox_b).unwrap();

        fabric
            .publish(
                REGISTRATION_TOPIC,
                encode(&Message::RegistrationRequest {
                    reply_topic: inbox_a.clone(),
                })
                .unwrap(),
            )
            .unwrap();
        fabric
            .publish(REGISTRATION_TOPIC, vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
            .unwrap();
        fabric
            .publish(
                REGISTRATION_TOPIC,
                encode(&Message::RegistrationRequest {
                    reply_topic: inbox_b.clone(),
                })
                .unwrap(),
            )
            .unwrap();
        settle().await;

        server.tick();

        // Both well-formed requests around the bad payload were applied.
        assert!(matches!(
            next_message(&mut rx_a).await,
            Message::RegistrationAck { .. }
        ));
        assert!(matches!(
            next_message(&mut rx_b).await,
            Message::RegistrationAck { .. }
        ));
        assert_eq!(server.world().players.len(), 2);
    }

    #[tokio::test]
    async fn test_player_update_moves_the_player() {
        let fabric = LocalFabric::new();
        let mut server = test_server(&fabric);

        let inbox = fabric.create_inbox().unwrap();
        let _rx = fabric.subscribe(&inbox).unwrap();
        fabric
            .publish(
                REGISTRATION_TOPIC,
                encode(&Message::RegistrationRequest { reply_topic: inbox }).unwrap(),
            )
            .unwrap();
        settle().await;
        server.tick();

        fabric
            .publish(
                UPDATE_TOPIC,
                encode(&Message::PlayerUpdate {
                    player_id: "p1".to_string(),
                    x: 123.0,
                    y: 456.0,
                    dx: 1.0,
                    dy: 0.0,
                })
                .unwrap(),
            )
            .unwrap();
        settle().await;
        server.tick();

        let p1 = server.world().player_by_id("p1").unwrap();
        assert_eq!((p1.x, p1.y), (123.0, 456.0));
    }

    #[tokio::test]
    async fn test_unregistration_removes_player_and_session() {
        let fabric = LocalFabric::new();
        let mut server = test_server(&fabric);

        let inbox = fabric.create_inbox().unwrap();
        let _rx = fabric.subscribe(&inbox).unwrap();
        fabric
            .publish(
                REGISTRATION_TOPIC,
                encode(&Message::RegistrationRequest { reply_topic: inbox }).unwrap(),
            )
            .unwrap();
        settle().await;
        server.tick();
        assert_eq!(server.world().players.len(), 1);

        fabric
            .publish(
                UPDATE_TOPIC,
                encode(&Message::UnRegistration {
                    player_id: "p1".to_string(),
                })
                .unwrap(),
            )
            .unwrap();
        settle().await;
        server.tick();

        assert!(server.world().players.is_empty());
        assert_eq!(server.session_count(), 0);
    }

    #[tokio::test]
    async fn test_eaten_player_gets_game_over_on_its_reply_topic() {
        let fabric = LocalFabric::new();
        let mut server = test_server(&fabric);

        let inbox_small = fabric.create_inbox().unwrap();
        let mut rx_small = fabric.subscribe(&inbox_small).unwrap();
        for inbox in [fabric.create_inbox().unwrap(), inbox_small.clone()] {
            fabric
                .publish(
                    REGISTRATION_TOPIC,
                    encode(&Message::RegistrationRequest { reply_topic: inbox }).unwrap(),
                )
                .unwrap();
        }
        settle().await;
        server.tick();
        // Drain the ack so the next read sees the game-over notice.
        assert!(matches!(
            next_message(&mut rx_small).await,
            Message::RegistrationAck { .. }
        ));

        for update in [
            Message::PlayerUpdate {
                player_id: "p1".to_string(),
                x: 100.0,
                y: 100.0,
                dx: 0.0,
                dy: 0.0,
            },
            Message::PlayerUpdate {
                player_id: "p2".to_string(),
                x: 100.5,
                y: 100.0,
                dx: 0.0,
                dy: 0.0,
            },
        ] {
            fabric
                .publish(UPDATE_TOPIC, encode(&update).unwrap())
                .unwrap();
        }
        settle().await;

        // p1 must outweigh p2 before the overlap resolves: send it over
        // the pellet first.
        fabric
            .publish(
                UPDATE_TOPIC,
                encode(&Message::PlayerUpdate {
                    player_id: "p1".to_string(),
                    x: 500.0,
                    y: 500.0,
                    dx: 0.0,
                    dy: 0.0,
                })
                .unwrap(),
            )
            .unwrap();
        settle().await;
        server.tick();
        assert!(server.world().foods.is_empty());

        fabric
            .publish(
                UPDATE_TOPIC,
                encode(&Message::PlayerUpdate {
                    player_id: "p1".to_string(),
                    x: 100.5,
                    y: 100.0,
                    dx: 0.0,
                    dy: 0.0,
                })
                .unwrap(),
            )
            .unwrap();
        settle().await;
        server.tick();

        assert!(server.world().player_by_id("p2").is_none());
        assert!(matches!(next_message(&mut rx_small).await, Message::GameOver));
        assert_eq!(server.session_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_notifies_every_session() {
        let fabric = LocalFabric::new();
        let mut server = test_server(&fabric);

        let mut inbox_rxs = Vec::new();
        for _ in 0..3 {
            let inbox = fabric.create_inbox().unwrap();
            inbox_rxs.push(fabric.subscribe(&inbox).unwrap());
            fabric
                .publish(
                    REGISTRATION_TOPIC,
                    encode(&Message::RegistrationRequest { reply_topic: inbox }).unwrap(),
                )
                .unwrap();
        }
        settle().await;
        server.tick();

        server.shutdown();

        for rx in &mut inbox_rxs {
            assert!(matches!(
                next_message(rx).await,
                Message::RegistrationAck { .. }
            ));
            assert!(matches!(next_message(rx).await, Message::GameOver));
        }
        assert_eq!(server.session_count(), 0);
    }
}
