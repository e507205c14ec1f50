use crate::input::DirectionHandle;
use log::debug;
use shared::{Player, World, PLAYER_SPEED};

/// Locally-predicted game state for one player.
///
/// The owned player moves every tick under the held direction without
/// waiting for the network; everything else in the world is whatever the
/// server last broadcast. Reconciliation in [`merge_broadcast`] keeps the
/// two from fighting each other.
///
/// [`merge_broadcast`]: ClientGameState::merge_broadcast
pub struct ClientGameState {
    player_id: String,
    world: World,
    direction: DirectionHandle,
}

impl ClientGameState {
    /// Starts from the world the registration ack seeded us with.
    pub fn new(player_id: impl Into<String>, world: World) -> Self {
        ClientGameState {
            player_id: player_id.into(),
            world,
            direction: DirectionHandle::new(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Owned snapshot for readers on other threads (rendering). Snapshots
    /// are never mutated in place, so the copy stays valid while the next
    /// tick replaces ours.
    pub fn snapshot(&self) -> World {
        self.world.clone()
    }

    /// Handle for whoever owns input; writes are picked up on the next
    /// tick.
    pub fn direction_handle(&self) -> DirectionHandle {
        self.direction.clone()
    }

    pub fn direction(&self) -> shared::Direction {
        self.direction.get()
    }

    pub fn set_direction(&self, dx: f64, dy: f64) {
        self.direction.set(dx, dy);
    }

    /// Client-side prediction: moves only the owned player by the held
    /// direction scaled by the speed constant. Runs every tick regardless
    /// of network activity.
    pub fn tick(&mut self) {
        let direction = self.direction.get();
        let moved = match self.world.player_by_id(&self.player_id) {
            Some(player) => player.moved_to(
                player.x + direction.dx * PLAYER_SPEED,
                player.y + direction.dy * PLAYER_SPEED,
            ),
            None => return,
        };
        let players = self
            .world
            .players
            .iter()
            .map(|p| if p.id == self.player_id { moved.clone() } else { p.clone() })
            .collect();
        self.world = self.world.with_players(players);
    }

    /// Reconciles an authoritative broadcast into the local view.
    ///
    /// Every other player and all food are replaced by the server's
    /// values. The owned player adopts the server's mass but keeps its
    /// locally-predicted position, so a stale broadcast never yanks the
    /// player backwards.
    ///
    /// Returns `false` when the owned player is absent from the
    /// broadcast: the server no longer knows us, the session is over.
    pub fn merge_broadcast(&mut self, server_world: World) -> bool {
        let server_self = match server_world.player_by_id(&self.player_id) {
            Some(player) => player.clone(),
            None => {
                debug!("{} missing from broadcast; session over", self.player_id);
                return false;
            }
        };
        // Keep the predicted position; fall back to the server's if the
        // local copy somehow lost the player.
        let (x, y) = match self.world.player_by_id(&self.player_id) {
            Some(local) => (local.x, local.y),
            None => (server_self.x, server_self.y),
        };

        let mut players: Vec<Player> = server_world
            .players
            .iter()
            .filter(|p| p.id != self.player_id)
            .cloned()
            .collect();
        players.push(Player::new(self.player_id.clone(), x, y, server_self.mass));

        self.world = World::new(
            server_world.width,
            server_world.height,
            players,
            server_world.foods,
        );
        true
    }
}
