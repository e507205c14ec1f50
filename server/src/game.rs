use log::{debug, info};
use rand::Rng;
use shared::{
    can_eat_food, can_eat_player, Direction, Food, Player, World, FOOD_MASS, INITIAL_PLAYER_MASS,
};
use std::collections::HashMap;

/// Result of one eating resolution pass over a world snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EatingOutcome {
    pub world: World,
    pub eaten_players: Vec<Player>,
}

/// Resolves all eating for one tick as a pure function of the pre-tick
/// snapshot.
///
/// Every predicate is evaluated against the incoming world, so the result
/// does not depend on iteration order and chain-eating within a single
/// tick is impossible: if A eats B while B eats a pellet, A gains B's
/// pre-tick mass, not B's grown mass. Two players covering the same pellet
/// both grow by it; the pellet is removed once.
pub fn resolve_eating(world: &World) -> EatingOutcome {
    let grown: Vec<Player> = world
        .players
        .iter()
        .map(|player| {
            let food_mass: f64 = world
                .foods
                .iter()
                .filter(|food| can_eat_food(player, food))
                .map(|food| food.mass)
                .sum();
            let player_mass: f64 = world
                .players
                .iter()
                .filter(|victim| can_eat_player(player, victim))
                .map(|victim| victim.mass)
                .sum();
            player.grown_by(food_mass + player_mass)
        })
        .collect();

    let eaten_food_ids: Vec<String> = world
        .foods
        .iter()
        .filter(|food| world.players.iter().any(|player| can_eat_food(player, food)))
        .map(|food| food.id.clone())
        .collect();

    let eaten_players: Vec<Player> = world
        .players
        .iter()
        .filter(|victim| world.players.iter().any(|eater| can_eat_player(eater, victim)))
        .cloned()
        .collect();
    let eaten_player_ids: Vec<String> = eaten_players.iter().map(|p| p.id.clone()).collect();

    EatingOutcome {
        world: world
            .with_players(grown)
            .without_foods(&eaten_food_ids)
            .without_players(&eaten_player_ids),
        eaten_players,
    }
}

/// Scatters the initial food pellets uniformly over the arena.
pub fn initial_foods(count: usize, width: u32, height: u32) -> Vec<Food> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            Food::new(
                format!("f{}", i + 1),
                rng.gen_range(0.0..width as f64),
                rng.gen_range(0.0..height as f64),
                FOOD_MASS,
            )
        })
        .collect()
}

/// Authoritative game state. Single source of truth for the world; only
/// the server tick thread may call the mutating methods.
pub struct GameState {
    world: World,
    directions: HashMap<String, Direction>,
    pending_removals: Vec<Player>,
}

impl GameState {
    pub fn new(world: World) -> Self {
        GameState {
            world,
            directions: HashMap::new(),
            pending_removals: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Spawns a freshly registered player at a uniformly random position
    /// with the fixed initial mass.
    pub fn spawn_player(&mut self, player_id: &str) -> Player {
        let mut rng = rand::thread_rng();
        let player = Player::new(
            player_id,
            rng.gen_range(0.0..self.world.width as f64),
            rng.gen_range(0.0..self.world.height as f64),
            INITIAL_PLAYER_MASS,
        );
        info!(
            "Spawned player {} at ({:.1}, {:.1})",
            player.id, player.x, player.y
        );
        self.world = self.world.with_player(player.clone());
        player
    }

    /// Overwrites a player's claimed position and held direction. Clients
    /// are trusted; the claim is not validated against the previous tick.
    /// Updates for players no longer in the world are no-ops.
    pub fn apply_player_update(&mut self, player_id: &str, x: f64, y: f64, dx: f64, dy: f64) {
        if self.world.player_by_id(player_id).is_none() {
            debug!("update for stale player {}; ignored", player_id);
            return;
        }
        let players = self
            .world
            .players
            .iter()
            .map(|p| {
                if p.id == player_id {
                    p.moved_to(x, y)
                } else {
                    p.clone()
                }
            })
            .collect();
        self.world = self.world.with_players(players);
        self.directions
            .insert(player_id.to_string(), Direction::new(dx, dy));
    }

    /// Removes a player from the world. Idempotent.
    pub fn remove_player(&mut self, player_id: &str) {
        self.world = self.world.without_players(&[player_id.to_string()]);
        self.directions.remove(player_id);
    }

    /// Last direction reported by a player; zero if never reported.
    pub fn direction(&self, player_id: &str) -> Direction {
        self.directions
            .get(player_id)
            .copied()
            .unwrap_or(Direction::ZERO)
    }

    /// Advances the world by one step: resolves eating and records the
    /// eaten players for notification.
    pub fn tick(&mut self) {
        let outcome = resolve_eating(&self.world);
        for eaten in &outcome.eaten_players {
            self.directions.remove(&eaten.id);
        }
        self.pending_removals.extend(outcome.eaten_players);
        self.world = outcome.world;
    }

    /// Drains the players removed by eating since the last call. A second
    /// call before the next tick returns an empty list.
    pub fn players_to_remove(&mut self) -> Vec<Player> {
        std::mem::take(&mut self.pending_removals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn arena(players: Vec<Player>, foods: Vec<Food>) -> World {
        World::new(1000, 1000, players, foods)
    }

    #[test]
    fn test_eating_resolution_is_deterministic() {
        let world = arena(
            vec![
                Player::new("p1", 100.0, 100.0, 200.0),
                Player::new("p2", 101.0, 100.0, 120.0),
                Player::new("p3", 500.0, 500.0, 120.0),
            ],
            vec![
                Food::new("f1", 100.5, 100.0, FOOD_MASS),
                Food::new("f2", 700.0, 700.0, FOOD_MASS),
            ],
        );

        let first = resolve_eating(&world);
        let second = resolve_eating(&world);
        assert_eq!(first, second);
    }

    #[test]
    fn test_player_grows_by_eaten_food_mass() {
        let player = Player::new("p1", 100.0, 100.0, INITIAL_PLAYER_MASS);
        let near = Food::new("f1", 102.0, 100.0, FOOD_MASS);
        let far = Food::new("f2", 900.0, 900.0, FOOD_MASS);
        let world = arena(vec![player], vec![near, far]);

        let outcome = resolve_eating(&world);

        let survivor = outcome.world.player_by_id("p1").unwrap();
        assert_approx_eq!(survivor.mass, INITIAL_PLAYER_MASS + FOOD_MASS, 1e-9);
        assert_eq!(outcome.world.foods.len(), 1);
        assert_eq!(outcome.world.foods[0].id, "f2");
        assert!(outcome.eaten_players.is_empty());
    }

    #[test]
    fn test_bigger_player_eats_smaller_player() {
        let big = Player::new("p1", 100.0, 100.0, 300.0);
        let small = Player::new("p2", 102.0, 100.0, 120.0);
        let world = arena(vec![big, small], vec![]);

        let outcome = resolve_eating(&world);

        assert_eq!(outcome.eaten_players.len(), 1);
        assert_eq!(outcome.eaten_players[0].id, "p2");
        assert!(outcome.world.player_by_id("p2").is_none());

        let survivor = outcome.world.player_by_id("p1").unwrap();
        assert_approx_eq!(survivor.mass, 300.0 + 120.0, 1e-9);
    }

    #[test]
    fn test_equal_mass_overlap_is_a_standoff() {
        let a = Player::new("p1", 100.0, 100.0, 200.0);
        let b = Player::new("p2", 100.5, 100.0, 200.0);
        let world = arena(vec![a, b], vec![]);

        let outcome = resolve_eating(&world);

        assert!(outcome.eaten_players.is_empty());
        assert_eq!(outcome.world.players.len(), 2);
        assert_approx_eq!(outcome.world.player_by_id("p1").unwrap().mass, 200.0, 1e-9);
        assert_approx_eq!(outcome.world.player_by_id("p2").unwrap().mass, 200.0, 1e-9);
    }

    #[test]
    fn test_no_chaining_within_a_tick() {
        // p1 eats p2 while p2 eats a pellet: p1 gains p2's pre-tick mass,
        // and the pellet it also covers, but nothing twice.
        let eater = Player::new("p1", 100.0, 100.0, 300.0);
        let victim = Player::new("p2", 102.0, 100.0, 120.0);
        let pellet = Food::new("f1", 103.0, 100.0, FOOD_MASS);
        let world = arena(vec![eater, victim], vec![pellet]);

        let outcome = resolve_eating(&world);

        let survivor = outcome.world.player_by_id("p1").unwrap();
        assert_approx_eq!(survivor.mass, 300.0 + 120.0 + FOOD_MASS, 1e-9);
        assert!(outcome.world.foods.is_empty());
        assert!(outcome.world.player_by_id("p2").is_none());
    }

    #[test]
    fn test_shared_pellet_feeds_both_but_disappears_once() {
        let a = Player::new("p1", 100.0, 100.0, 200.0);
        let b = Player::new("p2", 102.0, 100.0, 200.0);
        let pellet = Food::new("f1", 101.0, 100.0, FOOD_MASS);
        let world = arena(vec![a, b], vec![pellet]);

        let outcome = resolve_eating(&world);

        assert!(outcome.world.foods.is_empty());
        assert_approx_eq!(outcome.world.player_by_id("p1").unwrap().mass, 300.0, 1e-9);
        assert_approx_eq!(outcome.world.player_by_id("p2").unwrap().mass, 300.0, 1e-9);
    }

    #[test]
    fn test_spawn_player_stays_in_bounds() {
        let mut game = GameState::new(arena(vec![], vec![]));
        for i in 0..50 {
            let player = game.spawn_player(&format!("p{}", i + 1));
            assert!(player.x >= 0.0 && player.x < 1000.0);
            assert!(player.y >= 0.0 && player.y < 1000.0);
            assert_approx_eq!(player.mass, INITIAL_PLAYER_MASS, 1e-9);
        }
        assert_eq!(game.world().players.len(), 50);
    }

    #[test]
    fn test_update_for_stale_player_is_noop() {
        let mut game = GameState::new(arena(
            vec![Player::new("p1", 10.0, 10.0, INITIAL_PLAYER_MASS)],
            vec![],
        ));

        game.apply_player_update("p99", 50.0, 50.0, 1.0, 0.0);

        assert_eq!(game.world().players.len(), 1);
        let p1 = game.world().player_by_id("p1").unwrap();
        assert_eq!((p1.x, p1.y), (10.0, 10.0));
        assert_eq!(game.direction("p99"), Direction::ZERO);
    }

    #[test]
    fn test_update_overwrites_position_and_direction() {
        let mut game = GameState::new(arena(
            vec![Player::new("p1", 10.0, 10.0, INITIAL_PLAYER_MASS)],
            vec![],
        ));

        game.apply_player_update("p1", 42.0, 43.0, 0.6, 0.8);

        let p1 = game.world().player_by_id("p1").unwrap();
        assert_eq!((p1.x, p1.y), (42.0, 43.0));
        assert_eq!(game.direction("p1"), Direction::new(0.6, 0.8));
    }

    #[test]
    fn test_pending_removals_drain_exactly_once() {
        let mut game = GameState::new(arena(
            vec![
                Player::new("p1", 100.0, 100.0, 300.0),
                Player::new("p2", 101.0, 100.0, 120.0),
            ],
            vec![],
        ));

        game.tick();

        let removed = game.players_to_remove();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, "p2");
        assert!(game.players_to_remove().is_empty());
    }

    #[test]
    fn test_remove_player_is_idempotent() {
        let mut game = GameState::new(arena(
            vec![Player::new("p1", 10.0, 10.0, INITIAL_PLAYER_MASS)],
            vec![],
        ));

        game.remove_player("p1");
        game.remove_player("p1");

        assert!(game.world().players.is_empty());
    }

    #[test]
    fn test_initial_foods_fill_the_arena() {
        let foods = initial_foods(150, 1000, 1000);
        assert_eq!(foods.len(), 150);
        assert_eq!(foods[0].id, "f1");
        assert_eq!(foods[149].id, "f150");
        for food in &foods {
            assert!(food.x >= 0.0 && food.x < 1000.0);
            assert!(food.y >= 0.0 && food.y < 1000.0);
            assert_approx_eq!(food.mass, FOOD_MASS, 1e-9);
        }
    }
}
