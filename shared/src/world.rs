//! Arena model shared by the authoritative server and predictive clients.
//!
//! The [`World`] is an immutable value: every state transition builds a new
//! snapshot instead of mutating fields in place. Old snapshots stay valid,
//! so a render thread can keep reading one while the tick loop installs the
//! next.

use serde::{Deserialize, Serialize};

pub const WORLD_WIDTH: u32 = 1000;
pub const WORLD_HEIGHT: u32 = 1000;
pub const INITIAL_FOOD_COUNT: usize = 150;
pub const INITIAL_PLAYER_MASS: f64 = 120.0;
pub const FOOD_MASS: f64 = 100.0;
pub const PLAYER_SPEED: f64 = 2.0;

/// Per-player movement intent as a unit-ish vector. Zero means standing
/// still. Scaled by [`PLAYER_SPEED`] once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Direction {
    pub dx: f64,
    pub dy: f64,
}

impl Direction {
    pub const ZERO: Direction = Direction { dx: 0.0, dy: 0.0 };

    pub fn new(dx: f64, dy: f64) -> Self {
        Direction { dx, dy }
    }

    /// Unit-length copy of this direction, or zero if the vector is zero.
    pub fn normalized(&self) -> Direction {
        let magnitude = (self.dx * self.dx + self.dy * self.dy).sqrt();
        if magnitude > 0.0 {
            Direction {
                dx: self.dx / magnitude,
                dy: self.dy / magnitude,
            }
        } else {
            Direction::ZERO
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub mass: f64,
}

impl Player {
    pub fn new(id: impl Into<String>, x: f64, y: f64, mass: f64) -> Self {
        Player {
            id: id.into(),
            x,
            y,
            mass,
        }
    }

    /// Collision radius, derived from mass. Monotonic: heavier is bigger.
    pub fn radius(&self) -> f64 {
        (self.mass / std::f64::consts::PI).sqrt()
    }

    /// Copy of this player at a new position.
    pub fn moved_to(&self, x: f64, y: f64) -> Player {
        Player {
            id: self.id.clone(),
            x,
            y,
            mass: self.mass,
        }
    }

    /// Copy of this player with extra mass added.
    pub fn grown_by(&self, extra_mass: f64) -> Player {
        Player {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            mass: self.mass + extra_mass,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Food {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub mass: f64,
}

impl Food {
    pub fn new(id: impl Into<String>, x: f64, y: f64, mass: f64) -> Self {
        Food {
            id: id.into(),
            x,
            y,
            mass,
        }
    }
}

pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// A player eats a food pellet when the pellet's center lies inside the
/// player's radius.
pub fn can_eat_food(player: &Player, food: &Food) -> bool {
    distance(player.x, player.y, food.x, food.y) < player.radius()
}

/// A player eats another player when the victim's center lies inside the
/// eater's radius and the eater is strictly heavier. Equal-mass overlap is
/// a stand-off: neither is removed.
pub fn can_eat_player(eater: &Player, victim: &Player) -> bool {
    eater.id != victim.id
        && distance(eater.x, eater.y, victim.x, victim.y) < eater.radius()
        && eater.mass > victim.mass
}

/// Immutable snapshot of the arena: bounds, players and food.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct World {
    pub width: u32,
    pub height: u32,
    pub players: Vec<Player>,
    pub foods: Vec<Food>,
}

impl World {
    pub fn new(width: u32, height: u32, players: Vec<Player>, foods: Vec<Food>) -> Self {
        World {
            width,
            height,
            players,
            foods,
        }
    }

    pub fn player_by_id(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// New world with one more player appended.
    pub fn with_player(&self, player: Player) -> World {
        let mut players = self.players.clone();
        players.push(player);
        World::new(self.width, self.height, players, self.foods.clone())
    }

    /// New world with the given player roster, food unchanged.
    pub fn with_players(&self, players: Vec<Player>) -> World {
        World::new(self.width, self.height, players, self.foods.clone())
    }

    /// New world without the named players. Unknown ids are ignored.
    pub fn without_players(&self, ids: &[String]) -> World {
        let players = self
            .players
            .iter()
            .filter(|p| !ids.contains(&p.id))
            .cloned()
            .collect();
        World::new(self.width, self.height, players, self.foods.clone())
    }

    /// New world without the named foods. Unknown ids are ignored.
    pub fn without_foods(&self, ids: &[String]) -> World {
        let foods = self
            .foods
            .iter()
            .filter(|f| !ids.contains(&f.id))
            .cloned()
            .collect();
        World::new(self.width, self.height, self.players.clone(), foods)
    }
}
