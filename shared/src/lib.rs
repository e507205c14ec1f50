//! Types and plumbing shared between the authoritative server and
//! predictive clients: the arena world model, the wire protocol, and the
//! messaging fabric both sides communicate through.
//!
//! Both simulation managers run the same movement and collision rules from
//! [`world`], so a client predicting its own motion lands on the same
//! numbers the server computes. The [`protocol`] enum is the only thing
//! that crosses the fabric; [`fabric`] defines how it travels.

pub mod fabric;
pub mod protocol;
pub mod world;

pub use fabric::{Fabric, FabricError, FabricHost, LocalFabric, TcpFabric};
pub use protocol::{
    decode, encode, Message, ProtocolError, BROADCAST_TOPIC, REGISTRATION_TIMEOUT_SECS,
    REGISTRATION_TOPIC, UPDATE_TOPIC,
};
pub use world::{
    can_eat_food, can_eat_player, distance, Direction, Food, Player, World, FOOD_MASS,
    INITIAL_FOOD_COUNT, INITIAL_PLAYER_MASS, PLAYER_SPEED, WORLD_HEIGHT, WORLD_WIDTH,
};
