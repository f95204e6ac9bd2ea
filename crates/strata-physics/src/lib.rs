//! # Strata Physics
//!
//! Kinematic character physics and static-world collision for the Strata engine.
//!
//! ## Features
//! - **Geometry**: triangulated world faces with a uniform-grid broad phase
//! - **Queries**: box-vs-face overlap and ray casts against the world
//! - **Collision**: world contacts, contact planes, body-vs-body separation
//! - **Movement**: slope walking, step-up, axis sliding, unstuck and ground snap
//! - **Player**: ground / air / crouch state machine with jump and noclip

pub mod body;
pub mod collision;
pub mod console;
pub mod geometry;
pub mod movement;
pub mod query;
pub mod response;
pub mod scenario;
pub mod store;
pub mod system;
pub mod tuning;
pub mod world;

#[cfg(test)]
mod scenarios;

use strata_core::ecs::Entity;
use thiserror::Error;

pub use body::{Collidable, CollisionLayers, Player, PlayerInput, PlayerState};
pub use collision::{
    CastHit, CollisionEvent, CollisionPlane, CollisionQuery, CollisionSystem, ContactEvent,
};
pub use console::{ConsoleCommand, ConsoleError};
pub use geometry::{Face, FaceDef, FaceFlags, GeometryStore};
pub use movement::{BodyMover, ResolvePath, Resolution};
pub use query::RayHit;
pub use scenario::Scenario;
pub use store::{BodyMut, BodyShape, BodyStore};
pub use system::PhysicsSystem;
pub use tuning::PhysicsTuning;
pub use world::{BodySnapshot, PhysicsWorld, WorldConfig};

/// Physics-related errors
#[derive(Error, Debug)]
pub enum PhysicsError {
    #[error("Invalid tuning value for {field}: {reason}")]
    InvalidTuning { field: &'static str, reason: String },

    #[error("Console error: {0}")]
    Console(#[from] ConsoleError),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Entity {0:?} has no player record")]
    NotAPlayer(Entity),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}

/// Result type for physics operations
pub type PhysicsResult<T> = Result<T, PhysicsError>;
