//! Entity Component System (ECS)
//!
//! Strata keeps its entities in a [`hecs::World`]. Components are plain
//! structs stored by type; systems receive the world (or a narrower accessor
//! trait) explicitly instead of reaching for a global.
//!
//! This module defines the transform-level components every system shares.
//! Richer, system-specific components (colliders, player state) live in the
//! crate that owns their semantics.

use std::ops::{Deref, DerefMut};

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use hecs::{Entity, NoSuchEntity, World};

/// World-space location of an entity's center.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position(pub Vec3);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

impl Deref for Position {
    type Target = Vec3;

    fn deref(&self) -> &Vec3 {
        &self.0
    }
}

impl DerefMut for Position {
    fn deref_mut(&mut self) -> &mut Vec3 {
        &mut self.0
    }
}

/// Rate of change of [`Position`] in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

impl Velocity {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

impl Deref for Velocity {
    type Target = Vec3;

    fn deref(&self) -> &Vec3 {
        &self.0
    }
}

impl DerefMut for Velocity {
    fn deref_mut(&mut self) -> &mut Vec3 {
        &mut self.0
    }
}
