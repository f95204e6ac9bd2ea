//! Canned scenarios
//!
//! Small hand-built levels with a player spawn and a fixed input, used by the
//! CLI driver, the scenario tests and the benches.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use strata_core::ecs::Entity;

use crate::body::PlayerInput;
use crate::geometry::FaceDef;
use crate::world::{PhysicsWorld, WorldConfig};
use crate::{PhysicsError, PhysicsResult};

/// Center height of a standing player resting on `y = 0`
pub const RESTING_HEIGHT: f32 = 0.91;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Fall from five units onto a flat floor
    Drop,
    /// Walk up two 0.3 steps
    Stairs,
    /// Walk into a ledge taller than the step height
    Ledge,
    /// Walk up a ramp with normal (-0.6, 0.8, 0) onto a plateau
    Slope,
    /// Spawn overlapping a wall and get pushed out
    Stuck,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Drop,
        Scenario::Stairs,
        Scenario::Ledge,
        Scenario::Slope,
        Scenario::Stuck,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Drop => "drop",
            Scenario::Stairs => "stairs",
            Scenario::Ledge => "ledge",
            Scenario::Slope => "slope",
            Scenario::Stuck => "stuck",
        }
    }

    /// World faces of the level
    pub fn faces(self) -> Vec<FaceDef> {
        let mut faces = vec![floor(20.0)];
        match self {
            Scenario::Drop => {}
            Scenario::Stairs => {
                faces.extend(FaceDef::solid_box(
                    Vec3::new(1.0, 0.0, -5.0),
                    Vec3::new(10.0, 0.3, 5.0),
                ));
                faces.extend(FaceDef::solid_box(
                    Vec3::new(2.0, 0.0, -5.0),
                    Vec3::new(10.0, 0.6, 5.0),
                ));
            }
            Scenario::Ledge => {
                faces.extend(FaceDef::solid_box(
                    Vec3::new(1.0, 0.0, -5.0),
                    Vec3::new(10.0, 1.0, 5.0),
                ));
            }
            Scenario::Slope => {
                faces.push(FaceDef::quad(
                    Vec3::new(1.0, 0.0, -5.0),
                    Vec3::new(1.0, 0.0, 5.0),
                    Vec3::new(5.0, 3.0, 5.0),
                    Vec3::new(5.0, 3.0, -5.0),
                ));
                faces.push(FaceDef::quad(
                    Vec3::new(5.0, 3.0, -5.0),
                    Vec3::new(5.0, 3.0, 5.0),
                    Vec3::new(15.0, 3.0, 5.0),
                    Vec3::new(15.0, 3.0, -5.0),
                ));
            }
            Scenario::Stuck => {
                faces.extend(FaceDef::solid_box(
                    Vec3::new(0.2, 0.0, -2.0),
                    Vec3::new(2.0, 3.0, 2.0),
                ));
            }
        }
        faces
    }

    /// Player spawn (center of the collision box)
    pub fn spawn_position(self) -> Vec3 {
        match self {
            Scenario::Drop => Vec3::new(0.0, 5.0, 0.0),
            _ => Vec3::new(0.0, RESTING_HEIGHT, 0.0),
        }
    }

    /// Input held for the whole run
    pub fn input(self) -> PlayerInput {
        let move_direction = match self {
            Scenario::Stairs | Scenario::Ledge | Scenario::Slope => Vec3::X,
            Scenario::Drop | Scenario::Stuck => Vec3::ZERO,
        };
        PlayerInput {
            move_direction,
            ..Default::default()
        }
    }

    /// Frames needed at 60 Hz for the scenario to play out
    pub fn default_frames(self) -> u32 {
        match self {
            Scenario::Slope => 90,
            Scenario::Drop => 120,
            _ => 60,
        }
    }

    /// Build the world, spawn the player and set its input
    pub fn build(self, config: WorldConfig) -> PhysicsResult<(PhysicsWorld, Entity)> {
        let mut world = PhysicsWorld::new(config)?;
        world.build_geometry(&self.faces())?;
        let player = world.spawn_player(self.spawn_position());
        world.set_input(player, self.input())?;
        log::info!("Scenario {} ready", self);
        Ok((world, player))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = PhysicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PhysicsError::UnknownScenario(s.to_string()))
    }
}

/// A square floor at `y = 0`
fn floor(half_size: f32) -> FaceDef {
    FaceDef::quad(
        Vec3::new(-half_size, 0.0, -half_size),
        Vec3::new(-half_size, 0.0, half_size),
        Vec3::new(half_size, 0.0, half_size),
        Vec3::new(half_size, 0.0, -half_size),
    )
}
