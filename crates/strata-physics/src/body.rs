//! Body state
//!
//! The per-entity records the physics pipeline reads and writes: the
//! collision shape and the player's movement state machine.

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use strata_core::ecs::Entity;
use strata_core::math::Aabb;

/// Standing height in units
pub const STANDING_HEIGHT: f32 = 1.8;

/// Crouching height in units
pub const CROUCHING_HEIGHT: f32 = 0.9;

/// Default player footprint (X and Z extents)
pub const PLAYER_WIDTH: f32 = 0.6;

bitflags! {
    /// Collision layers a body belongs to or collides with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionLayers: u32 {
        const PLAYER = 1 << 0;
        const ENEMY = 1 << 1;
        const PROJECTILE = 1 << 2;
        const PROP = 1 << 3;
        const TRIGGER = 1 << 4;
        const DEBRIS = 1 << 5;
    }
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::all()
    }
}

/// Axis-aligned collision shape of a body.
///
/// `bounds` mirrors `size` placed at the body's position and is refreshed by
/// the physics step every time the body moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collidable {
    /// Full extents
    pub size: Vec3,
    pub bounds: Aabb,
    /// Layers this body is on
    pub layer: CollisionLayers,
    /// Layers this body collides with
    pub mask: CollisionLayers,
    pub is_static: bool,
    /// Triggers report overlaps through their bounds but never collide
    pub is_trigger: bool,
    /// Bodies overlapping this one during the last step
    #[serde(skip)]
    pub collisions: Vec<Entity>,
}

impl Collidable {
    pub fn new(size: Vec3) -> Self {
        let size = size.abs();
        Self {
            size,
            bounds: Aabb::from_center_size(Vec3::ZERO, size),
            layer: CollisionLayers::PROP,
            mask: CollisionLayers::all(),
            is_static: false,
            is_trigger: false,
            collisions: Vec::new(),
        }
    }

    /// Standing player shape
    pub fn player() -> Self {
        Self::new(Vec3::new(PLAYER_WIDTH, STANDING_HEIGHT, PLAYER_WIDTH))
            .with_layers(CollisionLayers::PLAYER, CollisionLayers::all())
    }

    pub fn with_layers(mut self, layer: CollisionLayers, mask: CollisionLayers) -> Self {
        self.layer = layer;
        self.mask = mask;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size * 0.5
    }

    pub fn half_height(&self) -> f32 {
        self.size.y * 0.5
    }

    /// The shape placed with its center at `position`
    pub fn aabb_at(&self, position: Vec3) -> Aabb {
        Aabb::from_center_size(position, self.size)
    }

    pub fn update_bounds_from_position(&mut self, position: Vec3) {
        self.bounds = self.aabb_at(position);
    }

    /// Change the height while keeping the feet where they are.
    ///
    /// Returns the center position that keeps the feet fixed.
    pub fn resize_height(&mut self, height: f32, position: Vec3) -> Vec3 {
        let feet = position.y - self.half_height();
        self.size.y = height.abs();
        let center = Vec3::new(position.x, feet + self.half_height(), position.z);
        self.update_bounds_from_position(center);
        center
    }

    /// Whether the layer masks of both bodies accept each other
    pub fn accepts(&self, other: &Collidable) -> bool {
        self.mask.intersects(other.layer) && other.mask.intersects(self.layer)
    }
}

/// Movement state of a player body; exactly one is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerState {
    OnGround,
    #[default]
    InAir,
    Crouching,
}

impl PlayerState {
    /// Standing or crouched on a surface
    pub fn is_grounded(self) -> bool {
        matches!(self, PlayerState::OnGround | PlayerState::Crouching)
    }
}

/// Intents set by the input layer before each step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Consumed by the step that acts on it
    pub wants_jump: bool,
    pub wants_crouch: bool,
    pub is_running: bool,
    /// Desired horizontal direction; `Y` is ignored and the length is clamped to 1
    pub move_direction: Vec3,
}

/// Player record: state machine, tunables and flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub state: PlayerState,
    pub walk_speed: f32,
    pub run_speed: f32,
    pub crouch_speed: f32,
    pub jump_force: f32,
    pub standing_height: f32,
    pub crouching_height: f32,
    pub is_running: bool,
    pub is_jumping: bool,
    /// Moves without gravity or collision
    pub no_clip: bool,
    #[serde(default)]
    pub input: PlayerInput,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            state: PlayerState::InAir,
            walk_speed: 5.0,
            run_speed: 8.0,
            crouch_speed: 2.5,
            jump_force: 8.0,
            standing_height: STANDING_HEIGHT,
            crouching_height: CROUCHING_HEIGHT,
            is_running: false,
            is_jumping: false,
            no_clip: false,
            input: PlayerInput::default(),
        }
    }
}

impl Player {
    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded()
    }

    /// Horizontal speed for the current state
    pub fn move_speed(&self) -> f32 {
        match self.state {
            PlayerState::Crouching => self.crouch_speed,
            _ if self.is_running => self.run_speed,
            _ => self.walk_speed,
        }
    }

    /// Collision height for the current state
    pub fn target_height(&self) -> f32 {
        match self.state {
            PlayerState::Crouching => self.crouching_height,
            _ => self.standing_height,
        }
    }

    pub fn set_state(&mut self, state: PlayerState) {
        if self.state != state {
            log::debug!("Player state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}
