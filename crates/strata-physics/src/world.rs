//! Physics world
//!
//! Bundles the body storage, the physics system with its collision backend,
//! and a fixed-step accumulator behind one owner that games and tools drive
//! frame by frame.

use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use strata_core::ecs::{Entity, Position, Velocity, World};
use strata_core::math::Aabb;
use strata_core::time::{DeltaTime, FixedTimeStep, StepAccumulator};

use crate::body::{Collidable, Player, PlayerInput, PlayerState};
use crate::collision::{CastHit, CollisionSystem, ContactEvent};
use crate::console::ConsoleCommand;
use crate::geometry::{FaceDef, GeometryStore};
use crate::system::PhysicsSystem;
use crate::tuning::PhysicsTuning;
use crate::{PhysicsError, PhysicsResult};

/// World configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub tuning: PhysicsTuning,
    /// Rate of the fixed steps taken by [`PhysicsWorld::advance`]
    pub fixed_hz: f64,
    /// Most fixed steps taken for one frame
    pub max_steps_per_frame: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tuning: PhysicsTuning::default(),
            fixed_hz: 60.0,
            max_steps_per_frame: 8,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> PhysicsResult<()> {
        self.tuning.validate()?;
        if !(self.fixed_hz > 0.0 && self.fixed_hz.is_finite()) {
            return Err(PhysicsError::InvalidTuning {
                field: "fixed_hz",
                reason: format!("{} must be positive and finite", self.fixed_hz),
            });
        }
        if self.max_steps_per_frame == 0 {
            return Err(PhysicsError::InvalidTuning {
                field: "max_steps_per_frame",
                reason: "must allow at least one step".into(),
            });
        }
        Ok(())
    }
}

/// Observable state of one body after a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BodySnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub bounds: Option<Aabb>,
    pub state: Option<PlayerState>,
    pub no_clip: bool,
}

/// Physics simulation over a hecs world
pub struct PhysicsWorld {
    bodies: World,
    physics: PhysicsSystem<CollisionSystem>,
    accumulator: StepAccumulator,
    frame: u64,
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> PhysicsResult<Self> {
        config.validate()?;

        let collision = CollisionSystem::new(&config.tuning);
        let step =
            FixedTimeStep::from_hz(config.fixed_hz).with_max_updates(config.max_steps_per_frame);
        log::info!("Physics world created ({} Hz fixed step)", config.fixed_hz);

        Ok(Self {
            bodies: World::new(),
            physics: PhysicsSystem::new(collision, config.tuning),
            accumulator: StepAccumulator::new(step),
            frame: 0,
        })
    }

    pub fn bodies(&self) -> &World {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut World {
        &mut self.bodies
    }

    pub fn tuning(&self) -> &PhysicsTuning {
        self.physics.tuning()
    }

    pub fn geometry(&self) -> Option<&Arc<GeometryStore>> {
        self.physics.collision().geometry()
    }

    /// Steps taken so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Replace the world geometry; takes effect from the next step
    pub fn load_geometry(&mut self, geometry: Arc<GeometryStore>) {
        log::info!("Loaded world geometry with {} faces", geometry.len());
        self.physics.collision_mut().set_geometry(Some(geometry));
    }

    pub fn build_geometry(&mut self, faces: &[FaceDef]) -> PhysicsResult<()> {
        let store = GeometryStore::build(faces, self.tuning().grid_cell_size)?;
        self.load_geometry(Arc::new(store));
        Ok(())
    }

    /// Drop the world geometry; bodies then move without world collision
    pub fn unload_geometry(&mut self) {
        self.physics.collision_mut().set_geometry(None);
    }

    /// Spawn a standing player centered at `position`
    pub fn spawn_player(&mut self, position: Vec3) -> Entity {
        let mut collidable = Collidable::player();
        collidable.update_bounds_from_position(position);
        let entity = self.bodies.spawn((
            Position(position),
            Velocity::default(),
            collidable,
            Player::default(),
        ));
        log::debug!("Spawned player {:?} at {:?}", entity, position);
        entity
    }

    /// Spawn a dynamic box that falls and collides but takes no input
    pub fn spawn_prop(&mut self, position: Vec3, size: Vec3) -> Entity {
        let mut collidable = Collidable::new(size);
        collidable.update_bounds_from_position(position);
        self.bodies.spawn((Position(position), Velocity::default(), collidable))
    }

    /// Spawn a box that never moves but blocks other bodies
    pub fn spawn_static(&mut self, position: Vec3, size: Vec3) -> Entity {
        let mut collidable = Collidable::new(size).with_static(true);
        collidable.update_bounds_from_position(position);
        self.bodies.spawn((Position(position), Velocity::default(), collidable))
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.bodies.despawn(entity).is_ok()
    }

    /// Set the intents a player acts on during the next step
    pub fn set_input(&mut self, entity: Entity, input: PlayerInput) -> PhysicsResult<()> {
        let mut player = self
            .bodies
            .get::<&mut Player>(entity)
            .map_err(|_| PhysicsError::NotAPlayer(entity))?;
        player.input = input;
        Ok(())
    }

    pub fn snapshot(&self, entity: Entity) -> Option<BodySnapshot> {
        let entity_ref = self.bodies.entity(entity).ok()?;
        let position = entity_ref.get::<&Position>()?.0;
        let velocity = entity_ref.get::<&Velocity>().map_or(Vec3::ZERO, |velocity| velocity.0);
        let bounds = entity_ref.get::<&Collidable>().map(|collidable| collidable.bounds);
        let player = entity_ref.get::<&Player>();

        Some(BodySnapshot {
            position,
            velocity,
            bounds,
            state: player.as_ref().map(|player| player.state),
            no_clip: player.as_ref().is_some_and(|player| player.no_clip),
        })
    }

    /// Run one step of `dt` seconds
    pub fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        self.frame += 1;
        let events = self.physics.step(&mut self.bodies, dt);
        if !events.is_empty() {
            log::debug!("Frame {}: {} contact events", self.frame, events.len());
        }
        events
    }

    /// Feed a variable frame time and run the fixed steps it covers
    pub fn advance(&mut self, frame_time: DeltaTime) -> Vec<ContactEvent> {
        let steps = self.accumulator.push(frame_time);
        let dt = self.accumulator.step().as_secs_f32();

        let mut events = Vec::new();
        for _ in 0..steps {
            events.extend(self.step(dt));
        }
        events
    }

    /// Blend factor between the last two fixed steps, for rendering
    pub fn interpolation(&self) -> f64 {
        self.accumulator.interpolation()
    }

    /// Parse and run a console line against a player
    pub fn execute_console(&mut self, entity: Entity, line: &str) -> PhysicsResult<String> {
        let command = ConsoleCommand::parse(line)?;
        let mut player = self
            .bodies
            .get::<&mut Player>(entity)
            .map_err(|_| PhysicsError::NotAPlayer(entity))?;
        Ok(command.apply(&mut player))
    }

    /// Closest world face or body along a ray
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: Option<Entity>,
    ) -> Option<CastHit> {
        self.physics
            .collision()
            .cast_ray(&self.bodies, origin, direction, max_distance, ignore)
    }
}
