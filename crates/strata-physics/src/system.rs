//! Physics System
//!
//! Runs one simulation step over every body: input intents, gravity,
//! friction, movement resolution, unstuck, ground snap and the ground/air
//! state machine.

use glam::Vec3;
use smallvec::SmallVec;
use strata_core::ecs::{Position, Velocity};
use strata_core::math::{horizontal, lerp};

use crate::body::{Collidable, Player, PlayerState};
use crate::collision::{CollisionQuery, CollisionSystem, ContactEvent};
use crate::movement::{BodyMover, ResolvePath};
use crate::response::{clip_against_planes, contact_response};
use crate::store::{BodyMut, BodyStore};
use crate::tuning::PhysicsTuning;

/// Moves bodies through the world using an injected collision backend
#[derive(Debug, Clone)]
pub struct PhysicsSystem<C: CollisionQuery> {
    collision: C,
    tuning: PhysicsTuning,
}

impl<C: CollisionQuery> PhysicsSystem<C> {
    pub fn new(collision: C, tuning: PhysicsTuning) -> Self {
        Self { collision, tuning }
    }

    pub fn collision(&self) -> &C {
        &self.collision
    }

    pub fn collision_mut(&mut self) -> &mut C {
        &mut self.collision
    }

    pub fn tuning(&self) -> &PhysicsTuning {
        &self.tuning
    }

    /// Advance every body by `dt` seconds.
    ///
    /// Non-positive or non-finite steps are ignored.
    pub fn update<B: BodyStore>(&self, bodies: &mut B, dt: f32) {
        if !(dt > 0.0 && dt.is_finite()) {
            log::warn!("Ignoring physics step with dt = {}", dt);
            return;
        }

        for entity in bodies.body_entities() {
            if let Some(body) = bodies.body_mut(entity) {
                self.update_body(body, dt);
            }
        }
    }

    fn update_body(&self, body: BodyMut<'_>, dt: f32) {
        let BodyMut {
            position,
            velocity,
            collidable,
            mut player,
        } = body;

        // No shape: nothing to collide with and nothing to stand on.
        let Some(collidable) = collidable else {
            position.0 += velocity.0 * dt;
            return;
        };
        if collidable.is_static {
            collidable.update_bounds_from_position(position.0);
            return;
        }

        if let Some(player) = player.as_deref_mut() {
            self.apply_input(player, collidable, position, velocity, dt);

            if player.no_clip {
                self.apply_friction(velocity, false, dt);
                position.0 += velocity.0 * dt;
                collidable.update_bounds_from_position(position.0);
                return;
            }
        }

        let mover = BodyMover::new(&self.collision, &self.tuning, collidable.size);
        let grounded = match player.as_deref() {
            Some(player) => player.is_grounded(),
            None => velocity.y <= self.tuning.velocity_epsilon && mover.has_ground(position.0),
        };

        if grounded {
            velocity.y = 0.0;
        } else {
            velocity.y = (velocity.y + self.tuning.gravity * dt).max(self.tuning.terminal_velocity);
        }
        self.apply_friction(velocity, grounded, dt);
        let impact_speed = velocity.y;

        let resolution = mover.resolve(position.0, velocity.0 * dt);
        position.0 += resolution.applied;

        match resolution.path {
            ResolvePath::Free => {}
            ResolvePath::StepUp => {
                velocity.x = resolution.applied.x / dt;
                velocity.z = resolution.applied.z / dt;
                velocity.y = 0.0;
            }
            ResolvePath::Slope => {
                // The surface carries the rise; only a jump keeps upward speed.
                let upward = velocity.y.max(0.0);
                velocity.0 = resolution.applied / dt;
                velocity.y = velocity.y.min(upward);
            }
            ResolvePath::Slide => {
                velocity.0 = resolution.applied / dt;
                self.respond_to_contacts(&mover, position.0, velocity);
            }
        }

        if let Some(offset) = mover.unstuck(position.0, dt) {
            position.0 += offset;
        }

        if let Some(y) = mover.ground_snap(position.0, velocity.y) {
            position.y = y;
            velocity.y = velocity.y.max(0.0);
        }

        collidable.update_bounds_from_position(position.0);

        if let Some(player) = player {
            self.update_ground_state(player, &mover, position.0, velocity, impact_speed);
        }
    }

    /// Crouch, stand, jump and horizontal wish velocity.
    fn apply_input(
        &self,
        player: &mut Player,
        collidable: &mut Collidable,
        position: &mut Position,
        velocity: &mut Velocity,
        dt: f32,
    ) {
        let input = player.input;
        player.is_running = input.is_running;

        if input.wants_crouch {
            if player.state == PlayerState::OnGround {
                position.0 = collidable.resize_height(player.crouching_height, position.0);
                player.set_state(PlayerState::Crouching);
            }
        } else if collidable.size.y < player.standing_height && player.state != PlayerState::InAir {
            let feet = position.y - collidable.half_height();
            let standing_size =
                Vec3::new(collidable.size.x, player.standing_height, collidable.size.z);
            let standing_center =
                Vec3::new(position.x, feet + player.standing_height * 0.5, position.z);

            let mover = BodyMover::new(&self.collision, &self.tuning, standing_size);
            if mover.is_free(standing_center) {
                position.0 = collidable.resize_height(player.standing_height, position.0);
                if player.state == PlayerState::Crouching {
                    player.set_state(PlayerState::OnGround);
                }
            } else {
                log::trace!("No headroom to stand up");
            }
        }

        if input.wants_jump {
            player.input.wants_jump = false;
            if player.state == PlayerState::OnGround {
                velocity.y = player.jump_force;
                player.is_jumping = true;
                player.set_state(PlayerState::InAir);
            }
        }

        let mut direction = horizontal(input.move_direction);
        if direction.length_squared() > 1.0 {
            direction = direction.normalize();
        }
        if direction.length_squared() > 0.0 {
            let wish = direction * player.move_speed();
            if player.is_grounded() || player.no_clip {
                velocity.x = wish.x;
                velocity.z = wish.z;
            } else {
                let blend = 1.0 - (1.0 - self.tuning.air_control).powf(dt * 60.0);
                velocity.x = lerp(velocity.x, wish.x, blend);
                velocity.z = lerp(velocity.z, wish.z, blend);
            }
        }
    }

    /// Air resistance plus ground or air friction on the horizontal velocity,
    /// normalized to a 60 Hz frame.
    fn apply_friction(&self, velocity: &mut Velocity, grounded: bool, dt: f32) {
        let (friction, stop_speed) = if grounded {
            (self.tuning.ground_friction, self.tuning.ground_stop_speed)
        } else {
            (self.tuning.air_friction, self.tuning.air_stop_speed)
        };
        let decay = PhysicsTuning::decay(self.tuning.air_resistance, dt)
            * PhysicsTuning::decay(friction, dt);

        velocity.x *= decay;
        velocity.z *= decay;
        if horizontal(velocity.0).length() < stop_speed {
            velocity.x = 0.0;
            velocity.z = 0.0;
        }
    }

    fn respond_to_contacts(
        &self,
        mover: &BodyMover<'_, C>,
        position: Vec3,
        velocity: &mut Velocity,
    ) {
        let margin = self.tuning.contact_tolerance * 2.0;
        let planes = self.collision.collision_planes(&mover.aabb_at(position), margin);
        let normals: SmallVec<[Vec3; 4]> = planes.iter().map(|plane| plane.normal).collect();

        velocity.0 = match normals.as_slice() {
            [] => velocity.0,
            [normal] => contact_response(velocity.0, *normal, &self.tuning),
            _ => clip_against_planes(velocity.0, &normals),
        };
    }

    fn update_ground_state(
        &self,
        player: &mut Player,
        mover: &BodyMover<'_, C>,
        position: Vec3,
        velocity: &mut Velocity,
        impact_speed: f32,
    ) {
        let supported = mover.has_ground(position);

        match player.state {
            PlayerState::InAir => {
                if supported && velocity.y <= self.tuning.velocity_epsilon {
                    // Resolution already stopped the body, so damp the speed
                    // it hit the ground with.
                    velocity.y = impact_speed.min(0.0) * self.tuning.bounce_damping;
                    if velocity.y.abs() < self.tuning.landing_velocity_threshold {
                        velocity.y = 0.0;
                    }
                    player.is_jumping = false;
                    player.set_state(PlayerState::OnGround);
                }
            }
            PlayerState::OnGround | PlayerState::Crouching => {
                if !supported {
                    player.set_state(PlayerState::InAir);
                }
            }
        }
    }
}

impl PhysicsSystem<CollisionSystem> {
    /// Move every body, then separate overlapping bodies.
    pub fn step<B: BodyStore>(&mut self, bodies: &mut B, dt: f32) -> Vec<ContactEvent> {
        self.update(bodies, dt);
        self.collision.resolve_entity_pairs(bodies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use strata_core::ecs::{Entity, World};

    use crate::geometry::{FaceDef, GeometryStore};

    const DT: f32 = 1.0 / 60.0;

    fn floor_system() -> PhysicsSystem<CollisionSystem> {
        floor_system_with(PhysicsTuning::default())
    }

    fn floor_system_with(tuning: PhysicsTuning) -> PhysicsSystem<CollisionSystem> {
        let floor = FaceDef::quad(
            Vec3::new(-50.0, 0.0, -50.0),
            Vec3::new(-50.0, 0.0, 50.0),
            Vec3::new(50.0, 0.0, 50.0),
            Vec3::new(50.0, 0.0, -50.0),
        );
        let store = GeometryStore::build(&[floor], tuning.grid_cell_size).unwrap();
        let collision = CollisionSystem::new(&tuning).with_geometry(Arc::new(store));
        PhysicsSystem::new(collision, tuning)
    }

    fn spawn_resting_player(world: &mut World) -> Entity {
        world.spawn((
            Position::new(0.0, 0.91, 0.0),
            Velocity::default(),
            Collidable::player(),
            Player {
                state: PlayerState::OnGround,
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_body_without_collidable_integrates_without_gravity() {
        let system = floor_system();
        let mut world = World::new();
        let entity = world.spawn((Position::new(0.0, -5.0, 0.0), Velocity::new(1.0, 0.0, 0.0)));

        system.update(&mut world, 0.5);
        assert_eq!(world.get::<&Position>(entity).unwrap().0, Vec3::new(0.5, -5.0, 0.0));
    }

    #[test]
    fn test_static_body_never_moves() {
        let system = floor_system();
        let mut world = World::new();
        let entity = world.spawn((
            Position::new(0.0, 3.0, 0.0),
            Velocity::new(0.0, -10.0, 0.0),
            Collidable::new(Vec3::ONE).with_static(true),
        ));

        system.update(&mut world, DT);
        assert_eq!(world.get::<&Position>(entity).unwrap().0, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_gravity_clamped_to_terminal_velocity() {
        let system = floor_system();
        let mut world = World::new();
        let entity = world.spawn((
            Position::new(0.0, 500.0, 0.0),
            Velocity::new(0.0, -49.9, 0.0),
            Collidable::player(),
            Player::default(),
        ));

        system.update(&mut world, DT);
        assert_eq!(world.get::<&Velocity>(entity).unwrap().y, -50.0);
    }

    #[test]
    fn test_landing_damps_impact_speed() {
        let land = |bounce_damping: f32| {
            let system = floor_system_with(PhysicsTuning {
                bounce_damping,
                ..Default::default()
            });
            let mut world = World::new();
            let entity = world.spawn((
                Position::new(0.0, 0.95, 0.0),
                Velocity::new(0.0, -6.0, 0.0),
                Collidable::player(),
                Player::default(),
            ));

            system.update(&mut world, DT);
            assert_eq!(world.get::<&Player>(entity).unwrap().state, PlayerState::OnGround);
            let landed = world.get::<&Velocity>(entity).unwrap().y;

            system.update(&mut world, DT);
            assert_eq!(world.get::<&Velocity>(entity).unwrap().y, 0.0);
            landed
        };

        // -6 plus one step of gravity.
        assert!((land(0.5) - -3.25).abs() < 1e-4);
        assert_eq!(land(0.0), 0.0);
        // Damped below the landing threshold.
        assert_eq!(land(0.1), 0.0);
    }

    #[test]
    fn test_friction_is_frame_rate_independent() {
        let run = |dt: f32, steps: usize| {
            let system = floor_system();
            let mut world = World::new();
            let entity = spawn_resting_player(&mut world);
            world.get::<&mut Velocity>(entity).unwrap().x = 3.0;
            for _ in 0..steps {
                system.update(&mut world, dt);
            }
            world.get::<&Velocity>(entity).unwrap().x
        };

        let at_60 = run(1.0 / 60.0, 60);
        let at_30 = run(1.0 / 30.0, 30);
        assert!(at_60 > 0.0);
        assert!((at_60 - at_30).abs() < 1e-3, "{at_60} vs {at_30}");
    }

    #[test]
    fn test_jump_only_from_ground() {
        let system = floor_system();
        let mut world = World::new();
        let entity = spawn_resting_player(&mut world);

        world.get::<&mut Player>(entity).unwrap().input.wants_jump = true;
        system.update(&mut world, DT);
        {
            let player = world.get::<&Player>(entity).unwrap();
            assert_eq!(player.state, PlayerState::InAir);
            assert!(player.is_jumping);
            assert!(!player.input.wants_jump);
        }
        let vy = world.get::<&Velocity>(entity).unwrap().y;
        assert!(vy > 0.0);

        // A second jump in the air is consumed but ignored.
        world.get::<&mut Player>(entity).unwrap().input.wants_jump = true;
        system.update(&mut world, DT);
        assert!(world.get::<&Velocity>(entity).unwrap().y < vy);
        assert!(!world.get::<&Player>(entity).unwrap().input.wants_jump);
    }

    #[test]
    fn test_crouch_and_stand() {
        let system = floor_system();
        let mut world = World::new();
        let entity = spawn_resting_player(&mut world);

        world.get::<&mut Player>(entity).unwrap().input.wants_crouch = true;
        system.update(&mut world, DT);
        assert_eq!(world.get::<&Player>(entity).unwrap().state, PlayerState::Crouching);
        {
            let collidable = world.get::<&Collidable>(entity).unwrap();
            assert_eq!(collidable.size.y, crate::body::CROUCHING_HEIGHT);
            assert!((collidable.bounds.min.y - 0.01).abs() < 0.02);
        }

        world.get::<&mut Player>(entity).unwrap().input.wants_crouch = false;
        system.update(&mut world, DT);
        assert_eq!(world.get::<&Player>(entity).unwrap().state, PlayerState::OnGround);
        assert_eq!(world.get::<&Collidable>(entity).unwrap().size.y, crate::body::STANDING_HEIGHT);
    }

    #[test]
    fn test_walking_off_a_ledge_leaves_the_ground() {
        let tuning = PhysicsTuning::default();
        // A platform ending at x = 1, two units above the floor far below.
        let platform = FaceDef::quad(
            Vec3::new(-10.0, 2.0, -10.0),
            Vec3::new(-10.0, 2.0, 10.0),
            Vec3::new(1.0, 2.0, 10.0),
            Vec3::new(1.0, 2.0, -10.0),
        );
        let store = GeometryStore::build(&[platform], tuning.grid_cell_size).unwrap();
        let collision = CollisionSystem::new(&tuning).with_geometry(Arc::new(store));
        let system = PhysicsSystem::new(collision, tuning);

        let mut world = World::new();
        let entity = world.spawn((
            Position::new(0.0, 2.91, 0.0),
            Velocity::default(),
            Collidable::player(),
            Player {
                state: PlayerState::OnGround,
                ..Default::default()
            },
        ));
        world.get::<&mut Player>(entity).unwrap().input.move_direction = Vec3::X;

        for _ in 0..30 {
            system.update(&mut world, DT);
        }
        assert_eq!(world.get::<&Player>(entity).unwrap().state, PlayerState::InAir);
        assert!(world.get::<&Position>(entity).unwrap().y < 2.91);
    }
}
