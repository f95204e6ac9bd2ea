//! End-to-end runs of the canned scenarios through a full physics world.

use glam::Vec3;
use strata_core::ecs::{Entity, Velocity};

use crate::body::{CROUCHING_HEIGHT, Collidable, PlayerInput, PlayerState, STANDING_HEIGHT};
use crate::geometry::FaceDef;
use crate::scenario::{RESTING_HEIGHT, Scenario};
use crate::world::{BodySnapshot, PhysicsWorld, WorldConfig};

const DT: f32 = 1.0 / 60.0;

fn run(scenario: Scenario, frames: u32) -> (PhysicsWorld, Entity, Vec<BodySnapshot>) {
    let (mut world, player) = scenario.build(WorldConfig::default()).unwrap();
    let mut history = Vec::with_capacity(frames as usize);
    for _ in 0..frames {
        world.step(DT);
        history.push(world.snapshot(player).unwrap());
    }
    (world, player, history)
}

/// Walk a standing player along +X through `extra` faces on top of the flat floor.
fn walk_through(extra: Vec<FaceDef>, frames: u32) -> Vec<BodySnapshot> {
    let mut faces = Scenario::Drop.faces();
    faces.extend(extra);

    let mut world = PhysicsWorld::new(WorldConfig::default()).unwrap();
    world.build_geometry(&faces).unwrap();
    let player = world.spawn_player(Vec3::new(0.0, RESTING_HEIGHT, 0.0));
    world.set_input(player, Scenario::Stairs.input()).unwrap();

    (0..frames)
        .map(|_| {
            world.step(DT);
            world.snapshot(player).unwrap()
        })
        .collect()
}

fn feet(snapshot: &BodySnapshot) -> f32 {
    snapshot.position.y - STANDING_HEIGHT * 0.5
}

#[test]
fn test_drop_settles_on_floor() {
    let (_, _, history) = run(Scenario::Drop, Scenario::Drop.default_frames());
    let last = history.last().unwrap();

    assert!((last.position.y - 0.9).abs() <= 0.01, "y = {}", last.position.y);
    assert_eq!(last.velocity.y, 0.0);
    assert_eq!(last.state, Some(PlayerState::OnGround));
}

#[test]
fn test_drop_never_penetrates_floor() {
    let slop = WorldConfig::default().tuning.penetration_slop;
    let (_, _, history) = run(Scenario::Drop, Scenario::Drop.default_frames());

    for (frame, snapshot) in history.iter().enumerate() {
        assert!(
            snapshot.position.y >= 0.9 - slop,
            "frame {frame}: y = {}",
            snapshot.position.y
        );
    }
}

#[test]
fn test_landing_happens_in_the_crossing_frame() {
    let (_, _, history) = run(Scenario::Drop, Scenario::Drop.default_frames());

    let landed = history
        .iter()
        .position(|snapshot| feet(snapshot) <= 0.02)
        .expect("body never reached the floor");
    assert_eq!(history[landed].state, Some(PlayerState::OnGround));
    assert!(history[landed].velocity.y <= 0.0);
    assert_eq!(history[landed + 1].velocity.y, 0.0);
    assert!(history[..landed].iter().all(|s| s.state == Some(PlayerState::InAir)));
}

#[test]
fn test_stairs_are_climbed_without_losing_speed() {
    let (_, _, history) = run(Scenario::Stairs, Scenario::Stairs.default_frames());
    let last = history.last().unwrap();

    assert!((feet(last) - 0.6).abs() <= 0.02, "feet = {}", feet(last));
    assert!(last.position.x > 4.0, "x = {}", last.position.x);
    assert!(last.velocity.x > 4.0, "vx = {}", last.velocity.x);
    assert_eq!(last.state, Some(PlayerState::OnGround));

    // Each step-up keeps most of the frame's horizontal travel.
    for pair in history.windows(2) {
        let advance = pair[1].position.x - pair[0].position.x;
        assert!(advance > 5.0 * DT * 0.5, "advance = {advance}");
    }
}

#[test]
fn test_single_step_at_step_height_is_climbed() {
    let step = FaceDef::solid_box(Vec3::new(2.0, 0.0, -5.0), Vec3::new(10.0, 0.6, 5.0));
    let history = walk_through(step, 60);
    let last = history.last().unwrap();

    assert!((feet(last) - 0.6).abs() <= 0.02, "feet = {}", feet(last));
    assert!(last.position.x > 4.0, "x = {}", last.position.x);
    assert!(last.velocity.x > 4.0, "vx = {}", last.velocity.x);
    assert_eq!(last.state, Some(PlayerState::OnGround));
}

#[test]
fn test_steep_ramp_never_leaves_body_hovering() {
    // Rises from x = 1 to the crest at (2.5, 2); normal (-0.8, 0.6, 0).
    let ramp = FaceDef::quad(
        Vec3::new(1.0, 0.0, -3.0),
        Vec3::new(1.0, 0.0, 3.0),
        Vec3::new(2.5, 2.0, 3.0),
        Vec3::new(2.5, 2.0, -3.0),
    );
    let history = walk_through(vec![ramp], 90);

    for window in history.windows(10) {
        let moved = (window[9].position - window[0].position).length();
        assert!(moved > 0.05, "stalled at {:?}", window[9].position);
    }
    let last = history.last().unwrap();
    assert!(last.position.x > 3.0, "x = {}", last.position.x);
}

#[test]
fn test_tall_ledge_blocks() {
    let (_, _, history) = run(Scenario::Ledge, Scenario::Ledge.default_frames());
    let last = history.last().unwrap();

    assert!(last.position.x <= 0.7 + 0.001, "x = {}", last.position.x);
    assert!(last.position.x > 0.6);
    assert!(feet(last) < 0.05);
    assert_eq!(last.state, Some(PlayerState::OnGround));
}

#[test]
fn test_slope_is_walked_onto_plateau() {
    let (_, _, history) = run(Scenario::Slope, Scenario::Slope.default_frames());
    let last = history.last().unwrap();

    assert!(last.position.x > 5.5, "x = {}", last.position.x);
    assert!((feet(last) - 3.01).abs() < 0.05, "feet = {}", feet(last));
    assert!(history.iter().all(|s| s.state != Some(PlayerState::InAir)));
}

#[test]
fn test_stuck_body_is_pushed_out_gradually() {
    let (world, _, history) = run(Scenario::Stuck, Scenario::Stuck.default_frames());
    let max_nudge = world.tuning().unstuck_speed * DT + 1e-4;

    let mut previous = Scenario::Stuck.spawn_position();
    for snapshot in &history {
        let moved = (snapshot.position - previous).length();
        assert!(moved <= max_nudge, "moved {moved}");
        previous = snapshot.position;
    }

    let last = history.last().unwrap();
    assert!(last.position.x <= -0.099, "x = {}", last.position.x);
    assert!((last.position.y - RESTING_HEIGHT).abs() < 0.01);
}

#[test]
fn test_noclip_passes_through_floor() {
    let (mut world, player) = Scenario::Drop.build(WorldConfig::default()).unwrap();
    world.execute_console(player, "noclip on").unwrap();
    world.bodies_mut().get::<&mut Velocity>(player).unwrap().0 = Vec3::new(0.0, -10.0, 0.0);

    for _ in 0..60 {
        world.step(DT);
    }
    let snapshot = world.snapshot(player).unwrap();
    assert!(snapshot.position.y < -4.0, "y = {}", snapshot.position.y);
    assert!(snapshot.no_clip);

    world.execute_console(player, "noclip").unwrap();
    assert!(!world.snapshot(player).unwrap().no_clip);
}

#[test]
fn test_crouched_player_stays_down_under_low_ceiling() {
    let (mut world, player) = Scenario::Drop.build(WorldConfig::default()).unwrap();
    let mut faces = Scenario::Drop.faces();
    faces.extend(FaceDef::solid_box(Vec3::new(-1.0, 1.2, -5.0), Vec3::new(1.0, 2.0, 5.0)));
    world.build_geometry(&faces).unwrap();
    world.despawn(player);

    let player = world.spawn_player(Vec3::new(3.0, RESTING_HEIGHT, 0.0));
    let mut input = PlayerInput::default();
    world.set_input(player, input).unwrap();
    world.step(DT);
    assert_eq!(world.snapshot(player).unwrap().state, Some(PlayerState::OnGround));

    input.wants_crouch = true;
    input.move_direction = Vec3::NEG_X;
    world.set_input(player, input).unwrap();
    for _ in 0..60 {
        world.step(DT);
    }
    let under = world.snapshot(player).unwrap();
    assert_eq!(under.state, Some(PlayerState::Crouching));
    assert!(under.position.x.abs() < 0.7, "x = {}", under.position.x);

    // Releasing crouch under the ceiling keeps the body crouched.
    input.wants_crouch = false;
    input.move_direction = Vec3::ZERO;
    world.set_input(player, input).unwrap();
    world.step(DT);
    assert_eq!(world.snapshot(player).unwrap().state, Some(PlayerState::Crouching));
    assert_eq!(
        world.bodies().get::<&Collidable>(player).unwrap().size.y,
        CROUCHING_HEIGHT
    );

    // Out in the open it stands back up.
    input.wants_crouch = true;
    input.move_direction = Vec3::NEG_X;
    world.set_input(player, input).unwrap();
    for _ in 0..60 {
        world.step(DT);
    }
    input.wants_crouch = false;
    world.set_input(player, input).unwrap();
    world.step(DT);
    assert_eq!(world.snapshot(player).unwrap().state, Some(PlayerState::OnGround));
    assert_eq!(
        world.bodies().get::<&Collidable>(player).unwrap().size.y,
        STANDING_HEIGHT
    );
}

#[test]
fn test_scenario_names_parse() {
    for scenario in Scenario::ALL {
        assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
    }
    assert!("maze".parse::<Scenario>().is_err());
}
