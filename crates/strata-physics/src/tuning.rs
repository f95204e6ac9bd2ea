//! Physics tuning
//!
//! Every heuristic constant the movement pipeline uses, gathered into one
//! serializable struct. Values are per-second or per-unit unless noted;
//! friction coefficients are per frame at a 60 Hz baseline.

use serde::{Deserialize, Serialize};

use crate::{PhysicsError, PhysicsResult};

/// Tunable constants for the physics and collision pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    // ========================================================================
    // Forces
    // ========================================================================
    /// Vertical acceleration (units/second², negative is down).
    pub gravity: f32,

    /// Lowest vertical velocity a falling body can reach (negative).
    pub terminal_velocity: f32,

    /// Horizontal decay per 60 Hz frame while grounded.
    pub ground_friction: f32,

    /// Horizontal decay per 60 Hz frame while airborne.
    pub air_friction: f32,

    /// Horizontal decay per 60 Hz frame applied in every state.
    pub air_resistance: f32,

    /// Grounded horizontal speed below which the body stops.
    pub ground_stop_speed: f32,

    /// Airborne horizontal speed below which the body stops.
    pub air_stop_speed: f32,

    /// Share of the horizontal wish velocity applied per 60 Hz frame in the air.
    pub air_control: f32,

    // ========================================================================
    // Tolerances
    // ========================================================================
    /// Overlaps shallower than this are contacts, not collisions.
    pub contact_tolerance: f32,

    /// Speeds below this count as stationary.
    pub velocity_epsilon: f32,

    /// Penetration allowed before the unstuck pass kicks in.
    pub penetration_slop: f32,

    // ========================================================================
    // Slopes and Steps
    // ========================================================================
    /// Tallest ledge the step-up heuristic will climb.
    pub step_height: f32,

    /// Increment used when scanning down from `step_height`.
    pub step_scan_increment: f32,

    /// Minimum `normal.y` of a walkable surface (cos 45°).
    pub slope_threshold: f32,

    /// Contacts with `normal.y` above this are slope candidates.
    pub slope_min_normal_y: f32,

    /// Contacts with `normal.y` at or above this are flat floors.
    pub slope_max_normal_y: f32,

    /// Step-up is skipped while the vertical displacement is below this.
    pub step_max_fall_intent: f32,

    /// `|normal.y|` above which a face is tested as floor or ceiling.
    pub floor_normal_threshold: f32,

    // ========================================================================
    // Ground
    // ========================================================================
    /// Depth of the box probed under the feet.
    pub ground_probe_offset: f32,

    /// Largest gap the ground snap will close.
    pub ground_snap_distance: f32,

    /// Height above the surface a snapped body rests at.
    pub ground_snap_epsilon: f32,

    /// Fraction of the impact speed kept for the landing step. The grounded
    /// state zeroes it from the next step on.
    pub bounce_damping: f32,

    /// Landing speeds below this are zeroed outright.
    pub landing_velocity_threshold: f32,

    // ========================================================================
    // Collision Response
    // ========================================================================
    /// Extra decay on the tangential component while sliding on a wall.
    pub wall_slide_friction: f32,

    /// Bisection steps used to advance a blocked axis to contact.
    pub approach_iterations: u32,

    // ========================================================================
    // Unstuck
    // ========================================================================
    /// Search radius for a free position.
    pub unstuck_max_distance: f32,

    /// Distance between candidate positions along each search direction.
    pub unstuck_step: f32,

    /// Speed at which a stuck body is nudged free.
    pub unstuck_speed: f32,

    // ========================================================================
    // Broad Phase
    // ========================================================================
    /// Edge length of a geometry grid cell.
    pub grid_cell_size: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: -30.0,
            terminal_velocity: -50.0,
            ground_friction: 0.98,
            air_friction: 0.995,
            air_resistance: 0.999,
            ground_stop_speed: 0.02,
            air_stop_speed: 0.001,
            air_control: 0.1,

            contact_tolerance: 0.001,
            velocity_epsilon: 0.01,
            penetration_slop: 0.005,

            step_height: 0.6,
            step_scan_increment: 0.1,
            slope_threshold: 0.7,
            slope_min_normal_y: 0.1,
            slope_max_normal_y: 0.99,
            step_max_fall_intent: -0.1,
            floor_normal_threshold: 0.9,

            ground_probe_offset: 0.05,
            ground_snap_distance: 0.1,
            ground_snap_epsilon: 0.01,
            bounce_damping: 0.3,
            landing_velocity_threshold: 1.0,

            wall_slide_friction: 0.995,
            approach_iterations: 10,

            unstuck_max_distance: 1.0,
            unstuck_step: 0.05,
            unstuck_speed: 2.0,

            grid_cell_size: 4.0,
        }
    }
}

impl PhysicsTuning {
    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> PhysicsResult<()> {
        fn unit(name: &'static str, value: f32) -> PhysicsResult<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(PhysicsError::InvalidTuning {
                    field: name,
                    reason: format!("{value} is outside [0, 1]"),
                })
            }
        }

        fn positive(name: &'static str, value: f32) -> PhysicsResult<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(PhysicsError::InvalidTuning {
                    field: name,
                    reason: format!("{value} must be positive and finite"),
                })
            }
        }

        if self.terminal_velocity > 0.0 {
            return Err(PhysicsError::InvalidTuning {
                field: "terminal_velocity",
                reason: "must not be positive".into(),
            });
        }
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidTuning {
                field: "gravity",
                reason: "must be finite".into(),
            });
        }

        unit("ground_friction", self.ground_friction)?;
        unit("air_friction", self.air_friction)?;
        unit("air_resistance", self.air_resistance)?;
        unit("air_control", self.air_control)?;
        unit("slope_threshold", self.slope_threshold)?;
        unit("bounce_damping", self.bounce_damping)?;
        unit("wall_slide_friction", self.wall_slide_friction)?;
        unit("floor_normal_threshold", self.floor_normal_threshold)?;

        positive("contact_tolerance", self.contact_tolerance)?;
        positive("step_height", self.step_height)?;
        positive("step_scan_increment", self.step_scan_increment)?;
        positive("ground_probe_offset", self.ground_probe_offset)?;
        positive("unstuck_step", self.unstuck_step)?;
        positive("unstuck_speed", self.unstuck_speed)?;
        positive("grid_cell_size", self.grid_cell_size)?;

        if self.slope_min_normal_y >= self.slope_max_normal_y {
            return Err(PhysicsError::InvalidTuning {
                field: "slope_min_normal_y",
                reason: "must be below slope_max_normal_y".into(),
            });
        }
        if self.penetration_slop < self.contact_tolerance {
            return Err(PhysicsError::InvalidTuning {
                field: "penetration_slop",
                reason: "must not be smaller than contact_tolerance".into(),
            });
        }
        if self.unstuck_max_distance < self.unstuck_step {
            return Err(PhysicsError::InvalidTuning {
                field: "unstuck_max_distance",
                reason: "must cover at least one unstuck_step".into(),
            });
        }

        Ok(())
    }

    /// Frame-rate independent decay factor for a per-frame coefficient.
    pub fn decay(coefficient: f32, dt: f32) -> f32 {
        coefficient.powf(dt * 60.0)
    }
}
