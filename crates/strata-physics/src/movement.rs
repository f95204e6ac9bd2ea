//! Movement resolution
//!
//! Moves an axis-aligned body through the static world. A blocked move is
//! resolved in priority order:
//!
//! 1. the free target, committed as-is
//! 2. slope projection when the horizontal move runs into a slope
//! 3. step-up onto ledges no taller than the step height
//! 4. per-axis sliding (X, Z, then Y), each advanced to contact, with the XZ
//!    diagonal as a last resort
//!
//! Also home to the unstuck search, ground snap and ground probe, which run
//! after resolution each step.

use std::f32::consts::FRAC_1_SQRT_2;

use glam::Vec3;
use strata_core::math::{Aabb, Ray, horizontal};

use crate::collision::CollisionQuery;
use crate::tuning::PhysicsTuning;

/// Squared horizontal displacement below which there is no horizontal intent.
const MIN_MOVE_SQ: f32 = 1.0e-12;

/// Upper bound on the sub-steps a single long displacement is split into.
const MAX_SUBSTEPS: u32 = 8;

/// Ground-snap rays start this fraction of the half extents in from the corners.
const SNAP_CORNER_INSET: f32 = 0.98;

/// Unstuck search directions, nearest escape wins; earlier entries win ties.
const UNSTUCK_DIRECTIONS: [Vec3; 10] = [
    Vec3::Y,
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Z,
    Vec3::NEG_Z,
    Vec3::NEG_Y,
    Vec3::new(FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2),
    Vec3::new(FRAC_1_SQRT_2, 0.0, -FRAC_1_SQRT_2),
    Vec3::new(-FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2),
    Vec3::new(-FRAC_1_SQRT_2, 0.0, -FRAC_1_SQRT_2),
];

/// Which stage of the resolver produced the final displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolvePath {
    /// Nothing in the way
    Free,
    /// Some or all of the move was lost to sliding
    Slide,
    /// Walked along a slope
    Slope,
    /// Climbed a ledge
    StepUp,
}

/// Outcome of [`BodyMover::resolve`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Displacement actually applied
    pub applied: Vec3,
    pub path: ResolvePath,
}

/// Movement queries for one body shape against the world
pub struct BodyMover<'a, C: CollisionQuery> {
    collision: &'a C,
    tuning: &'a PhysicsTuning,
    size: Vec3,
}

impl<'a, C: CollisionQuery> BodyMover<'a, C> {
    pub fn new(collision: &'a C, tuning: &'a PhysicsTuning, size: Vec3) -> Self {
        Self {
            collision,
            tuning,
            size,
        }
    }

    fn half_extents(&self) -> Vec3 {
        self.size * 0.5
    }

    pub fn aabb_at(&self, position: Vec3) -> Aabb {
        Aabb::from_center_size(position, self.size)
    }

    /// Whether the body fits at `position`
    pub fn is_free(&self, position: Vec3) -> bool {
        !self.collision.overlaps_world(&self.aabb_at(position))
    }

    /// Deepest penetration at `position`, zero when free
    pub fn penetration_at(&self, position: Vec3) -> f32 {
        self.collision
            .deepest_contact(&self.aabb_at(position))
            .map_or(0.0, |contact| contact.penetration_depth)
    }

    /// Resolve `displacement` from `start` against the world.
    pub fn resolve(&self, start: Vec3, displacement: Vec3) -> Resolution {
        let target = start + displacement;
        let substeps = self.substeps_for(displacement);

        if substeps <= 1 {
            if self.is_free(target) {
                return Resolution {
                    applied: displacement,
                    path: ResolvePath::Free,
                };
            }
            return self.resolve_blocked(start, displacement);
        }

        // Long moves also check the swept box so thin geometry can't be skipped.
        let swept = self.aabb_at(start).merge(&self.aabb_at(target));
        if !self.collision.overlaps_world(&swept) {
            return Resolution {
                applied: displacement,
                path: ResolvePath::Free,
            };
        }

        let step = displacement / substeps as f32;
        let mut position = start;
        let mut path = ResolvePath::Free;
        for _ in 0..substeps {
            let resolution = if self.is_free(position + step) {
                Resolution {
                    applied: step,
                    path: ResolvePath::Free,
                }
            } else {
                self.resolve_blocked(position, step)
            };
            position += resolution.applied;
            path = path.max(resolution.path);
        }

        log::trace!("Resolved long move in {} sub-steps via {:?}", substeps, path);
        Resolution {
            applied: position - start,
            path,
        }
    }

    fn substeps_for(&self, displacement: Vec3) -> u32 {
        let half = self.half_extents().max(Vec3::splat(f32::EPSILON));
        let ratio = (displacement.abs() / half).max_element();
        if ratio <= 1.0 {
            1
        } else {
            (ratio.ceil() as u32).min(MAX_SUBSTEPS)
        }
    }

    fn resolve_blocked(&self, start: Vec3, displacement: Vec3) -> Resolution {
        let horizontal_move = horizontal(displacement);
        let has_horizontal = horizontal_move.length_squared() > MIN_MOVE_SQ;
        let horizontal_blocked = has_horizontal && !self.is_free(start + horizontal_move);

        if horizontal_blocked {
            let contact = self
                .collision
                .deepest_contact(&self.aabb_at(start + displacement));
            if let Some(contact) = contact.filter(|c| self.is_slope_like(c.normal)) {
                if let Some(applied) = self.slope_move(start, displacement, contact.normal) {
                    log::trace!("Slope move along {:?}", contact.normal);
                    return Resolution {
                        applied,
                        path: ResolvePath::Slope,
                    };
                }
            }

            if displacement.y >= self.tuning.step_max_fall_intent {
                if let Some(applied) = self.step_up(start, horizontal_move) {
                    log::debug!("Stepped up {:.3}", applied.y);
                    return Resolution {
                        applied,
                        path: ResolvePath::StepUp,
                    };
                }
            }
        }

        Resolution {
            applied: self.slide_axes(start, displacement),
            path: ResolvePath::Slide,
        }
    }

    /// Neither a wall nor a flat floor. Steep faces count too; whether the
    /// body can stand on one is decided by the ground probe.
    pub fn is_slope_like(&self, normal: Vec3) -> bool {
        normal.y > self.tuning.slope_min_normal_y && normal.y < self.tuning.slope_max_normal_y
    }

    /// Keep the full horizontal move and rise or fall with the slope.
    ///
    /// Any upward part of the original move (a jump) is added on top; a
    /// downward part is dropped since the surface now carries the body.
    fn slope_move(&self, start: Vec3, displacement: Vec3, normal: Vec3) -> Option<Vec3> {
        let horizontal_move = horizontal(displacement);
        let rise = -(normal.x * horizontal_move.x + normal.z * horizontal_move.z) / normal.y;
        let along = Vec3::new(
            horizontal_move.x,
            rise + displacement.y.max(0.0),
            horizontal_move.z,
        );
        if self.is_free(start + along) {
            return Some(along);
        }

        let projected = displacement - normal * displacement.dot(normal);
        if projected.length_squared() > MIN_MOVE_SQ && self.is_free(start + projected) {
            return Some(projected);
        }
        None
    }

    /// Lift by the step height, move, then settle on the lowest clear lift
    /// that still has footing. Never ends below `start`.
    fn step_up(&self, start: Vec3, horizontal_move: Vec3) -> Option<Vec3> {
        let step_height = self.tuning.step_height;
        if !self.is_free(start + Vec3::Y * step_height) {
            return None;
        }
        if !self.is_free(start + horizontal_move + Vec3::Y * step_height) {
            return None;
        }

        let increment = self.tuning.step_scan_increment;
        let mut lift = step_height;
        for k in 1.. {
            let lower = step_height - k as f32 * increment;
            if lower < self.tuning.ground_snap_epsilon {
                break;
            }
            if !self.is_free(start + horizontal_move + Vec3::Y * lower) {
                break;
            }
            lift = lower;
        }

        let landing = start + horizontal_move + Vec3::Y * lift;
        if !self.has_ground_within(landing, increment + self.tuning.ground_probe_offset) {
            return None;
        }
        Some(horizontal_move + Vec3::Y * lift)
    }

    /// Move one axis at a time, advancing blocked axes to contact.
    fn slide_axes(&self, start: Vec3, displacement: Vec3) -> Vec3 {
        let mut position = start;
        let mut any_full = false;

        for axis in [Vec3::X, Vec3::Z, Vec3::Y] {
            let amount = displacement.dot(axis);
            if amount == 0.0 {
                continue;
            }
            let step = axis * amount;
            if self.is_free(position + step) {
                position += step;
                any_full = true;
            } else {
                position += axis * self.approach(position, axis, amount);
            }
        }

        if !any_full {
            let diagonal = horizontal(displacement);
            if diagonal.length_squared() > MIN_MOVE_SQ && self.is_free(start + diagonal) {
                log::trace!("Axis slides blocked; taking the XZ diagonal");
                return diagonal;
            }
        }

        position - start
    }

    /// Largest part of `amount` along `axis` the body can move, by bisection.
    fn approach(&self, position: Vec3, axis: Vec3, amount: f32) -> f32 {
        let mut lo = 0.0f32;
        let mut hi = 1.0f32;
        for _ in 0..self.tuning.approach_iterations {
            let mid = (lo + hi) * 0.5;
            if self.is_free(position + axis * (amount * mid)) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        amount * lo
    }

    /// Offset that moves a penetrating body towards the nearest free spot.
    ///
    /// Returns `None` when the body is not stuck or no free spot lies within
    /// the search radius. The offset never exceeds `unstuck_speed * dt`.
    pub fn unstuck(&self, position: Vec3, dt: f32) -> Option<Vec3> {
        let depth = self.penetration_at(position);
        if depth <= self.tuning.penetration_slop {
            return None;
        }

        let steps = (self.tuning.unstuck_max_distance / self.tuning.unstuck_step).round() as u32;
        let max_nudge = self.tuning.unstuck_speed * dt;
        for k in 1..=steps {
            let distance = k as f32 * self.tuning.unstuck_step;
            for direction in UNSTUCK_DIRECTIONS {
                if self.is_free(position + direction * distance) {
                    log::debug!(
                        "Unstuck: depth {:.3}, free {:.2} away along {:?}",
                        depth,
                        distance,
                        direction
                    );
                    return Some(direction * distance.min(max_nudge));
                }
            }
        }

        log::warn!(
            "No free position within {} of {:?}; retrying next step",
            self.tuning.unstuck_max_distance,
            position
        );
        None
    }

    /// New center height resting on the surface just below, if one is close.
    ///
    /// Casts down from the center and four inset corners and uses the
    /// highest walkable hit. Skipped while moving up.
    pub fn ground_snap(&self, position: Vec3, vertical_velocity: f32) -> Option<f32> {
        if vertical_velocity > self.tuning.velocity_epsilon {
            return None;
        }

        let half = self.half_extents();
        let inset = half * SNAP_CORNER_INSET;
        let feet = position.y - half.y;
        let max_distance = half.y + self.tuning.ground_snap_distance;

        let origins = [
            position,
            position + Vec3::new(inset.x, 0.0, inset.z),
            position + Vec3::new(inset.x, 0.0, -inset.z),
            position + Vec3::new(-inset.x, 0.0, inset.z),
            position + Vec3::new(-inset.x, 0.0, -inset.z),
        ];
        let highest = origins
            .iter()
            .filter_map(|origin| {
                self.collision
                    .raycast_world(&Ray::new(*origin, Vec3::NEG_Y), max_distance)
            })
            .filter(|hit| hit.normal.y >= self.tuning.slope_threshold)
            .map(|hit| hit.point.y)
            .reduce(f32::max)?;

        let gap = feet - highest;
        if gap.abs() > self.tuning.ground_snap_distance {
            return None;
        }

        let snapped = highest + self.tuning.ground_snap_epsilon + half.y;
        if (snapped - position.y).abs() <= f32::EPSILON {
            return None;
        }
        if !self.is_free(Vec3::new(position.x, snapped, position.z)) {
            return None;
        }
        Some(snapped)
    }

    /// Whether a walkable surface lies just under the feet
    pub fn has_ground(&self, position: Vec3) -> bool {
        self.has_ground_within(position, self.tuning.ground_probe_offset)
    }

    fn has_ground_within(&self, position: Vec3, depth: f32) -> bool {
        let bounds = self.aabb_at(position);
        let feet = bounds.min.y;
        let probe = Aabb::new(
            Vec3::new(bounds.min.x, feet - depth, bounds.min.z),
            Vec3::new(
                bounds.max.x,
                feet + self.tuning.ground_probe_offset * 0.5,
                bounds.max.z,
            ),
        );
        self.collision.has_support(&probe, self.tuning.slope_threshold)
    }
}
