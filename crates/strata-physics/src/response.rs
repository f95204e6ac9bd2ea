//! Velocity response to contacts
//!
//! Building blocks for removing the part of a velocity that drives into a
//! surface: single-plane sliding, crease sliding between two planes, and the
//! dominant-axis response used after a blocked move.

use glam::Vec3;

use crate::tuning::PhysicsTuning;

/// Velocities entering a plane by less than this are accepted as sliding.
const CLIP_EPSILON: f32 = 0.01;

/// Two normals whose cross product is shorter than this share a crease direction.
const INDEPENDENT_PLANE_EPSILON: f32 = 0.01;

/// Remove the component of `velocity` that moves into the surface.
///
/// Velocities parallel to or leaving the surface are returned unchanged.
pub fn slide_velocity(velocity: Vec3, normal: Vec3) -> Vec3 {
    let into = velocity.dot(normal);
    if into < 0.0 {
        velocity - normal * into
    } else {
        velocity
    }
}

/// Clip a velocity against every plane the body touches.
///
/// Tries sliding along each plane in turn; the first result that enters no
/// other plane wins. Otherwise two planes leave the crease along their cross
/// product, and a third independent plane stops the body.
pub fn clip_against_planes(velocity: Vec3, normals: &[Vec3]) -> Vec3 {
    match normals {
        [] => velocity,
        [normal] => slide_velocity(velocity, *normal),
        _ => {
            for (i, normal) in normals.iter().enumerate() {
                let clipped = slide_velocity(velocity, *normal);
                let valid = normals
                    .iter()
                    .enumerate()
                    .all(|(j, other)| i == j || clipped.dot(*other) >= -CLIP_EPSILON);
                if valid {
                    return clipped;
                }
            }

            let crease = normals[0].cross(normals[1]);
            if crease.length() < INDEPENDENT_PLANE_EPSILON {
                // Near-parallel pair: one plane is enough.
                return slide_velocity(velocity, normals[0]);
            }
            let crease = crease.normalize();

            let along = crease * velocity.dot(crease);
            let blocked = normals[2..].iter().any(|third| {
                third.dot(crease).abs() > INDEPENDENT_PLANE_EPSILON
                    && along.dot(*third) < -CLIP_EPSILON
            });
            if blocked {
                log::trace!("Velocity {:?} stopped in a corner", velocity);
                Vec3::ZERO
            } else {
                along
            }
        }
    }
}

/// Dominant-axis response for a single contact normal.
///
/// A floor removes downward speed and a ceiling upward speed. A wall removes
/// the speed into it along its axis and lightly damps the perpendicular
/// slide.
pub fn contact_response(velocity: Vec3, normal: Vec3, tuning: &PhysicsTuning) -> Vec3 {
    let abs = normal.abs();
    let mut velocity = velocity;

    if abs.y >= abs.x && abs.y >= abs.z {
        if normal.y > 0.0 && velocity.y < 0.0 {
            velocity.y = 0.0;
        } else if normal.y < 0.0 && velocity.y > 0.0 {
            velocity.y = 0.0;
        }
    } else if abs.x >= abs.z {
        if velocity.x * normal.x < 0.0 {
            velocity.x = 0.0;
            velocity.z *= tuning.wall_slide_friction;
        }
    } else if velocity.z * normal.z < 0.0 {
        velocity.z = 0.0;
        velocity.x *= tuning.wall_slide_friction;
    }

    velocity
}
