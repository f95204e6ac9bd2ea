//! Spatial queries against the geometry store
//!
//! Pure functions of (store, parameters): box-vs-triangle overlap, a plane
//! penetration estimate, and closest-hit ray casts.

use glam::Vec3;
use strata_core::math::{Aabb, Ray};

use crate::geometry::{Face, GeometryStore};
use crate::tuning::PhysicsTuning;

/// Determinant below which a ray is treated as parallel to a triangle.
const RAY_PARALLEL_EPSILON: f32 = 1.0e-8;

/// Padding applied to face bounds before the slab prefilter, so flat
/// bounds are not lost to rounding.
const RAY_BOUNDS_PAD: f32 = 1.0e-4;

/// Thresholds shared by the overlap tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryParams {
    /// Overlaps shallower than this are treated as touching, not colliding
    pub contact_tolerance: f32,
    /// `|normal.y|` above which a face is tested as floor or ceiling
    pub floor_normal_threshold: f32,
}

impl QueryParams {
    pub fn from_tuning(tuning: &PhysicsTuning) -> Self {
        Self {
            contact_tolerance: tuning.contact_tolerance,
            floor_normal_threshold: tuning.floor_normal_threshold,
        }
    }
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::from_tuning(&PhysicsTuning::default())
    }
}

/// Closest ray hit against the static world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    /// The face normal, flipped to face back along the ray
    pub normal: Vec3,
    pub face_index: usize,
}

/// Half extents projected onto `normal`.
#[inline]
pub fn projected_extent(half_extents: Vec3, normal: Vec3) -> f32 {
    half_extents.x * normal.x.abs()
        + half_extents.y * normal.y.abs()
        + half_extents.z * normal.z.abs()
}

/// How far the box reaches through the face's plane, never negative.
///
/// This only looks at the plane; a box beside a small triangle still reports
/// the depth it would have against the infinite plane.
pub fn penetration_depth(aabb: &Aabb, face: &Face) -> f32 {
    let extent = projected_extent(aabb.half_extents(), face.normal);
    let distance = face.plane_distance(aabb.center());
    (extent - distance.abs()).max(0.0)
}

/// Conservative box-vs-triangle test.
///
/// Floor- and ceiling-like faces compare the XZ projections of the box and
/// triangle bounds; every other face compares 3-D bounds. Both paths also
/// require the box to reach through the triangle's plane by more than the
/// contact tolerance. The test may accept boxes near a triangle's edges that
/// miss the triangle itself, but never rejects a genuine overlap.
pub fn aabb_intersects_face(aabb: &Aabb, face: &Face, params: QueryParams) -> bool {
    let extent = projected_extent(aabb.half_extents(), face.normal);
    let distance = face.plane_distance(aabb.center());
    if distance.abs() >= extent - params.contact_tolerance {
        return false;
    }

    if face.normal.y.abs() > params.floor_normal_threshold {
        aabb.intersects_xz(&face.bounds)
    } else {
        // Wall bounds are flat on one axis; pad so a straddling box still
        // counts as overlapping on it.
        aabb.intersects(&face.bounds.inflated(Vec3::splat(params.contact_tolerance)))
    }
}

/// Möller–Trumbore intersection, returning the distance along the ray.
///
/// Faces are two-sided.
pub fn ray_triangle(ray: &Ray, face: &Face) -> Option<f32> {
    let [a, b, c] = face.vertices;
    let edge1 = b - a;
    let edge2 = c - a;

    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < RAY_PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(q) * inv_det;
    (t >= 0.0).then_some(t)
}

/// Closest collidable face hit within `max_distance`.
pub fn raycast(store: &GeometryStore, ray: &Ray, max_distance: f32) -> Option<RayHit> {
    closest_hit(store, store.collidable_indices(), ray, max_distance)
}

/// Like [`raycast`], but ray-only faces such as glass and clip brushes stop
/// the ray as well.
pub fn raycast_blocking(store: &GeometryStore, ray: &Ray, max_distance: f32) -> Option<RayHit> {
    closest_hit(store, store.ray_blocking_indices(), ray, max_distance)
}

fn closest_hit(
    store: &GeometryStore,
    indices: &[u32],
    ray: &Ray,
    max_distance: f32,
) -> Option<RayHit> {
    if ray.is_degenerate() || max_distance <= 0.0 {
        return None;
    }

    let mut best: Option<RayHit> = None;
    for &index in indices {
        let index = index as usize;
        let Some(face) = store.face(index) else {
            continue;
        };

        let limit = best.map_or(max_distance, |hit| hit.distance);
        match ray.intersect_aabb(&face.bounds.inflated(Vec3::splat(RAY_BOUNDS_PAD))) {
            Some((t_enter, _)) if t_enter <= limit => {}
            _ => continue,
        }

        if let Some(t) = ray_triangle(ray, face) {
            if t <= limit && best.is_none_or(|hit| t < hit.distance) {
                let normal = if face.normal.dot(ray.direction) > 0.0 {
                    -face.normal
                } else {
                    face.normal
                };
                best = Some(RayHit {
                    distance: t,
                    point: ray.at(t),
                    normal,
                    face_index: index,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FaceDef, FaceFlags};

    fn floor_face() -> Face {
        Face::new(
            [
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(-5.0, 0.0, 5.0),
                Vec3::new(5.0, 0.0, 5.0),
            ],
            0,
            FaceFlags::COLLIDABLE,
        )
        .unwrap()
    }

    fn wall_face() -> Face {
        // Plane x = 2, normal +X.
        Face::new(
            [
                Vec3::new(2.0, 0.0, -5.0),
                Vec3::new(2.0, 3.0, -5.0),
                Vec3::new(2.0, 0.0, 5.0),
            ],
            0,
            FaceFlags::COLLIDABLE,
        )
        .unwrap()
    }

    fn body_box(center: Vec3) -> Aabb {
        Aabb::from_center_size(center, Vec3::new(0.6, 1.8, 0.6))
    }

    #[test]
    fn test_box_through_floor_intersects() {
        let face = floor_face();
        let params = QueryParams::default();
        assert!(aabb_intersects_face(&body_box(Vec3::new(-3.0, 0.5, -3.5)), &face, params));
        assert!(!aabb_intersects_face(&body_box(Vec3::new(-3.0, 1.5, -3.5)), &face, params));
    }

    #[test]
    fn test_resting_contact_is_not_a_collision() {
        let face = floor_face();
        let params = QueryParams::default();
        // Feet exactly on the floor and half a tolerance below it.
        assert!(!aabb_intersects_face(&body_box(Vec3::new(-3.0, 0.9, -3.5)), &face, params));
        assert!(!aabb_intersects_face(&body_box(Vec3::new(-3.0, 0.8995, -3.5)), &face, params));
        assert!(aabb_intersects_face(&body_box(Vec3::new(-3.0, 0.89, -3.5)), &face, params));
    }

    #[test]
    fn test_wall_uses_three_dimensional_bounds() {
        let face = wall_face();
        let params = QueryParams::default();
        assert!(aabb_intersects_face(&body_box(Vec3::new(1.9, 0.9, 0.0)), &face, params));
        // Straddles the plane but sits above the wall's top edge.
        assert!(!aabb_intersects_face(&body_box(Vec3::new(1.9, 4.0, 0.0)), &face, params));
        assert!(!aabb_intersects_face(&body_box(Vec3::new(1.6, 0.9, 0.0)), &face, params));
    }

    #[test]
    fn test_penetration_depth() {
        let face = floor_face();
        let depth = penetration_depth(&body_box(Vec3::new(0.0, 0.7, 0.0)), &face);
        assert!((depth - 0.2).abs() < 1e-5);
        assert_eq!(penetration_depth(&body_box(Vec3::new(0.0, 3.0, 0.0)), &face), 0.0);
    }

    #[test]
    fn test_ray_triangle_hit_and_miss() {
        let face = floor_face();
        let down = Ray::new(Vec3::new(-3.0, 2.0, 1.0), -Vec3::Y);
        let t = ray_triangle(&down, &face).unwrap();
        assert!((t - 2.0).abs() < 1e-5);

        let parallel = Ray::new(Vec3::new(-3.0, 2.0, 1.0), Vec3::X);
        assert!(ray_triangle(&parallel, &face).is_none());

        let away = Ray::new(Vec3::new(-3.0, 2.0, 1.0), Vec3::Y);
        assert!(ray_triangle(&away, &face).is_none());
    }

    #[test]
    fn test_raycast_returns_closest_hit() {
        let defs = vec![
            FaceDef::quad(
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(-5.0, 0.0, 5.0),
                Vec3::new(5.0, 0.0, 5.0),
                Vec3::new(5.0, 0.0, -5.0),
            ),
            FaceDef::quad(
                Vec3::new(-5.0, 1.0, -5.0),
                Vec3::new(-5.0, 1.0, 5.0),
                Vec3::new(5.0, 1.0, 5.0),
                Vec3::new(5.0, 1.0, -5.0),
            ),
        ];
        let store = GeometryStore::build(&defs, 4.0).unwrap();

        let ray = Ray::new(Vec3::new(0.5, 3.0, 0.25), -Vec3::Y);
        let hit = raycast(&store, &ray, 10.0).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-5);
        assert!(hit.face_index >= 2);
        assert!((hit.normal - Vec3::Y).length() < 1e-6);

        assert!(raycast(&store, &ray, 1.5).is_none());
    }

    #[test]
    fn test_raycast_normal_faces_the_ray() {
        let store = GeometryStore::build(
            &[FaceDef::triangle(
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(0.0, 0.0, 1.0),
            )],
            4.0,
        )
        .unwrap();
        // Winding gives a downward normal; a downward ray still sees it as a floor.
        assert!(store.faces()[0].normal.y < 0.0);
        let hit = raycast(&store, &Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y), 5.0).unwrap();
        assert!(hit.normal.y > 0.99);
    }

    #[test]
    fn test_ray_only_face_stops_blocking_rays() {
        let mut def = FaceDef::quad(
            Vec3::new(-2.0, 0.0, -2.0),
            Vec3::new(-2.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, -2.0),
        );
        def.flags = FaceFlags::RAY_ONLY;
        let store = GeometryStore::build(&[def], 4.0).unwrap();
        let ray = Ray::new(Vec3::new(0.0, 3.0, 0.0), -Vec3::Y);

        assert!(raycast(&store, &ray, 10.0).is_none());
        let hit = raycast_blocking(&store, &ray, 10.0).unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_ray_hits_nothing() {
        let store = GeometryStore::build(
            &[FaceDef::triangle(Vec3::ZERO, Vec3::Z, Vec3::X)],
            4.0,
        )
        .unwrap();
        let ray = Ray::new(Vec3::new(0.1, 1.0, 0.1), Vec3::ZERO);
        assert!(raycast(&store, &ray, 5.0).is_none());
    }
}
