//! Collision System
//!
//! Answers "can this box sit here?" and "what does this ray hit?" against the
//! static [`GeometryStore`] and against other bodies.
//!
//! World queries fail open: without a geometry store every box is free and
//! every ray misses.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use glam::Vec3;
use smallvec::SmallVec;
use strata_core::ecs::Entity;
use strata_core::math::{Aabb, Ray};

use crate::body::Collidable;
use crate::geometry::{Face, GeometryStore};
use crate::query::{self, QueryParams, RayHit};
use crate::store::{BodyShape, BodyStore};
use crate::tuning::PhysicsTuning;

/// Two planes closer than this in direction are treated as one.
const PLANE_MERGE_DOT: f32 = 0.999;

/// A single box-vs-face contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Unit normal pointing from the surface towards the box
    pub normal: Vec3,
    pub penetration_depth: f32,
    /// Box center projected onto the face's plane
    pub contact_point: Vec3,
    pub face_index: usize,
    pub material_id: u32,
}

/// A surface the box touches, used to clip motion in corners and creases
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPlane {
    pub normal: Vec3,
    /// Distance from the box center to the plane along `normal`
    pub distance: f32,
    pub contact_point: Vec3,
    /// The box reaches through the plane rather than resting within the margin
    pub is_contact: bool,
}

/// Pair contact transitions emitted by [`CollisionSystem::resolve_entity_pairs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Enter { a: Entity, b: Entity },
    Exit { a: Entity, b: Entity },
}

/// Closest hit of [`CollisionSystem::cast_ray`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    /// Set when the closest hit is a body rather than world geometry
    pub entity: Option<Entity>,
}

/// World queries the movement pipeline needs
pub trait CollisionQuery {
    /// Whether the box overlaps any collidable face
    fn overlaps_world(&self, aabb: &Aabb) -> bool;

    /// The deepest overlapping face; ties go to the lowest face index
    fn deepest_contact(&self, aabb: &Aabb) -> Option<CollisionEvent>;

    /// Append every overlapping face to `out`
    fn contacts_into(&self, aabb: &Aabb, out: &mut Vec<CollisionEvent>);

    /// Whether the box overlaps a face whose normal points up by at least `min_normal_y`
    fn has_support(&self, probe: &Aabb, min_normal_y: f32) -> bool;

    /// Distinct surfaces within `margin` of the box
    fn collision_planes(&self, aabb: &Aabb, margin: f32) -> SmallVec<[CollisionPlane; 4]>;

    fn raycast_world(&self, ray: &Ray, max_distance: f32) -> Option<RayHit>;
}

/// Body-vs-world and body-vs-body collision
#[derive(Debug, Clone)]
pub struct CollisionSystem {
    geometry: Option<Arc<GeometryStore>>,
    params: QueryParams,
    active_pairs: AHashSet<(Entity, Entity)>,
}

impl CollisionSystem {
    pub fn new(tuning: &PhysicsTuning) -> Self {
        Self {
            geometry: None,
            params: QueryParams::from_tuning(tuning),
            active_pairs: AHashSet::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Arc<GeometryStore>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Swap in the geometry of a newly loaded map
    pub fn set_geometry(&mut self, geometry: Option<Arc<GeometryStore>>) {
        self.geometry = geometry;
    }

    pub fn geometry(&self) -> Option<&Arc<GeometryStore>> {
        self.geometry.as_ref()
    }

    pub fn params(&self) -> QueryParams {
        self.params
    }

    fn overlapping<'a>(&'a self, aabb: &'a Aabb) -> impl Iterator<Item = (usize, &'a Face)> + 'a {
        let store = self.geometry.as_deref();
        let candidates = store.map(|store| store.candidates(aabb)).unwrap_or_default();
        let params = self.params;
        candidates.into_iter().filter_map(move |index| {
            let index = index as usize;
            let face = store?.face(index)?;
            query::aabb_intersects_face(aabb, face, params).then_some((index, face))
        })
    }

    fn event_for(aabb: &Aabb, index: usize, face: &Face) -> CollisionEvent {
        let center = aabb.center();
        let distance = face.plane_distance(center);
        let normal = if distance < 0.0 { -face.normal } else { face.normal };
        CollisionEvent {
            normal,
            penetration_depth: query::penetration_depth(aabb, face),
            contact_point: center - normal * distance.abs(),
            face_index: index,
            material_id: face.material_id,
        }
    }

    /// Whether `collidable` placed at `position` overlaps the world
    pub fn check_collision_with_world(&self, collidable: &Collidable, position: Vec3) -> bool {
        self.overlaps_world(&collidable.aabb_at(position))
    }

    /// The deepest contact for `collidable` placed at `position`
    pub fn detailed_collision_with_world(
        &self,
        collidable: &Collidable,
        position: Vec3,
    ) -> Option<CollisionEvent> {
        self.deepest_contact(&collidable.aabb_at(position))
    }

    /// Every contact for `collidable` placed at `position`
    pub fn all_collisions(&self, collidable: &Collidable, position: Vec3) -> Vec<CollisionEvent> {
        let mut out = Vec::new();
        self.collect_collisions_into(collidable, position, &mut out);
        out
    }

    /// [`Self::all_collisions`] into a caller-owned buffer, which is cleared first
    pub fn collect_collisions_into(
        &self,
        collidable: &Collidable,
        position: Vec3,
        out: &mut Vec<CollisionEvent>,
    ) {
        out.clear();
        self.contacts_into(&collidable.aabb_at(position), out);
    }

    /// Distinct planes within `margin` of the box.
    pub fn gather_collision_planes(
        &self,
        aabb: &Aabb,
        margin: f32,
    ) -> SmallVec<[CollisionPlane; 4]> {
        let mut planes: SmallVec<[CollisionPlane; 4]> = SmallVec::new();
        let search = aabb.inflated(Vec3::splat(margin.max(0.0)));

        for (index, face) in self.overlapping(&search) {
            let event = Self::event_for(&search, index, face);
            if planes.iter().any(|plane| plane.normal.dot(event.normal) > PLANE_MERGE_DOT) {
                continue;
            }
            planes.push(CollisionPlane {
                normal: event.normal,
                distance: face.plane_distance(aabb.center()).abs(),
                contact_point: event.contact_point,
                is_contact: query::aabb_intersects_face(aabb, face, self.params),
            });
        }
        planes
    }

    /// Separate overlapping bodies and refresh every collidable's contact list.
    ///
    /// Overlaps no deeper than the contact tolerance are ignored. Triggers
    /// never take part. Static bodies never move; two dynamic bodies
    /// split the correction. Returns the pairs that started or stopped
    /// touching since the previous call.
    pub fn resolve_entity_pairs<B: BodyStore>(&mut self, bodies: &mut B) -> Vec<ContactEvent> {
        let mut shapes = bodies.body_shapes();
        let mut offsets: AHashMap<Entity, Vec3> = AHashMap::new();
        let mut touching: AHashMap<Entity, Vec<Entity>> = AHashMap::new();
        let mut current_pairs: Vec<(Entity, Entity)> = Vec::new();

        for i in 0..shapes.len() {
            for j in (i + 1)..shapes.len() {
                let (a, b) = (shapes[i], shapes[j]);
                if a.is_trigger || b.is_trigger || (a.is_static && b.is_static) || !a.accepts(&b) {
                    continue;
                }
                // Boxes left exactly touching by an earlier separation do not count.
                if a.bounds.overlap(&b.bounds).min_element() <= self.params.contact_tolerance {
                    continue;
                }

                touching.entry(a.entity).or_default().push(b.entity);
                touching.entry(b.entity).or_default().push(a.entity);
                current_pairs.push((a.entity, b.entity));

                let (push_a, push_b) = separation(&a, &b);
                if push_a != Vec3::ZERO {
                    shapes[i].bounds = shapes[i].bounds.translated(push_a);
                    *offsets.entry(a.entity).or_default() += push_a;
                }
                if push_b != Vec3::ZERO {
                    shapes[j].bounds = shapes[j].bounds.translated(push_b);
                    *offsets.entry(b.entity).or_default() += push_b;
                }
            }
        }

        for shape in &shapes {
            let Some(body) = bodies.body_mut(shape.entity) else {
                continue;
            };
            if let Some(offset) = offsets.get(&shape.entity) {
                body.position.0 += *offset;
            }
            if let Some(collidable) = body.collidable {
                collidable.update_bounds_from_position(body.position.0);
                collidable.collisions = touching.remove(&shape.entity).unwrap_or_default();
            }
        }

        let current: AHashSet<(Entity, Entity)> = current_pairs.iter().copied().collect();
        let mut events = Vec::new();
        for &(a, b) in &current_pairs {
            if !self.active_pairs.contains(&(a, b)) {
                log::debug!("Contact enter {:?} <-> {:?}", a, b);
                events.push(ContactEvent::Enter { a, b });
            }
        }

        let mut ended: Vec<(Entity, Entity)> = self
            .active_pairs
            .iter()
            .filter(|pair| !current.contains(*pair))
            .copied()
            .collect();
        ended.sort_by_key(|(a, b)| (a.id(), b.id()));
        for (a, b) in ended {
            log::debug!("Contact exit {:?} <-> {:?}", a, b);
            events.push(ContactEvent::Exit { a, b });
        }

        self.active_pairs = current;
        events
    }

    /// Closest hit along a ray against world faces and body bounds.
    ///
    /// `ignore` skips one body, usually the caster. Triggers are not hit.
    pub fn cast_ray<B: BodyStore>(
        &self,
        bodies: &B,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: Option<Entity>,
    ) -> Option<CastHit> {
        let ray = Ray::new(origin, direction);
        if ray.is_degenerate() {
            return None;
        }

        let world_hit = self
            .geometry
            .as_deref()
            .and_then(|store| query::raycast_blocking(store, &ray, max_distance));
        let mut best = world_hit.map(|hit| CastHit {
            distance: hit.distance,
            point: hit.point,
            normal: hit.normal,
            entity: None,
        });

        for shape in bodies.body_shapes() {
            if shape.is_trigger || Some(shape.entity) == ignore {
                continue;
            }
            let limit = best.map_or(max_distance, |hit| hit.distance);
            let Some((t, _)) = ray.intersect_aabb(&shape.bounds) else {
                continue;
            };
            if t < limit {
                let point = ray.at(t);
                best = Some(CastHit {
                    distance: t,
                    point,
                    normal: box_face_normal(&shape.bounds, point),
                    entity: Some(shape.entity),
                });
            }
        }

        best
    }
}

impl CollisionQuery for CollisionSystem {
    fn overlaps_world(&self, aabb: &Aabb) -> bool {
        let hit = self.overlapping(aabb).next();
        if let Some((index, _)) = hit {
            log::trace!("Box {:?} overlaps face {}", aabb, index);
        }
        hit.is_some()
    }

    fn deepest_contact(&self, aabb: &Aabb) -> Option<CollisionEvent> {
        let mut best: Option<CollisionEvent> = None;
        for (index, face) in self.overlapping(aabb) {
            let event = Self::event_for(aabb, index, face);
            // Candidates arrive in ascending index order, so a strict
            // comparison keeps the lowest index on ties.
            if best.is_none_or(|b| event.penetration_depth > b.penetration_depth) {
                best = Some(event);
            }
        }
        best
    }

    fn contacts_into(&self, aabb: &Aabb, out: &mut Vec<CollisionEvent>) {
        out.extend(
            self.overlapping(aabb)
                .map(|(index, face)| Self::event_for(aabb, index, face)),
        );
    }

    fn has_support(&self, probe: &Aabb, min_normal_y: f32) -> bool {
        self.overlapping(probe)
            .any(|(_, face)| face.normal.y >= min_normal_y)
    }

    fn collision_planes(&self, aabb: &Aabb, margin: f32) -> SmallVec<[CollisionPlane; 4]> {
        self.gather_collision_planes(aabb, margin)
    }

    fn raycast_world(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        let store = self.geometry.as_deref()?;
        query::raycast(store, ray, max_distance)
    }
}

/// Corrections that push `a` and `b` apart along the axis of least overlap.
fn separation(a: &BodyShape, b: &BodyShape) -> (Vec3, Vec3) {
    let overlap = a.bounds.overlap(&b.bounds);
    let axis = if overlap.x <= overlap.y && overlap.x <= overlap.z {
        Vec3::X
    } else if overlap.y <= overlap.z {
        Vec3::Y
    } else {
        Vec3::Z
    };

    let depth = overlap.dot(axis);
    let side = (a.bounds.center() - b.bounds.center()).dot(axis);
    let direction = if side < 0.0 { -axis } else { axis };

    match (a.is_static, b.is_static) {
        (true, _) => (Vec3::ZERO, -direction * depth),
        (_, true) => (direction * depth, Vec3::ZERO),
        _ => (direction * depth * 0.5, -direction * depth * 0.5),
    }
}

/// Outward normal of the box face nearest to `point`
fn box_face_normal(bounds: &Aabb, point: Vec3) -> Vec3 {
    let half = bounds.half_extents().max(Vec3::splat(f32::EPSILON));
    let local = (point - bounds.center()) / half;
    let abs = local.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        Vec3::X * local.x.signum()
    } else if abs.y >= abs.z {
        Vec3::Y * local.y.signum()
    } else {
        Vec3::Z * local.z.signum()
    }
}
