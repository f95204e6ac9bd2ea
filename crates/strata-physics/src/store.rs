//! Body access
//!
//! The physics and collision systems never own entity storage. They reach
//! bodies through [`BodyStore`], which maps an entity handle to mutable
//! views of its Position, Velocity, Collidable and Player records.

use strata_core::ecs::{Entity, Position, Velocity, World};
use strata_core::math::Aabb;

use crate::body::{Collidable, CollisionLayers, Player};

/// Mutable view of one body's records
pub struct BodyMut<'a> {
    pub position: &'a mut Position,
    pub velocity: &'a mut Velocity,
    pub collidable: Option<&'a mut Collidable>,
    pub player: Option<&'a mut Player>,
}

/// Read-only summary of a collidable body's shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyShape {
    pub entity: Entity,
    pub bounds: Aabb,
    pub layer: CollisionLayers,
    pub mask: CollisionLayers,
    pub is_static: bool,
    pub is_trigger: bool,
}

impl BodyShape {
    pub fn accepts(&self, other: &BodyShape) -> bool {
        self.mask.intersects(other.layer) && other.mask.intersects(self.layer)
    }
}

/// Entity-addressed access to body records.
///
/// Entity lists are returned in a stable order so a step over the same
/// world state is repeatable.
pub trait BodyStore {
    /// Every entity with a Position and Velocity
    fn body_entities(&self) -> Vec<Entity>;

    /// Every entity with a Position and Collidable, with its world bounds
    fn body_shapes(&self) -> Vec<BodyShape>;

    fn body_mut(&mut self, entity: Entity) -> Option<BodyMut<'_>>;
}

impl BodyStore for World {
    fn body_entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .query::<(&Position, &Velocity)>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        entities.sort_by_key(|entity| entity.id());
        entities
    }

    fn body_shapes(&self) -> Vec<BodyShape> {
        let mut shapes: Vec<BodyShape> = self
            .query::<(&Position, &Collidable)>()
            .iter()
            .map(|(entity, (position, collidable))| BodyShape {
                entity,
                bounds: collidable.aabb_at(position.0),
                layer: collidable.layer,
                mask: collidable.mask,
                is_static: collidable.is_static,
                is_trigger: collidable.is_trigger,
            })
            .collect();
        shapes.sort_by_key(|shape| shape.entity.id());
        shapes
    }

    fn body_mut(&mut self, entity: Entity) -> Option<BodyMut<'_>> {
        self.query_one_mut::<(
            &mut Position,
            &mut Velocity,
            Option<&mut Collidable>,
            Option<&mut Player>,
        )>(entity)
            .ok()
            .map(|(position, velocity, collidable, player)| BodyMut {
                position,
                velocity,
                collidable,
                player,
            })
    }
}
