//! Geometry Store
//!
//! The static level geometry as a flat triangle list. Faces arrive from the
//! map loader as polygons, are fan-triangulated, get their normals recomputed
//! from winding and are indexed in a uniform grid for box queries.
//!
//! The store is immutable once built. A map reload builds a new store and
//! swaps it in between simulation steps.

use ahash::AHashMap;
use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strata_core::math::Aabb;

use crate::{PhysicsError, PhysicsResult};

/// Twice the triangle area below which a face is treated as degenerate.
const DEGENERATE_AREA: f32 = 1.0e-8;

/// Faces covering more grid cells than this are tested by every query.
const MAX_CELLS_PER_FACE: i64 = 4096;

/// Queries covering more grid cells than this scan the whole store.
const MAX_CELLS_PER_QUERY: i64 = 512;

bitflags! {
    /// Per-face surface flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FaceFlags: u32 {
        /// Bodies collide with this face
        const COLLIDABLE = 1 << 0;
        /// Rendered but never collided with (decals, foliage)
        const DETAIL = 1 << 1;
        /// Blocks bullets and line-of-sight rays but not bodies
        const RAY_ONLY = 1 << 2;
    }
}

impl Default for FaceFlags {
    fn default() -> Self {
        Self::COLLIDABLE
    }
}

/// A polygon as produced by the map loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDef {
    /// Polygon vertices in winding order; three or more
    pub vertices: Vec<Vec3>,
    #[serde(default)]
    pub material_id: u32,
    #[serde(default)]
    pub flags: FaceFlags,
}

impl FaceDef {
    pub fn new(vertices: Vec<Vec3>, material_id: u32, flags: FaceFlags) -> Self {
        Self {
            vertices,
            material_id,
            flags,
        }
    }

    /// A collidable triangle with material 0
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self::new(vec![a, b, c], 0, FaceFlags::COLLIDABLE)
    }

    /// A collidable quad with material 0
    pub fn quad(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> Self {
        Self::new(vec![a, b, c, d], 0, FaceFlags::COLLIDABLE)
    }

    /// An axis-aligned solid box as six outward-facing quads
    pub fn solid_box(min: Vec3, max: Vec3) -> Vec<FaceDef> {
        let (a, b) = (min, max);
        vec![
            // top
            FaceDef::quad(
                Vec3::new(a.x, b.y, a.z),
                Vec3::new(a.x, b.y, b.z),
                Vec3::new(b.x, b.y, b.z),
                Vec3::new(b.x, b.y, a.z),
            ),
            // bottom
            FaceDef::quad(
                Vec3::new(a.x, a.y, a.z),
                Vec3::new(b.x, a.y, a.z),
                Vec3::new(b.x, a.y, b.z),
                Vec3::new(a.x, a.y, b.z),
            ),
            // -X
            FaceDef::quad(
                Vec3::new(a.x, a.y, a.z),
                Vec3::new(a.x, a.y, b.z),
                Vec3::new(a.x, b.y, b.z),
                Vec3::new(a.x, b.y, a.z),
            ),
            // +X
            FaceDef::quad(
                Vec3::new(b.x, a.y, a.z),
                Vec3::new(b.x, b.y, a.z),
                Vec3::new(b.x, b.y, b.z),
                Vec3::new(b.x, a.y, b.z),
            ),
            // -Z
            FaceDef::quad(
                Vec3::new(a.x, a.y, a.z),
                Vec3::new(a.x, b.y, a.z),
                Vec3::new(b.x, b.y, a.z),
                Vec3::new(b.x, a.y, a.z),
            ),
            // +Z
            FaceDef::quad(
                Vec3::new(a.x, a.y, b.z),
                Vec3::new(b.x, a.y, b.z),
                Vec3::new(b.x, b.y, b.z),
                Vec3::new(a.x, b.y, b.z),
            ),
        ]
    }
}

/// A triangle in the store
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub vertices: [Vec3; 3],
    /// Unit normal from the vertex winding
    pub normal: Vec3,
    pub material_id: u32,
    pub flags: FaceFlags,
    pub bounds: Aabb,
}

impl Face {
    /// Build a triangle, or `None` if it has (near) zero area.
    pub fn new(vertices: [Vec3; 3], material_id: u32, flags: FaceFlags) -> Option<Self> {
        let [a, b, c] = vertices;
        let cross = (b - a).cross(c - a);
        if cross.length() < DEGENERATE_AREA || !cross.is_finite() {
            return None;
        }

        Some(Self {
            vertices,
            normal: cross.normalize(),
            material_id,
            flags,
            bounds: Aabb::from_points(&vertices),
        })
    }

    pub fn is_collidable(&self) -> bool {
        self.flags.contains(FaceFlags::COLLIDABLE)
    }

    /// Whether bullet and line-of-sight rays stop at this face
    pub fn blocks_rays(&self) -> bool {
        self.flags.intersects(FaceFlags::COLLIDABLE | FaceFlags::RAY_ONLY)
    }

    /// Signed distance from `point` to the face's plane
    pub fn plane_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point - self.vertices[0])
    }
}

type Cell = (i32, i32, i32);

/// Uniform grid over face bounds.
///
/// Candidate lists are always a superset of the faces whose bounds touch the
/// query box, so filtering through the grid never changes a query's result.
#[derive(Debug, Clone)]
pub struct FaceGrid {
    cell_size: f32,
    cells: AHashMap<Cell, SmallVec<[u32; 8]>>,
    /// Faces too large to index; every query tests them
    oversized: Vec<u32>,
}

impl FaceGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: AHashMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_range(&self, bounds: &Aabb) -> (Cell, Cell, i64) {
        let inv = 1.0 / self.cell_size;
        let lo = (bounds.min * inv).floor();
        let hi = (bounds.max * inv).floor();
        let lo = (lo.x as i32, lo.y as i32, lo.z as i32);
        let hi = (hi.x as i32, hi.y as i32, hi.z as i32);
        let count = (i64::from(hi.0) - i64::from(lo.0) + 1)
            * (i64::from(hi.1) - i64::from(lo.1) + 1)
            * (i64::from(hi.2) - i64::from(lo.2) + 1);
        (lo, hi, count)
    }

    pub fn insert(&mut self, index: u32, bounds: &Aabb) {
        let (lo, hi, count) = self.cell_range(bounds);
        if count > MAX_CELLS_PER_FACE {
            self.oversized.push(index);
            return;
        }

        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    self.cells.entry((x, y, z)).or_default().push(index);
                }
            }
        }
    }

    /// Collect candidate face indices for `bounds` in ascending order.
    ///
    /// Returns `false` without touching `out` when the box covers too many
    /// cells; the caller should scan every face instead.
    pub fn query(&self, bounds: &Aabb, out: &mut SmallVec<[u32; 32]>) -> bool {
        let (lo, hi, count) = self.cell_range(bounds);
        if count > MAX_CELLS_PER_QUERY {
            return false;
        }

        out.extend_from_slice(&self.oversized);
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    if let Some(indices) = self.cells.get(&(x, y, z)) {
                        out.extend_from_slice(indices);
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        true
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

/// Immutable triangle set with a broad-phase index
#[derive(Debug, Clone)]
pub struct GeometryStore {
    faces: Vec<Face>,
    collidable: Vec<u32>,
    ray_blocking: Vec<u32>,
    grid: FaceGrid,
    bounds: Aabb,
}

impl GeometryStore {
    /// Triangulate and index the map's faces.
    ///
    /// Degenerate polygons and triangles are skipped with a warning.
    /// Non-finite coordinates are rejected since they indicate a broken
    /// loader rather than odd geometry.
    pub fn build(defs: &[FaceDef], cell_size: f32) -> PhysicsResult<Self> {
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return Err(PhysicsError::Geometry(format!(
                "grid cell size must be positive, got {cell_size}"
            )));
        }

        let mut faces = Vec::with_capacity(defs.len());
        let mut skipped = 0usize;

        for (def_index, def) in defs.iter().enumerate() {
            if let Some(bad) = def.vertices.iter().find(|v| !v.is_finite()) {
                return Err(PhysicsError::Geometry(format!(
                    "face {def_index} has a non-finite vertex {bad}"
                )));
            }
            if def.vertices.len() < 3 {
                log::warn!(
                    "Skipping face {} with {} vertices",
                    def_index,
                    def.vertices.len()
                );
                skipped += 1;
                continue;
            }

            let first = def.vertices[0];
            for pair in def.vertices[1..].windows(2) {
                match Face::new([first, pair[0], pair[1]], def.material_id, def.flags) {
                    Some(face) => faces.push(face),
                    None => {
                        log::warn!("Skipping degenerate triangle in face {}", def_index);
                        skipped += 1;
                    }
                }
            }
        }

        Ok(Self::from_faces(faces, cell_size, skipped))
    }

    fn from_faces(faces: Vec<Face>, cell_size: f32, skipped: usize) -> Self {
        let mut grid = FaceGrid::new(cell_size);
        let mut collidable = Vec::new();
        let mut ray_blocking = Vec::new();
        let mut bounds = Aabb::EMPTY;

        for (index, face) in faces.iter().enumerate() {
            bounds = bounds.merge(&face.bounds);
            let index = index as u32;
            if face.is_collidable() {
                grid.insert(index, &face.bounds);
                collidable.push(index);
            }
            if face.blocks_rays() {
                ray_blocking.push(index);
            }
        }

        log::info!(
            "Built geometry store: {} faces ({} collidable, {} skipped), {} grid cells",
            faces.len(),
            collidable.len(),
            skipped,
            grid.occupied_cells()
        );

        Self {
            faces,
            collidable,
            ray_blocking,
            grid,
            bounds,
        }
    }

    /// A store with no faces. Every query against it reports nothing.
    pub fn empty() -> Self {
        Self {
            faces: Vec::new(),
            collidable: Vec::new(),
            ray_blocking: Vec::new(),
            grid: FaceGrid::new(4.0),
            bounds: Aabb::EMPTY,
        }
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> Option<&Face> {
        self.faces.get(index)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Indices of collidable faces in ascending order
    pub fn collidable_indices(&self) -> &[u32] {
        &self.collidable
    }

    /// Indices of faces that stop bullet and line-of-sight rays, ascending
    pub fn ray_blocking_indices(&self) -> &[u32] {
        &self.ray_blocking
    }

    /// Bounds of every face in the store
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Collidable faces whose bounds may touch `aabb`, in ascending index order.
    pub fn candidates(&self, aabb: &Aabb) -> SmallVec<[u32; 32]> {
        let mut out = SmallVec::new();
        if !self.grid.query(aabb, &mut out) {
            out.extend_from_slice(&self.collidable);
        }
        out
    }
}

impl Default for GeometryStore {
    fn default() -> Self {
        Self::empty()
    }
}
