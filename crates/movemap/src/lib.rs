//! Convex-cell navigation meshes ("movement maps") and the queries run on them
//!
//! A [`NavMesh`] is a set of convex cells in Y-up navigation space, connected
//! through shared edges and off-mesh links. [`NavMeshQuery`] answers nearest
//! cell, closest point, A* corridor, straight path and surface walk queries
//! against one mesh.

mod nav_mesh;
mod nav_mesh_builder;
mod nav_mesh_query;
mod status;

#[cfg(test)]
mod test_mesh_helpers;


pub use nav_mesh::{
    decode_cell_handle, encode_cell_handle, Cell, Link, MeshId, NavMesh, NavMeshParams,
    OffMeshLink,
};
pub use nav_mesh_builder::NavMeshBuilder;
pub use nav_mesh_query::{NavMeshQuery, StraightPath};
pub use status::Status;

use bitflags::bitflags;

/// Maximum number of vertices per cell
pub const MAX_VERTS_PER_CELL: usize = 12;

/// Number of area types with independent traversal costs
pub const MAX_AREAS: usize = 64;

/// Edge marker for links that do not run through a cell edge (off-mesh links)
pub const EXTERNAL_LINK_EDGE: u8 = 0xff;

/// Opaque reference to one cell of one mesh instance
///
/// The high 32 bits carry the [`MeshId`] of the owning mesh and the low 32 bits
/// the cell index plus one, so the zero value is never a real cell and handles
/// from different meshes never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CellHandle(u64);

impl CellHandle {
    /// The "no cell" sentinel
    pub const INVALID: CellHandle = CellHandle(0);

    /// Wraps a raw handle value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw handle value
    pub fn id(&self) -> u64 {
        self.0
    }

    /// Returns true unless this is the sentinel
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for CellHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

bitflags! {
    /// Terrain media a cell belongs to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CellFlags: u16 {
        const GROUND = 0x01;
        const MAGMA = 0x02;
        const SLIME = 0x04;
        const WATER = 0x08;
    }
}

bitflags! {
    /// Per-vertex flags returned by [`NavMeshQuery::find_straight_path`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StraightPathFlags: u8 {
        /// The vertex is the path start
        const START = 0x01;
        /// The vertex is the path end
        const END = 0x02;
        /// The vertex is the entry of an off-mesh link
        const OFFMESH_CONNECTION = 0x04;
    }
}

/// Kind of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Convex walkable polygon
    Ground,
    /// Two-point connection between ground cells (jump, ladder, teleport)
    OffMeshLink,
}

/// Decides which cells a query may traverse and at what cost
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Cell must carry at least one of these flags
    pub include_flags: CellFlags,
    /// Cell must carry none of these flags
    pub exclude_flags: CellFlags,
    /// Cost multiplier per area type
    pub area_cost: [f32; MAX_AREAS],
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            include_flags: CellFlags::all(),
            exclude_flags: CellFlags::empty(),
            area_cost: [1.0; MAX_AREAS],
        }
    }
}

impl QueryFilter {
    /// Creates a filter over the given media with no exclusions
    pub fn new(include_flags: CellFlags) -> Self {
        Self {
            include_flags,
            ..Self::default()
        }
    }

    pub fn include_flags(&self) -> CellFlags {
        self.include_flags
    }

    pub fn set_include_flags(&mut self, flags: CellFlags) {
        self.include_flags = flags;
    }

    pub fn exclude_flags(&self) -> CellFlags {
        self.exclude_flags
    }

    pub fn set_exclude_flags(&mut self, flags: CellFlags) {
        self.exclude_flags = flags;
    }

    /// Sets the traversal cost multiplier of an area; out of range areas are ignored
    pub fn set_area_cost(&mut self, area: u8, cost: f32) {
        if let Some(slot) = self.area_cost.get_mut(area as usize) {
            *slot = cost;
        }
    }

    pub fn area_cost(&self, area: u8) -> f32 {
        self.area_cost.get(area as usize).copied().unwrap_or(1.0)
    }

    /// Returns true if a cell with these flags may be traversed
    pub fn pass_flags(&self, flags: CellFlags) -> bool {
        flags.intersects(self.include_flags) && !flags.intersects(self.exclude_flags)
    }

    /// Cost of moving between two points inside a cell of the given area
    pub fn cost(&self, a: &[f32; 3], b: &[f32; 3], area: u8) -> f32 {
        movemap_common::vdist(a, b) * self.area_cost(area)
    }
}
