//! Navigation mesh storage
//!
//! The mesh is an arena of cells addressed by [`CellHandle`]s. Ground cells are
//! convex polygons wound so that [`tri_area_2d`](movemap_common::tri_area_2d)
//! of consecutive vertices is positive; off-mesh link cells hold exactly two
//! vertices, the link start and end.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use super::{CellFlags, CellHandle, CellType, QueryFilter, Status, EXTERNAL_LINK_EDGE};
use movemap_common::{
    closest_height_on_triangle, dist_point_segment_sqr_2d_with_t, distance_pt_poly_edges_sqr,
    overlap_bounds, vlerp, Error, Result,
};

/// Number of bits reserved for the cell index inside a handle
const CELL_INDEX_BITS: u32 = 32;
const CELL_INDEX_MASK: u64 = (1 << CELL_INDEX_BITS) - 1;

static NEXT_MESH_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one mesh instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(u32);

impl MeshId {
    pub(crate) fn next() -> Self {
        MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Creates a handle for the cell at `index` of the mesh `mesh_id`
#[inline]
pub fn encode_cell_handle(mesh_id: MeshId, index: usize) -> CellHandle {
    CellHandle::new(((mesh_id.0 as u64) << CELL_INDEX_BITS) | ((index as u64 + 1) & CELL_INDEX_MASK))
}

/// Splits a handle into its mesh id and cell index
///
/// Returns `None` for the invalid handle.
#[inline]
pub fn decode_cell_handle(handle: CellHandle) -> Option<(u32, usize)> {
    let low = handle.id() & CELL_INDEX_MASK;
    if low == 0 {
        return None;
    }
    Some(((handle.id() >> CELL_INDEX_BITS) as u32, (low - 1) as usize))
}

/// Placement of the tile grid used for tile presence checks
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NavMeshParams {
    /// World-space origin of the tile grid
    pub origin: [f32; 3],
    /// Tile size along X
    pub tile_width: f32,
    /// Tile size along Z
    pub tile_height: f32,
    /// Vertical distance under which a point directly over a cell counts as on it
    pub walkable_climb: f32,
}

impl Default for NavMeshParams {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            tile_width: 533.333_3,
            tile_height: 533.333_3,
            walkable_climb: 0.25,
        }
    }
}

/// Connection from one cell to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Index of the connected cell
    pub target: u32,
    /// Edge of the owning cell the link runs through. For off-mesh link cells
    /// this is the endpoint index (0 = start, 1 = end); ground cells use
    /// [`EXTERNAL_LINK_EDGE`] for links into an off-mesh link cell.
    pub edge: u8,
}

/// One cell of the navigation mesh
#[derive(Debug, Clone)]
pub struct Cell {
    /// Vertices in navigation space
    pub verts: Vec<[f32; 3]>,
    /// Outgoing links
    pub links: Vec<Link>,
    /// Terrain media of the cell
    pub flags: CellFlags,
    /// Area type, indexes the filter cost table
    pub area: u8,
    /// Ground cell or off-mesh link
    pub cell_type: CellType,
    /// Bounding box minimum
    pub bmin: [f32; 3],
    /// Bounding box maximum
    pub bmax: [f32; 3],
}

impl Cell {
    pub(crate) fn new(verts: Vec<[f32; 3]>, flags: CellFlags, area: u8, cell_type: CellType) -> Self {
        let mut bmin = [f32::MAX; 3];
        let mut bmax = [f32::MIN; 3];
        for v in &verts {
            for k in 0..3 {
                bmin[k] = bmin[k].min(v[k]);
                bmax[k] = bmax[k].max(v[k]);
            }
        }
        Self {
            verts,
            links: Vec::new(),
            flags,
            area,
            cell_type,
            bmin,
            bmax,
        }
    }

    /// Number of vertices
    pub fn vert_count(&self) -> usize {
        self.verts.len()
    }

    /// Returns true for off-mesh link cells
    pub fn is_off_mesh_link(&self) -> bool {
        self.cell_type == CellType::OffMeshLink
    }

    /// Finds the link leaving this cell towards `target`
    pub fn link_to(&self, target: u32) -> Option<&Link> {
        self.links.iter().find(|l| l.target == target)
    }
}

/// Off-mesh link description kept next to its link cell
#[derive(Debug, Clone, PartialEq)]
pub struct OffMeshLink {
    /// Start point after snapping to the landing cell
    pub start: [f32; 3],
    /// End point after snapping to the landing cell
    pub end: [f32; 3],
    /// Landing search radius
    pub radius: f32,
    /// True if the link can be taken from end to start
    pub bidirectional: bool,
    /// Index of the link cell
    pub cell: u32,
}

/// Navigation mesh
#[derive(Debug)]
pub struct NavMesh {
    mesh_id: MeshId,
    params: NavMeshParams,
    cells: Vec<Cell>,
    off_mesh_links: Vec<OffMeshLink>,
    tiles: HashSet<(i32, i32)>,
}

impl NavMesh {
    pub(crate) fn from_parts(
        params: NavMeshParams,
        cells: Vec<Cell>,
        off_mesh_links: Vec<OffMeshLink>,
    ) -> Result<Self> {
        if params.tile_width <= 0.0 || params.tile_height <= 0.0 {
            return Err(Error::InvalidMesh(format!(
                "tile size must be positive, got {}x{}",
                params.tile_width, params.tile_height
            )));
        }

        let mut mesh = Self {
            mesh_id: MeshId::next(),
            params,
            cells,
            off_mesh_links,
            tiles: HashSet::new(),
        };

        let mut tiles = HashSet::new();
        for cell in mesh.cells.iter().filter(|c| !c.is_off_mesh_link()) {
            let (tx0, ty0) = mesh.calc_tile_loc(&cell.bmin);
            let (tx1, ty1) = mesh.calc_tile_loc(&cell.bmax);
            for tx in tx0..=tx1 {
                for ty in ty0..=ty1 {
                    tiles.insert((tx, ty));
                }
            }
        }
        mesh.tiles = tiles;

        log::debug!(
            "navigation mesh {} ready: {} cells, {} off-mesh links, {} tiles",
            mesh.mesh_id.0,
            mesh.cells.len(),
            mesh.off_mesh_links.len(),
            mesh.tiles.len()
        );

        Ok(mesh)
    }

    /// Identity of this mesh instance
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    /// Number of cells, off-mesh link cells included
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Handle of the cell at `index`
    pub fn handle_for_index(&self, index: usize) -> CellHandle {
        if index < self.cells.len() {
            encode_cell_handle(self.mesh_id, index)
        } else {
            CellHandle::INVALID
        }
    }

    /// Index of the cell behind `handle`, if the handle belongs to this mesh
    pub fn cell_index(&self, handle: CellHandle) -> Option<usize> {
        match decode_cell_handle(handle) {
            Some((mesh, index)) if mesh == self.mesh_id.0 && index < self.cells.len() => Some(index),
            _ => None,
        }
    }

    /// Returns true if `handle` names a cell of this mesh
    pub fn is_valid_cell_handle(&self, handle: CellHandle) -> bool {
        self.cell_index(handle).is_some()
    }

    /// Gets the cell behind a handle
    pub fn cell(&self, handle: CellHandle) -> Result<&Cell> {
        self.cell_index(handle)
            .map(|i| &self.cells[i])
            .ok_or_else(|| Status::InvalidParam.into())
    }

    /// Axis-aligned bounds of a cell as `(bmin, bmax)`
    pub fn cell_bounds(&self, handle: CellHandle) -> Result<([f32; 3], [f32; 3])> {
        let cell = self.cell(handle)?;
        Ok((cell.bmin, cell.bmax))
    }

    pub(crate) fn cell_at(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// All off-mesh links of the mesh
    pub fn off_mesh_links(&self) -> &[OffMeshLink] {
        &self.off_mesh_links
    }

    /// Off-mesh link description behind a link cell handle
    pub fn off_mesh_link(&self, handle: CellHandle) -> Option<&OffMeshLink> {
        let index = self.cell_index(handle)? as u32;
        self.off_mesh_links.iter().find(|l| l.cell == index)
    }

    /// Tile grid coordinates of a navigation-space point
    pub fn calc_tile_loc(&self, pos: &[f32; 3]) -> (i32, i32) {
        let tx = ((pos[0] - self.params.origin[0]) / self.params.tile_width).floor() as i32;
        let ty = ((pos[2] - self.params.origin[2]) / self.params.tile_height).floor() as i32;
        (tx, ty)
    }

    /// Returns true if any ground cell overlaps the tile
    pub fn has_tile_at(&self, tx: i32, ty: i32) -> bool {
        self.tiles.contains(&(tx, ty))
    }

    /// Returns true if the tile containing `pos` holds mesh data
    pub fn has_tile_at_pos(&self, pos: &[f32; 3]) -> bool {
        let (tx, ty) = self.calc_tile_loc(pos);
        self.has_tile_at(tx, ty)
    }

    /// Checks a filter against the cell behind `handle`
    pub fn pass_filter(&self, handle: CellHandle, filter: &QueryFilter) -> bool {
        self.cell_index(handle)
            .is_some_and(|i| filter.pass_flags(self.cells[i].flags))
    }

    /// Ground cells whose bounds overlap the box and that pass the filter
    pub fn query_cells(
        &self,
        bmin: &[f32; 3],
        bmax: &[f32; 3],
        filter: &QueryFilter,
    ) -> Vec<CellHandle> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                !c.is_off_mesh_link()
                    && filter.pass_flags(c.flags)
                    && overlap_bounds(bmin, bmax, &c.bmin, &c.bmax)
            })
            .map(|(i, _)| encode_cell_handle(self.mesh_id, i))
            .collect()
    }

    /// Height of the cell surface under `pos`
    ///
    /// Ground cells return `None` when `pos` is outside the cell on the XZ
    /// plane. Off-mesh links interpolate between their endpoints.
    pub fn cell_height(&self, handle: CellHandle, pos: &[f32; 3]) -> Result<Option<f32>> {
        let cell = self.cell(handle)?;
        Ok(cell_height_of(cell, pos))
    }

    /// Closest point on a ground cell and whether `pos` lies over the cell
    pub(crate) fn closest_point_on_ground_cell(
        &self,
        index: usize,
        pos: &[f32; 3],
    ) -> ([f32; 3], bool) {
        let cell = &self.cells[index];
        let (inside, edge_dists, edge_ts) = distance_pt_poly_edges_sqr(pos, &cell.verts);

        if inside {
            if let Some(h) = cell_height_of(cell, pos) {
                return ([pos[0], h, pos[2]], true);
            }
        }

        let (edge, t) = closest_edge(&edge_dists, &edge_ts);
        let n = cell.verts.len();
        let p = vlerp(&cell.verts[edge], &cell.verts[(edge + 1) % n], t);
        (p, inside)
    }
}

fn closest_edge(edge_dists: &[f32], edge_ts: &[f32]) -> (usize, f32) {
    let mut best = 0;
    for (i, d) in edge_dists.iter().enumerate() {
        if *d < edge_dists[best] {
            best = i;
        }
    }
    (best, edge_ts[best])
}

pub(crate) fn closest_point_on_boundary(cell: &Cell, pos: &[f32; 3]) -> [f32; 3] {
    let (inside, edge_dists, edge_ts) = distance_pt_poly_edges_sqr(pos, &cell.verts);
    if inside && !cell.is_off_mesh_link() {
        return *pos;
    }
    let (edge, t) = closest_edge(&edge_dists, &edge_ts);
    let n = cell.verts.len();
    vlerp(&cell.verts[edge], &cell.verts[(edge + 1) % n], t)
}

fn cell_height_of(cell: &Cell, pos: &[f32; 3]) -> Option<f32> {
    if cell.is_off_mesh_link() {
        let (_, t) = dist_point_segment_sqr_2d_with_t(pos, &cell.verts[0], &cell.verts[1]);
        return Some(cell.verts[0][1] + (cell.verts[1][1] - cell.verts[0][1]) * t);
    }

    let v = &cell.verts;
    (1..v.len() - 1).find_map(|i| closest_height_on_triangle(pos, &v[0], &v[i], &v[i + 1]))
}

/// Link from a ground cell into an off-mesh link cell
pub(crate) fn external_link(target: u32) -> Link {
    Link {
        target,
        edge: EXTERNAL_LINK_EDGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_encoding() {
        let id = MeshId(7);
        let handle = encode_cell_handle(id, 41);
        assert!(handle.is_valid());
        assert_eq!(decode_cell_handle(handle), Some((7, 41)));
        assert_eq!(decode_cell_handle(CellHandle::INVALID), None);
    }

    #[test]
    fn test_handles_differ_between_meshes() {
        let a = MeshId::next();
        let b = MeshId::next();
        assert_ne!(encode_cell_handle(a, 0), encode_cell_handle(b, 0));
    }

    #[test]
    fn test_handles_carry_mesh_id() -> Result<()> {
        use crate::test_mesh_helpers::create_strip_mesh;

        let mesh = create_strip_mesh(2)?;
        let other = create_strip_mesh(2)?;
        assert_ne!(mesh.mesh_id(), other.mesh_id());

        let decoded = decode_cell_handle(mesh.handle_for_index(1));
        assert_eq!(decoded, Some((mesh.mesh_id().get(), 1)));
        // Handles of another mesh are rejected.
        assert!(mesh.cell(other.handle_for_index(1)).is_err());
        Ok(())
    }
}

