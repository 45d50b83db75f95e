//! Navigation mesh query implementation
//!
//! This module contains the NavMeshQuery structure, which owns the search
//! scratch state (node pool, open list) used to run corridor searches and
//! other queries against a borrowed [`NavMesh`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use super::nav_mesh::{closest_point_on_boundary, NavMesh};
use super::{CellHandle, CellType, QueryFilter, Status, StraightPathFlags};
use movemap_common::{
    dist_point_segment_sqr_2d_with_t, point_in_polygon_2d, tri_area_2d, vdist, vdist_sqr,
    vequal, vlerp, Result,
};

/// Default maximum number of nodes in the search pool
const DEFAULT_MAX_NODES: usize = 2048;

/// Heuristic scale; slightly below one keeps the search admissible
const H_SCALE: f32 = 0.999;

/// Maximum number of cells explored by a single surface walk
const MAX_SURFACE_NODES: usize = 48;

/// Portals closer than this to the apex are skipped at the path start
const PORTAL_APEX_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    New,
    Open,
    Closed,
}

/// Node in the A* search
#[derive(Debug, Clone)]
struct Node {
    /// Cell index
    cell: u32,
    /// Parent node
    parent: Option<usize>,
    /// Point where the search entered the cell
    pos: [f32; 3],
    /// Cost from start to this node
    g: f32,
    /// Total cost (g + h)
    total: f32,
    state: NodeState,
}

/// Node wrapper for the binary heap (priority queue)
#[derive(Debug, Clone, Copy)]
struct HeapNode {
    index: usize,
    f: f32,
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
    }
}

impl Eq for HeapNode {}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lowest f value first)
        other.f.total_cmp(&self.f)
    }
}

/// Result of a straight path query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StraightPath {
    /// Corner points, start and end included
    pub points: Vec<[f32; 3]>,
    /// Flags of each corner
    pub flags: Vec<StraightPathFlags>,
    /// Cell entered at each corner; the end corner carries the invalid handle
    pub cells: Vec<CellHandle>,
    /// True if the output was cut short by the point limit
    pub truncated: bool,
}

impl StraightPath {
    fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
            flags: Vec::with_capacity(n),
            cells: Vec::with_capacity(n),
            truncated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends a corner; returns false once no more corners should be added.
    fn append(
        &mut self,
        pos: [f32; 3],
        flags: StraightPathFlags,
        cell: CellHandle,
        max_points: usize,
    ) -> bool {
        if let Some(last) = self.points.last() {
            if vequal(last, &pos) {
                // Same corner reached through a different portal.
                let n = self.points.len() - 1;
                self.flags[n] = flags;
                self.cells[n] = cell;
                return true;
            }
        }

        self.points.push(pos);
        self.flags.push(flags);
        self.cells.push(cell);

        if self.points.len() >= max_points {
            self.truncated = !flags.contains(StraightPathFlags::END);
            return false;
        }
        !flags.contains(StraightPathFlags::END)
    }
}

/// Navigation mesh query structure
#[derive(Debug)]
pub struct NavMeshQuery<'a> {
    /// Reference to the navigation mesh
    nav_mesh: &'a NavMesh,
    /// Node pool for A* search
    node_pool: Vec<Node>,
    /// Cell index to node pool index
    node_lookup: HashMap<u32, usize>,
    /// Open list for A* search
    open_list: BinaryHeap<HeapNode>,
    max_nodes: usize,
}

impl<'a> NavMeshQuery<'a> {
    /// Creates a new navigation mesh query
    pub fn new(nav_mesh: &'a NavMesh) -> Self {
        Self::with_max_nodes(nav_mesh, DEFAULT_MAX_NODES)
    }

    /// Creates a query whose searches visit at most `max_nodes` cells
    pub fn with_max_nodes(nav_mesh: &'a NavMesh, max_nodes: usize) -> Self {
        Self {
            nav_mesh,
            node_pool: Vec::new(),
            node_lookup: HashMap::new(),
            open_list: BinaryHeap::new(),
            max_nodes: max_nodes.max(1),
        }
    }

    /// Gets a reference to the navigation mesh
    pub fn nav_mesh(&self) -> &'a NavMesh {
        self.nav_mesh
    }

    fn cell_index(&self, handle: CellHandle) -> Result<usize> {
        self.nav_mesh
            .cell_index(handle)
            .ok_or_else(|| Status::InvalidParam.into())
    }

    /// Finds the ground cell nearest to the specified center point
    ///
    /// Only cells whose bounds overlap the box `center ± half_extents` are
    /// considered. A point directly over a cell and within the mesh's walkable
    /// climb counts as lying on it.
    pub fn find_nearest_cell(
        &self,
        center: &[f32; 3],
        half_extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Result<(CellHandle, [f32; 3])> {
        let bmin = [
            center[0] - half_extents[0],
            center[1] - half_extents[1],
            center[2] - half_extents[2],
        ];
        let bmax = [
            center[0] + half_extents[0],
            center[1] + half_extents[1],
            center[2] + half_extents[2],
        ];

        let climb = self.nav_mesh.params().walkable_climb;
        let mut nearest_ref = CellHandle::INVALID;
        let mut nearest_point = *center;
        let mut nearest_distance_sqr = f32::MAX;

        for handle in self.nav_mesh.query_cells(&bmin, &bmax, filter) {
            let index = self.cell_index(handle)?;
            let (closest, is_over_cell) = self.nav_mesh.closest_point_on_ground_cell(index, center);

            let d = if is_over_cell {
                let height_diff = (center[1] - closest[1]).abs() - climb;
                if height_diff > 0.0 {
                    height_diff * height_diff
                } else {
                    0.0
                }
            } else {
                vdist_sqr(center, &closest)
            };

            if d < nearest_distance_sqr {
                nearest_point = closest;
                nearest_distance_sqr = d;
                nearest_ref = handle;
            }
        }

        if !nearest_ref.is_valid() {
            return Err(Status::NotFound.into());
        }

        Ok((nearest_ref, nearest_point))
    }

    /// Closest point on a ground cell, and whether `pos` lies over it
    ///
    /// Fails for off-mesh link cells, which have no surface.
    pub fn closest_point_on_cell(
        &self,
        cell: CellHandle,
        pos: &[f32; 3],
    ) -> Result<([f32; 3], bool)> {
        let index = self.cell_index(cell)?;
        if self.nav_mesh.cell_at(index).is_off_mesh_link() {
            return Err(Status::InvalidParam.into());
        }
        Ok(self.nav_mesh.closest_point_on_ground_cell(index, pos))
    }

    /// Closest point on the cell boundary, or `pos` itself if it lies inside
    pub fn closest_point_on_cell_boundary(&self, cell: CellHandle, pos: &[f32; 3]) -> Result<[f32; 3]> {
        let index = self.cell_index(cell)?;
        Ok(closest_point_on_boundary(self.nav_mesh.cell_at(index), pos))
    }

    /// Height of the cell surface under `pos`
    pub fn cell_height(&self, cell: CellHandle, pos: &[f32; 3]) -> Result<Option<f32>> {
        self.nav_mesh.cell_height(cell, pos)
    }

    /// Finds a corridor of cells from `start_ref` to `end_ref`
    ///
    /// When the end cell cannot be reached the corridor leads to the explored
    /// cell closest to `end_pos`. At most `max_path` cells are returned,
    /// counted from the start.
    pub fn find_path(
        &mut self,
        start_ref: CellHandle,
        end_ref: CellHandle,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
        max_path: usize,
    ) -> Result<Vec<CellHandle>> {
        let start = self.cell_index(start_ref)? as u32;
        let end = self.cell_index(end_ref)? as u32;
        if max_path == 0 || !is_finite(start_pos) || !is_finite(end_pos) {
            return Err(Status::InvalidParam.into());
        }

        if start == end {
            return Ok(vec![start_ref]);
        }

        let mesh = self.nav_mesh;

        self.node_pool.clear();
        self.node_lookup.clear();
        self.open_list.clear();

        let start_h = vdist(start_pos, end_pos) * H_SCALE;
        self.node_pool.push(Node {
            cell: start,
            parent: None,
            pos: *start_pos,
            g: 0.0,
            total: start_h,
            state: NodeState::Open,
        });
        self.node_lookup.insert(start, 0);
        self.open_list.push(HeapNode {
            index: 0,
            f: start_h,
        });

        let mut best_node = 0;
        let mut best_cost = start_h;
        let mut out_of_nodes = false;

        while let Some(HeapNode { index: current, f }) = self.open_list.pop() {
            let node = &self.node_pool[current];
            if node.state == NodeState::Closed || f > node.total {
                continue;
            }
            self.node_pool[current].state = NodeState::Closed;

            let Node {
                cell: cur_cell,
                parent,
                pos: cur_pos,
                g: cur_g,
                ..
            } = self.node_pool[current].clone();

            if cur_cell == end {
                best_node = current;
                break;
            }

            let parent_cell = parent.map(|p| self.node_pool[p].cell);
            let cell = mesh.cell_at(cur_cell as usize);

            for link in &cell.links {
                let neighbour = link.target;
                if Some(neighbour) == parent_cell {
                    continue;
                }
                let neighbour_cell = mesh.cell_at(neighbour as usize);
                if !filter.pass_flags(neighbour_cell.flags) {
                    continue;
                }

                let neighbour_idx = match self.node_lookup.get(&neighbour) {
                    Some(&idx) => idx,
                    None => {
                        if self.node_pool.len() >= self.max_nodes {
                            out_of_nodes = true;
                            continue;
                        }
                        let Some((left, right, _, _)) =
                            portal_points_between(mesh, cur_cell as usize, neighbour as usize)
                        else {
                            continue;
                        };
                        self.node_pool.push(Node {
                            cell: neighbour,
                            parent: None,
                            pos: vlerp(&left, &right, 0.5),
                            g: 0.0,
                            total: f32::MAX,
                            state: NodeState::New,
                        });
                        let idx = self.node_pool.len() - 1;
                        self.node_lookup.insert(neighbour, idx);
                        idx
                    }
                };

                let neighbour_pos = self.node_pool[neighbour_idx].pos;
                let (g, h) = if neighbour == end {
                    let cur_cost = filter.cost(&cur_pos, &neighbour_pos, cell.area);
                    let end_cost = filter.cost(&neighbour_pos, end_pos, neighbour_cell.area);
                    (cur_g + cur_cost + end_cost, 0.0)
                } else {
                    let cur_cost = filter.cost(&cur_pos, &neighbour_pos, cell.area);
                    (cur_g + cur_cost, vdist(&neighbour_pos, end_pos) * H_SCALE)
                };
                let total = g + h;

                let node = &mut self.node_pool[neighbour_idx];
                if node.state != NodeState::New && total >= node.total {
                    continue;
                }
                node.parent = Some(current);
                node.g = g;
                node.total = total;
                node.state = NodeState::Open;
                self.open_list.push(HeapNode {
                    index: neighbour_idx,
                    f: total,
                });

                if h < best_cost {
                    best_cost = h;
                    best_node = neighbour_idx;
                }
            }
        }

        if out_of_nodes {
            log::debug!("find_path ran out of nodes ({} allocated)", self.node_pool.len());
        }

        let mut path = Vec::new();
        let mut current = Some(best_node);
        while let Some(idx) = current {
            let node = &self.node_pool[idx];
            path.push(mesh.handle_for_index(node.cell as usize));
            current = node.parent;
        }
        path.reverse();

        if path.last() != Some(&end_ref) {
            log::debug!(
                "find_path returned a partial corridor of {} cells towards {}",
                path.len(),
                end_ref
            );
        }

        path.truncate(max_path);
        Ok(path)
    }

    /// Portal segment between two adjacent cells as (left, right)
    ///
    /// Portals into or out of off-mesh links collapse to the link endpoint.
    pub fn portal_points(&self, from: CellHandle, to: CellHandle) -> Result<([f32; 3], [f32; 3])> {
        let from = self.cell_index(from)?;
        let to = self.cell_index(to)?;
        portal_points_between(self.nav_mesh, from, to)
            .map(|(left, right, _, _)| (left, right))
            .ok_or_else(|| Status::InvalidParam.into())
    }

    /// Finds the corners of the shortest path through a corridor
    ///
    /// `start_pos` and `end_pos` are clamped to the first and last corridor
    /// cells. Corners that enter an off-mesh link are flagged with
    /// [`StraightPathFlags::OFFMESH_CONNECTION`]. At most `max_points` corners
    /// are produced.
    pub fn find_straight_path(
        &self,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        path: &[CellHandle],
        max_points: usize,
    ) -> Result<StraightPath> {
        if path.is_empty() || max_points == 0 {
            return Err(Status::InvalidParam.into());
        }

        let indices = path
            .iter()
            .map(|h| self.cell_index(*h))
            .collect::<Result<Vec<_>>>()?;
        let mesh = self.nav_mesh;
        let last = indices.len() - 1;

        let closest_start = closest_point_on_boundary(mesh.cell_at(indices[0]), start_pos);
        let closest_end = closest_point_on_boundary(mesh.cell_at(indices[last]), end_pos);

        let mut out = StraightPath::with_capacity(max_points.min(path.len() + 2));
        if !out.append(closest_start, StraightPathFlags::START, path[0], max_points) {
            return Ok(out);
        }

        if path.len() > 1 {
            let mut apex = closest_start;
            let mut portal_left = apex;
            let mut portal_right = apex;
            let mut left_index = 0;
            let mut right_index = 0;
            let mut left_type = CellType::Ground;
            let mut right_type = CellType::Ground;
            let mut left_ref = path[0];
            let mut right_ref = path[0];

            let mut i = 0;
            while i < path.len() {
                let (left, right, to_type) = if i + 1 < path.len() {
                    match portal_points_between(mesh, indices[i], indices[i + 1]) {
                        Some((left, right, _, to_type)) => {
                            if i == 0 {
                                let (d, _) = dist_point_segment_sqr_2d_with_t(&apex, &left, &right);
                                if d < PORTAL_APEX_EPSILON * PORTAL_APEX_EPSILON {
                                    i += 1;
                                    continue;
                                }
                            }
                            (left, right, to_type)
                        }
                        None => {
                            // Broken corridor: stop at the last good cell.
                            let clamped = closest_point_on_boundary(mesh.cell_at(indices[i]), end_pos);
                            out.append(clamped, StraightPathFlags::empty(), path[i], max_points);
                            out.truncated = true;
                            return Ok(out);
                        }
                    }
                } else {
                    (closest_end, closest_end, CellType::Ground)
                };

                let next_ref = if i + 1 < path.len() {
                    path[i + 1]
                } else {
                    CellHandle::INVALID
                };

                // Right side of the funnel.
                if tri_area_2d(&apex, &portal_right, &right) <= 0.0 {
                    if vequal(&apex, &portal_right) || tri_area_2d(&apex, &portal_left, &right) > 0.0 {
                        portal_right = right;
                        right_ref = next_ref;
                        right_type = to_type;
                        right_index = i;
                    } else {
                        apex = portal_left;
                        let apex_index = left_index;
                        if !out.append(apex, corner_flags(left_ref, left_type), left_ref, max_points) {
                            return Ok(out);
                        }
                        portal_left = apex;
                        portal_right = apex;
                        left_index = apex_index;
                        right_index = apex_index;
                        i = apex_index + 1;
                        continue;
                    }
                }

                // Left side of the funnel.
                if tri_area_2d(&apex, &portal_left, &left) >= 0.0 {
                    if vequal(&apex, &portal_left) || tri_area_2d(&apex, &portal_right, &left) < 0.0 {
                        portal_left = left;
                        left_ref = next_ref;
                        left_type = to_type;
                        left_index = i;
                    } else {
                        apex = portal_right;
                        let apex_index = right_index;
                        if !out.append(apex, corner_flags(right_ref, right_type), right_ref, max_points) {
                            return Ok(out);
                        }
                        portal_left = apex;
                        portal_right = apex;
                        left_index = apex_index;
                        right_index = apex_index;
                        i = apex_index + 1;
                        continue;
                    }
                }

                i += 1;
            }
        }

        out.append(
            closest_end,
            StraightPathFlags::END,
            CellHandle::INVALID,
            max_points,
        );
        Ok(out)
    }

    /// Moves from `start_pos` towards `end_pos` constrained to the mesh surface
    ///
    /// Returns the reached position and the cells visited on the way, start
    /// cell first, limited to `max_visited` entries. The returned height is
    /// only approximate; callers snap it with [`NavMeshQuery::cell_height`].
    pub fn move_along_surface(
        &self,
        start_ref: CellHandle,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
        max_visited: usize,
    ) -> Result<([f32; 3], Vec<CellHandle>)> {
        let start = self.cell_index(start_ref)?;
        if max_visited == 0 || !is_finite(start_pos) || !is_finite(end_pos) {
            return Err(Status::InvalidParam.into());
        }
        let mesh = self.nav_mesh;

        // (cell index, parent node)
        let mut nodes: Vec<(usize, Option<usize>)> = vec![(start, None)];
        let mut queue = VecDeque::from([0usize]);

        let mut best_pos = *start_pos;
        let mut best_dist = f32::MAX;
        let mut best_node = 0;

        let search_pos = vlerp(start_pos, end_pos, 0.5);
        let search_rad = vdist(start_pos, end_pos) / 2.0 + 0.001;
        let search_rad_sqr = search_rad * search_rad;

        while let Some(current) = queue.pop_front() {
            let cell = mesh.cell_at(nodes[current].0);

            if point_in_polygon_2d(end_pos, &cell.verts) {
                best_node = current;
                best_pos = *end_pos;
                break;
            }

            let n = cell.verts.len();
            for j in 0..n {
                let vj = &cell.verts[j];
                let vi = &cell.verts[(j + 1) % n];

                let neighbours: Vec<usize> = cell
                    .links
                    .iter()
                    .filter(|l| l.edge as usize == j)
                    .map(|l| l.target as usize)
                    .filter(|&t| filter.pass_flags(mesh.cell_at(t).flags))
                    .collect();

                if neighbours.is_empty() {
                    // Wall edge, remember the closest point on it.
                    let (d, t) = dist_point_segment_sqr_2d_with_t(end_pos, vj, vi);
                    if d < best_dist {
                        best_pos = vlerp(vj, vi, t);
                        best_dist = d;
                        best_node = current;
                    }
                    continue;
                }

                for target in neighbours {
                    if nodes.iter().any(|(c, _)| *c == target) {
                        continue;
                    }
                    let (d, _) = dist_point_segment_sqr_2d_with_t(&search_pos, vj, vi);
                    if d > search_rad_sqr {
                        continue;
                    }
                    if nodes.len() < MAX_SURFACE_NODES {
                        nodes.push((target, Some(current)));
                        queue.push_back(nodes.len() - 1);
                    }
                }
            }
        }

        let mut visited = Vec::new();
        let mut current = Some(best_node);
        while let Some(idx) = current {
            visited.push(mesh.handle_for_index(nodes[idx].0));
            current = nodes[idx].1;
        }
        visited.reverse();
        visited.truncate(max_visited);

        Ok((best_pos, visited))
    }

    /// Entry and exit points of an off-mesh link when arriving from `prev_ref`
    pub fn off_mesh_link_end_points(
        &self,
        prev_ref: CellHandle,
        link_ref: CellHandle,
    ) -> Result<([f32; 3], [f32; 3])> {
        let prev = self.cell_index(prev_ref)? as u32;
        let cell = self.nav_mesh.cell_at(self.cell_index(link_ref)?);
        if !cell.is_off_mesh_link() {
            return Err(Status::InvalidParam.into());
        }

        let (mut idx0, mut idx1) = (0, 1);
        if let Some(link) = cell.links.iter().find(|l| l.edge == 0) {
            if link.target != prev {
                idx0 = 1;
                idx1 = 0;
            }
        }

        Ok((cell.verts[idx0], cell.verts[idx1]))
    }
}

fn corner_flags(cell: CellHandle, cell_type: CellType) -> StraightPathFlags {
    if !cell.is_valid() {
        StraightPathFlags::END
    } else if cell_type == CellType::OffMeshLink {
        StraightPathFlags::OFFMESH_CONNECTION
    } else {
        StraightPathFlags::empty()
    }
}

fn is_finite(p: &[f32; 3]) -> bool {
    p.iter().all(|c| c.is_finite())
}

/// Portal between two cells: (left, right, from type, to type)
fn portal_points_between(
    mesh: &NavMesh,
    from: usize,
    to: usize,
) -> Option<([f32; 3], [f32; 3], CellType, CellType)> {
    let from_cell = mesh.cell_at(from);
    let to_cell = mesh.cell_at(to);
    let link = from_cell.link_to(to as u32)?;

    if from_cell.is_off_mesh_link() {
        let v = *from_cell.verts.get(link.edge as usize)?;
        return Some((v, v, from_cell.cell_type, to_cell.cell_type));
    }

    if to_cell.is_off_mesh_link() {
        let back = to_cell.link_to(from as u32)?;
        let v = *to_cell.verts.get(back.edge as usize)?;
        return Some((v, v, from_cell.cell_type, to_cell.cell_type));
    }

    let n = from_cell.verts.len();
    let e = link.edge as usize;
    if e >= n {
        return None;
    }
    Some((
        from_cell.verts[e],
        from_cell.verts[(e + 1) % n],
        from_cell.cell_type,
        to_cell.cell_type,
    ))
}
