//! Per-agent pathfinding engine
//!
//! A [`PathFinder`] belongs to one moving agent. It keeps the corridor and
//! point path of its last computation and reuses them when the agent keeps
//! following the same route, so repeated calls while chasing a slowly moving
//! target rarely need a full search.

use glam::Vec3;
use movemap::{CellHandle, NavMesh, NavMeshQuery, QueryFilter};
use movemap_common::Result;

use crate::collaborators::{MeshProvider, PathAgent, TerrainService};
use crate::config::PathFinderConfig;
use crate::corridor::{prefix_length, Corridor};
use crate::filter::{agent_filter, refresh_filter};
use crate::locator::{locate, CellLocation};
use crate::normalize::{normalize_points, NormalizeLimits};
use crate::point_path::{smooth_point_path, straight_point_path, PointPath};
use crate::types::{from_nav, to_nav, PathType};

/// Pathfinding engine of one agent
pub struct PathFinder<'a> {
    config: PathFinderConfig,
    nav_mesh: Option<&'a NavMesh>,
    query: Option<NavMeshQuery<'a>>,
    base_filter: QueryFilter,
    filter: QueryFilter,
    corridor: Corridor,
    path: Vec<Vec3>,
    path_type: PathType,
    start: Vec3,
    end: Vec3,
    actual_end: Vec3,
    use_straight_path: bool,
    force_destination: bool,
    point_path_limit: usize,
}

impl<'a> PathFinder<'a> {
    /// Creates the engine of `agent` with the default configuration
    pub fn new(agent: &dyn PathAgent, meshes: &'a dyn MeshProvider) -> Self {
        Self::build(agent, meshes, PathFinderConfig::default())
    }

    /// Creates the engine of `agent` with a custom configuration
    pub fn with_config(
        agent: &dyn PathAgent,
        meshes: &'a dyn MeshProvider,
        config: PathFinderConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(agent, meshes, config))
    }

    fn build(agent: &dyn PathAgent, meshes: &'a dyn MeshProvider, config: PathFinderConfig) -> Self {
        let map_id = agent.map_id();
        let (nav_mesh, query) = if meshes.is_pathfinding_enabled(map_id, agent) && meshes.has_mesh(map_id) {
            (
                meshes.nav_mesh(map_id),
                meshes
                    .nav_mesh_for_instance(map_id, agent.instance_id())
                    .map(NavMeshQuery::new),
            )
        } else {
            (None, None)
        };

        log::debug!(
            "pathfinder created for {} on map {} (mesh {})",
            agent.display_id(),
            map_id,
            if query.is_some() { "available" } else { "missing" }
        );

        let base_filter = agent_filter(agent.kind(), agent.capabilities());
        Self {
            nav_mesh,
            query,
            filter: base_filter.clone(),
            base_filter,
            corridor: Corridor::new(config.corridor_capacity),
            path: Vec::new(),
            path_type: PathType::BLANK,
            start: Vec3::ZERO,
            end: Vec3::ZERO,
            actual_end: Vec3::ZERO,
            use_straight_path: config.use_straight_path,
            force_destination: false,
            point_path_limit: config.point_path_capacity,
            config,
        }
    }

    /// Computes a path from the agent position to `destination`
    ///
    /// Returns false only when either position is outside the world; every
    /// other outcome is reported through [`PathFinder::path_type`]. With
    /// `force_destination` the path always ends exactly at `destination`.
    pub fn calculate(
        &mut self,
        agent: &dyn PathAgent,
        terrain: &dyn TerrainService,
        destination: Vec3,
        force_destination: bool,
    ) -> bool {
        let start = agent.position();
        if !self.is_valid_coord(start) || !self.is_valid_coord(destination) {
            return false;
        }

        self.start = start;
        self.set_end_position(destination);
        self.force_destination = force_destination;

        let id = agent.display_id();
        log::debug!("calculate for {}: {} -> {}", id, start, destination);

        // The start and destination tiles must hold mesh data; tiles in
        // between are not checked.
        let Some(mut query) = self.query.take() else {
            self.build_shortcut();
            self.path_type = PathType::direct();
            return true;
        };

        let usable = self.nav_mesh.is_some()
            && !agent.ignores_pathfinding()
            && query.nav_mesh().has_tile_at_pos(&to_nav(start))
            && query.nav_mesh().has_tile_at_pos(&to_nav(destination));

        if usable {
            self.filter = self.base_filter.clone();
            refresh_filter(&mut self.filter, agent, terrain);
            self.build_poly_path(&mut query, agent, terrain, &id);
        } else {
            self.build_shortcut();
            self.path_type = PathType::direct();
        }
        self.query = Some(query);

        if self.path_type.is_mesh_derived() {
            self.normalize_path(terrain);
        }

        debug_assert!(self.path.len() >= 2, "calculate produced a single point path");
        log::debug!(
            "path for {}: type {:?}, {} points, {} cells",
            id,
            self.path_type,
            self.path.len(),
            self.corridor.len()
        );
        true
    }

    fn build_poly_path(
        &mut self,
        query: &mut NavMeshQuery<'a>,
        agent: &dyn PathAgent,
        terrain: &dyn TerrainService,
        id: &str,
    ) {
        let start_point = to_nav(self.start);
        let mut end_point = to_nav(self.end);

        let start_loc = locate(query, self.corridor.cells(), &start_point, &self.filter, &self.config);
        let end_loc = locate(query, self.corridor.cells(), &end_point, &self.filter, &self.config);

        // A hole in the mesh: direct movement for swimmers and flyers only.
        if !start_loc.is_valid() || !end_loc.is_valid() {
            log::debug!(
                "{}: no cell for {}",
                id,
                if start_loc.is_valid() { "destination" } else { "start" }
            );
            self.build_shortcut();
            let submerged = (!start_loc.is_valid() && terrain.is_under_water(self.start))
                || (!end_loc.is_valid() && terrain.is_under_water(self.end));
            self.path_type = if self.may_move_directly(agent, submerged) {
                PathType::direct()
            } else {
                PathType::NOPATH
            };
            return;
        }

        let far = self.config.far_from_mesh_distance;
        let clamped = start_loc.distance > far || end_loc.distance > far;
        if clamped {
            log::debug!(
                "{}: far from mesh, start {:.3} end {:.3}",
                id,
                start_loc.distance,
                end_loc.distance
            );
            let far_point = if start_loc.distance > far { self.start } else { self.end };
            if self.may_move_directly(agent, terrain.is_under_water(far_point)) {
                self.build_shortcut();
                self.path_type = PathType::direct();
                return;
            }

            if let Ok((closest, _)) = query.closest_point_on_cell(end_loc.cell, &end_point) {
                end_point = closest;
                self.actual_end = from_nav(&closest);
            }
            self.path_type = PathType::INCOMPLETE;
        }

        if start_loc.cell == end_loc.cell {
            log::debug!("{}: start and end share cell {}", id, start_loc.cell);
            self.build_shortcut();
            self.corridor.set_single(start_loc.cell);
            self.path_type = if clamped { PathType::INCOMPLETE } else { PathType::NORMAL };
            return;
        }

        let start_index = self.corridor.find_forward(start_loc.cell);
        let end_index = start_index.and_then(|s| self.corridor.find_backward(end_loc.cell, s));

        match (start_index, end_index) {
            (Some(s), Some(e)) => {
                log::debug!("{}: reusing corridor range {}..={}", id, s, e);
                self.corridor.keep_range(s, e);
            }
            (Some(s), None) => {
                if !self.reuse_prefix(query, s, end_loc, &end_point, id) {
                    return;
                }
            }
            _ => {
                log::debug!("{}: full corridor search", id);
                self.clear();
                match query.find_path(
                    start_loc.cell,
                    end_loc.cell,
                    &start_point,
                    &end_point,
                    &self.filter,
                    self.config.corridor_capacity,
                ) {
                    Ok(cells) if !cells.is_empty() => self.corridor.replace(cells),
                    result => {
                        log::error!(
                            "path build failed for {}: 0 length path ({})",
                            id,
                            result.err().map_or_else(|| "empty".to_string(), |e| e.to_string())
                        );
                        self.build_shortcut();
                        self.path_type = PathType::NOPATH;
                        return;
                    }
                }
            }
        }

        self.path_type = if self.corridor.last() == Some(end_loc.cell) && !clamped {
            PathType::NORMAL
        } else {
            PathType::INCOMPLETE
        };

        self.build_point_path(query, &start_point, &end_point, id);
    }

    /// Keeps the front of the corridor from `start_index` and searches the rest
    ///
    /// Returns false when the corridor could not be anchored and a shortcut
    /// was built instead.
    fn reuse_prefix(
        &mut self,
        query: &mut NavMeshQuery<'a>,
        start_index: usize,
        end_loc: CellLocation,
        end_point: &[f32; 3],
        id: &str,
    ) -> bool {
        let remaining = self.corridor.len() - start_index;
        let mut prefix = prefix_length(remaining, self.config.prefix_retention).clamp(1, remaining);
        self.corridor.keep_prefix(start_index, prefix);

        // The seam cell may be an off-mesh link, which has no closest point;
        // step back one cell in that case.
        let mut anchor = None;
        for _ in 0..2 {
            let Some(seam) = self.corridor.last() else {
                break;
            };
            if let Ok((point, _)) = query.closest_point_on_cell(seam, end_point) {
                anchor = Some((seam, point));
                break;
            }
            if prefix <= 1 {
                break;
            }
            prefix -= 1;
            self.corridor.truncate(prefix);
        }

        let Some((seam, anchor)) = anchor else {
            log::debug!("{}: corridor prefix cannot be anchored", id);
            self.build_shortcut();
            self.path_type = PathType::NOPATH;
            return false;
        };

        let max_suffix = self.config.corridor_capacity.saturating_sub(prefix) + 1;
        let suffix_len = match query.find_path(
            seam,
            end_loc.cell,
            &anchor,
            end_point,
            &self.filter,
            max_suffix,
        ) {
            Ok(suffix) if !suffix.is_empty() => {
                self.corridor.stitch(&suffix);
                suffix.len()
            }
            _ => {
                // Keep the prefix; the next update will likely recover.
                log::error!("path build failed for {}: 0 length suffix", id);
                0
            }
        };

        log::debug!(
            "{}: prefix {} suffix {} corridor {}",
            id,
            prefix,
            suffix_len,
            self.corridor.len()
        );
        true
    }

    fn build_point_path(
        &mut self,
        query: &NavMeshQuery<'a>,
        start_point: &[f32; 3],
        end_point: &[f32; 3],
        id: &str,
    ) {
        let result = if self.use_straight_path {
            straight_point_path(query, start_point, end_point, self.corridor.cells(), self.point_path_limit)
        } else {
            smooth_point_path(
                query,
                &self.filter,
                &self.config,
                start_point,
                end_point,
                self.corridor.cells(),
                self.point_path_limit,
            )
        };

        let point_path: PointPath = match result {
            Ok(p) if p.points.len() >= 2 => p,
            Ok(p) => {
                log::debug!("{}: point path has {} points", id, p.points.len());
                self.build_shortcut();
                self.path_type = PathType::NOPATH;
                return;
            }
            Err(err) => {
                log::debug!("{}: point path failed: {}", id, err);
                self.build_shortcut();
                self.path_type = PathType::NOPATH;
                return;
            }
        };

        if point_path.truncated {
            self.path_type = PathType::INCOMPLETE;
        }

        self.path = point_path.points.iter().map(from_nav).collect();
        if let Some(last) = self.path.last() {
            self.actual_end = *last;
        }

        if self.force_destination
            && (!self.path_type.contains(PathType::NORMAL) || !in_range(self.end, self.actual_end, 1.0, 1.0))
        {
            let ratio = self.config.forced_destination_ratio;
            let end = self.end;
            if self.actual_end.distance_squared(end) < ratio * self.start.distance_squared(end) {
                self.actual_end = end;
                if let Some(last) = self.path.last_mut() {
                    *last = end;
                }
            } else {
                self.actual_end = end;
                self.build_shortcut();
            }
            self.path_type = PathType::direct();
        }

        log::debug!(
            "{}: point path type {:?}, {} points, {} cells",
            id,
            self.path_type,
            self.path.len(),
            self.corridor.len()
        );
    }

    /// Two point path from the start to the actual end
    fn build_shortcut(&mut self) {
        self.clear();
        self.path.push(self.start);
        self.path.push(self.actual_end);
        self.path_type = PathType::SHORTCUT;
    }

    /// Creatures that swim or fly may cross what the mesh does not cover
    fn may_move_directly(&self, agent: &dyn PathAgent, submerged: bool) -> bool {
        if !agent.kind().is_creature() {
            return false;
        }
        let capabilities = agent.capabilities();
        if submerged {
            capabilities.can_swim
        } else {
            capabilities.can_fly
        }
    }

    fn is_valid_coord(&self, p: Vec3) -> bool {
        let limit = self.config.world_half_size - 0.5;
        p.is_finite() && p.x.abs() <= limit && p.y.abs() <= limit
    }

    fn set_end_position(&mut self, point: Vec3) {
        self.end = point;
        self.actual_end = point;
    }

    /// Inserts midpoints where consecutive points differ too much in height
    pub fn normalize_path(&mut self, terrain: &dyn TerrainService) -> usize {
        let limits = NormalizeLimits {
            height_threshold: self.config.normalize_height_threshold,
            min_span: self.config.normalize_min_span,
            capacity: self.config.normalize_capacity,
        };
        normalize_points(&mut self.path, terrain, &limits)
    }

    /// Drops the corridor and the point path
    pub fn clear(&mut self) {
        self.corridor.clear();
        self.path.clear();
    }

    /// Waypoints of the last computation, agent position first
    pub fn path(&self) -> &[Vec3] {
        &self.path
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    /// Reachable end of the last path, which may differ from the destination
    pub fn actual_end_position(&self) -> Vec3 {
        self.actual_end
    }

    pub fn start_position(&self) -> Vec3 {
        self.start
    }

    /// Requested destination of the last computation
    pub fn end_position(&self) -> Vec3 {
        self.end
    }

    /// Cells of the current corridor
    pub fn corridor(&self) -> &[CellHandle] {
        self.corridor.cells()
    }

    pub fn config(&self) -> &PathFinderConfig {
        &self.config
    }

    /// Filter used by the last computation
    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    /// Mesh of the agent's map, if pathfinding is available there
    pub fn nav_mesh(&self) -> Option<&'a NavMesh> {
        self.nav_mesh
    }

    /// Returns true if the agent's map had a mesh when the engine was created
    pub fn has_mesh(&self) -> bool {
        self.query.is_some()
    }

    /// Chooses string pulling over smoothing
    pub fn set_use_straight_path(&mut self, use_straight_path: bool) {
        self.use_straight_path = use_straight_path;
    }

    /// Limits smoothed paths to roughly `distance` world units
    pub fn set_path_length_limit(&mut self, distance: f32) {
        let steps = (distance / self.config.smooth_step_size).max(0.0) as usize;
        self.point_path_limit = steps.clamp(2, self.config.point_path_capacity);
    }

    pub fn point_path_limit(&self) -> usize {
        self.point_path_limit
    }
}

/// Planar distance below `r` and height difference below `h` (world space)
fn in_range(a: Vec3, b: Vec3, r: f32, h: f32) -> bool {
    let d = a - b;
    d.x * d.x + d.y * d.y < r * r && d.z.abs() < h
}
