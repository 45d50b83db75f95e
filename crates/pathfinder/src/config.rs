//! Tuning parameters of the pathfinding engine

use movemap_common::{Error, Result};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Default maximum number of cells in a corridor
pub const DEFAULT_CORRIDOR_CAPACITY: usize = 74;

/// Default maximum number of points in a point path
pub const DEFAULT_POINT_PATH_CAPACITY: usize = 74;

/// Half size of the playable world along X and Y
pub const DEFAULT_WORLD_HALF_SIZE: f32 = 32.0 * 533.333_3;

/// Configuration of a [`crate::PathFinder`]
///
/// All distances are in world units. The defaults are the values the engine
/// has always been tuned with; none of them is structural.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct PathFinderConfig {
    /// Distance from the mesh beyond which an endpoint counts as far
    pub far_from_mesh_distance: f32,
    /// Forced destinations replace the last point when the miss is below
    /// this share of the squared start to destination distance
    pub forced_destination_ratio: f32,
    /// Share of the remaining corridor kept when only the start is reused
    pub prefix_retention: f32,
    /// Maximum number of cells in a corridor
    pub corridor_capacity: usize,
    /// Maximum number of points in a point path
    pub point_path_capacity: usize,
    /// Always string-pull instead of walking the corridor
    pub use_straight_path: bool,

    /// Length of one smoothing step
    pub smooth_step_size: f32,
    /// Distance at which a steer target counts as reached
    pub smooth_slop: f32,
    /// Height added above the surface to smoothed points
    pub height_clearance: f32,
    /// Corners considered when picking a steer target
    pub max_steer_points: usize,
    /// Cells a single surface move may visit
    pub max_visit_cells: usize,

    /// Squared planar distance under which a corridor cell match stops the scan
    pub corridor_early_stop_sqr: f32,
    /// Squared planar distance under which a corridor cell is accepted
    pub corridor_accept_dist_sqr: f32,
    /// Half extents (horizontal, vertical, horizontal) of the first nearest cell search
    pub near_search_extents: [f32; 3],
    /// Half extents of the second, taller nearest cell search
    pub tall_search_extents: [f32; 3],

    /// Largest elevation change allowed between two path points
    pub normalize_height_threshold: f32,
    /// Pairs closer than this on the ground plane are never split
    pub normalize_min_span: f32,
    /// Point count at which the normalizer stops inserting
    pub normalize_capacity: usize,

    /// Coordinates beyond this along X or Y are rejected
    pub world_half_size: f32,
}

impl Default for PathFinderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PathFinderConfig {
    pub fn new() -> Self {
        Self {
            far_from_mesh_distance: 7.0,
            forced_destination_ratio: 0.3,
            prefix_retention: 0.8,
            corridor_capacity: DEFAULT_CORRIDOR_CAPACITY,
            point_path_capacity: DEFAULT_POINT_PATH_CAPACITY,
            use_straight_path: false,
            smooth_step_size: 4.0,
            smooth_slop: 0.3,
            height_clearance: 0.5,
            max_steer_points: 3,
            max_visit_cells: 16,
            corridor_early_stop_sqr: 1.0,
            corridor_accept_dist_sqr: 3.0,
            near_search_extents: [3.0, 5.0, 3.0],
            tall_search_extents: [3.0, 200.0, 3.0],
            normalize_height_threshold: 1.0,
            normalize_min_span: 0.1,
            normalize_capacity: 4 * DEFAULT_POINT_PATH_CAPACITY,
            world_half_size: DEFAULT_WORLD_HALF_SIZE,
        }
    }

    pub fn with_far_from_mesh_distance(mut self, distance: f32) -> Self {
        self.far_from_mesh_distance = distance;
        self
    }

    pub fn with_forced_destination_ratio(mut self, ratio: f32) -> Self {
        self.forced_destination_ratio = ratio;
        self
    }

    pub fn with_prefix_retention(mut self, retention: f32) -> Self {
        self.prefix_retention = retention;
        self
    }

    pub fn with_corridor_capacity(mut self, capacity: usize) -> Self {
        self.corridor_capacity = capacity;
        self
    }

    pub fn with_point_path_capacity(mut self, capacity: usize) -> Self {
        self.point_path_capacity = capacity;
        self
    }

    pub fn with_straight_path(mut self, use_straight_path: bool) -> Self {
        self.use_straight_path = use_straight_path;
        self
    }

    pub fn with_smooth_step_size(mut self, step: f32) -> Self {
        self.smooth_step_size = step;
        self
    }

    pub fn with_smooth_slop(mut self, slop: f32) -> Self {
        self.smooth_slop = slop;
        self
    }

    pub fn with_height_clearance(mut self, clearance: f32) -> Self {
        self.height_clearance = clearance;
        self
    }

    pub fn with_normalize_height_threshold(mut self, threshold: f32) -> Self {
        self.normalize_height_threshold = threshold;
        self
    }

    pub fn with_world_half_size(mut self, half_size: f32) -> Self {
        self.world_half_size = half_size;
        self
    }

    /// Checks that the configuration can drive the engine
    pub fn validate(&self) -> Result<()> {
        let invalid = |what: &str| -> Result<()> {
            log::warn!("rejected pathfinder configuration: {}", what);
            Err(Error::Config(what.to_string()))
        };

        if self.corridor_capacity == 0 || self.point_path_capacity < 2 {
            return invalid("corridor capacity must be positive and point capacity at least 2");
        }
        if self.max_steer_points == 0 || self.max_visit_cells == 0 {
            return invalid("steer and visit budgets must be positive");
        }
        if !(self.forced_destination_ratio > 0.0 && self.forced_destination_ratio <= 1.0) {
            return invalid("forced destination ratio must be in (0, 1]");
        }
        if !(self.prefix_retention > 0.0 && self.prefix_retention <= 1.0) {
            return invalid("prefix retention must be in (0, 1]");
        }
        if self.smooth_step_size <= 0.0 || self.world_half_size <= 0.0 {
            return invalid("step size and world size must be positive");
        }

        let distances = [
            self.far_from_mesh_distance,
            self.smooth_slop,
            self.height_clearance,
            self.corridor_early_stop_sqr,
            self.corridor_accept_dist_sqr,
            self.normalize_height_threshold,
            self.normalize_min_span,
        ];
        if distances.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return invalid("distances must be finite and non-negative");
        }
        if self
            .near_search_extents
            .iter()
            .chain(self.tall_search_extents.iter())
            .any(|e| *e <= 0.0)
        {
            return invalid("search extents must be positive");
        }
        if self.normalize_capacity < self.point_path_capacity {
            return invalid("normalizer capacity must hold a full point path");
        }
        Ok(())
    }
}
