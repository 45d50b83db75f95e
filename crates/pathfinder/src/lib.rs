//! Per-agent pathfinding over movemap navigation meshes
//!
//! [`PathFinder`] turns an agent position and a destination into waypoints
//! and a [`PathType`] telling the caller how far the path can be trusted.
//! Corridors are reused between calls, smoothed paths hop across off-mesh
//! links, and whenever the mesh cannot help the engine falls back to a
//! straight shortcut instead of failing.
//!
//! The world around the engine is reached through the [`MeshProvider`],
//! [`TerrainService`] and [`PathAgent`] traits.

mod collaborators;
mod config;
mod corridor;
mod filter;
mod locator;
mod normalize;
mod path_finder;
mod point_path;
mod types;

#[cfg(test)]
mod test_support;


pub use collaborators::{MapMeshes, MeshProvider, PathAgent, TerrainService};
pub use config::{PathFinderConfig, DEFAULT_CORRIDOR_CAPACITY, DEFAULT_POINT_PATH_CAPACITY};
pub use corridor::{merge_corridor_start_moved, prefix_length, Corridor};
pub use filter::{agent_filter, refresh_filter};
pub use locator::{locate, CellLocation};
pub use normalize::{normalize_points, NormalizeLimits};
pub use path_finder::PathFinder;
pub use point_path::{smooth_point_path, straight_point_path, PointPath};
pub use types::{from_nav, to_nav, AgentKind, Capabilities, PathType, TerrainMedium};
