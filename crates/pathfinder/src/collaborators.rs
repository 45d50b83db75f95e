//! Interfaces the engine consumes from the surrounding world

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use movemap::NavMesh;

use crate::types::{AgentKind, Capabilities, TerrainMedium};

/// Source of navigation meshes, keyed by map and instance
pub trait MeshProvider {
    /// Returns true if a mesh is loaded for the map
    fn has_mesh(&self, map_id: u32) -> bool;

    /// Mesh of a map
    fn nav_mesh(&self, map_id: u32) -> Option<&NavMesh>;

    /// Mesh queries for one instance of a map run against
    fn nav_mesh_for_instance(&self, map_id: u32, instance_id: u32) -> Option<&NavMesh>;

    /// Whether the agent may use mesh pathfinding on the map at all
    fn is_pathfinding_enabled(&self, map_id: u32, agent: &dyn PathAgent) -> bool;
}

/// Liquid and ground height information of the world
pub trait TerrainService {
    fn is_under_water(&self, pos: Vec3) -> bool;

    fn terrain_medium_at(&self, pos: Vec3) -> TerrainMedium;

    /// Ground height under `pos`, if the terrain has data there
    fn ground_height_at(&self, pos: Vec3) -> Option<f32>;
}

/// The moving entity an engine computes paths for
pub trait PathAgent {
    fn position(&self) -> Vec3;

    fn capabilities(&self) -> Capabilities;

    fn map_id(&self) -> u32;

    fn instance_id(&self) -> u32;

    fn kind(&self) -> AgentKind;

    /// Agent is currently told to move without pathfinding
    fn ignores_pathfinding(&self) -> bool {
        false
    }

    fn is_in_water(&self) -> bool;

    fn is_under_water(&self) -> bool;

    /// Identifier used in log messages
    fn display_id(&self) -> String;
}

/// In-memory [`MeshProvider`] holding one mesh per map plus instance overrides
#[derive(Debug, Default)]
pub struct MapMeshes {
    maps: HashMap<u32, NavMesh>,
    instances: HashMap<(u32, u32), NavMesh>,
    disabled: HashSet<u32>,
}

impl MapMeshes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the mesh of a map, replacing any previous one
    pub fn insert(&mut self, map_id: u32, mesh: NavMesh) {
        log::debug!("registered navigation mesh for map {}", map_id);
        self.maps.insert(map_id, mesh);
    }

    /// Registers a mesh used by one instance of a map only
    pub fn insert_instance(&mut self, map_id: u32, instance_id: u32, mesh: NavMesh) {
        self.instances.insert((map_id, instance_id), mesh);
    }

    pub fn remove(&mut self, map_id: u32) -> Option<NavMesh> {
        self.instances.retain(|(map, _), _| *map != map_id);
        self.maps.remove(&map_id)
    }

    /// Turns mesh pathfinding off or on for a map
    pub fn set_pathfinding_enabled(&mut self, map_id: u32, enabled: bool) {
        if enabled {
            self.disabled.remove(&map_id);
        } else {
            self.disabled.insert(map_id);
        }
    }
}

impl MeshProvider for MapMeshes {
    fn has_mesh(&self, map_id: u32) -> bool {
        self.maps.contains_key(&map_id)
    }

    fn nav_mesh(&self, map_id: u32) -> Option<&NavMesh> {
        self.maps.get(&map_id)
    }

    fn nav_mesh_for_instance(&self, map_id: u32, instance_id: u32) -> Option<&NavMesh> {
        self.instances
            .get(&(map_id, instance_id))
            .or_else(|| self.maps.get(&map_id))
    }

    fn is_pathfinding_enabled(&self, map_id: u32, _agent: &dyn PathAgent) -> bool {
        !self.disabled.contains(&map_id)
    }
}
