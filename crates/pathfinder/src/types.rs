//! Value types shared by the engine components

use bitflags::bitflags;
use glam::Vec3;
use movemap::CellFlags;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// Classification of a computed path
    ///
    /// `NOT_USING_PATH` is orthogonal to the other bits: the mesh was bypassed
    /// even though mesh data exists.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PathType: u32 {
        /// Nothing computed yet
        const BLANK = 0x00;
        /// The corridor connects start and destination
        const NORMAL = 0x01;
        /// Straight line, mesh not consulted
        const SHORTCUT = 0x02;
        /// The corridor only reaches part of the way
        const INCOMPLETE = 0x04;
        /// The destination cannot be reached
        const NOPATH = 0x08;
        /// The agent moves directly even though a mesh exists
        const NOT_USING_PATH = 0x10;
    }
}

impl PathType {
    /// Direct movement accepted as a valid path
    pub fn direct() -> Self {
        PathType::NORMAL | PathType::NOT_USING_PATH
    }

    /// Returns true for corridor-derived results (normal or incomplete)
    pub fn is_mesh_derived(&self) -> bool {
        self.intersects(PathType::NORMAL | PathType::INCOMPLETE)
            && !self.intersects(PathType::NOT_USING_PATH | PathType::SHORTCUT | PathType::NOPATH)
    }
}

/// Kind of entity that owns an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "snake_case"))]
pub enum AgentKind {
    Player,
    Creature,
}

impl AgentKind {
    pub fn is_creature(&self) -> bool {
        matches!(self, AgentKind::Creature)
    }
}

/// Movement capabilities of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct Capabilities {
    pub can_walk: bool,
    pub can_swim: bool,
    pub can_fly: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::walker()
    }
}

impl Capabilities {
    /// Walks only
    pub fn walker() -> Self {
        Self {
            can_walk: true,
            can_swim: false,
            can_fly: false,
        }
    }

    pub fn with_swim(mut self, can_swim: bool) -> Self {
        self.can_swim = can_swim;
        self
    }

    pub fn with_fly(mut self, can_fly: bool) -> Self {
        self.can_fly = can_fly;
        self
    }
}

/// Physical medium at a world position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "snake_case"))]
pub enum TerrainMedium {
    #[default]
    Ground,
    Water,
    Lava,
    Slime,
}

impl TerrainMedium {
    /// Cell flag that covers this medium
    pub fn cell_flags(&self) -> CellFlags {
        match self {
            TerrainMedium::Ground => CellFlags::GROUND,
            TerrainMedium::Water => CellFlags::WATER,
            TerrainMedium::Lava => CellFlags::MAGMA,
            TerrainMedium::Slime => CellFlags::SLIME,
        }
    }
}

/// World position (z up) to navigation coordinates (y up)
pub fn to_nav(p: Vec3) -> [f32; 3] {
    [p.y, p.z, p.x]
}

/// Navigation coordinates back to a world position
pub fn from_nav(v: &[f32; 3]) -> Vec3 {
    Vec3::new(v[2], v[0], v[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_coordinates_round_trip() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(to_nav(p), [2.0, 3.0, 1.0]);
        assert_eq!(from_nav(&to_nav(p)), p);
    }

    #[test]
    fn test_mesh_derived_classification() {
        assert!(PathType::NORMAL.is_mesh_derived());
        assert!(PathType::INCOMPLETE.is_mesh_derived());
        assert!(!PathType::direct().is_mesh_derived());
        assert!(!PathType::NOPATH.is_mesh_derived());
        assert!(!PathType::BLANK.is_mesh_derived());
    }

    #[test]
    fn test_medium_flags() {
        assert_eq!(TerrainMedium::Lava.cell_flags(), CellFlags::MAGMA);
        assert_eq!(TerrainMedium::Water.cell_flags(), CellFlags::WATER);
    }
}
