//! Mock collaborators and world-space mesh builders for engine tests

use glam::Vec3;
use movemap::{CellFlags, NavMesh, NavMeshBuilder, NavMeshParams};
use movemap_common::Result;

use crate::collaborators::{MapMeshes, PathAgent, TerrainService};
use crate::types::{to_nav, AgentKind, Capabilities, TerrainMedium};

pub const TEST_MAP: u32 = 1;

/// Agent with directly settable state
#[derive(Debug, Clone)]
pub struct MockAgent {
    pub position: Vec3,
    pub capabilities: Capabilities,
    pub kind: AgentKind,
    pub map_id: u32,
    pub instance_id: u32,
    pub ignores_pathfinding: bool,
    pub in_water: bool,
    pub under_water: bool,
}

impl MockAgent {
    /// Walking creature on the test map
    pub fn creature(position: Vec3) -> Self {
        Self {
            position,
            capabilities: Capabilities::walker(),
            kind: AgentKind::Creature,
            map_id: TEST_MAP,
            instance_id: 0,
            ignores_pathfinding: false,
            in_water: false,
            under_water: false,
        }
    }

    pub fn player(position: Vec3) -> Self {
        Self {
            kind: AgentKind::Player,
            ..Self::creature(position)
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl PathAgent for MockAgent {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn map_id(&self) -> u32 {
        self.map_id
    }

    fn instance_id(&self) -> u32 {
        self.instance_id
    }

    fn kind(&self) -> AgentKind {
        self.kind
    }

    fn ignores_pathfinding(&self) -> bool {
        self.ignores_pathfinding
    }

    fn is_in_water(&self) -> bool {
        self.in_water
    }

    fn is_under_water(&self) -> bool {
        self.under_water
    }

    fn display_id(&self) -> String {
        format!("mock {:?} at {}", self.kind, self.position)
    }
}

type GroundFn = Box<dyn Fn(Vec3) -> Option<f32>>;

/// Terrain made of liquid boxes over an optional ground height function
#[derive(Default)]
pub struct MockTerrain {
    liquids: Vec<(Vec3, Vec3, TerrainMedium)>,
    ground: Option<GroundFn>,
}

impl MockTerrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_liquid(&mut self, min: Vec3, max: Vec3, medium: TerrainMedium) {
        self.liquids.push((min, max, medium));
    }

    pub fn set_ground(&mut self, ground: impl Fn(Vec3) -> Option<f32> + 'static) {
        self.ground = Some(Box::new(ground));
    }

    fn liquid_at(&self, pos: Vec3) -> Option<TerrainMedium> {
        self.liquids
            .iter()
            .find(|(min, max, _)| pos.cmpge(*min).all() && pos.cmple(*max).all())
            .map(|(_, _, medium)| *medium)
    }
}

impl TerrainService for MockTerrain {
    fn is_under_water(&self, pos: Vec3) -> bool {
        self.liquid_at(pos) == Some(TerrainMedium::Water)
    }

    fn terrain_medium_at(&self, pos: Vec3) -> TerrainMedium {
        self.liquid_at(pos).unwrap_or(TerrainMedium::Ground)
    }

    fn ground_height_at(&self, pos: Vec3) -> Option<f32> {
        self.ground.as_ref().and_then(|f| f(pos))
    }
}

pub fn test_params() -> NavMeshParams {
    NavMeshParams {
        origin: [-200.0, -200.0, -200.0],
        tile_width: 100.0,
        tile_height: 100.0,
        walkable_climb: 0.25,
    }
}

/// World-space rectangle `[x0, x1] x [y0, y1]` with per-corner heights from `z`
pub fn world_rect(x0: f32, y0: f32, x1: f32, y1: f32, z: impl Fn(f32, f32) -> f32) -> [[f32; 3]; 4] {
    [
        to_nav(Vec3::new(x0, y0, z(x0, y0))),
        to_nav(Vec3::new(x1, y0, z(x1, y0))),
        to_nav(Vec3::new(x1, y1, z(x1, y1))),
        to_nav(Vec3::new(x0, y1, z(x0, y1))),
    ]
}

/// Row of `n` cells along world +X; cell `i` spans `[4i, 4i + 4] x [0, 4]`
pub fn strip_mesh(n: usize, z: f32) -> Result<NavMesh> {
    strip_mesh_with(n, 4.0, |_| CellFlags::GROUND, move |_, _| z)
}

/// Row of `n` cells of width `width` with per-cell flags and a height field
pub fn strip_mesh_with(
    n: usize,
    width: f32,
    flags: impl Fn(usize) -> CellFlags,
    z: impl Fn(f32, f32) -> f32,
) -> Result<NavMesh> {
    let mut builder = NavMeshBuilder::new(test_params());
    for i in 0..n {
        let x0 = i as f32 * width;
        builder.add_cell(&world_rect(x0, 0.0, x0 + width, width, &z), flags(i), 0)?;
    }
    builder.build()
}

/// One large flat cell covering `[-20, 20] x [-20, 20]`
pub fn single_cell_mesh() -> Result<NavMesh> {
    let mut builder = NavMeshBuilder::new(test_params());
    builder.add_cell(&world_rect(-20.0, -20.0, 20.0, 20.0, |_, _| 0.0), CellFlags::GROUND, 0)?;
    builder.build()
}

/// Two strips joined by a one-way off-mesh link
///
/// Island A holds cells 0 and 1 (`x in [0, 8]`), island B cells 2 to 5
/// (`x in [16, 32]`), all `y in [0, 4]`. The link (cell 6) runs from
/// `(6, 2, 0)` to `(18, 2, 0)`.
pub fn linked_islands_mesh() -> Result<NavMesh> {
    let mut builder = NavMeshBuilder::new(test_params());
    for x0 in [0.0, 4.0, 16.0, 20.0, 24.0, 28.0] {
        builder.add_cell(&world_rect(x0, 0.0, x0 + 4.0, 4.0, |_, _| 0.0), CellFlags::GROUND, 0)?;
    }
    builder.add_off_mesh_link(
        to_nav(Vec3::new(6.0, 2.0, 0.0)),
        to_nav(Vec3::new(18.0, 2.0, 0.0)),
        1.0,
        false,
        CellFlags::GROUND,
        0,
    );
    builder.build()
}

/// Registry holding `mesh` as the test map
pub fn meshes_with(mesh: NavMesh) -> MapMeshes {
    let mut meshes = MapMeshes::new();
    meshes.insert(TEST_MAP, mesh);
    meshes
}

pub fn assert_vec_near(a: Vec3, b: Vec3) {
    assert!(a.abs_diff_eq(b, 1e-3), "{} != {}", a, b);
}

/// The test map mesh of a registry built by [`meshes_with`]
pub fn meshes_mesh(meshes: &MapMeshes) -> &NavMesh {
    use crate::collaborators::MeshProvider;
    meshes.nav_mesh(TEST_MAP).expect("test map mesh")
}
