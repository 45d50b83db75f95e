//! CLI utility for running pathfinding queries against JSON scenes

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use movemap::{CellFlags, NavMesh, NavMeshBuilder, NavMeshParams, NavMeshQuery, QueryFilter};
use pathfinder::{
    from_nav, to_nav, AgentKind, Capabilities, MapMeshes, PathAgent, PathFinder,
    PathFinderConfig, PathType, TerrainMedium, TerrainService,
};

/// Map id the scene mesh is registered under
const SCENE_MAP: u32 = 0;

/// A CLI utility for pathfinding on convex-cell navigation meshes
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a path from the scene agent to a destination
    FindPath {
        /// Scene file (JSON)
        #[clap(long, value_parser)]
        scene: PathBuf,

        /// Destination (x,y,z, z up)
        #[clap(long, value_parser = parse_vector)]
        dest: Vec3,

        /// Use corner waypoints instead of the smoothed walk
        #[clap(long)]
        straight: bool,

        /// End the path exactly at the destination
        #[clap(long)]
        force: bool,

        /// Output file for the result (JSON)
        #[clap(long, value_parser)]
        output: Option<PathBuf>,
    },

    /// Find the cell nearest to a point
    Locate {
        /// Scene file (JSON)
        #[clap(long, value_parser)]
        scene: PathBuf,

        /// Point to look up (x,y,z, z up)
        #[clap(long, value_parser = parse_vector)]
        point: Vec3,
    },
}

/// Ground cell of a scene, vertices in world space
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneCell {
    verts: Vec<Vec3>,
    #[serde(default = "default_media")]
    media: Vec<TerrainMedium>,
    #[serde(default)]
    area: u8,
}

/// Off-mesh link of a scene
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneLink {
    start: Vec3,
    end: Vec3,
    #[serde(default = "default_link_radius")]
    radius: f32,
    #[serde(default)]
    bidirectional: bool,
}

/// Axis-aligned liquid volume
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneLiquid {
    min: Vec3,
    max: Vec3,
    medium: TerrainMedium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneAgent {
    position: Vec3,
    #[serde(default = "default_agent_kind")]
    kind: AgentKind,
    #[serde(default)]
    capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scene {
    cells: Vec<SceneCell>,
    #[serde(default)]
    links: Vec<SceneLink>,
    #[serde(default)]
    liquids: Vec<SceneLiquid>,
    agent: SceneAgent,
    #[serde(default)]
    config: Option<PathFinderConfig>,
    #[serde(default = "default_tile_size")]
    tile_size: f32,
    #[serde(default = "default_walkable_climb")]
    walkable_climb: f32,
}

fn default_media() -> Vec<TerrainMedium> {
    vec![TerrainMedium::Ground]
}

fn default_link_radius() -> f32 {
    1.0
}

fn default_agent_kind() -> AgentKind {
    AgentKind::Creature
}

fn default_tile_size() -> f32 {
    533.333_3
}

fn default_walkable_climb() -> f32 {
    0.25
}

/// Result of a `find-path` run
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PathReport {
    path_type: String,
    corridor_len: usize,
    points: Vec<Vec3>,
    actual_end: Vec3,
}

/// Terrain backed by the scene's liquid volumes
struct SceneTerrain<'s> {
    liquids: &'s [SceneLiquid],
}

impl SceneTerrain<'_> {
    fn liquid_at(&self, pos: Vec3) -> Option<&SceneLiquid> {
        self.liquids
            .iter()
            .find(|l| pos.cmpge(l.min).all() && pos.cmple(l.max).all())
    }
}

impl TerrainService for SceneTerrain<'_> {
    fn is_under_water(&self, pos: Vec3) -> bool {
        self.liquid_at(pos)
            .is_some_and(|l| l.medium == TerrainMedium::Water)
    }

    fn terrain_medium_at(&self, pos: Vec3) -> TerrainMedium {
        self.liquid_at(pos)
            .map_or(TerrainMedium::Ground, |l| l.medium)
    }

    fn ground_height_at(&self, _pos: Vec3) -> Option<f32> {
        None
    }
}

struct Agent {
    desc: SceneAgent,
    in_water: bool,
    under_water: bool,
}

impl PathAgent for Agent {
    fn position(&self) -> Vec3 {
        self.desc.position
    }

    fn capabilities(&self) -> Capabilities {
        self.desc.capabilities
    }

    fn map_id(&self) -> u32 {
        SCENE_MAP
    }

    fn instance_id(&self) -> u32 {
        0
    }

    fn kind(&self) -> AgentKind {
        self.desc.kind
    }

    fn is_in_water(&self) -> bool {
        self.in_water
    }

    fn is_under_water(&self) -> bool {
        self.under_water
    }

    fn display_id(&self) -> String {
        "scene agent".to_string()
    }
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::FindPath {
            scene,
            dest,
            straight,
            force,
            output,
        } => {
            let report = find_path(&scene, dest, straight, force)?;
            print_report(&report);
            if let Some(output) = output {
                save_report(&report, &output)?;
            }
            Ok(())
        }
        Commands::Locate { scene, point } => locate(&scene, point),
    }
}

fn load_scene(path: &Path) -> Result<Scene> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open scene file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse scene file: {}", path.display()))
}

/// Builds the navigation mesh described by a scene
fn build_mesh(scene: &Scene) -> Result<NavMesh> {
    let mut origin = [f32::MAX; 3];
    for v in scene.cells.iter().flat_map(|c| c.verts.iter()) {
        let n = to_nav(*v);
        for k in 0..3 {
            origin[k] = origin[k].min(n[k]);
        }
    }
    if scene.cells.is_empty() {
        origin = [0.0; 3];
    }

    let mut builder = NavMeshBuilder::new(NavMeshParams {
        origin,
        tile_width: scene.tile_size,
        tile_height: scene.tile_size,
        walkable_climb: scene.walkable_climb,
    });

    for (i, cell) in scene.cells.iter().enumerate() {
        let verts: Vec<[f32; 3]> = cell.verts.iter().map(|v| to_nav(*v)).collect();
        let flags = cell
            .media
            .iter()
            .fold(CellFlags::empty(), |acc, m| acc | m.cell_flags());
        builder
            .add_cell(&verts, flags, cell.area)
            .with_context(|| format!("Invalid scene cell {}", i))?;
    }

    for link in &scene.links {
        builder.add_off_mesh_link(
            to_nav(link.start),
            to_nav(link.end),
            link.radius,
            link.bidirectional,
            CellFlags::GROUND,
            0,
        );
    }

    builder.build().context("Failed to build navigation mesh")
}

/// Run one path calculation over a scene
fn find_path(scene_path: &Path, dest: Vec3, straight: bool, force: bool) -> Result<PathReport> {
    let scene = load_scene(scene_path)?;
    let mesh = build_mesh(&scene)?;
    log::debug!("scene mesh built with {} cells", mesh.cell_count());

    let mut meshes = MapMeshes::new();
    meshes.insert(SCENE_MAP, mesh);

    let terrain = SceneTerrain {
        liquids: &scene.liquids,
    };
    let position = scene.agent.position;
    let agent = Agent {
        desc: scene.agent.clone(),
        in_water: terrain.terrain_medium_at(position) != TerrainMedium::Ground,
        under_water: terrain.is_under_water(position),
    };

    let config = scene.config.clone().unwrap_or_default();
    let mut finder = PathFinder::with_config(&agent, &meshes, config)
        .context("Invalid pathfinder configuration")?;
    if straight {
        finder.set_use_straight_path(true);
    }

    if !finder.calculate(&agent, &terrain, dest, force) {
        return Err(anyhow!(
            "Start {} or destination {} lies outside the world",
            position,
            dest
        ));
    }

    Ok(PathReport {
        path_type: path_type_name(finder.path_type()),
        corridor_len: finder.corridor().len(),
        points: finder.path().to_vec(),
        actual_end: finder.actual_end_position(),
    })
}

fn path_type_name(path_type: PathType) -> String {
    let names: Vec<&str> = path_type.iter_names().map(|(name, _)| name).collect();
    if names.is_empty() {
        "BLANK".to_string()
    } else {
        names.join(" | ")
    }
}

fn print_report(report: &PathReport) {
    println!("Path type: {}", report.path_type);
    println!("Corridor: {} cells", report.corridor_len);
    println!("Actual end: {},{},{}", report.actual_end.x, report.actual_end.y, report.actual_end.z);
    println!("Path:");
    for (i, p) in report.points.iter().enumerate() {
        println!("{}: {},{},{}", i, p.x, p.y, p.z);
    }
}

fn save_report(report: &PathReport, output: &Path) -> Result<()> {
    println!("Saving path to {}...", output.display());
    let mut file = File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let json = serde_json::to_string_pretty(report)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

/// Print the cell nearest to a point
fn locate(scene_path: &Path, point: Vec3) -> Result<()> {
    let scene = load_scene(scene_path)?;
    let mesh = build_mesh(&scene)?;
    let query = NavMeshQuery::new(&mesh);
    let config = scene.config.clone().unwrap_or_default();

    let (cell, nearest) = query
        .find_nearest_cell(&to_nav(point), &config.tall_search_extents, &QueryFilter::default())
        .map_err(|e| anyhow!("No cell near {}: {}", point, e))?;
    let nearest = from_nav(&nearest);

    println!("Cell: {}", cell);
    println!("Nearest point: {},{},{}", nearest.x, nearest.y, nearest.z);
    println!("Distance: {}", nearest.distance(point));
    Ok(())
}
