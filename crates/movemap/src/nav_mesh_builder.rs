//! Assembles a [`NavMesh`] from convex polygons and off-mesh links
//!
//! Adjacency is inferred from shared edges: two cells are neighbours when one
//! of their edges has the same two endpoints (after quantization). Off-mesh
//! link endpoints are attached to the nearest ground cell within the link
//! radius.

use std::collections::HashMap;

use super::nav_mesh::{external_link, Cell, Link, NavMesh, NavMeshParams, OffMeshLink};
use super::{CellFlags, CellType, MAX_VERTS_PER_CELL};
use movemap_common::{dist_sqr_2d, poly_area_2d, Error, Result};

/// Vertices closer than this are considered identical when matching edges
const VERTEX_WELD_SCALE: f32 = 1000.0;

/// Minimum doubled cell area accepted on the XZ plane
const MIN_CELL_AREA: f32 = 1e-6;

type VertKey = [i64; 3];

fn vert_key(v: &[f32; 3]) -> VertKey {
    [
        (v[0] * VERTEX_WELD_SCALE).round() as i64,
        (v[1] * VERTEX_WELD_SCALE).round() as i64,
        (v[2] * VERTEX_WELD_SCALE).round() as i64,
    ]
}

#[derive(Debug, Clone)]
struct PendingLink {
    start: [f32; 3],
    end: [f32; 3],
    radius: f32,
    bidirectional: bool,
    flags: CellFlags,
    area: u8,
}

/// Builder for navigation meshes
#[derive(Debug, Default)]
pub struct NavMeshBuilder {
    params: NavMeshParams,
    cells: Vec<Cell>,
    links: Vec<PendingLink>,
}

impl NavMeshBuilder {
    /// Creates an empty builder
    pub fn new(params: NavMeshParams) -> Self {
        Self {
            params,
            cells: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Adds a convex ground cell and returns its index
    ///
    /// Vertices may be given in either winding; they are stored in the order
    /// the queries expect.
    pub fn add_cell(&mut self, verts: &[[f32; 3]], flags: CellFlags, area: u8) -> Result<usize> {
        if verts.len() < 3 || verts.len() > MAX_VERTS_PER_CELL {
            return Err(Error::InvalidMesh(format!(
                "cell {} has {} vertices, expected 3..={}",
                self.cells.len(),
                verts.len(),
                MAX_VERTS_PER_CELL
            )));
        }
        if verts.iter().flatten().any(|c| !c.is_finite()) {
            return Err(Error::InvalidMesh(format!(
                "cell {} has non-finite vertices",
                self.cells.len()
            )));
        }

        let mut verts = verts.to_vec();
        let area2 = poly_area_2d(&verts);
        if area2.abs() < MIN_CELL_AREA {
            return Err(Error::InvalidMesh(format!(
                "cell {} is degenerate on the XZ plane",
                self.cells.len()
            )));
        }
        if area2 < 0.0 {
            verts.reverse();
        }

        self.cells
            .push(Cell::new(verts, flags, area, CellType::Ground));
        Ok(self.cells.len() - 1)
    }

    /// Adds an off-mesh link between two points on the mesh
    pub fn add_off_mesh_link(
        &mut self,
        start: [f32; 3],
        end: [f32; 3],
        radius: f32,
        bidirectional: bool,
        flags: CellFlags,
        area: u8,
    ) -> &mut Self {
        self.links.push(PendingLink {
            start,
            end,
            radius,
            bidirectional,
            flags,
            area,
        });
        self
    }

    /// Connects the cells and produces the mesh
    pub fn build(self) -> Result<NavMesh> {
        let NavMeshBuilder {
            params,
            mut cells,
            links,
        } = self;

        if cells.is_empty() {
            return Err(Error::InvalidMesh("mesh has no cells".to_string()));
        }

        connect_shared_edges(&mut cells);

        let ground_count = cells.len();
        let mut off_mesh_links = Vec::with_capacity(links.len());
        for (i, link) in links.into_iter().enumerate() {
            let climb = params.walkable_climb.max(link.radius);
            let (start_cell, start) = find_landing(&cells[..ground_count], &link.start, link.radius, climb)
                .ok_or_else(|| {
                    Error::InvalidMesh(format!("off-mesh link {} start does not land on a cell", i))
                })?;
            let (end_cell, end) = find_landing(&cells[..ground_count], &link.end, link.radius, climb)
                .ok_or_else(|| {
                    Error::InvalidMesh(format!("off-mesh link {} end does not land on a cell", i))
                })?;

            let index = cells.len() as u32;
            let mut cell = Cell::new(vec![start, end], link.flags, link.area, CellType::OffMeshLink);
            cell.links.push(Link {
                target: start_cell as u32,
                edge: 0,
            });
            cell.links.push(Link {
                target: end_cell as u32,
                edge: 1,
            });
            cells.push(cell);

            cells[start_cell].links.push(external_link(index));
            if link.bidirectional {
                cells[end_cell].links.push(external_link(index));
            }

            off_mesh_links.push(OffMeshLink {
                start,
                end,
                radius: link.radius,
                bidirectional: link.bidirectional,
                cell: index,
            });
        }

        NavMesh::from_parts(params, cells, off_mesh_links)
    }
}

fn connect_shared_edges(cells: &mut [Cell]) {
    let mut edges: HashMap<(VertKey, VertKey), Vec<(u32, u8)>> = HashMap::new();

    for (ci, cell) in cells.iter().enumerate() {
        let n = cell.verts.len();
        for e in 0..n {
            let a = vert_key(&cell.verts[e]);
            let b = vert_key(&cell.verts[(e + 1) % n]);
            let key = if a <= b { (a, b) } else { (b, a) };
            edges.entry(key).or_default().push((ci as u32, e as u8));
        }
    }

    for sides in edges.values() {
        if sides.len() > 2 {
            log::warn!(
                "edge shared by {} cells, linking the first two only",
                sides.len()
            );
        }
        if let [(ca, ea), (cb, eb), ..] = sides.as_slice() {
            if ca == cb {
                continue;
            }
            cells[*ca as usize].links.push(Link {
                target: *cb,
                edge: *ea,
            });
            cells[*cb as usize].links.push(Link {
                target: *ca,
                edge: *eb,
            });
        }
    }
}

/// Nearest ground cell to `p` within `radius` horizontally and `climb` vertically
fn find_landing(cells: &[Cell], p: &[f32; 3], radius: f32, climb: f32) -> Option<(usize, [f32; 3])> {
    let mut best: Option<(usize, [f32; 3], f32)> = None;

    for (i, cell) in cells.iter().enumerate() {
        if p[0] < cell.bmin[0] - radius
            || p[0] > cell.bmax[0] + radius
            || p[2] < cell.bmin[2] - radius
            || p[2] > cell.bmax[2] + radius
        {
            continue;
        }

        let (inside, edge_dists, edge_ts) = movemap_common::distance_pt_poly_edges_sqr(p, &cell.verts);
        let n = cell.verts.len();
        let point = if inside {
            let v = &cell.verts;
            let h = (1..n - 1)
                .find_map(|k| movemap_common::closest_height_on_triangle(p, &v[0], &v[k], &v[k + 1]))
                .unwrap_or(p[1]);
            [p[0], h, p[2]]
        } else {
            let (edge, d) = edge_dists
                .iter()
                .enumerate()
                .fold((0, f32::MAX), |acc, (k, d)| if *d < acc.1 { (k, *d) } else { acc });
            if d > radius * radius {
                continue;
            }
            movemap_common::vlerp(&cell.verts[edge], &cell.verts[(edge + 1) % n], edge_ts[edge])
        };

        if (point[1] - p[1]).abs() > climb {
            continue;
        }

        let d = dist_sqr_2d(p, &point) + (point[1] - p[1]) * (point[1] - p[1]);
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((i, point, d));
        }
    }

    best.map(|(i, point, _)| (i, point))
}
