//! Mesh builders shared by the query tests

use crate::{CellFlags, NavMesh, NavMeshBuilder, NavMeshParams};
use movemap_common::Result;

/// Axis-aligned square cell on the plane `y`
pub fn quad(x0: f32, z0: f32, x1: f32, z1: f32, y: f32) -> [[f32; 3]; 4] {
    [[x0, y, z0], [x1, y, z0], [x1, y, z1], [x0, y, z1]]
}

pub fn default_params() -> NavMeshParams {
    NavMeshParams {
        origin: [0.0, 0.0, 0.0],
        tile_width: 2.0,
        tile_height: 2.0,
        walkable_climb: 0.25,
    }
}

/// Row of `n` square cells along +X; cell `i` spans `[i, i + 1] x [0, 1]`
pub fn create_strip_mesh(n: usize) -> Result<NavMesh> {
    create_strip_mesh_with_flags(&vec![CellFlags::GROUND; n])
}

/// Row of square cells along +X with per-cell flags
pub fn create_strip_mesh_with_flags(flags: &[CellFlags]) -> Result<NavMesh> {
    let mut builder = NavMeshBuilder::new(default_params());
    for (i, f) in flags.iter().enumerate() {
        let x = i as f32;
        builder.add_cell(&quad(x, 0.0, x + 1.0, 1.0, 0.0), *f, 0)?;
    }
    builder.build()
}

/// `nx` by `nz` grid of unit cells; cell `(x, z)` has index `z * nx + x`
pub fn create_grid_mesh(nx: usize, nz: usize, area: impl Fn(usize, usize) -> u8) -> Result<NavMesh> {
    let mut builder = NavMeshBuilder::new(default_params());
    for z in 0..nz {
        for x in 0..nx {
            let (fx, fz) = (x as f32, z as f32);
            builder.add_cell(
                &quad(fx, fz, fx + 1.0, fz + 1.0, 0.0),
                CellFlags::GROUND,
                area(x, z),
            )?;
        }
    }
    builder.build()
}

/// Three cells along +X followed by two cells along +Z from the last one
///
/// Cell indices: 0 `[0,1]x[0,1]`, 1 `[1,2]x[0,1]`, 2 `[2,3]x[0,1]`,
/// 3 `[2,3]x[1,2]`, 4 `[2,3]x[2,3]`.
pub fn create_l_shaped_mesh() -> Result<NavMesh> {
    let mut builder = NavMeshBuilder::new(default_params());
    for (x0, z0) in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0)] {
        builder.add_cell(&quad(x0, z0, x0 + 1.0, z0 + 1.0, 0.0), CellFlags::GROUND, 0)?;
    }
    builder.build()
}

/// Two islands of two cells each, joined by an off-mesh link
///
/// Island A spans `[0,2]x[0,1]` (cells 0, 1), island B spans `[4,6]x[0,1]`
/// (cells 2, 3). The link (cell 4) runs from `(1.5, 0, 0.5)` to `(4.5, 0, 0.5)`.
pub fn create_islands_with_link(bidirectional: bool) -> Result<NavMesh> {
    let mut builder = NavMeshBuilder::new(default_params());
    builder.add_cell(&quad(0.0, 0.0, 1.0, 1.0, 0.0), CellFlags::GROUND, 0)?;
    builder.add_cell(&quad(1.0, 0.0, 2.0, 1.0, 0.0), CellFlags::GROUND, 0)?;
    builder.add_cell(&quad(4.0, 0.0, 5.0, 1.0, 0.0), CellFlags::GROUND, 0)?;
    builder.add_cell(&quad(5.0, 0.0, 6.0, 1.0, 0.0), CellFlags::GROUND, 0)?;
    builder.add_off_mesh_link(
        [1.5, 0.0, 0.5],
        [4.5, 0.0, 0.5],
        0.5,
        bidirectional,
        CellFlags::GROUND,
        0,
    );
    builder.build()
}
