//! Resolves positions to cells, preferring the current corridor

use movemap::{CellHandle, NavMeshQuery, QueryFilter};
use movemap_common::{dist_sqr_2d, vdist};

use crate::config::PathFinderConfig;

/// Cell found for a position and the distance from the position to its surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLocation {
    pub cell: CellHandle,
    pub distance: f32,
}

impl CellLocation {
    fn invalid() -> Self {
        Self {
            cell: CellHandle::INVALID,
            distance: 0.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.cell.is_valid()
    }
}

/// Finds the cell of `point` (navigation coordinates)
///
/// The corridor is scanned first; only when none of its cells is close enough
/// does the nearest cell search run, first with the near box and then with
/// the tall one. The result is invalid when every step fails.
pub fn locate(
    query: &NavMeshQuery,
    corridor: &[CellHandle],
    point: &[f32; 3],
    filter: &QueryFilter,
    config: &PathFinderConfig,
) -> CellLocation {
    if let Some(found) = locate_in_corridor(query, corridor, point, config) {
        return found;
    }

    for extents in [&config.near_search_extents, &config.tall_search_extents] {
        if let Ok((cell, closest)) = query.find_nearest_cell(point, extents, filter) {
            return CellLocation {
                cell,
                distance: vdist(&closest, point),
            };
        }
    }

    CellLocation::invalid()
}

fn locate_in_corridor(
    query: &NavMeshQuery,
    corridor: &[CellHandle],
    point: &[f32; 3],
    config: &PathFinderConfig,
) -> Option<CellLocation> {
    let mut best: Option<(CellHandle, f32, f32)> = None;
    for &cell in corridor {
        // Off-mesh link cells have no surface.
        let Ok((closest, _)) = query.closest_point_on_cell(cell, point) else {
            continue;
        };

        let d2d = dist_sqr_2d(point, &closest);
        let d3d = vdist(point, &closest);
        if best.map_or(true, |(_, bd, b3)| d2d < bd || (d2d == bd && d3d < b3)) {
            best = Some((cell, d2d, d3d));
        }
        if best.is_some_and(|(_, bd, _)| bd < config.corridor_early_stop_sqr) {
            break;
        }
    }

    let (cell, d2d, distance) = best?;
    if d2d < config.corridor_accept_dist_sqr {
        Some(CellLocation { cell, distance })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::strip_mesh;
    use crate::types::to_nav;
    use glam::Vec3;
    use movemap_common::Result;

    #[test]
    fn test_locate_prefers_corridor() -> Result<()> {
        let mesh = strip_mesh(4, 0.0)?;
        let query = NavMeshQuery::new(&mesh);
        let config = PathFinderConfig::default();
        let filter = QueryFilter::default();

        // One unit from cell 3, inside the accept window but not the early stop.
        let point = to_nav(Vec3::new(11.0, 2.0, 0.0));
        let corridor = [mesh.handle_for_index(3)];
        let found = locate(&query, &corridor, &point, &filter, &config);
        assert_eq!(found.cell, mesh.handle_for_index(3));
        assert!((found.distance - 1.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_locate_rejects_corridor_cell_outside_accept_window() -> Result<()> {
        let mesh = strip_mesh(4, 0.0)?;
        let query = NavMeshQuery::new(&mesh);
        let config = PathFinderConfig::default();
        let filter = QueryFilter::default();

        // 2.5 units from cell 3: 6.25 squared is past the window, so the search finds cell 2.
        let point = to_nav(Vec3::new(9.5, 2.0, 0.0));
        let corridor = [mesh.handle_for_index(3)];
        let found = locate(&query, &corridor, &point, &filter, &config);
        assert_eq!(found.cell, mesh.handle_for_index(2));
        assert!(found.distance < 1e-4);

        // Just past the square root of the window.
        let point = to_nav(Vec3::new(10.2, 2.0, 0.0));
        let found = locate(&query, &corridor, &point, &filter, &config);
        assert_eq!(found.cell, mesh.handle_for_index(2));
        Ok(())
    }

    #[test]
    fn test_locate_falls_back_to_search() -> Result<()> {
        let mesh = strip_mesh(4, 0.0)?;
        let query = NavMeshQuery::new(&mesh);
        let config = PathFinderConfig::default();
        let filter = QueryFilter::default();

        // Too far from the corridor cell, found by the near search.
        let point = to_nav(Vec3::new(2.0, 2.0, 1.0));
        let corridor = [mesh.handle_for_index(3)];
        let found = locate(&query, &corridor, &point, &filter, &config);
        assert_eq!(found.cell, mesh.handle_for_index(0));
        assert!((found.distance - 1.0).abs() < 1e-4);

        // High above the mesh, only the tall search reaches it.
        let high = to_nav(Vec3::new(2.0, 2.0, 50.0));
        let found = locate(&query, &[], &high, &filter, &config);
        assert_eq!(found.cell, mesh.handle_for_index(0));
        assert!((found.distance - 50.0).abs() < 1e-3);

        let outside = to_nav(Vec3::new(200.0, 2.0, 0.0));
        assert!(!locate(&query, &[], &outside, &filter, &config).is_valid());
        Ok(())
    }

    #[test]
    fn test_locate_breaks_planar_ties_by_height() -> Result<()> {
        use crate::test_support::{test_params, world_rect};
        use movemap::{CellFlags, NavMeshBuilder};

        // Two floors over the same footprint.
        let mut builder = NavMeshBuilder::new(test_params());
        builder.add_cell(&world_rect(0.0, 0.0, 4.0, 4.0, |_, _| 0.0), CellFlags::GROUND, 0)?;
        builder.add_cell(&world_rect(0.0, 0.0, 4.0, 4.0, |_, _| 3.0), CellFlags::GROUND, 0)?;
        let mesh = builder.build()?;
        let query = NavMeshQuery::new(&mesh);

        let corridor = [mesh.handle_for_index(0), mesh.handle_for_index(1)];
        // One unit beside both floors, exactly at the early stop distance.
        let point = to_nav(Vec3::new(5.0, 2.0, 2.8));
        let found = locate(&query, &corridor, &point, &QueryFilter::default(), &PathFinderConfig::default());
        assert_eq!(found.cell, mesh.handle_for_index(1));
        assert!((found.distance - 1.04f32.sqrt()).abs() < 1e-4);
        Ok(())
    }
}
