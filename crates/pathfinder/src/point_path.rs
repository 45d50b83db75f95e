//! Turns a cell corridor into waypoints
//!
//! Two generators exist: string pulling, which returns the corners of the
//! shortest path through the corridor, and smoothing, which walks the
//! corridor surface in fixed steps and hops across off-mesh links.

use movemap::{CellHandle, NavMeshQuery, QueryFilter, Status, StraightPathFlags};
use movemap_common::{vlen, vmad, vsub, Result};

use crate::config::PathFinderConfig;
use crate::corridor::merge_corridor_start_moved;

/// Waypoints in navigation coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointPath {
    pub points: Vec<[f32; 3]>,
    /// True if the point limit stopped generation before the target
    pub truncated: bool,
}

/// Corners of the corridor from `start` to `end`, at most `max_points`
pub fn straight_point_path(
    query: &NavMeshQuery,
    start: &[f32; 3],
    end: &[f32; 3],
    corridor: &[CellHandle],
    max_points: usize,
) -> Result<PointPath> {
    let straight = query.find_straight_path(start, end, corridor, max_points)?;
    Ok(PointPath {
        truncated: straight.truncated,
        points: straight.points,
    })
}

/// Point the walk is steering to
#[derive(Debug, Clone, Copy)]
struct SteerTarget {
    pos: [f32; 3],
    flags: StraightPathFlags,
    cell: CellHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SmoothState {
    /// Stepping towards the next steer target
    Walking,
    /// Reached the entry of the off-mesh link cell
    AtPortalEntry(CellHandle),
    /// Crossed an off-mesh link and continues from its exit
    AtPortalExit([f32; 3]),
    Done,
}

/// Step parameters of the smoothing walk
struct SmoothWalk<'q, 'a> {
    query: &'q NavMeshQuery<'a>,
    filter: &'q QueryFilter,
    config: &'q PathFinderConfig,
    max_points: usize,
}

/// Walks the corridor surface from `start` to `end`
///
/// Points other than the first and the target sit `height_clearance` above
/// the surface. Generation stops at `max_points` points.
pub fn smooth_point_path(
    query: &NavMeshQuery,
    filter: &QueryFilter,
    config: &PathFinderConfig,
    start: &[f32; 3],
    end: &[f32; 3],
    corridor: &[CellHandle],
    max_points: usize,
) -> Result<PointPath> {
    let (Some(&first), Some(&last)) = (corridor.first(), corridor.last()) else {
        return Err(Status::InvalidParam.into());
    };
    if max_points == 0 {
        return Err(Status::InvalidParam.into());
    }

    let walk = SmoothWalk {
        query,
        filter,
        config,
        max_points,
    };
    let iter = query.closest_point_on_cell_boundary(first, start)?;
    let target = query.closest_point_on_cell_boundary(last, end)?;
    Ok(walk.run(corridor.to_vec(), iter, target))
}

impl SmoothWalk<'_, '_> {
    fn run(&self, mut cells: Vec<CellHandle>, mut iter: [f32; 3], target: [f32; 3]) -> PointPath {
        let mut out = PointPath {
            points: vec![iter],
            truncated: false,
        };
        let mut reached = false;
        let mut state = SmoothState::Walking;

        loop {
            state = match state {
                SmoothState::Done => break,
                SmoothState::Walking => {
                    if cells.is_empty() || out.points.len() >= self.max_points {
                        SmoothState::Done
                    } else {
                        match self.steer_target(&iter, &target, &cells) {
                            None => SmoothState::Done,
                            Some(steer) => {
                                iter = self.step(&mut cells, &iter, &steer);
                                let near = in_range_yzx(&iter, &steer.pos, self.config.smooth_slop, 1.0);

                                if near && steer.flags.contains(StraightPathFlags::END) {
                                    self.push(&mut out, target);
                                    reached = true;
                                    SmoothState::Done
                                } else if near && steer.flags.contains(StraightPathFlags::OFFMESH_CONNECTION) {
                                    SmoothState::AtPortalEntry(steer.cell)
                                } else {
                                    self.push(&mut out, iter);
                                    SmoothState::Walking
                                }
                            }
                        }
                    }
                }
                SmoothState::AtPortalEntry(link) => self.enter_link(&mut cells, &mut out, &iter, link),
                SmoothState::AtPortalExit(exit) => {
                    iter = self.snap_height(&cells, exit);
                    self.push(&mut out, iter);
                    SmoothState::Walking
                }
            };
        }

        out.truncated = !reached && out.points.len() >= self.max_points;
        out
    }

    /// Next corner that is either an off-mesh entry or further than the slop
    fn steer_target(
        &self,
        start: &[f32; 3],
        end: &[f32; 3],
        cells: &[CellHandle],
    ) -> Option<SteerTarget> {
        let straight = self
            .query
            .find_straight_path(start, end, cells, self.config.max_steer_points)
            .ok()?;

        let ns = (0..straight.len()).find(|&i| {
            straight.flags[i].contains(StraightPathFlags::OFFMESH_CONNECTION)
                || !in_range_yzx(&straight.points[i], start, self.config.smooth_slop, 1000.0)
        })?;

        let mut pos = straight.points[ns];
        pos[1] = start[1];
        Some(SteerTarget {
            pos,
            flags: straight.flags[ns],
            cell: straight.cells[ns],
        })
    }

    /// Moves one step towards the steer target and fixes the corridor start
    fn step(&self, cells: &mut Vec<CellHandle>, iter: &[f32; 3], steer: &SteerTarget) -> [f32; 3] {
        let delta = vsub(&steer.pos, iter);
        let len = vlen(&delta);
        let stop_short = steer
            .flags
            .intersects(StraightPathFlags::END | StraightPathFlags::OFFMESH_CONNECTION);
        let scale = if stop_short && len < self.config.smooth_step_size {
            1.0
        } else {
            self.config.smooth_step_size / len
        };
        let move_target = vmad(iter, &delta, scale);

        let result = match self.query.move_along_surface(
            cells[0],
            iter,
            &move_target,
            self.filter,
            self.config.max_visit_cells,
        ) {
            Ok((result, visited)) => {
                merge_corridor_start_moved(cells, self.config.corridor_capacity, &visited);
                result
            }
            Err(err) => {
                log::debug!("surface move from {} failed: {}", cells[0], err);
                *iter
            }
        };

        self.snap_height(cells, result)
    }

    /// Drops the corridor up to and over the link and emits its entry point
    fn enter_link(
        &self,
        cells: &mut Vec<CellHandle>,
        out: &mut PointPath,
        iter: &[f32; 3],
        link: CellHandle,
    ) -> SmoothState {
        let Some(at) = cells.iter().position(|c| *c == link) else {
            self.push(out, *iter);
            return SmoothState::Walking;
        };
        let prev = if at > 0 { cells[at - 1] } else { link };
        cells.drain(..=at);

        match self.query.off_mesh_link_end_points(prev, link) {
            Ok((entry, exit)) => {
                self.push(out, entry);
                SmoothState::AtPortalExit(exit)
            }
            Err(err) => {
                log::debug!("off-mesh link {} has no end points: {}", link, err);
                self.push(out, *iter);
                SmoothState::Walking
            }
        }
    }

    fn snap_height(&self, cells: &[CellHandle], mut pos: [f32; 3]) -> [f32; 3] {
        if let Some(&first) = cells.first() {
            if let Ok(Some(h)) = self.query.cell_height(first, &pos) {
                pos[1] = h + self.config.height_clearance;
            }
        }
        pos
    }

    fn push(&self, out: &mut PointPath, pos: [f32; 3]) {
        if out.points.len() < self.max_points {
            out.points.push(pos);
        }
    }
}

/// Planar distance below `r` and height difference below `h`
fn in_range_yzx(a: &[f32; 3], b: &[f32; 3], r: f32, h: f32) -> bool {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    dx * dx + dz * dz < r * r && dy.abs() < h
}
