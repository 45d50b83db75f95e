//! Splits path segments that climb or drop too steeply

use glam::Vec3;

use crate::collaborators::TerrainService;

/// Limits of the midpoint insertion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeLimits {
    /// Largest elevation change allowed between two points
    pub height_threshold: f32,
    /// Pairs closer than this on the ground plane are left alone
    pub min_span: f32,
    /// Insertion stops once the path holds this many points
    pub capacity: usize,
}

/// Snaps every point to the terrain, then inserts terrain-snapped midpoints
/// until no pair exceeds the height threshold
///
/// Points where the terrain has no height keep theirs. After an insertion the pair ending at the new midpoint is checked again
/// before moving on. Returns the number of inserted points.
pub fn normalize_points(
    points: &mut Vec<Vec3>,
    terrain: &dyn TerrainService,
    limits: &NormalizeLimits,
) -> usize {
    for p in points.iter_mut() {
        snap_to_ground(p, terrain);
    }

    let mut inserted = 0;
    let mut i = 0;

    while i + 1 < points.len() && points.len() < limits.capacity {
        let a = points[i];
        let b = points[i + 1];

        let steep = (b.z - a.z).abs() > limits.height_threshold;
        let span = a.truncate().distance(b.truncate());
        if !steep || span < limits.min_span {
            i += 1;
            continue;
        }

        let mut mid = (a + b) * 0.5;
        snap_to_ground(&mut mid, terrain);
        points.insert(i + 1, mid);
        inserted += 1;
    }

    inserted
}

fn snap_to_ground(p: &mut Vec3, terrain: &dyn TerrainService) {
    if let Some(h) = terrain.ground_height_at(*p) {
        if h.is_finite() {
            p.z = h;
        }
    }
}
