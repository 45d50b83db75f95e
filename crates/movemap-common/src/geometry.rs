//! 2D geometry operations on the XZ plane
//!
//! Navigation data uses a Y-up coordinate system, so every "planar" helper here
//! ignores the second component of its inputs.

/// Twice the signed area of the triangle `abc` on the XZ plane.
///
/// Positive when `abc` winds clockwise looking down the Y axis, negative when
/// counter-clockwise, zero for collinear points.
#[inline]
pub fn tri_area_2d(a: &[f32; 3], b: &[f32; 3], c: &[f32; 3]) -> f32 {
    let abx = b[0] - a[0];
    let abz = b[2] - a[2];
    let acx = c[0] - a[0];
    let acz = c[2] - a[2];
    acx * abz - abx * acz
}

/// Twice the signed area of a polygon on the XZ plane, using the same sign
/// convention as [`tri_area_2d`].
pub fn poly_area_2d(verts: &[[f32; 3]]) -> f32 {
    if verts.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 2..verts.len() {
        area += tri_area_2d(&verts[0], &verts[i - 1], &verts[i]);
    }
    area
}

/// Check if two axis-aligned bounding boxes overlap.
#[inline]
pub fn overlap_bounds(amin: &[f32; 3], amax: &[f32; 3], bmin: &[f32; 3], bmax: &[f32; 3]) -> bool {
    amin[0] <= bmax[0]
        && amax[0] >= bmin[0]
        && amin[1] <= bmax[1]
        && amax[1] >= bmin[1]
        && amin[2] <= bmax[2]
        && amax[2] >= bmin[2]
}

/// Squared distance between two points on the XZ plane.
#[inline]
pub fn dist_sqr_2d(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dx = b[0] - a[0];
    let dz = b[2] - a[2];
    dx * dx + dz * dz
}

/// Squared distance from `p` to the segment `ab` on the XZ plane, together
/// with the clamped segment parameter of the closest point.
pub fn dist_point_segment_sqr_2d_with_t(p: &[f32; 3], a: &[f32; 3], b: &[f32; 3]) -> (f32, f32) {
    let dx = b[0] - a[0];
    let dz = b[2] - a[2];
    let dpx = p[0] - a[0];
    let dpz = p[2] - a[2];

    let d = dx * dx + dz * dz;
    let t = if d > 0.0 {
        ((dpx * dx + dpz * dz) / d).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let ex = a[0] + t * dx - p[0];
    let ez = a[2] + t * dz - p[2];

    (ex * ex + ez * ez, t)
}

/// Point-in-polygon test on the XZ plane (even-odd rule).
pub fn point_in_polygon_2d(p: &[f32; 3], verts: &[[f32; 3]]) -> bool {
    let n = verts.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let vi = &verts[i];
        let vj = &verts[j];
        if ((vi[2] > p[2]) != (vj[2] > p[2]))
            && (p[0] < (vj[0] - vi[0]) * (p[2] - vi[2]) / (vj[2] - vi[2]) + vi[0])
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Squared XZ distance from `p` to every polygon edge.
///
/// Edge `k` runs from `verts[k]` to `verts[(k + 1) % n]`. Returns whether the
/// point lies inside the polygon, the squared distances and the segment
/// parameters of the closest points.
pub fn distance_pt_poly_edges_sqr(p: &[f32; 3], verts: &[[f32; 3]]) -> (bool, Vec<f32>, Vec<f32>) {
    let n = verts.len();
    let mut edge_dists = Vec::with_capacity(n);
    let mut edge_ts = Vec::with_capacity(n);

    for k in 0..n {
        let (d, t) = dist_point_segment_sqr_2d_with_t(p, &verts[k], &verts[(k + 1) % n]);
        edge_dists.push(d);
        edge_ts.push(t);
    }

    (point_in_polygon_2d(p, verts), edge_dists, edge_ts)
}

/// Height of the triangle `abc` below or above `p`, if `p` projects inside it.
pub fn closest_height_on_triangle(
    p: &[f32; 3],
    a: &[f32; 3],
    b: &[f32; 3],
    c: &[f32; 3],
) -> Option<f32> {
    const EPS: f32 = 1e-6;

    let v0 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let v1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v2 = [p[0] - a[0], p[1] - a[1], p[2] - a[2]];

    let dot00 = v0[0] * v0[0] + v0[2] * v0[2];
    let dot01 = v0[0] * v1[0] + v0[2] * v1[2];
    let dot02 = v0[0] * v2[0] + v0[2] * v2[2];
    let dot11 = v1[0] * v1[0] + v1[2] * v1[2];
    let dot12 = v1[0] * v2[0] + v1[2] * v2[2];

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let inv_denom = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let v = (dot00 * dot12 - dot01 * dot02) * inv_denom;

    if u >= -EPS && v >= -EPS && (u + v) <= 1.0 + EPS {
        Some(a[1] + v0[1] * u + v1[1] * v)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<[f32; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 2.0],
            [2.0, 0.0, 2.0],
            [2.0, 0.0, 0.0],
        ]
    }

    #[test]
    fn test_winding_sign() {
        let verts = square();
        assert!(poly_area_2d(&verts) > 0.0);

        let mut reversed = verts.clone();
        reversed.reverse();
        assert!(poly_area_2d(&reversed) < 0.0);
    }

    #[test]
    fn test_point_in_polygon() {
        let verts = square();
        assert!(point_in_polygon_2d(&[1.0, 5.0, 1.0], &verts));
        assert!(!point_in_polygon_2d(&[3.0, 0.0, 1.0], &verts));
    }

    #[test]
    fn test_edge_distances() {
        let verts = square();
        let (inside, dists, ts) = distance_pt_poly_edges_sqr(&[1.0, 0.0, 3.0], &verts);
        assert!(!inside);
        // Edge 1 runs along z = 2.
        assert!((dists[1] - 1.0).abs() < 1e-6);
        assert!((ts[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_triangle_height() {
        let a = [0.0, 0.0, 0.0];
        let b = [0.0, 2.0, 4.0];
        let c = [4.0, 0.0, 0.0];
        let h = closest_height_on_triangle(&[1.0, 10.0, 2.0], &a, &b, &c);
        assert!((h.unwrap_or(f32::NAN) - 1.0).abs() < 1e-5);
        assert!(closest_height_on_triangle(&[5.0, 0.0, 5.0], &a, &b, &c).is_none());
    }
}
