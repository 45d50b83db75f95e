//! Small vector helpers over `[f32; 3]` navigation-space points

/// Squared distance between two points
#[inline]
pub fn vdist_sqr(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    dx * dx + dy * dy + dz * dz
}

/// Distance between two points
#[inline]
pub fn vdist(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    vdist_sqr(a, b).sqrt()
}

/// `a - b`
#[inline]
pub fn vsub(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// `a + b * s`
#[inline]
pub fn vmad(a: &[f32; 3], b: &[f32; 3], s: f32) -> [f32; 3] {
    [a[0] + b[0] * s, a[1] + b[1] * s, a[2] + b[2] * s]
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn vlerp(a: &[f32; 3], b: &[f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Length of a vector
#[inline]
pub fn vlen(v: &[f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// True when two points are closer than the mesh's quantization step.
#[inline]
pub fn vequal(a: &[f32; 3], b: &[f32; 3]) -> bool {
    const THR: f32 = 1.0 / 16384.0;
    vdist_sqr(a, b) < THR * THR
}
