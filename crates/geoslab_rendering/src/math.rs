//! Matrix helpers for culling.
//!
//! Matrices are `[[f32; 4]; 4]` in column-major order (`m[column][row]`),
//! the same layout the frustum extraction and GPU uniforms use.

/// A column-major 4x4 matrix.
pub type Mat4 = [[f32; 4]; 4];

/// The identity matrix.
pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Returns `a * b`.
#[must_use]
pub fn mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0f32; 4]; 4];
    for (col, out_col) in out.iter_mut().enumerate() {
        for (row, value) in out_col.iter_mut().enumerate() {
            *value = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

/// Transforms a point (w = 1) by an affine matrix.
#[must_use]
pub fn transform_point(m: &Mat4, p: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0f32; 3];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[0][row] * p[0] + m[1][row] * p[1] + m[2][row] * p[2] + m[3][row];
    }
    out
}

/// Largest scale factor applied along any basis axis.
#[must_use]
pub fn max_axis_scale(m: &Mat4) -> f32 {
    (0..3)
        .map(|col| (m[col][0] * m[col][0] + m[col][1] * m[col][1] + m[col][2] * m[col][2]).sqrt())
        .fold(0.0, f32::max)
}

/// Translation matrix.
#[must_use]
pub fn translation(t: [f32; 3]) -> Mat4 {
    let mut m = IDENTITY;
    m[3] = [t[0], t[1], t[2], 1.0];
    m
}

/// Uniform scale matrix.
#[must_use]
pub fn scale(s: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[0][0] = s;
    m[1][1] = s;
    m[2][2] = s;
    m
}

/// Right-handed orthographic projection with depth mapped to [-1, 1].
#[must_use]
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[0][0] = 2.0 / (right - left);
    m[1][1] = 2.0 / (top - bottom);
    m[2][2] = -2.0 / (far - near);
    m[3][0] = -(right + left) / (right - left);
    m[3][1] = -(top + bottom) / (top - bottom);
    m[3][2] = -(far + near) / (far - near);
    m
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Inverse of an affine transform (rotation, scale, translation).
///
/// Returns `None` if the linear part is singular.
#[must_use]
pub fn affine_inverse(m: &Mat4) -> Option<Mat4> {
    let a = [m[0][0], m[0][1], m[0][2]];
    let b = [m[1][0], m[1][1], m[1][2]];
    let c = [m[2][0], m[2][1], m[2][2]];

    let bc = cross(b, c);
    let det = dot(a, bc);
    if det.abs() <= f32::EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    // Rows of the inverse linear part.
    let rows = [bc, cross(c, a), cross(a, b)].map(|r| r.map(|v| v * inv_det));

    let mut out = IDENTITY;
    for (row, r) in rows.iter().enumerate() {
        for col in 0..3 {
            out[col][row] = r[col];
        }
    }

    let t = [m[3][0], m[3][1], m[3][2]];
    for (row, r) in rows.iter().enumerate() {
        out[3][row] = -dot(*r, t);
    }

    Some(out)
}
