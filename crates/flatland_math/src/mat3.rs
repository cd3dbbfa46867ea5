//! 3x3 Matrix utilities for 2D affine transformations
//!
//! Points are treated as `(x, y, 1)` and directions as `(x, y, 0)`, so a single
//! matrix carries rotation, non-uniform scale and translation. The collision
//! code uses these to move world geometry into an ellipse's local frame and
//! back again.

use crate::Vec2;

/// 3x3 matrix type (column-major)
pub type Mat3 = [[f32; 3]; 3];

/// Identity matrix
pub const IDENTITY: Mat3 = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

/// Determinants smaller than this are treated as singular
const SINGULAR_EPSILON: f32 = 1e-12;

/// Create a counter-clockwise rotation by `angle` radians
pub fn rotation(angle: f32) -> Mat3 {
    let (sn, cs) = angle.sin_cos();

    let mut m = IDENTITY;
    m[0][0] = cs;
    m[0][1] = sn;
    m[1][0] = -sn;
    m[1][1] = cs;
    m
}

/// Create a non-uniform scale
pub fn scale(sx: f32, sy: f32) -> Mat3 {
    let mut m = IDENTITY;
    m[0][0] = sx;
    m[1][1] = sy;
    m
}

/// Create a translation
pub fn translation(t: Vec2) -> Mat3 {
    let mut m = IDENTITY;
    m[2][0] = t.x;
    m[2][1] = t.y;
    m
}

/// Multiply two 3x3 matrices: result = a * b
///
/// In column-major convention, this applies b first, then a.
#[allow(clippy::needless_range_loop)]
pub fn mul(a: Mat3, b: Mat3) -> Mat3 {
    let mut result = [[0.0f32; 3]; 3];

    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                result[i][j] += a[k][j] * b[i][k];
            }
        }
    }

    result
}

/// Transform a point (applies translation)
pub fn transform_point(m: Mat3, p: Vec2) -> Vec2 {
    Vec2::new(
        m[0][0] * p.x + m[1][0] * p.y + m[2][0],
        m[0][1] * p.x + m[1][1] * p.y + m[2][1],
    )
}

/// Transform a direction (ignores translation)
pub fn transform_vector(m: Mat3, v: Vec2) -> Vec2 {
    Vec2::new(
        m[0][0] * v.x + m[1][0] * v.y,
        m[0][1] * v.x + m[1][1] * v.y,
    )
}

/// Invert an affine matrix
///
/// Returns `None` when the linear part is singular.
pub fn inverse(m: Mat3) -> Option<Mat3> {
    let (a, b) = (m[0][0], m[0][1]);
    let (c, d) = (m[1][0], m[1][1]);
    let det = a * d - c * b;
    if det.abs() < SINGULAR_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let mut result = IDENTITY;
    result[0][0] = d * inv_det;
    result[0][1] = -b * inv_det;
    result[1][0] = -c * inv_det;
    result[1][1] = a * inv_det;

    let t = transform_vector(result, Vec2::new(m[2][0], m[2][1]));
    result[2][0] = -t.x;
    result[2][1] = -t.y;

    Some(result)
}
