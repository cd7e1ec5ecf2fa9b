//! Small numeric helpers shared by the frame modules
//!
//! Everything here works in `f64` (glam's `D*` types): deep reference chains
//! accumulate rounding error and the viewer hands the final matrix to the GPU
//! anyway, so the narrowing happens only at that boundary.

use glam::{DQuat, DVec3};

/// Below this squared norm a vector or quaternion is treated as degenerate
pub const EPSILON: f64 = 1e-10;

/// Normalize a rotation, falling back to identity for degenerate input.
///
/// A zero-norm or non-finite quaternion cannot describe a rotation, so it is
/// replaced by [`DQuat::IDENTITY`] and a warning is logged.
pub fn normalize_rotation(q: DQuat) -> DQuat {
    let norm_sq = q.length_squared();
    if !norm_sq.is_finite() || norm_sq < EPSILON {
        tracing::warn!("Degenerate rotation {:?} replaced by identity", q);
        return DQuat::IDENTITY;
    }
    q / norm_sq.sqrt()
}

/// Unit direction of `v`, or `None` when `v` is (nearly) zero
pub fn unit_direction(v: DVec3) -> Option<DVec3> {
    let norm_sq = v.length_squared();
    if !norm_sq.is_finite() || norm_sq < EPSILON {
        None
    } else {
        Some(v / norm_sq.sqrt())
    }
}

/// Component of `v` along `axis` (`axis` need not be unit length).
///
/// A degenerate axis leaves nothing to project on and yields zero.
pub fn project_on_axis(v: DVec3, axis: DVec3) -> DVec3 {
    match unit_direction(axis) {
        Some(dir) => dir * v.dot(dir),
        None => DVec3::ZERO,
    }
}

/// Component of `v` in the plane orthogonal to `normal`.
///
/// A degenerate normal leaves `v` untouched.
pub fn project_on_plane(v: DVec3, normal: DVec3) -> DVec3 {
    match unit_direction(normal) {
        Some(n) => v - n * v.dot(n),
        None => v,
    }
}

/// Rotation of `angle` radians around `axis`, identity when the axis is degenerate
pub fn axis_angle(axis: DVec3, angle: f64) -> DQuat {
    match unit_direction(axis) {
        Some(dir) => DQuat::from_axis_angle(dir, angle),
        None => DQuat::IDENTITY,
    }
}
