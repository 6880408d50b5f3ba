//! Rigid-body primitives shared by both simulator frames.
//!
//! Quaternions follow the Hamilton convention and are stored `(w, x, y, z)`.
//! Euler angles use the static-XYZ (roll, pitch, yaw) convention, i.e.
//! `R = Rz(yaw) · Ry(pitch) · Rx(roll)`, which is what the physics simulator's
//! message tooling emits.
//!
//! # Example
//!
//! ```rust
//! use cosim_frames::transform::Quaternion;
//!
//! let q = Quaternion::from_yaw(std::f64::consts::FRAC_PI_2);
//! let (_, _, yaw) = q.to_euler();
//! assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

/// Below this, `cos(pitch)` is treated as zero (gimbal lock).
const GIMBAL_EPSILON: f64 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (position or linear/angular velocity).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A rotation quaternion (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  Non-unit input is tolerated by [`to_euler`]
    /// which normalises before extracting angles.
    ///
    /// [`to_euler`]: Self::to_euler
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation from static-XYZ Euler angles (radians).
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();
        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Pure rotation about +z.
    pub fn from_yaw(yaw: f64) -> Self {
        Self::from_euler(0.0, 0.0, yaw)
    }

    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit quaternion pointing the same way.  A zero quaternion maps to the
    /// identity.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n < f64::EPSILON {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product: `self ⊗ rhs` applies `rhs` first, then `self`.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Static-XYZ Euler angles `(roll, pitch, yaw)` in radians, each in
    /// `(-π, π]`.
    ///
    /// Extracted from the rotation matrix the same way the physics
    /// simulator's tooling does it.  At gimbal lock yaw is pinned to zero and
    /// the rotation is folded into roll.
    pub fn to_euler(self) -> (f64, f64, f64) {
        let Self { w, x, y, z } = self.normalized();

        let m00 = 1.0 - 2.0 * (y * y + z * z);
        let m10 = 2.0 * (x * y + w * z);
        let m20 = 2.0 * (x * z - w * y);
        let m21 = 2.0 * (y * z + w * x);
        let m22 = 1.0 - 2.0 * (x * x + y * y);

        let cy = (m00 * m00 + m10 * m10).sqrt();
        if cy > GIMBAL_EPSILON {
            (m21.atan2(m22), (-m20).atan2(cy), m10.atan2(m00))
        } else {
            let m11 = 1.0 - 2.0 * (x * x + z * z);
            let m12 = 2.0 * (y * z - w * x);
            ((-m12).atan2(m11), (-m20).atan2(cy), 0.0)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4, PI};

    const TOL: f64 = 1e-12;

    #[test]
    fn from_yaw_quarter_turn_matches_closed_form() {
        let q = Quaternion::from_yaw(FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < TOL);
        assert!((q.z - FRAC_1_SQRT_2).abs() < TOL);
        assert!(q.x.abs() < TOL && q.y.abs() < TOL);
    }

    #[test]
    fn identity_mul_is_noop() {
        let q = Quaternion::from_euler(0.1, -0.2, 0.3);
        let r = Quaternion::identity().mul(q);
        assert!((r.w - q.w).abs() < TOL);
        assert!((r.x - q.x).abs() < TOL);
        assert!((r.y - q.y).abs() < TOL);
        assert!((r.z - q.z).abs() < TOL);
    }

    #[test]
    fn yaw_rotations_compose_additively() {
        let q = Quaternion::from_yaw(FRAC_PI_4).mul(Quaternion::from_yaw(FRAC_PI_4));
        let (_, _, yaw) = q.to_euler();
        assert!((yaw - FRAC_PI_2).abs() < TOL);
    }

    #[test]
    fn euler_roundtrip_recovers_angles() {
        let (roll, pitch, yaw) = Quaternion::from_euler(0.3, -0.4, 2.5).to_euler();
        assert!((roll - 0.3).abs() < 1e-9, "roll={roll}");
        assert!((pitch + 0.4).abs() < 1e-9, "pitch={pitch}");
        assert!((yaw - 2.5).abs() < 1e-9, "yaw={yaw}");
    }

    #[test]
    fn yaw_beyond_pi_wraps_into_range() {
        let (_, _, yaw) = Quaternion::from_yaw(3.0 * FRAC_PI_2).to_euler();
        assert!((yaw + FRAC_PI_2).abs() < 1e-9, "yaw={yaw}");
        let (_, _, yaw) = Quaternion::from_yaw(PI - 1e-6).to_euler();
        assert!((yaw - (PI - 1e-6)).abs() < 1e-9);
    }

    #[test]
    fn to_euler_normalises_scaled_input() {
        let q = Quaternion::from_yaw(1.0);
        let scaled = Quaternion::new(q.w * 3.0, q.x * 3.0, q.y * 3.0, q.z * 3.0);
        let (_, _, yaw) = scaled.to_euler();
        assert!((yaw - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_quaternion_is_treated_as_identity() {
        let (roll, pitch, yaw) = Quaternion::new(0.0, 0.0, 0.0, 0.0).to_euler();
        assert_eq!((roll, pitch, yaw), (0.0, 0.0, 0.0));
    }

    #[test]
    fn gimbal_lock_pins_yaw_to_zero() {
        let (_, pitch, yaw) = Quaternion::from_euler(0.0, FRAC_PI_2, 0.7).to_euler();
        assert!((pitch - FRAC_PI_2).abs() < 1e-6);
        assert_eq!(yaw, 0.0);
    }
}
