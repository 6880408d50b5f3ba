//! Orientation Converter.
//!
//! The physics simulator measures yaw counter-clockwise from +x, in radians.
//! The traffic simulator measures heading clockwise from north (+y), in
//! degrees.  Going physics → traffic composes two fixed yaw rotations through
//! quaternion multiplication and shifts the result by 180°:
//!
//! ```text
//! q_axis  = yaw(-90°)
//! q_sense = yaw(360° - yaw)
//! heading = degrees(yaw_of(q_sense ⊗ q_axis)) + 180°
//! ```
//!
//! which is numerically `(90° - yaw) mod 360` except exactly at the wraparound
//! (physics yaw = 90°), where the output lands on either 0° or 360° depending
//! on rounding.
//!
//! Going traffic-frame pose → physics applies a separate +90° correction
//! ([`PHYSICS_POSE_HEADING_OFFSET_RAD`]) before building the quaternion.  The
//! two corrections fix different axis mismatches and are kept apart.

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::transform::Quaternion;

/// Rotation aligning the physics zero-heading axis with the traffic one.
pub const TRAFFIC_AXIS_ROTATION_RAD: f64 = -FRAC_PI_2;

/// Shift applied after the rotation composition, in degrees.
pub const TRAFFIC_HEADING_SHIFT_DEG: f64 = 180.0;

/// Offset added to an inbound heading before it is written as a physics
/// orientation.
pub const PHYSICS_POSE_HEADING_OFFSET_RAD: f64 = FRAC_PI_2;

/// Yaw (radians, `(-π, π]`) of a physics orientation.  Roll and pitch are
/// discarded: the bridge is planar.
pub fn physics_yaw(orientation: Quaternion) -> f64 {
    let (_, _, yaw) = orientation.to_euler();
    yaw
}

/// Convert a physics orientation into a traffic heading in degrees.
///
/// The result is not clamped; see [`normalize_degrees`].
pub fn to_traffic_heading(orientation: Quaternion) -> f64 {
    yaw_to_traffic_heading(physics_yaw(orientation))
}

/// Convert a physics yaw (radians) into a traffic heading in degrees using
/// the two-rotation composition.
pub fn yaw_to_traffic_heading(yaw: f64) -> f64 {
    let axis = Quaternion::from_yaw(TRAFFIC_AXIS_ROTATION_RAD);
    let sense = Quaternion::from_yaw(TAU - yaw);
    let (_, _, rotated) = sense.mul(axis).to_euler();
    rotated.to_degrees() + TRAFFIC_HEADING_SHIFT_DEG
}

/// Build the physics orientation for an inbound pose heading (radians).
pub fn to_physics_orientation(heading_rad: f64) -> Quaternion {
    Quaternion::from_euler(0.0, 0.0, heading_rad + PHYSICS_POSE_HEADING_OFFSET_RAD)
}

/// Fold an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let folded = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if folded >= 360.0 { 0.0 } else { folded }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
