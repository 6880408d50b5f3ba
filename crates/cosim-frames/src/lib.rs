//! `cosim-frames` – Reference-frame plumbing between the two simulators.
//!
//! The physics simulator reports a 3-D pose (quaternion orientation, centre of
//! mass origin, heading counter-clockwise from +x).  The traffic simulator
//! expects a planar pose in compass degrees referenced to the front bumper.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3] and
//!   [`Quaternion`][transform::Quaternion] primitives with static-XYZ Euler
//!   conversion.
//! - [`heading`] – the Orientation Converter between the two heading
//!   conventions.
//! - [`projection`] – the Pose Projector applying the fixed lookahead offset.

pub mod heading;
pub mod projection;
pub mod transform;

pub use heading::{
    normalize_degrees, to_physics_orientation, to_traffic_heading, yaw_to_traffic_heading,
};
pub use projection::project;
pub use transform::{Quaternion, Vec3};
