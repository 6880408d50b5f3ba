//! `cosim-hal` – Simulator control interfaces.
//!
//! The bridge never talks to a simulator's wire protocol directly.  It talks
//! to the two traits defined here, so a TraCI client, a Gazebo service proxy,
//! or the in-process engines in [`sim`] can be swapped without touching the
//! transform or command logic.
//!
//! # Modules
//!
//! - [`traffic`] – [`TrafficSim`][traffic::TrafficSim]: the road-traffic
//!   control interface (lane, speed, speed mode, reposition).
//! - [`physics`] – [`PhysicsSim`][physics::PhysicsSim]: the physics control
//!   interface (model state get/set) and the startup
//!   [`wait_for_authority`][physics::wait_for_authority] handshake.
//! - [`sim`] – in-process simulated engines with call logs and fault
//!   injection, for headless runs and tests.

pub mod physics;
pub mod sim;
pub mod traffic;

pub use physics::{ModelPose, ModelState, PhysicsSim, Twist, WORLD_FRAME, wait_for_authority};
pub use sim::{PhysicsOp, SimPhysicsEngine, SimTrafficEngine, SimVehicle, TrafficCall, TrafficOp};
pub use traffic::{LaneChangeMode, MoveToXy, SpeedMode, TrafficSim};
