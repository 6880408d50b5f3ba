//! `cosim-runtime` – The bridge engine.
//!
//! Couples the ego vehicle between a road-traffic simulator and a physics
//! simulator, and keeps it coupled on a fixed period.
//!
//! # Modules
//!
//! - [`ego`] – [`EgoAdapter`][ego::EgoAdapter]: mirrors the physics pose into
//!   the traffic simulator, pushes poses back into the physics simulator,
//!   selects the control regime at departure, and applies lane-change /
//!   acceleration commands under the two-lane
//!   [`LaneBounds`][ego::LaneBounds] policy.
//! - [`bridge_loop`] – [`BridgeLoop`][bridge_loop::BridgeLoop]: the periodic
//!   sync driver.  Runs every tick and every bus command on a blocking worker
//!   under a deadline, reporting overruns as
//!   [`BridgeError::Timeout`][cosim_types::BridgeError::Timeout], and
//!   publishes telemetry and faults on the event bus.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod bridge_loop;
pub mod ego;
pub mod telemetry;

pub use bridge_loop::{BridgeLoop, BridgeLoopConfig, SharedAdapter};
pub use ego::{CommandReport, EgoAdapter, LaneBounds, LaneChangeOutcome, SpeedOutcome};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
