//! Road-traffic simulator control interface.
//!
//! Mirrors the subset of the traffic simulator's per-vehicle commands the
//! bridge consumes.  Every method is a blocking request/response round-trip
//! and may fail with a [`SimFault`] carrying the simulator's message.

use cosim_types::SimFault;
use serde::{Deserialize, Serialize};

/// Speed-mode bitmask controlling which of the traffic simulator's own
/// speed checks are applied to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeedMode(pub u8);

impl SpeedMode {
    /// All checks off: commanded speeds are applied verbatim.
    pub const NONE: SpeedMode = SpeedMode(0);
    /// Safe speed, max acceleration, max deceleration, right of way and red
    /// light checks all on.  The simulator's default.
    pub const ALL_CHECKS: SpeedMode = SpeedMode(31);
}

/// Lane-change-mode bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneChangeMode(pub u16);

impl LaneChangeMode {
    /// No autonomous lane changes, and requested changes ignore other drivers.
    pub const NONE: LaneChangeMode = LaneChangeMode(0);
    /// The simulator's default for newly inserted vehicles.
    pub const DEFAULT: LaneChangeMode = LaneChangeMode(1621);
}

/// Explicit reposition request that keeps the vehicle on a known road/lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveToXy {
    pub road_id: String,
    pub lane_index: i32,
    pub x: f64,
    pub y: f64,
    /// Traffic-convention heading in degrees.
    pub angle_deg: f64,
    /// `0` – the route is not kept; the given road/lane is used as the
    /// mapping hint.
    pub keep_route: u8,
}

/// The road-traffic simulator's control interface for a single vehicle.
pub trait TrafficSim: Send {
    /// Id of the road (edge) the vehicle is on.
    fn road_id(&mut self, vehicle_id: &str) -> Result<String, SimFault>;

    /// Index of the lane the vehicle is on, 0 being the rightmost lane.
    fn lane_index(&mut self, vehicle_id: &str) -> Result<i32, SimFault>;

    /// Current speed (m/s).
    fn speed(&mut self, vehicle_id: &str) -> Result<f64, SimFault>;

    fn speed_mode(&mut self, vehicle_id: &str) -> Result<SpeedMode, SimFault>;

    fn set_speed(&mut self, vehicle_id: &str, speed: f64) -> Result<(), SimFault>;

    fn set_speed_mode(&mut self, vehicle_id: &str, mode: SpeedMode) -> Result<(), SimFault>;

    fn set_lane_change_mode(
        &mut self,
        vehicle_id: &str,
        mode: LaneChangeMode,
    ) -> Result<(), SimFault>;

    /// Request a change to `lane_index`, held for `duration_s` seconds.
    fn change_lane(
        &mut self,
        vehicle_id: &str,
        lane_index: i32,
        duration_s: f64,
    ) -> Result<(), SimFault>;

    /// Place the vehicle at an explicit position and heading.
    fn move_to_xy(&mut self, vehicle_id: &str, target: &MoveToXy) -> Result<(), SimFault>;
}
