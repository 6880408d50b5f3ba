use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Acceleration value meaning "no acceleration update requested".
pub const ACCEL_SENTINEL: f64 = -100.0;

/// Default distance (metres) between the physics reference point (centre of
/// mass) and the traffic reference point (front bumper).
pub const DEFAULT_LOOKAHEAD_M: f64 = 2.0;

/// Default control tick used to integrate acceleration commands (seconds).
pub const DEFAULT_CONTROL_TIME_STEP_S: f64 = 0.05;

/// The two simulators bridged by the ego adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// Road-traffic simulator: lane and speed discipline.
    Traffic,
    /// Physics/robotics simulator: 3-D pose.
    Physics,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Traffic => write!(f, "traffic"),
            Authority::Physics => write!(f, "physics"),
        }
    }
}

/// Long-lived control regime chosen once when the ego vehicle departs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlRegime {
    /// The traffic simulator's own speed/lane decision making is disabled and
    /// every frame is driven by the physics pose.
    #[default]
    #[serde(rename = "physics")]
    PhysicsAuthoritative,
    /// The traffic simulator keeps its safety-gap and collision-avoidance
    /// logic; commands only nudge speed and lane on top of it.
    #[serde(rename = "traffic")]
    TrafficAuthoritative,
}

impl fmt::Display for ControlRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRegime::PhysicsAuthoritative => write!(f, "physics"),
            ControlRegime::TrafficAuthoritative => write!(f, "traffic"),
        }
    }
}

impl FromStr for ControlRegime {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "physics" => Ok(ControlRegime::PhysicsAuthoritative),
            "traffic" => Ok(ControlRegime::TrafficAuthoritative),
            other => Err(BridgeError::Parsing(format!(
                "unknown control regime '{other}' (expected 'physics' or 'traffic')"
            ))),
        }
    }
}

/// Planar pose.  `heading_rad` is counter-clockwise from +x (physics frame).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading_rad: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading_rad: f64) -> Self {
        Self { x, y, heading_rad }
    }
}

/// Last known ego state as mirrored into the traffic simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub vehicle_id: String,
    pub x: f64,
    pub y: f64,
    /// Traffic-convention heading in degrees (clockwise from north).
    pub heading_deg: f64,
    /// Always non-negative.
    pub speed: f64,
}

impl VehicleState {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            x: 0.0,
            y: 0.0,
            heading_deg: 0.0,
            speed: 0.0,
        }
    }
}

/// Fixed tuning of the ego adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_lookahead")]
    pub lookahead_m: f64,
    #[serde(default = "default_time_step")]
    pub control_time_step_s: f64,
}

fn default_lookahead() -> f64 {
    DEFAULT_LOOKAHEAD_M
}
fn default_time_step() -> f64 {
    DEFAULT_CONTROL_TIME_STEP_S
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            lookahead_m: DEFAULT_LOOKAHEAD_M,
            control_time_step_s: DEFAULT_CONTROL_TIME_STEP_S,
        }
    }
}

/// Decoded lane-change field of an inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneChange {
    /// `0` – no lane change requested.
    Keep,
    /// `1` – shift one lane to the left (lane index + 1).
    Left,
    /// `-1` – shift one lane to the right (lane index - 1).
    Right,
    /// Any other non-zero value.
    Unknown(i32),
}

impl LaneChange {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => LaneChange::Keep,
            1 => LaneChange::Left,
            -1 => LaneChange::Right,
            other => LaneChange::Unknown(other),
        }
    }

    /// Lane index delta, or `None` when no shift should happen.
    pub fn direction(self) -> Option<i32> {
        match self {
            LaneChange::Left => Some(1),
            LaneChange::Right => Some(-1),
            LaneChange::Keep | LaneChange::Unknown(_) => None,
        }
    }
}

/// Decoded acceleration field of an inbound command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acceleration {
    /// The sentinel was sent: leave speed and speed mode untouched.
    Hold,
    /// Acceleration in m/s² to integrate over one control tick.
    Apply(f64),
}

impl Acceleration {
    pub fn from_raw(raw: f64) -> Self {
        if raw == ACCEL_SENTINEL {
            Acceleration::Hold
        } else {
            Acceleration::Apply(raw)
        }
    }
}

/// Inbound vehicle command as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleCommand {
    #[serde(default)]
    pub lane_change: i32,
    #[serde(default = "default_accel")]
    pub accel: f64,
}

fn default_accel() -> f64 {
    ACCEL_SENTINEL
}

impl VehicleCommand {
    pub fn new(lane_change: i32, accel: f64) -> Self {
        Self { lane_change, accel }
    }

    pub fn lane_change(&self) -> LaneChange {
        LaneChange::from_raw(self.lane_change)
    }

    pub fn acceleration(&self) -> Acceleration {
        Acceleration::from_raw(self.accel)
    }
}

/// Unified event wrapper for the bridge event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "cosim-runtime::ego/sync"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the bridge event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Ego state after a successful sync into the traffic simulator.
    Telemetry(VehicleState),
    /// Lane-change / acceleration command for the ego vehicle.
    Command(VehicleCommand),
    /// Pose to push into the physics simulator.
    PoseTarget(Pose),
    /// A simulator call failed or timed out.
    AuthorityFault {
        operation: String,
        message: String,
    },
}

/// Raw failure reported by a simulator control interface.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{0}")]
pub struct SimFault(pub String);

impl SimFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Global error type for the bridge.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("{authority} simulator unavailable during {operation} for '{vehicle_id}': {details}")]
    AuthorityUnavailable {
        authority: Authority,
        operation: String,
        vehicle_id: String,
        details: String,
    },

    #[error("{operation} exceeded its {timeout_ms} ms deadline")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The adapter was still held by an earlier unit of work.
    #[error("{operation} not applied: adapter busy with an earlier call")]
    Busy { operation: String },

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("control regime already selected: {0}")]
    RegimeLocked(ControlRegime),
}
