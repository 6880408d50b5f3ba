//! Inbound command channel.
//!
//! External controllers publish rosbridge-style JSON frames:
//!
//! ```json
//! {"op": "publish", "topic": "/vehicle_change_lane", "msg": {"lane_change": 1, "accel": -100.0}}
//! {"op": "publish", "topic": "/ego_pose", "msg": {"pos_x": 10.0, "pos_y": 5.0, "heading": 0.0}}
//! ```
//!
//! Bare message objects (the `msg` part alone) are accepted too; the shape of
//! the object decides which topic it belongs to.  Decoded messages are
//! published on [`Topic::Commands`].

use std::sync::Arc;

use cosim_types::{BridgeError, Event, EventPayload, Pose, VehicleCommand};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::bus::{EventBus, Topic};

/// Rosbridge topic carrying lane-change / acceleration commands.
pub const COMMAND_TOPIC: &str = "/vehicle_change_lane";

/// Rosbridge topic carrying physics pose targets.
pub const POSE_TOPIC: &str = "/ego_pose";

/// Maximum byte length of a single inbound frame.
///
/// Longer frames are rejected before any JSON parsing happens.
pub const MAX_FRAME_BYTES: usize = 16 * 1024; // 16 KiB

const COMMAND_SOURCE: &str = "cosim-middleware::ingest/vehicle_change_lane";
const POSE_SOURCE: &str = "cosim-middleware::ingest/ego_pose";

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Command(VehicleCommand),
    PoseTarget(Pose),
}

impl Inbound {
    fn into_event(self) -> Event {
        match self {
            Inbound::Command(cmd) => Event::new(COMMAND_SOURCE, EventPayload::Command(cmd)),
            Inbound::PoseTarget(pose) => Event::new(POSE_SOURCE, EventPayload::PoseTarget(pose)),
        }
    }
}

#[derive(Deserialize)]
struct Frame {
    op: String,
    topic: String,
    msg: Value,
}

#[derive(Deserialize)]
struct PoseMsg {
    pos_x: f64,
    pos_y: f64,
    /// Radians.
    heading: f64,
}

impl From<PoseMsg> for Pose {
    fn from(msg: PoseMsg) -> Self {
        Pose::new(msg.pos_x, msg.pos_y, msg.heading)
    }
}

/// Decode one inbound frame without publishing it.
pub fn decode_frame(raw: &str) -> Result<Inbound, BridgeError> {
    if raw.len() > MAX_FRAME_BYTES {
        return Err(BridgeError::Parsing(format!(
            "frame is {} bytes, exceeding the limit of {}",
            raw.len(),
            MAX_FRAME_BYTES,
        )));
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BridgeError::Parsing(format!("invalid JSON frame: {e}")))?;

    if value.get("op").is_some() {
        let frame: Frame = serde_json::from_value(value)
            .map_err(|e| BridgeError::Parsing(format!("malformed rosbridge frame: {e}")))?;
        if frame.op != "publish" {
            return Err(BridgeError::Parsing(format!(
                "unsupported rosbridge op '{}'",
                frame.op
            )));
        }
        return match frame.topic.as_str() {
            COMMAND_TOPIC => decode_command(frame.msg),
            POSE_TOPIC => decode_pose(frame.msg),
            other => Err(BridgeError::Parsing(format!("unsupported topic '{other}'"))),
        };
    }

    // Bare message: pose fields take precedence over command fields.
    if value.get("pos_x").is_some() {
        decode_pose(value)
    } else if value.get("lane_change").is_some() || value.get("accel").is_some() {
        decode_command(value)
    } else {
        Err(BridgeError::Parsing(
            "frame is neither a vehicle command nor a pose target".to_string(),
        ))
    }
}

fn decode_command(msg: Value) -> Result<Inbound, BridgeError> {
    serde_json::from_value::<VehicleCommand>(msg)
        .map(Inbound::Command)
        .map_err(|e| BridgeError::Parsing(format!("malformed vehicle command: {e}")))
}

fn decode_pose(msg: Value) -> Result<Inbound, BridgeError> {
    serde_json::from_value::<PoseMsg>(msg)
        .map(|p| Inbound::PoseTarget(p.into()))
        .map_err(|e| BridgeError::Parsing(format!("malformed pose target: {e}")))
}

/// Decodes inbound frames and streams them into the [`EventBus`].
pub struct CommandIngest {
    bus: Arc<EventBus>,
}

impl CommandIngest {
    /// Create a new [`CommandIngest`] backed by the given [`EventBus`].
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Decode `raw` and publish it on [`Topic::Commands`].
    ///
    /// Returns the number of subscribers that received the event.
    pub fn ingest_frame(&self, raw: &str) -> Result<usize, BridgeError> {
        let inbound = decode_frame(raw)?;
        debug!(?inbound, "decoded inbound frame");
        self.publish(inbound)
    }

    pub fn ingest_command(&self, command: VehicleCommand) -> Result<usize, BridgeError> {
        self.publish(Inbound::Command(command))
    }

    pub fn ingest_pose(&self, pose: Pose) -> Result<usize, BridgeError> {
        self.publish(Inbound::PoseTarget(pose))
    }

    fn publish(&self, inbound: Inbound) -> Result<usize, BridgeError> {
        self.bus.publish_to(Topic::Commands, inbound.into_event())
    }
}
