//! In-process simulated engines for headless runs and CI.
//!
//! [`SimTrafficEngine`] and [`SimPhysicsEngine`] implement the two control
//! interfaces without any external process.  Both record every call they
//! receive and can be told to fail specific operations, which is how the
//! bridge's error paths are exercised in tests.
//!
//! Call recording is off unless asked for with `with_call_log()`, so a
//! long-running headless bridge does not accumulate history.
//!
//! # Stub behaviour
//!
//! | Engine | Behaviour |
//! |---|---|
//! | [`SimTrafficEngine`] | Per-vehicle record of road, lane, speed and modes; setters overwrite it; unknown vehicles fault. |
//! | [`SimPhysicsEngine`] | Per-model [`ModelState`]; optional auto-step integrates the twist on each read. |
//!
//! # Example
//!
//! ```rust
//! use cosim_hal::sim::{SimTrafficEngine, SimVehicle, TrafficOp};
//! use cosim_hal::traffic::TrafficSim;
//!
//! let mut traffic = SimTrafficEngine::new()
//!     .with_vehicle("ego", SimVehicle::on_road("edge_0", 0))
//!     .fail_on(TrafficOp::ChangeLane);
//!
//! assert_eq!(traffic.lane_index("ego").unwrap(), 0);
//! assert!(traffic.change_lane("ego", 1, 0.0).is_err());
//! ```

use std::collections::{HashMap, HashSet};

use cosim_frames::heading::physics_yaw;
use cosim_types::SimFault;

use crate::physics::{ModelState, PhysicsSim};
use crate::traffic::{LaneChangeMode, MoveToXy, SpeedMode, TrafficSim};

// ─────────────────────────────────────────────────────────────────────────────
// Traffic engine
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies one [`TrafficSim`] operation, for fault injection and call-log
/// filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficOp {
    RoadId,
    LaneIndex,
    Speed,
    SpeedMode,
    SetSpeed,
    SetSpeedMode,
    SetLaneChangeMode,
    ChangeLane,
    MoveToXy,
}

impl TrafficOp {
    /// `true` for operations that change simulator state.
    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            TrafficOp::RoadId | TrafficOp::LaneIndex | TrafficOp::Speed | TrafficOp::SpeedMode
        )
    }
}

/// One recorded call against [`SimTrafficEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrafficCall {
    Query(TrafficOp),
    SetSpeed(f64),
    SetSpeedMode(SpeedMode),
    SetLaneChangeMode(LaneChangeMode),
    ChangeLane { lane_index: i32, duration_s: f64 },
    MoveToXy(MoveToXy),
}

impl TrafficCall {
    pub fn op(&self) -> TrafficOp {
        match self {
            TrafficCall::Query(op) => *op,
            TrafficCall::SetSpeed(_) => TrafficOp::SetSpeed,
            TrafficCall::SetSpeedMode(_) => TrafficOp::SetSpeedMode,
            TrafficCall::SetLaneChangeMode(_) => TrafficOp::SetLaneChangeMode,
            TrafficCall::ChangeLane { .. } => TrafficOp::ChangeLane,
            TrafficCall::MoveToXy(_) => TrafficOp::MoveToXy,
        }
    }
}

/// Simulated per-vehicle state held by [`SimTrafficEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimVehicle {
    pub road_id: String,
    pub lane_index: i32,
    pub speed: f64,
    pub speed_mode: SpeedMode,
    pub lane_change_mode: LaneChangeMode,
    pub x: f64,
    pub y: f64,
    pub angle_deg: f64,
}

impl SimVehicle {
    /// A stationary vehicle on `road_id`/`lane_index` with the simulator's
    /// default modes.
    pub fn on_road(road_id: impl Into<String>, lane_index: i32) -> Self {
        Self {
            road_id: road_id.into(),
            lane_index,
            speed: 0.0,
            speed_mode: SpeedMode::ALL_CHECKS,
            lane_change_mode: LaneChangeMode::DEFAULT,
            x: 0.0,
            y: 0.0,
            angle_deg: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}

/// In-process stand-in for the road-traffic simulator.
#[derive(Debug, Default)]
pub struct SimTrafficEngine {
    vehicles: HashMap<String, SimVehicle>,
    failing: HashSet<TrafficOp>,
    record_calls: bool,
    calls: Vec<TrafficCall>,
}

impl SimTrafficEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a vehicle.
    pub fn with_vehicle(mut self, vehicle_id: impl Into<String>, vehicle: SimVehicle) -> Self {
        self.vehicles.insert(vehicle_id.into(), vehicle);
        self
    }

    /// Record every call for [`calls`][Self::calls] and friends.
    pub fn with_call_log(mut self) -> Self {
        self.record_calls = true;
        self
    }

    /// Make every future `op` call fail.
    pub fn fail_on(mut self, op: TrafficOp) -> Self {
        self.failing.insert(op);
        self
    }

    /// Toggle fault injection for `op` on an engine already in use.
    pub fn set_failing(&mut self, op: TrafficOp, failing: bool) {
        if failing {
            self.failing.insert(op);
        } else {
            self.failing.remove(&op);
        }
    }

    pub fn vehicle(&self, vehicle_id: &str) -> Option<&SimVehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// Every call received, in order, including failed ones.  Empty unless
    /// the engine was built [`with_call_log`][Self::with_call_log].
    pub fn calls(&self) -> impl Iterator<Item = &TrafficCall> {
        self.calls.iter()
    }

    /// Calls that attempted to change simulator state.
    pub fn mutations(&self) -> Vec<&TrafficCall> {
        self.calls().filter(|c| c.op().is_mutation()).collect()
    }

    pub fn count(&self, op: TrafficOp) -> usize {
        self.calls().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    // Records the call, applies fault injection, and resolves the vehicle.
    fn enter(&mut self, vehicle_id: &str, call: TrafficCall) -> Result<&mut SimVehicle, SimFault> {
        let op = call.op();
        if self.record_calls {
            self.calls.push(call);
        }
        if self.failing.contains(&op) {
            return Err(SimFault::new(format!("injected fault in {op:?}")));
        }
        self.vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| SimFault::new(format!("Vehicle '{vehicle_id}' is not known")))
    }
}

impl TrafficSim for SimTrafficEngine {
    fn road_id(&mut self, vehicle_id: &str) -> Result<String, SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::Query(TrafficOp::RoadId))?;
        Ok(v.road_id.clone())
    }

    fn lane_index(&mut self, vehicle_id: &str) -> Result<i32, SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::Query(TrafficOp::LaneIndex))?;
        Ok(v.lane_index)
    }

    fn speed(&mut self, vehicle_id: &str) -> Result<f64, SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::Query(TrafficOp::Speed))?;
        Ok(v.speed)
    }

    fn speed_mode(&mut self, vehicle_id: &str) -> Result<SpeedMode, SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::Query(TrafficOp::SpeedMode))?;
        Ok(v.speed_mode)
    }

    fn set_speed(&mut self, vehicle_id: &str, speed: f64) -> Result<(), SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::SetSpeed(speed))?;
        v.speed = speed;
        Ok(())
    }

    fn set_speed_mode(&mut self, vehicle_id: &str, mode: SpeedMode) -> Result<(), SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::SetSpeedMode(mode))?;
        v.speed_mode = mode;
        Ok(())
    }

    fn set_lane_change_mode(
        &mut self,
        vehicle_id: &str,
        mode: LaneChangeMode,
    ) -> Result<(), SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::SetLaneChangeMode(mode))?;
        v.lane_change_mode = mode;
        Ok(())
    }

    fn change_lane(
        &mut self,
        vehicle_id: &str,
        lane_index: i32,
        duration_s: f64,
    ) -> Result<(), SimFault> {
        let v = self.enter(
            vehicle_id,
            TrafficCall::ChangeLane {
                lane_index,
                duration_s,
            },
        )?;
        v.lane_index = lane_index;
        Ok(())
    }

    fn move_to_xy(&mut self, vehicle_id: &str, target: &MoveToXy) -> Result<(), SimFault> {
        let v = self.enter(vehicle_id, TrafficCall::MoveToXy(target.clone()))?;
        v.road_id = target.road_id.clone();
        v.lane_index = target.lane_index;
        v.x = target.x;
        v.y = target.y;
        v.angle_deg = target.angle_deg;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Physics engine
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies one [`PhysicsSim`] operation for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicsOp {
    GetModelState,
    SetModelState,
}

/// In-process stand-in for the physics simulator.
#[derive(Debug, Default)]
pub struct SimPhysicsEngine {
    models: HashMap<String, ModelState>,
    failing: HashSet<PhysicsOp>,
    unavailable_polls: u32,
    auto_step_s: Option<f64>,
    record_calls: bool,
    get_calls: usize,
    set_calls: Vec<ModelState>,
}

impl SimPhysicsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a model, keyed by its name.
    pub fn with_model(mut self, state: ModelState) -> Self {
        self.models.insert(state.model_name.clone(), state);
        self
    }

    /// Record every written state for [`set_calls`][Self::set_calls].
    pub fn with_call_log(mut self) -> Self {
        self.record_calls = true;
        self
    }

    pub fn fail_on(mut self, op: PhysicsOp) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn set_failing(&mut self, op: PhysicsOp, failing: bool) {
        if failing {
            self.failing.insert(op);
        } else {
            self.failing.remove(&op);
        }
    }

    /// Report the services unavailable for the first `polls` availability
    /// checks.
    pub fn unavailable_for(mut self, polls: u32) -> Self {
        self.unavailable_polls = polls;
        self
    }

    /// Advance every model by `dt` seconds along its forward velocity each
    /// time its state is read.
    pub fn with_auto_step(mut self, dt: f64) -> Self {
        self.auto_step_s = Some(dt);
        self
    }

    pub fn model(&self, model_name: &str) -> Option<&ModelState> {
        self.models.get(model_name)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls
    }

    /// Every state written through [`PhysicsSim::set_model_state`], including
    /// failed attempts.  Empty unless built with
    /// [`with_call_log`][Self::with_call_log].
    pub fn set_calls(&self) -> &[ModelState] {
        &self.set_calls
    }

    fn step(state: &mut ModelState, dt: f64) {
        let yaw = physics_yaw(state.pose.orientation);
        let (sin, cos) = yaw.sin_cos();
        let v = state.twist.linear.x;
        state.pose.position.x += v * cos * dt;
        state.pose.position.y += v * sin * dt;
    }
}

impl PhysicsSim for SimPhysicsEngine {
    fn is_available(&mut self) -> bool {
        if self.unavailable_polls == 0 {
            return true;
        }
        self.unavailable_polls -= 1;
        false
    }

    fn model_state(&mut self, model_name: &str) -> Result<ModelState, SimFault> {
        self.get_calls += 1;
        if self.failing.contains(&PhysicsOp::GetModelState) {
            return Err(SimFault::new("GetModelState: service call failed"));
        }
        let state = self
            .models
            .get_mut(model_name)
            .ok_or_else(|| SimFault::new(format!("GetModelState: model [{model_name}] does not exist")))?;
        if let Some(dt) = self.auto_step_s {
            Self::step(state, dt);
        }
        Ok(state.clone())
    }

    fn set_model_state(&mut self, state: &ModelState) -> Result<(), SimFault> {
        if self.record_calls {
            self.set_calls.push(state.clone());
        }
        if self.failing.contains(&PhysicsOp::SetModelState) {
            return Err(SimFault::new("SetModelState: service call failed"));
        }
        match self.models.get_mut(&state.model_name) {
            Some(existing) => {
                existing.pose = state.pose;
                existing.twist = state.twist;
                existing.reference_frame = state.reference_frame.clone();
                Ok(())
            }
            None => Err(SimFault::new(format!(
                "SetModelState: model [{}] does not exist",
                state.model_name
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
