//! Ego Adapter.
//!
//! [`EgoAdapter`] owns one traffic-simulator handle, one physics-simulator
//! handle and the cached [`VehicleState`] of the ego vehicle.  It mirrors the
//! physics pose into the traffic simulator ([`EgoAdapter::sync_from_authority`]),
//! pushes poses back into the physics simulator
//! ([`EgoAdapter::sync_to_authority`]) and applies lane-change / acceleration
//! commands ([`EgoAdapter::handle_command`]).
//!
//! Every simulator failure is logged at the call site with the vehicle id and
//! the operation, converted into [`BridgeError::AuthorityUnavailable`], and
//! ends the current handler.  Nothing is retried.

use cosim_frames::{Vec3, project, to_physics_orientation, to_traffic_heading};
use cosim_frames::heading::physics_yaw;
use cosim_hal::{LaneChangeMode, ModelPose, ModelState, MoveToXy, PhysicsSim, SpeedMode, TrafficSim};
use cosim_types::{
    Acceleration, AdapterConfig, Authority, BridgeError, ControlRegime, LaneChange, Pose, SimFault,
    VehicleCommand, VehicleState,
};
use tracing::{debug, error, info, instrument, warn};

/// Inclusive range of lane indices a commanded lane change may land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneBounds {
    pub min: i32,
    pub max: i32,
}

impl LaneBounds {
    /// The two-lane road the bridge was built for: lanes `0` and `1`.
    pub const TWO_LANE: LaneBounds = LaneBounds { min: 0, max: 1 };

    pub fn contains(self, lane_index: i32) -> bool {
        (self.min..=self.max).contains(&lane_index)
    }
}

impl Default for LaneBounds {
    fn default() -> Self {
        Self::TWO_LANE
    }
}

/// What the lane-change half of a command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneChangeOutcome {
    /// No shift requested, or the requested value was not a known direction.
    Skipped,
    /// The target lane lies outside the [`LaneBounds`].
    OutOfBounds { current: i32, desired: i32 },
    /// `change_lane` was issued.
    Requested { from: i32, to: i32 },
}

/// What the acceleration half of a command did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedOutcome {
    /// The sentinel was sent; speed and speed mode were left alone.
    Held,
    /// `set_speed(to)` was issued.
    Requested { from: f64, to: f64 },
}

/// Result of [`EgoAdapter::handle_command`].  The two halves of a command are
/// processed independently, so each carries its own result.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    pub lane_change: Result<LaneChangeOutcome, BridgeError>,
    pub acceleration: Result<SpeedOutcome, BridgeError>,
}

impl CommandReport {
    /// The first failure, lane change before acceleration.
    pub fn first_error(&self) -> Option<&BridgeError> {
        self.lane_change
            .as_ref()
            .err()
            .or(self.acceleration.as_ref().err())
    }
}

/// Bridge between the two simulators for a single ego vehicle.
pub struct EgoAdapter<T, P> {
    state: VehicleState,
    config: AdapterConfig,
    lane_bounds: LaneBounds,
    regime: Option<ControlRegime>,
    traffic: T,
    physics: P,
}

impl<T: TrafficSim, P: PhysicsSim> EgoAdapter<T, P> {
    /// `vehicle_id` names the vehicle in the traffic simulator and the model
    /// in the physics simulator.
    pub fn new(vehicle_id: impl Into<String>, config: AdapterConfig, traffic: T, physics: P) -> Self {
        Self {
            state: VehicleState::new(vehicle_id),
            config,
            lane_bounds: LaneBounds::default(),
            regime: None,
            traffic,
            physics,
        }
    }

    pub fn with_lane_bounds(mut self, bounds: LaneBounds) -> Self {
        self.lane_bounds = bounds;
        self
    }

    pub fn vehicle_id(&self) -> &str {
        &self.state.vehicle_id
    }

    /// Last state successfully mirrored into the traffic simulator.
    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// `None` until [`depart`][Self::depart] has succeeded.
    pub fn regime(&self) -> Option<ControlRegime> {
        self.regime
    }

    pub fn traffic(&self) -> &T {
        &self.traffic
    }

    pub fn traffic_mut(&mut self) -> &mut T {
        &mut self.traffic
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    // ─────────────────────────────────────────────────────────────────────
    // Departure
    // ─────────────────────────────────────────────────────────────────────

    /// Put the traffic simulator into `regime` for the rest of the run.
    ///
    /// The regime is locked only once every mode call has gone through; a
    /// later call returns [`BridgeError::RegimeLocked`].
    #[instrument(skip(self), fields(vehicle_id = %self.state.vehicle_id))]
    pub fn depart(&mut self, regime: ControlRegime) -> Result<(), BridgeError> {
        if let Some(current) = self.regime {
            warn!(%current, requested = %regime, "control regime already selected");
            return Err(BridgeError::RegimeLocked(current));
        }

        let id = self.state.vehicle_id.clone();
        match regime {
            ControlRegime::PhysicsAuthoritative => {
                self.traffic
                    .set_speed_mode(&id, SpeedMode::NONE)
                    .map_err(|e| self.traffic_fault("set_speed_mode", e))?;
                self.traffic
                    .set_lane_change_mode(&id, LaneChangeMode::NONE)
                    .map_err(|e| self.traffic_fault("set_lane_change_mode", e))?;
                self.traffic
                    .set_speed(&id, 0.0)
                    .map_err(|e| self.traffic_fault("set_speed", e))?;
            }
            ControlRegime::TrafficAuthoritative => {
                self.traffic
                    .set_speed_mode(&id, SpeedMode::ALL_CHECKS)
                    .map_err(|e| self.traffic_fault("set_speed_mode", e))?;
                self.traffic
                    .set_lane_change_mode(&id, LaneChangeMode::NONE)
                    .map_err(|e| self.traffic_fault("set_lane_change_mode", e))?;
            }
        }

        self.regime = Some(regime);
        info!(%regime, "ego vehicle departed");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // State synchronisation
    // ─────────────────────────────────────────────────────────────────────

    /// Mirror the physics pose and forward speed into the traffic simulator.
    ///
    /// The position is projected `lookahead_m` ahead along the physics yaw
    /// and the vehicle is repositioned on the road and lane the traffic
    /// simulator currently has it on.  The cached state changes only after
    /// the matching traffic call succeeded.
    #[instrument(skip(self), fields(vehicle_id = %self.state.vehicle_id))]
    pub fn sync_from_authority(&mut self) -> Result<VehicleState, BridgeError> {
        let id = self.state.vehicle_id.clone();

        let model = self
            .physics
            .model_state(&id)
            .map_err(|e| self.physics_fault("get_model_state", e))?;

        let orientation = model.pose.orientation;
        let heading_deg = to_traffic_heading(orientation);
        let (x, y) = project(
            model.pose.position.x,
            model.pose.position.y,
            physics_yaw(orientation),
            self.config.lookahead_m,
        );
        let speed = model.twist.linear.x.abs();

        let road_id = self
            .traffic
            .road_id(&id)
            .map_err(|e| self.traffic_fault("road_id", e))?;
        let lane_index = self
            .traffic
            .lane_index(&id)
            .map_err(|e| self.traffic_fault("lane_index", e))?;

        let target = MoveToXy {
            road_id,
            lane_index,
            x,
            y,
            angle_deg: heading_deg,
            keep_route: 0,
        };
        self.traffic
            .move_to_xy(&id, &target)
            .map_err(|e| self.traffic_fault("move_to_xy", e))?;
        self.state.x = x;
        self.state.y = y;
        self.state.heading_deg = heading_deg;

        self.traffic
            .set_speed(&id, speed)
            .map_err(|e| self.traffic_fault("set_speed", e))?;
        self.state.speed = speed;

        debug!(x, y, heading_deg, speed, lane_index, "ego mirrored into traffic");
        Ok(self.state.clone())
    }

    /// Write `pose` into the physics simulator as the ego model's state.
    #[instrument(skip(self), fields(vehicle_id = %self.state.vehicle_id))]
    pub fn sync_to_authority(&mut self, pose: Pose) -> Result<(), BridgeError> {
        let target = ModelState::at_rest(
            self.state.vehicle_id.clone(),
            ModelPose {
                position: Vec3::new(pose.x, pose.y, 0.0),
                orientation: to_physics_orientation(pose.heading_rad),
            },
        );
        self.physics
            .set_model_state(&target)
            .map_err(|e| self.physics_fault("set_model_state", e))?;
        debug!(x = pose.x, y = pose.y, heading_rad = pose.heading_rad, "pose pushed to physics");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Apply both halves of `command`.  A failure in one half does not stop
    /// the other.
    #[instrument(skip(self), fields(vehicle_id = %self.state.vehicle_id))]
    pub fn handle_command(&mut self, command: &VehicleCommand) -> CommandReport {
        CommandReport {
            lane_change: self.change_lane(command.lane_change()),
            acceleration: self.apply_acceleration(command.acceleration()),
        }
    }

    /// Shift one lane left or right if the target lane is within bounds.
    pub fn change_lane(&mut self, request: LaneChange) -> Result<LaneChangeOutcome, BridgeError> {
        let direction = match request {
            LaneChange::Keep => return Ok(LaneChangeOutcome::Skipped),
            LaneChange::Unknown(raw) => {
                warn!(
                    vehicle_id = %self.state.vehicle_id,
                    raw,
                    "ignoring unknown lane-change value"
                );
                return Ok(LaneChangeOutcome::Skipped);
            }
            LaneChange::Left | LaneChange::Right => request.direction().unwrap_or_default(),
        };

        let id = self.state.vehicle_id.clone();
        let current = self
            .traffic
            .lane_index(&id)
            .map_err(|e| self.traffic_fault("lane_index", e))?;
        let desired = current + direction;

        if !self.lane_bounds.contains(desired) {
            debug!(vehicle_id = %id, current, desired, "lane change out of bounds, dropped");
            return Ok(LaneChangeOutcome::OutOfBounds { current, desired });
        }

        self.traffic
            .change_lane(&id, desired, 0.0)
            .map_err(|e| self.traffic_fault("change_lane", e))?;
        info!(vehicle_id = %id, from = current, to = desired, "lane change requested");
        Ok(LaneChangeOutcome::Requested {
            from: current,
            to: desired,
        })
    }

    /// Integrate `request` over one control time step and command the result.
    pub fn apply_acceleration(&mut self, request: Acceleration) -> Result<SpeedOutcome, BridgeError> {
        let accel = match request {
            Acceleration::Hold => return Ok(SpeedOutcome::Held),
            Acceleration::Apply(a) => a,
        };

        let id = self.state.vehicle_id.clone();
        self.traffic
            .set_speed_mode(&id, SpeedMode::NONE)
            .map_err(|e| self.traffic_fault("set_speed_mode", e))?;
        let current = self
            .traffic
            .speed(&id)
            .map_err(|e| self.traffic_fault("speed", e))?;

        let desired = current + accel * self.config.control_time_step_s;
        if desired < 0.0 {
            warn!(vehicle_id = %id, current, accel, desired, "commanding negative speed");
        }

        self.traffic
            .set_speed(&id, desired)
            .map_err(|e| self.traffic_fault("set_speed", e))?;
        debug!(vehicle_id = %id, current, accel, desired, "speed requested");
        Ok(SpeedOutcome::Requested {
            from: current,
            to: desired,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Error helpers
    // ─────────────────────────────────────────────────────────────────────

    fn traffic_fault(&self, operation: &str, fault: SimFault) -> BridgeError {
        self.fault(Authority::Traffic, operation, fault)
    }

    fn physics_fault(&self, operation: &str, fault: SimFault) -> BridgeError {
        self.fault(Authority::Physics, operation, fault)
    }

    fn fault(&self, authority: Authority, operation: &str, fault: SimFault) -> BridgeError {
        error!(
            vehicle_id = %self.state.vehicle_id,
            %authority,
            operation,
            error = %fault,
            "simulator call failed"
        );
        BridgeError::AuthorityUnavailable {
            authority,
            operation: operation.to_string(),
            vehicle_id: self.state.vehicle_id.clone(),
            details: fault.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_frames::Quaternion;
    use cosim_frames::heading::yaw_to_traffic_heading;
    use cosim_hal::{
        PhysicsOp, SimPhysicsEngine, SimTrafficEngine, SimVehicle, TrafficCall, TrafficOp, Twist,
        WORLD_FRAME,
    };
    use cosim_types::ACCEL_SENTINEL;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOL: f64 = 1e-9;

    type SimAdapter = EgoAdapter<SimTrafficEngine, SimPhysicsEngine>;

    fn model(name: &str, x: f64, y: f64, yaw: f64, forward: f64) -> ModelState {
        ModelState {
            model_name: name.to_string(),
            pose: ModelPose {
                position: Vec3::new(x, y, 0.0),
                orientation: Quaternion::from_yaw(yaw),
            },
            twist: Twist {
                linear: Vec3::new(forward, 0.0, 0.0),
                angular: Vec3::zero(),
            },
            reference_frame: WORLD_FRAME.to_string(),
        }
    }

    fn adapter_on_lane(lane: i32, speed: f64) -> SimAdapter {
        let traffic = SimTrafficEngine::new().with_call_log()
            .with_vehicle("ego1", SimVehicle::on_road("edge_0", lane).with_speed(speed));
        let physics = SimPhysicsEngine::new().with_call_log().with_model(model("ego1", 10.0, 5.0, 0.0, 3.0));
        EgoAdapter::new("ego1", AdapterConfig::default(), traffic, physics)
    }

    // ── sync_from_authority ─────────────────────────────────────────────────

    #[test]
    fn sync_from_authority_mirrors_projected_pose_and_speed() {
        let mut ego = adapter_on_lane(1, 0.0);

        let state = ego.sync_from_authority().unwrap();

        assert!((state.x - 12.0).abs() < TOL);
        assert!((state.y - 5.0).abs() < TOL);
        assert!((state.heading_deg - 90.0).abs() < TOL);
        assert!((state.speed - 3.0).abs() < TOL);

        let moves: Vec<_> = ego
            .traffic()
            .calls()
            .filter_map(|c| match c {
                TrafficCall::MoveToXy(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(moves.len(), 1);
        let m = &moves[0];
        assert_eq!(m.road_id, "edge_0");
        assert_eq!(m.lane_index, 1);
        assert_eq!(m.keep_route, 0);
        assert!((m.x - 12.0).abs() < TOL);
        assert!((m.y - 5.0).abs() < TOL);
        assert!((m.angle_deg - 90.0).abs() < TOL);

        let vehicle = ego.traffic().vehicle("ego1").unwrap();
        assert!((vehicle.speed - 3.0).abs() < TOL);
        assert_eq!(ego.state(), &state);
    }

    #[test]
    fn sync_from_authority_uses_absolute_forward_speed() {
        let traffic =
            SimTrafficEngine::new().with_call_log().with_vehicle("ego1", SimVehicle::on_road("edge_0", 0));
        let physics = SimPhysicsEngine::new().with_call_log().with_model(model("ego1", 0.0, 0.0, PI, -2.5));
        let mut ego = EgoAdapter::new("ego1", AdapterConfig::default(), traffic, physics);

        let state = ego.sync_from_authority().unwrap();

        assert!((state.speed - 2.5).abs() < TOL);
        assert!((state.x + 2.0).abs() < TOL);
        assert!(state.y.abs() < TOL);
        assert!((state.heading_deg - 270.0).abs() < TOL);
        assert!((state.heading_deg - yaw_to_traffic_heading(PI)).abs() < TOL);
    }

    #[test]
    fn physics_failure_leaves_state_untouched_and_skips_traffic() {
        let mut ego = adapter_on_lane(0, 0.0);
        ego.sync_from_authority().unwrap();
        let before = ego.state().clone();
        ego.traffic_mut().clear_calls();
        ego.physics_mut().set_failing(PhysicsOp::GetModelState, true);

        let err = ego.sync_from_authority().unwrap_err();

        assert!(matches!(
            err,
            BridgeError::AuthorityUnavailable { authority: Authority::Physics, ref operation, ref vehicle_id, .. }
                if operation == "get_model_state" && vehicle_id == "ego1"
        ));
        assert_eq!(ego.state(), &before);
        assert_eq!(ego.traffic().calls().count(), 0);
    }

    #[test]
    fn failed_reposition_keeps_cached_pose() {
        let traffic = SimTrafficEngine::new().with_call_log()
            .with_vehicle("ego1", SimVehicle::on_road("edge_0", 0))
            .fail_on(TrafficOp::MoveToXy);
        let physics = SimPhysicsEngine::new().with_call_log().with_model(model("ego1", 10.0, 5.0, 0.0, 3.0));
        let mut ego = EgoAdapter::new("ego1", AdapterConfig::default(), traffic, physics);

        let err = ego.sync_from_authority().unwrap_err();

        assert!(matches!(err, BridgeError::AuthorityUnavailable { authority: Authority::Traffic, .. }));
        assert_eq!(ego.state(), &VehicleState::new("ego1"));
        assert_eq!(ego.traffic().count(TrafficOp::SetSpeed), 0);
    }

    #[test]
    fn failed_set_speed_keeps_cached_speed_but_not_pose() {
        let traffic = SimTrafficEngine::new().with_call_log()
            .with_vehicle("ego1", SimVehicle::on_road("edge_0", 0))
            .fail_on(TrafficOp::SetSpeed);
        let physics = SimPhysicsEngine::new().with_call_log().with_model(model("ego1", 10.0, 5.0, 0.0, 3.0));
        let mut ego = EgoAdapter::new("ego1", AdapterConfig::default(), traffic, physics);

        assert!(ego.sync_from_authority().is_err());
        assert!((ego.state().x - 12.0).abs() < TOL);
        assert_eq!(ego.state().speed, 0.0);
    }

    #[test]
    fn lookahead_is_configurable() {
        let traffic =
            SimTrafficEngine::new().with_call_log().with_vehicle("ego1", SimVehicle::on_road("edge_0", 0));
        let physics = SimPhysicsEngine::new().with_call_log().with_model(model("ego1", 10.0, 5.0, 0.0, 0.0));
        let config = AdapterConfig {
            lookahead_m: 0.0,
            ..AdapterConfig::default()
        };
        let mut ego = EgoAdapter::new("ego1", config, traffic, physics);

        let state = ego.sync_from_authority().unwrap();
        assert!((state.x - 10.0).abs() < TOL);
    }

    // ── sync_to_authority ───────────────────────────────────────────────────

    #[test]
    fn sync_to_authority_writes_rotated_pose_in_world_frame() {
        let mut ego = adapter_on_lane(0, 0.0);

        ego.sync_to_authority(Pose::new(3.0, -4.0, 0.0)).unwrap();

        let written = &ego.physics().set_calls()[0];
        assert_eq!(written.model_name, "ego1");
        assert_eq!(written.reference_frame, WORLD_FRAME);
        assert_eq!(written.pose.position, Vec3::new(3.0, -4.0, 0.0));
        let (roll, pitch, yaw) = written.pose.orientation.to_euler();
        assert!(roll.abs() < TOL && pitch.abs() < TOL);
        assert!((yaw - FRAC_PI_2).abs() < TOL);
    }

    #[test]
    fn sync_to_authority_failure_is_reported_once() {
        let mut ego = adapter_on_lane(0, 0.0);
        ego.physics_mut().set_failing(PhysicsOp::SetModelState, true);

        let err = ego.sync_to_authority(Pose::new(0.0, 0.0, 0.0)).unwrap_err();

        assert!(matches!(
            err,
            BridgeError::AuthorityUnavailable { authority: Authority::Physics, ref operation, .. }
                if operation == "set_model_state"
        ));
        assert_eq!(ego.physics().set_calls().len(), 1);
    }

    // ── lane changes ────────────────────────────────────────────────────────

    #[test]
    fn left_from_lane_zero_requests_lane_one() {
        let mut ego = adapter_on_lane(0, 0.0);

        let report = ego.handle_command(&VehicleCommand::new(1, ACCEL_SENTINEL));

        assert_eq!(report.lane_change, Ok(LaneChangeOutcome::Requested { from: 0, to: 1 }));
        assert_eq!(
            ego.traffic().mutations(),
            vec![&TrafficCall::ChangeLane {
                lane_index: 1,
                duration_s: 0.0
            }]
        );
    }

    #[test]
    fn right_from_lane_one_requests_lane_zero() {
        let mut ego = adapter_on_lane(1, 0.0);

        let outcome = ego.change_lane(LaneChange::Right).unwrap();

        assert_eq!(outcome, LaneChangeOutcome::Requested { from: 1, to: 0 });
        assert_eq!(ego.traffic().vehicle("ego1").unwrap().lane_index, 0);
    }

    #[test]
    fn left_from_lane_one_is_dropped_without_mutation() {
        let mut ego = adapter_on_lane(1, 0.0);

        let outcome = ego.change_lane(LaneChange::Left).unwrap();

        assert_eq!(outcome, LaneChangeOutcome::OutOfBounds { current: 1, desired: 2 });
        assert!(ego.traffic().mutations().is_empty());
    }

    #[test]
    fn right_from_lane_zero_is_dropped_without_mutation() {
        let mut ego = adapter_on_lane(0, 0.0);

        let outcome = ego.change_lane(LaneChange::Right).unwrap();

        assert_eq!(outcome, LaneChangeOutcome::OutOfBounds { current: 0, desired: -1 });
        assert!(ego.traffic().mutations().is_empty());
    }

    #[test]
    fn keep_and_unknown_make_no_calls() {
        let mut ego = adapter_on_lane(0, 0.0);

        assert_eq!(ego.change_lane(LaneChange::Keep), Ok(LaneChangeOutcome::Skipped));
        assert_eq!(ego.change_lane(LaneChange::Unknown(7)), Ok(LaneChangeOutcome::Skipped));
        assert_eq!(ego.traffic().calls().count(), 0);
    }

    #[test]
    fn wider_lane_bounds_accept_more_lanes() {
        let mut ego = adapter_on_lane(1, 0.0).with_lane_bounds(LaneBounds { min: 0, max: 3 });

        let outcome = ego.change_lane(LaneChange::Left).unwrap();

        assert_eq!(outcome, LaneChangeOutcome::Requested { from: 1, to: 2 });
    }

    #[test]
    fn lane_query_failure_aborts_lane_handling() {
        let mut ego = adapter_on_lane(0, 0.0);
        ego.traffic_mut().set_failing(TrafficOp::LaneIndex, true);

        let err = ego.change_lane(LaneChange::Left).unwrap_err();

        assert!(matches!(
            err,
            BridgeError::AuthorityUnavailable { ref operation, .. } if operation == "lane_index"
        ));
        assert_eq!(ego.traffic().count(TrafficOp::ChangeLane), 0);
    }

    // ── acceleration ────────────────────────────────────────────────────────

    #[test]
    fn acceleration_integrates_over_one_time_step() {
        let mut ego = adapter_on_lane(0, 10.0);

        let outcome = ego.apply_acceleration(Acceleration::Apply(2.0)).unwrap();

        let expected = 10.0 + 2.0 * 0.05;
        assert_eq!(outcome, SpeedOutcome::Requested { from: 10.0, to: expected });
        let vehicle = ego.traffic().vehicle("ego1").unwrap();
        assert_eq!(vehicle.speed_mode, SpeedMode::NONE);
        assert_eq!(vehicle.speed, expected);
        assert_eq!(
            ego.traffic().mutations(),
            vec![
                &TrafficCall::SetSpeedMode(SpeedMode::NONE),
                &TrafficCall::SetSpeed(expected)
            ]
        );
    }

    #[test]
    fn sentinel_leaves_speed_and_speed_mode_untouched() {
        let mut ego = adapter_on_lane(0, 7.0);

        let report = ego.handle_command(&VehicleCommand::new(0, ACCEL_SENTINEL));

        assert_eq!(report.acceleration, Ok(SpeedOutcome::Held));
        assert!(ego.traffic().mutations().is_empty());
        let mode = ego.traffic_mut().speed_mode("ego1").unwrap();
        assert_eq!(mode, SpeedMode::ALL_CHECKS);
        assert_eq!(ego.traffic().vehicle("ego1").unwrap().speed, 7.0);
    }

    #[test]
    fn negative_result_is_passed_through() {
        let mut ego = adapter_on_lane(0, 0.1);

        let outcome = ego.apply_acceleration(Acceleration::Apply(-10.0)).unwrap();

        let expected = 0.1 + -10.0 * 0.05;
        assert_eq!(outcome, SpeedOutcome::Requested { from: 0.1, to: expected });
        assert!(expected < 0.0);
        assert_eq!(ego.traffic().vehicle("ego1").unwrap().speed, expected);
    }

    #[test]
    fn lane_failure_does_not_block_acceleration() {
        let mut ego = adapter_on_lane(0, 4.0);
        ego.traffic_mut().set_failing(TrafficOp::ChangeLane, true);

        let report = ego.handle_command(&VehicleCommand::new(1, 1.0));

        assert!(report.lane_change.is_err());
        let expected = 4.0 + 1.0 * 0.05;
        assert_eq!(report.acceleration, Ok(SpeedOutcome::Requested { from: 4.0, to: expected }));
        assert!(matches!(
            report.first_error(),
            Some(BridgeError::AuthorityUnavailable { operation, .. }) if operation == "change_lane"
        ));
    }

    #[test]
    fn speed_read_failure_skips_set_speed() {
        let mut ego = adapter_on_lane(0, 4.0);
        ego.traffic_mut().set_failing(TrafficOp::Speed, true);

        assert!(ego.apply_acceleration(Acceleration::Apply(1.0)).is_err());
        assert_eq!(ego.traffic().count(TrafficOp::SetSpeed), 0);
    }

    // ── regimes ─────────────────────────────────────────────────────────────

    #[test]
    fn physics_regime_disables_traffic_control() {
        let mut ego = adapter_on_lane(0, 8.0);

        ego.depart(ControlRegime::PhysicsAuthoritative).unwrap();

        assert_eq!(ego.regime(), Some(ControlRegime::PhysicsAuthoritative));
        let vehicle = ego.traffic().vehicle("ego1").unwrap();
        assert_eq!(vehicle.speed_mode, SpeedMode::NONE);
        assert_eq!(vehicle.lane_change_mode, LaneChangeMode::NONE);
        assert_eq!(vehicle.speed, 0.0);
    }

    #[test]
    fn traffic_regime_keeps_safety_checks() {
        let mut ego = adapter_on_lane(0, 8.0);

        ego.depart(ControlRegime::TrafficAuthoritative).unwrap();

        let vehicle = ego.traffic().vehicle("ego1").unwrap();
        assert_eq!(vehicle.speed_mode, SpeedMode::ALL_CHECKS);
        assert_eq!(vehicle.lane_change_mode, LaneChangeMode::NONE);
        assert_eq!(vehicle.speed, 8.0);
        assert_eq!(ego.traffic().count(TrafficOp::SetSpeed), 0);
    }

    #[test]
    fn second_departure_is_rejected() {
        let mut ego = adapter_on_lane(0, 0.0);
        ego.depart(ControlRegime::TrafficAuthoritative).unwrap();
        ego.traffic_mut().clear_calls();

        let err = ego.depart(ControlRegime::PhysicsAuthoritative).unwrap_err();

        assert_eq!(err, BridgeError::RegimeLocked(ControlRegime::TrafficAuthoritative));
        assert_eq!(ego.traffic().calls().count(), 0);
    }

    #[test]
    fn failed_departure_can_be_retried() {
        let mut ego = adapter_on_lane(0, 0.0);
        ego.traffic_mut().set_failing(TrafficOp::SetLaneChangeMode, true);
        assert!(ego.depart(ControlRegime::PhysicsAuthoritative).is_err());
        assert_eq!(ego.regime(), None);

        ego.traffic_mut().set_failing(TrafficOp::SetLaneChangeMode, false);
        assert!(ego.depart(ControlRegime::PhysicsAuthoritative).is_ok());
    }
}
