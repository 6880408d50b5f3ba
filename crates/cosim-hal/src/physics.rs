//! Physics simulator control interface.
//!
//! The physics simulator is positionally authoritative: the bridge reads the
//! ego model's pose and twist from it and, in the other direction, can write a
//! pose back into it.

use std::time::Duration;

use cosim_frames::{Quaternion, Vec3};
use cosim_types::SimFault;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Reference frame used for every pose written by the bridge.
pub const WORLD_FRAME: &str = "world";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

/// Linear and angular velocity, expressed in the model's body frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// Full state of a named model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub model_name: String,
    pub pose: ModelPose,
    pub twist: Twist,
    pub reference_frame: String,
}

impl ModelState {
    /// A model at rest at `pose`, expressed in [`WORLD_FRAME`].
    pub fn at_rest(model_name: impl Into<String>, pose: ModelPose) -> Self {
        Self {
            model_name: model_name.into(),
            pose,
            twist: Twist::default(),
            reference_frame: WORLD_FRAME.to_string(),
        }
    }
}

/// The physics simulator's model-state services.
pub trait PhysicsSim: Send {
    /// `true` once the model-state services accept requests.
    fn is_available(&mut self) -> bool;

    /// Pose and twist of `model_name`.  Fails if the model is unknown or the
    /// service is down.
    fn model_state(&mut self, model_name: &str) -> Result<ModelState, SimFault>;

    /// Overwrite the pose (and twist) of `state.model_name`.
    fn set_model_state(&mut self, state: &ModelState) -> Result<(), SimFault>;
}

/// Block until `sim` reports its services available, polling every
/// `poll_interval`.
///
/// There is no deadline: the bridge cannot start without the physics
/// authority.
pub fn wait_for_authority<P: PhysicsSim + ?Sized>(sim: &mut P, poll_interval: Duration) {
    if sim.is_available() {
        return;
    }
    info!(
        poll_ms = poll_interval.as_millis() as u64,
        "waiting for physics model-state services"
    );
    let mut polls: u64 = 1;
    while !sim.is_available() {
        debug!(polls, "physics services still unavailable");
        std::thread::sleep(poll_interval);
        polls += 1;
    }
    info!(polls, "physics model-state services available");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowStart {
        remaining: u32,
        polls: u32,
    }

    impl PhysicsSim for SlowStart {
        fn is_available(&mut self) -> bool {
            self.polls += 1;
            if self.remaining == 0 {
                true
            } else {
                self.remaining -= 1;
                false
            }
        }

        fn model_state(&mut self, model_name: &str) -> Result<ModelState, SimFault> {
            Err(SimFault::new(format!("no model '{model_name}'")))
        }

        fn set_model_state(&mut self, _state: &ModelState) -> Result<(), SimFault> {
            Ok(())
        }
    }

    #[test]
    fn wait_returns_immediately_when_available() {
        let mut sim = SlowStart { remaining: 0, polls: 0 };
        wait_for_authority(&mut sim, Duration::from_secs(60));
        assert_eq!(sim.polls, 1);
    }

    #[test]
    fn wait_polls_until_available() {
        let mut sim = SlowStart { remaining: 3, polls: 0 };
        wait_for_authority(&mut sim, Duration::from_millis(1));
        assert_eq!(sim.remaining, 0);
        assert_eq!(sim.polls, 4);
    }

    #[test]
    fn at_rest_uses_world_frame() {
        let state = ModelState::at_rest("ego", ModelPose::default());
        assert_eq!(state.reference_frame, WORLD_FRAME);
        assert_eq!(state.twist, Twist::default());
    }
}
