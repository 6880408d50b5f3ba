//! Bridge loop.
//!
//! [`BridgeLoop`] drives [`EgoAdapter::sync_from_authority`] at a fixed
//! period and, between ticks, applies whatever arrives on the bus
//! [`Topic::Commands`] channel.
//!
//! Each unit of work runs on a blocking worker thread under the adapter's
//! mutex and is bounded by `call_timeout`.  A unit that overruns is reported
//! as [`BridgeError::Timeout`] but keeps running; until it releases the
//! adapter, later units find the mutex taken and are not queued behind it.
//! A tick that finds the adapter busy is skipped; a command that finds it
//! busy is rejected with [`BridgeError::Busy`] so the sender can retry.
//!
//! | Outcome | Published on |
//! |---|---|
//! | Successful sync, including one that finished after its deadline | [`Topic::Telemetry`] (`EventPayload::Telemetry`) |
//! | Simulator failure, timeout or rejected command | [`Topic::Faults`] (`EventPayload::AuthorityFault`) |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use cosim_hal::{PhysicsSim, TrafficSim};
use cosim_middleware::{EventBus, Topic, TopicReceiver};
use cosim_types::{BridgeError, Event, EventPayload, VehicleState};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::ego::EgoAdapter;

const TELEMETRY_SOURCE: &str = "cosim-runtime::bridge/sync";
const FAULT_SOURCE: &str = "cosim-runtime::bridge/fault";
const MIN_DURATION: Duration = Duration::from_millis(1);

/// Timing of the bridge loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BridgeLoopConfig {
    /// Interval between two `sync_from_authority` ticks.
    pub sync_period: Duration,
    /// Deadline for one tick or one command.
    pub call_timeout: Duration,
}

impl Default for BridgeLoopConfig {
    fn default() -> Self {
        Self {
            sync_period: Duration::from_millis(50),
            call_timeout: Duration::from_millis(500),
        }
    }
}

/// Shared handle to an adapter driven by a [`BridgeLoop`].
pub type SharedAdapter<T, P> = Arc<Mutex<EgoAdapter<T, P>>>;

pub struct BridgeLoop<T, P> {
    adapter: SharedAdapter<T, P>,
    bus: Arc<EventBus>,
    commands: TopicReceiver,
    config: BridgeLoopConfig,
}

impl<T, P> BridgeLoop<T, P>
where
    T: TrafficSim + 'static,
    P: PhysicsSim + 'static,
{
    /// Subscribes to [`Topic::Commands`] immediately, so commands published
    /// after construction are not lost even before [`run`][Self::run].
    ///
    /// Durations below 1 ms are raised to 1 ms.
    pub fn new(adapter: SharedAdapter<T, P>, bus: Arc<EventBus>, config: BridgeLoopConfig) -> Self {
        let commands = bus.subscribe_to(Topic::Commands);
        let config = BridgeLoopConfig {
            sync_period: config.sync_period.max(MIN_DURATION),
            call_timeout: config.call_timeout.max(MIN_DURATION),
        };
        Self {
            adapter,
            bus,
            commands,
            config,
        }
    }

    pub fn adapter(&self) -> SharedAdapter<T, P> {
        Arc::clone(&self.adapter)
    }

    pub fn config(&self) -> BridgeLoopConfig {
        self.config
    }

    /// Run until `shutdown` is raised or the bus closes.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(self.config.sync_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            period_ms = self.config.sync_period.as_millis() as u64,
            timeout_ms = self.config.call_timeout.as_millis() as u64,
            "bridge loop started"
        );

        while !shutdown.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are already logged and published.
                    let _ = self.tick().await;
                }
                received = self.commands.recv() => match received {
                    Ok(event) => {
                        let _ = self.dispatch(event).await;
                    }
                    Err(RecvError::Lagged(dropped)) => {
                        warn!(dropped, "command subscriber lagged, commands dropped");
                    }
                    Err(RecvError::Closed) => {
                        info!("command channel closed");
                        break;
                    }
                },
            }
        }

        info!("bridge loop stopped");
    }

    /// One `sync_from_authority` tick.
    ///
    /// `Ok(None)` means the tick was skipped because the adapter was busy.
    /// Telemetry is published by the worker itself, so a sync that completes
    /// after its deadline is still reported.
    pub async fn tick(&self) -> Result<Option<VehicleState>, BridgeError> {
        let bus = Arc::clone(&self.bus);
        let synced = self
            .run_exclusive("sync_from_authority", move |ego| {
                let state = ego.sync_from_authority()?;
                let event = Event::new(TELEMETRY_SOURCE, EventPayload::Telemetry(state.clone()));
                let _ = bus.publish_to(Topic::Telemetry, event);
                Ok(state)
            })
            .await;
        if let Err(e) = &synced {
            self.publish_fault("sync_from_authority", e);
        }
        synced
    }

    /// Apply one event taken from [`Topic::Commands`].
    ///
    /// A command that finds the adapter busy is not applied and fails with
    /// [`BridgeError::Busy`].
    pub async fn dispatch(&self, event: Event) -> Result<(), BridgeError> {
        match event.payload {
            EventPayload::Command(command) => {
                let operation = "handle_command";
                let report = self
                    .run_exclusive(operation, move |ego| Ok(ego.handle_command(&command)))
                    .await
                    .and_then(|r| r.ok_or_else(|| busy(operation)));
                let outcome = match report {
                    Ok(report) => report.first_error().cloned().map_or(Ok(()), Err),
                    Err(e) => Err(e),
                };
                if let Err(e) = &outcome {
                    self.publish_fault(operation, e);
                }
                outcome
            }
            EventPayload::PoseTarget(pose) => {
                let operation = "sync_to_authority";
                let pushed = self
                    .run_exclusive(operation, move |ego| ego.sync_to_authority(pose))
                    .await
                    .and_then(|r| r.ok_or_else(|| busy(operation)));
                if let Err(e) = &pushed {
                    self.publish_fault(operation, e);
                }
                pushed
            }
            other => {
                debug!(source = %event.source, ?other, "ignoring non-command event");
                Ok(())
            }
        }
    }

    // Runs `work` on a blocking worker holding the adapter lock, bounded by
    // the call timeout.  `Ok(None)`: the lock was held by an earlier unit.
    async fn run_exclusive<R, F>(&self, operation: &'static str, work: F) -> Result<Option<R>, BridgeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut EgoAdapter<T, P>) -> Result<R, BridgeError> + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        let worker = tokio::task::spawn_blocking(move || {
            let mut ego = match adapter.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return Ok(None),
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!(operation, "adapter mutex poisoned by an earlier panic, recovering");
                    poisoned.into_inner()
                }
            };
            work(&mut ego).map(Some)
        });

        let outcome = match tokio::time::timeout(self.config.call_timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(BridgeError::Channel(format!("{operation} worker failed: {join}"))),
            Err(_) => {
                let timeout_ms = self.config.call_timeout.as_millis() as u64;
                warn!(operation, timeout_ms, "deadline exceeded");
                Err(BridgeError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms,
                })
            }
        };

        if let Ok(None) = outcome {
            warn!(operation, "adapter busy with an earlier call");
        }
        outcome
    }

    fn publish_fault(&self, operation: &str, error: &BridgeError) {
        let event = Event::new(
            FAULT_SOURCE,
            EventPayload::AuthorityFault {
                operation: operation.to_string(),
                message: error.to_string(),
            },
        );
        let _ = self.bus.publish_to(Topic::Faults, event);
    }
}

fn busy(operation: &str) -> BridgeError {
    BridgeError::Busy {
        operation: operation.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
