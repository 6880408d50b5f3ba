//! `cosim-cli` – Co-simulation bridge command line interface.
//!
//! Runs the ego-vehicle bridge headless against the in-process simulated
//! engines.  It:
//!
//! 1. Loads `~/.cosim/config.toml`, writing the defaults there on first run.
//! 2. Waits for the physics authority and departs in the configured control
//!    regime.
//! 3. Runs the bridge loop, feeding it command frames read as JSON lines from
//!    stdin (`{"lane_change":1,"accel":-100}`, rosbridge `publish` frames,
//!    or `{"pos_x":..,"pos_y":..,"heading":..}` pose targets).
//! 4. Intercepts **Ctrl-C** to stop the loop and print the final ego state.

mod config;

use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use cosim_frames::{Quaternion, Vec3};
use cosim_hal::{
    ModelPose, ModelState, SimPhysicsEngine, SimTrafficEngine, SimVehicle, Twist,
    wait_for_authority,
};
use cosim_middleware::{CommandIngest, EventBus, Topic};
use cosim_runtime::{BridgeLoop, EgoAdapter, init_tracing};
use cosim_types::EventPayload;

use crate::config::Config;

const AUTHORITY_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() {
    let _tracing = init_tracing("cosim");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the bridge …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let cfg = load_config();
    println!(
        "  vehicle {}  regime {}  sync every {} ms",
        cfg.vehicle_id.bold(),
        cfg.regime.to_string().cyan(),
        cfg.sync_period_ms
    );
    println!();

    // ── Engines and departure ─────────────────────────────────────────────
    let (traffic, mut physics) = build_engines(&cfg);
    wait_for_authority(&mut physics, AUTHORITY_POLL_INTERVAL);

    let mut ego = EgoAdapter::new(cfg.vehicle_id.clone(), cfg.adapter, traffic, physics);
    if let Err(e) = ego.depart(cfg.regime) {
        println!("{}: {}", "Departure failed".red(), e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let adapter = Arc::new(Mutex::new(ego));
    runtime.block_on(run_bridge(&cfg, Arc::clone(&adapter), shutdown));
    // The stdin reader sits in a blocking read; don't wait for it.
    runtime.shutdown_timeout(Duration::from_millis(100));

    match adapter.lock() {
        Ok(ego) => {
            let s = ego.state();
            println!(
                "{} x={:.2} y={:.2} heading={:.1}° speed={:.2} m/s",
                "Final ego state:".green().bold(),
                s.x,
                s.y,
                s.heading_deg,
                s.speed
            );
        }
        Err(_) => println!("{}", "Final ego state unavailable.".yellow()),
    }
    println!("{}", "  ✓ Exiting cosim.".green());
}

fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "{} {}",
                "Config loaded from".green(),
                config::config_path().display()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "{} {}",
                    "Default config written to".green(),
                    config::config_path().display()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

fn build_engines(cfg: &Config) -> (SimTrafficEngine, SimPhysicsEngine) {
    let scene = &cfg.scene;
    let traffic = SimTrafficEngine::new().with_vehicle(
        cfg.vehicle_id.clone(),
        SimVehicle::on_road(scene.road_id.clone(), scene.lane_index),
    );
    let physics = SimPhysicsEngine::new()
        .with_model(ModelState {
            twist: Twist {
                linear: Vec3::new(scene.forward_speed, 0.0, 0.0),
                angular: Vec3::zero(),
            },
            ..ModelState::at_rest(
                cfg.vehicle_id.clone(),
                ModelPose {
                    position: Vec3::new(scene.x, scene.y, 0.0),
                    orientation: Quaternion::from_yaw(scene.yaw_rad),
                },
            )
        })
        .with_auto_step(cfg.sync_period_ms as f64 / 1000.0);
    (traffic, physics)
}

async fn run_bridge(
    cfg: &Config,
    adapter: Arc<Mutex<EgoAdapter<SimTrafficEngine, SimPhysicsEngine>>>,
    shutdown: Arc<AtomicBool>,
) {
    let bus = Arc::new(EventBus::new(cfg.bus_capacity));
    let bridge = BridgeLoop::new(adapter, Arc::clone(&bus), cfg.bridge_loop_config());

    // ── Fault reporter ────────────────────────────────────────────────────
    let mut faults = bus.subscribe_to(Topic::Faults);
    tokio::spawn(async move {
        while let Ok(event) = faults.recv().await {
            if let EventPayload::AuthorityFault { operation, message } = event.payload {
                println!("{} {}: {}", "fault".red().bold(), operation, message);
            }
        }
    });

    // ── Inbound command frames ────────────────────────────────────────────
    let ingest = CommandIngest::new(Arc::clone(&bus));
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if let Err(e) = ingest.ingest_frame(&line) {
                        warn!(error = %e, "rejected inbound frame");
                    }
                }
                Ok(None) => {
                    info!("stdin closed, no further commands");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    });

    bridge.run(shutdown).await;
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___________  ________  ___"#.bold().cyan());
    println!("{}", r#"  / ___/ __ \ \/ /  _/  |/  /"#.bold().cyan());
    println!("{}", r#" / /__/ /_/ /\  // // /|_/ / "#.bold().cyan());
    println!("{}", r#" \___/\____/ /_/___/_/  /_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "cosim".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Traffic / physics ego-vehicle bridge");
    println!();
}
