//! Configuration Vault – reads/writes `~/.cosim/config.toml`.

use cosim_runtime::BridgeLoopConfig;
use cosim_types::{AdapterConfig, ControlRegime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted bridge configuration stored in `~/.cosim/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Vehicle id in the traffic simulator and model name in the physics
    /// simulator.
    #[serde(default = "default_vehicle_id")]
    pub vehicle_id: String,

    /// Control regime selected at departure (`"physics"` or `"traffic"`).
    #[serde(default)]
    pub regime: ControlRegime,

    /// Milliseconds between two sync ticks.
    #[serde(default = "default_sync_period_ms")]
    pub sync_period_ms: u64,

    /// Deadline for one tick or one command, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Per-topic event bus capacity.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub adapter: AdapterConfig,

    /// Starting scene for the in-process simulated engines.
    #[serde(default)]
    pub scene: SceneConfig,
}

/// Where the ego vehicle starts in the in-process engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "default_road_id")]
    pub road_id: String,
    #[serde(default)]
    pub lane_index: i32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Physics yaw, radians.
    #[serde(default)]
    pub yaw_rad: f64,
    /// Forward speed of the physics model, m/s.
    #[serde(default = "default_forward_speed")]
    pub forward_speed: f64,
}

fn default_vehicle_id() -> String {
    "ego".to_string()
}
fn default_sync_period_ms() -> u64 {
    50
}
fn default_call_timeout_ms() -> u64 {
    500
}
fn default_bus_capacity() -> usize {
    256
}
fn default_road_id() -> String {
    "edge_0".to_string()
}
fn default_forward_speed() -> f64 {
    5.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vehicle_id: default_vehicle_id(),
            regime: ControlRegime::default(),
            sync_period_ms: default_sync_period_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            bus_capacity: default_bus_capacity(),
            adapter: AdapterConfig::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            road_id: default_road_id(),
            lane_index: 0,
            x: 0.0,
            y: 0.0,
            yaw_rad: 0.0,
            forward_speed: default_forward_speed(),
        }
    }
}

impl Config {
    /// Loop timing.  Zero durations are raised to 1 ms.
    pub fn bridge_loop_config(&self) -> BridgeLoopConfig {
        BridgeLoopConfig {
            sync_period: Duration::from_millis(self.sync_period_ms.max(1)),
            call_timeout: Duration::from_millis(self.call_timeout_ms.max(1)),
        }
    }
}

/// Return the path to `~/.cosim/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".cosim").join("config.toml")
}

/// Load the config from disk, with `COSIM_*` overrides applied.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `COSIM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `COSIM_VEHICLE_ID` | `vehicle_id` |
/// | `COSIM_REGIME` | `regime` |
/// | `COSIM_SYNC_PERIOD_MS` | `sync_period_ms` |
/// | `COSIM_CALL_TIMEOUT_MS` | `call_timeout_ms` |
///
/// Values that do not parse (or are zero, for the durations) are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("COSIM_VEHICLE_ID")
        && !v.trim().is_empty()
    {
        cfg.vehicle_id = v.trim().to_string();
    }
    if let Some(v) = lookup("COSIM_REGIME")
        && let Ok(regime) = v.parse::<ControlRegime>()
    {
        cfg.regime = regime;
    }
    if let Some(v) = lookup("COSIM_SYNC_PERIOD_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
        && ms > 0
    {
        cfg.sync_period_ms = ms;
    }
    if let Some(v) = lookup("COSIM_CALL_TIMEOUT_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
        && ms > 0
    {
        cfg.call_timeout_ms = ms;
    }
}

/// Save the config to disk, creating `~/.cosim/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
