use std::path::PathBuf;
use std::time::Duration;

/// Station configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the gallery files and the login log.
    pub data_dir: PathBuf,
    /// Interval between frame grabs.
    pub frame_interval: Duration,
    /// Interval between detection + emotion sampling ticks.
    pub detect_interval: Duration,
    /// Interval at which a pending login attempt re-checks the blink gate.
    pub poll_interval: Duration,
    /// Linear scale applied to the probe frame before encoding. Purely a
    /// performance knob; matching semantics are unaffected.
    pub probe_scale: f32,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("FACEGATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        Self {
            data_dir,
            frame_interval: Duration::from_millis(env_u64("FACEGATE_FRAME_INTERVAL_MS", 10)),
            detect_interval: Duration::from_millis(env_u64("FACEGATE_DETECT_INTERVAL_MS", 500)),
            poll_interval: Duration::from_millis(env_u64("FACEGATE_POLL_INTERVAL_MS", 500)),
            probe_scale: env_f32("FACEGATE_PROBE_SCALE", 0.25),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
