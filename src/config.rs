//! Application-level configuration loading: sync-loop tuning and the runtime
//! team colors set.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::session::TeamColor;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CRISIS_ROOM_CONFIG_PATH";
/// Fallback color returned when the colors set is exhausted.
const DEFAULT_COLOR: TeamColor = TeamColor {
    h: 0.0,
    s: 0.0,
    v: 1.0,
};

/// Timing knobs shared by the server and the client sync engine.
#[derive(Debug, Clone)]
pub struct SyncTuning {
    /// Poll interval while a session is in progress.
    pub poll_interval_active: Duration,
    /// Poll interval while waiting, paused, or completed.
    pub poll_interval_idle: Duration,
    /// Wait before re-querying to compute score diffs, giving advancement
    /// side effects time to land.
    pub settle_delay: Duration,
    /// Upper bound on any single request so a stalled call cannot block
    /// subsequent ticks.
    pub request_timeout: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            poll_interval_active: Duration::from_millis(1_000),
            poll_interval_idle: Duration::from_millis(3_000),
            settle_delay: Duration::from_millis(1_000),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    sync: SyncTuning,
    colors: Vec<TeamColor>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in
    /// defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        colors = app_config.colors.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Timing knobs for poll loops and mutation requests.
    pub fn sync(&self) -> &SyncTuning {
        &self.sync
    }

    /// Return the first color of the colors set that is not already listed in `used`.
    ///
    /// When every entry is taken we fall back to [`DEFAULT_COLOR`] so callers
    /// always receive a value.
    pub fn first_unused_color(&self, used: &[TeamColor]) -> TeamColor {
        self.colors
            .iter()
            .find(|candidate| used.iter().all(|existing| existing != *candidate))
            .copied()
            .unwrap_or(DEFAULT_COLOR)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sync: SyncTuning::default(),
            colors: default_colors(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    poll_interval_active_ms: Option<u64>,
    #[serde(default)]
    poll_interval_idle_ms: Option<u64>,
    #[serde(default)]
    settle_delay_ms: Option<u64>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
    #[serde(default)]
    colors: Vec<RawColor>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = SyncTuning::default();
        let millis = |ms: Option<u64>, fallback: Duration| {
            ms.map(Duration::from_millis).unwrap_or(fallback)
        };

        let colors = if value.colors.is_empty() {
            default_colors()
        } else {
            value.colors.into_iter().map(Into::into).collect()
        };

        Self {
            sync: SyncTuning {
                poll_interval_active: millis(
                    value.poll_interval_active_ms,
                    defaults.poll_interval_active,
                ),
                poll_interval_idle: millis(value.poll_interval_idle_ms, defaults.poll_interval_idle),
                settle_delay: millis(value.settle_delay_ms, defaults.settle_delay),
                request_timeout: millis(value.request_timeout_ms, defaults.request_timeout),
            },
            colors,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single HSV entry inside the configuration file.
struct RawColor {
    hue: f32,
    saturation: f32,
    value: f32,
}

impl From<RawColor> for TeamColor {
    fn from(value: RawColor) -> Self {
        Self {
            h: value.hue,
            s: value.saturation,
            v: value.value,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in colors set shipped with the binary.
fn default_colors() -> Vec<TeamColor> {
    let mut colors = Vec::with_capacity(16);
    for s in [1.0, 0.6] {
        for step in 0..8 {
            colors.push(TeamColor {
                h: step as f32 * 45.0,
                s,
                v: 1.0,
            });
        }
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_unused_color_skips_taken_entries() {
        let config = AppConfig::default();
        let first = config.first_unused_color(&[]);
        let second = config.first_unused_color(&[first]);
        assert_ne!(first, second);
    }

    #[test]
    fn exhausted_colors_fall_back_to_default() {
        let config = AppConfig::default();
        let all = default_colors();
        assert_eq!(config.first_unused_color(&all), DEFAULT_COLOR);
    }

    #[test]
    fn raw_config_overrides_only_present_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"poll_interval_active_ms": 500}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.sync().poll_interval_active, Duration::from_millis(500));
        assert_eq!(
            config.sync().poll_interval_idle,
            SyncTuning::default().poll_interval_idle
        );
        assert!(!config.colors.is_empty());
    }
}
