//! Tunable thresholds and routing endpoint settings.

use crate::error::{NavError, NavResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 20 ft, the distance at which a maneuver counts as done
pub const DEFAULT_STEP_COMPLETION_M: f64 = 6.096;
pub const DEFAULT_OFF_ROUTE_M: f64 = 10.0;
pub const DEFAULT_RECALC_DEBOUNCE_SECS: f64 = 10.0;
pub const DEFAULT_ARRIVAL_M: f64 = 20.0;
pub const DEFAULT_LOCATION_ERROR_LIMIT: u32 = 5;

/// Thresholds for step tracking, off-route detection and arrival.
///
/// Every field is optional in JSON; missing ones take the defaults above.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub step_completion_threshold_m: f64,
    pub off_route_threshold_m: f64,
    pub recalc_debounce_secs: f64,
    pub arrival_threshold_m: f64,
    /// Consecutive failed fixes before the UI is told location is gone
    pub location_error_limit: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            step_completion_threshold_m: DEFAULT_STEP_COMPLETION_M,
            off_route_threshold_m: DEFAULT_OFF_ROUTE_M,
            recalc_debounce_secs: DEFAULT_RECALC_DEBOUNCE_SECS,
            arrival_threshold_m: DEFAULT_ARRIVAL_M,
            location_error_limit: DEFAULT_LOCATION_ERROR_LIMIT,
        }
    }
}

impl NavigationConfig {
    pub fn from_json_str(json: &str) -> NavResult<Self> {
        let config: NavigationConfig = serde_json::from_str(json)
            .map_err(|e| NavError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NavError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn recalc_debounce(&self) -> Duration {
        Duration::from_secs_f64(self.recalc_debounce_secs)
    }

    pub fn validate(&self) -> NavResult<()> {
        let thresholds = [
            ("step_completion_threshold_m", self.step_completion_threshold_m),
            ("off_route_threshold_m", self.off_route_threshold_m),
            ("recalc_debounce_secs", self.recalc_debounce_secs),
            ("arrival_threshold_m", self.arrival_threshold_m),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(NavError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if self.location_error_limit == 0 {
            return Err(NavError::InvalidConfig(
                "location_error_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// OpenRouteService connection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub base_url: String,
    pub profile: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            base_url: "https://api.openrouteservice.org".to_string(),
            profile: "foot-walking".to_string(),
            api_key: None,
            timeout_secs: 30,
            user_agent: format!("nav_tracker_rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RoutingConfig {
    /// Defaults plus `ORS_API_KEY` and optional `ORS_BASE_URL` from the environment
    pub fn from_env() -> Self {
        let mut config = RoutingConfig::default();
        config.api_key = std::env::var("ORS_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Ok(url) = std::env::var("ORS_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        config
    }

    pub fn directions_url(&self) -> String {
        format!(
            "{}/v2/directions/{}",
            self.base_url.trim_end_matches('/'),
            self.profile
        )
    }
}
