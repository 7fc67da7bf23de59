//! Run settings, loadable from JSON controller files.
//!
//! A [`RunSettings`] carries everything a run needs beyond the scene itself:
//! the tick budget, the fixed timestep, the optional rest-termination rule,
//! and the contact tracker's configuration (promotion threshold and
//! container-sensor category). Missing fields fall back to defaults, so
//! partial controller files keep working as settings grow.

use serde::{Deserialize, Serialize};

use crate::contact::TrackerConfig;
use crate::TraceError;

// ---------------------------------------------------------------------------
// RunSettings
// ---------------------------------------------------------------------------

/// Configuration for one trace run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Tick budget: the run terminates at this step unless it comes to rest
    /// earlier (see `terminate_on_rest`).
    pub step_count: u64,
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Terminate early once every dynamic body is asleep.
    pub terminate_on_rest: bool,
    /// Contact tracker configuration.
    pub tracker: TrackerConfig,
}

impl Default for RunSettings {
    /// Defaults to a 600-tick budget at 60 Hz, no rest termination, and the
    /// tracker defaults.
    fn default() -> Self {
        Self {
            step_count: 600,
            fixed_dt: 1.0 / 60.0,
            terminate_on_rest: false,
            tracker: TrackerConfig::default(),
        }
    }
}

impl RunSettings {
    /// Parse settings from a JSON string. Unknown fields are ignored and
    /// missing fields fall back to defaults.
    pub fn from_json_str(text: &str) -> Result<Self, TraceError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Pretty-printed JSON text of the settings.
    pub fn to_json_string(&self) -> Result<String, TraceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), TraceError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(TraceError::InvalidSettings {
                reason: format!("fixed_dt must be positive and finite, got {}", self.fixed_dt),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{DEFAULT_CONTAINER_CATEGORY, DEFAULT_TOUCH_THRESHOLD};

    #[test]
    fn defaults_are_sane() {
        let settings = RunSettings::default();
        assert_eq!(settings.step_count, 600);
        assert!((settings.fixed_dt - 1.0 / 60.0).abs() < f64::EPSILON);
        assert!(!settings.terminate_on_rest);
        assert_eq!(settings.tracker.touch_threshold, DEFAULT_TOUCH_THRESHOLD);
    }

    #[test]
    fn round_trips_through_json() {
        let settings = RunSettings {
            step_count: 1200,
            terminate_on_rest: true,
            ..Default::default()
        };
        let text = settings.to_json_string().unwrap();
        let back = RunSettings::from_json_str(&text).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings =
            RunSettings::from_json_str("{\"step_count\": 90, \"tracker\": {\"touch_threshold\": 8}}")
                .unwrap();
        assert_eq!(settings.step_count, 90);
        assert_eq!(settings.tracker.touch_threshold, 8);
        assert_eq!(settings.tracker.container_category, DEFAULT_CONTAINER_CATEGORY);
        assert!(!settings.terminate_on_rest);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let settings =
            RunSettings::from_json_str("{\"step_count\": 50, \"outputVideoPath\": \"x.mpg\"}")
                .unwrap();
        assert_eq!(settings.step_count, 50);
    }

    #[test]
    fn invalid_dt_fails_validation() {
        for bad in ["{\"fixed_dt\": 0.0}", "{\"fixed_dt\": -1.0}"] {
            assert!(matches!(
                RunSettings::from_json_str(bad),
                Err(TraceError::InvalidSettings { .. })
            ));
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            RunSettings::from_json_str("{not json"),
            Err(TraceError::SettingsParse(_))
        ));
    }
}
