//! Task settings
//!
//! A settings document is a flat JSON object read through typed lookups by
//! key. Session-wide values are pulled out into [`SessionConfig`]; per-trial
//! sampling rules are read by [`SamplerConfig::from_settings`](crate::sampler::SamplerConfig::from_settings).

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bridge::DecisionProcessConfig;
use crate::consts::*;
use crate::error::{ConfigError, Error};

/// Key/value settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a settings document; the top level must be an object
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(ConfigError::Parse(format!(
                "expected a JSON object, found {}",
                type_name(&other)
            ))),
        }
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded {} settings from {}", settings.len(), path.display());
        Ok(settings)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set_value(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_float(&self, key: &str) -> Result<f64, ConfigError> {
        self.get(key)?.as_f64().ok_or_else(|| wrong_type(key, "number"))
    }

    /// Like [`get_float`](Self::get_float) but falls back when the key is absent.
    /// A present key with the wrong type is still an error.
    pub fn get_float_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        if self.contains(key) {
            self.get_float(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_float_list(&self, key: &str) -> Result<Vec<f64>, ConfigError> {
        let items = self
            .get(key)?
            .as_array()
            .ok_or_else(|| wrong_type(key, "list of numbers"))?;
        items
            .iter()
            .map(|v| v.as_f64().ok_or_else(|| wrong_type(key, "list of numbers")))
            .collect()
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.get(key)?.as_i64().ok_or_else(|| wrong_type(key, "integer"))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        self.get(key)?.as_bool().ok_or_else(|| wrong_type(key, "boolean"))
    }

    pub fn get_string(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)?.as_str().ok_or_else(|| wrong_type(key, "string"))
    }

    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let items = self
            .get(key)?
            .as_array()
            .ok_or_else(|| wrong_type(key, "list of strings"))?;
        items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| wrong_type(key, "list of strings"))
            })
            .collect()
    }

    fn get_count_or(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        if !self.contains(key) {
            return Ok(default);
        }
        let n = self.get_int(key)?;
        usize::try_from(n).map_err(|_| wrong_type(key, "non-negative integer"))
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        key: key.to_string(),
        expected,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Session-wide values, constant across trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Simulation ticks per second
    pub fps: u32,
    /// Speeds selectable by the subject (digit keys 1-9 pick by position)
    pub subject_speeds: Vec<f64>,
    pub subject_radius: f64,
    pub target_radius: f64,
    pub trial_repetitions_per_block: usize,
    pub blocks_per_session: usize,
    /// Abort a trial that has not ended after this many ticks
    pub max_ticks: Option<u64>,
    /// External policy process, when the subject is not driven locally
    pub decision_process: Option<DecisionProcessConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fps: TASK_FPS,
            subject_speeds: DEFAULT_SUBJECT_SPEEDS.to_vec(),
            subject_radius: DEFAULT_RADIUS,
            target_radius: DEFAULT_RADIUS,
            trial_repetitions_per_block: 1,
            blocks_per_session: 1,
            max_ticks: None,
            decision_process: None,
        }
    }
}

impl SessionConfig {
    /// Read session values from a settings document, keeping defaults for absent keys
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let fps = if settings.contains("fps") {
            let fps = settings.get_int("fps")?;
            u32::try_from(fps)
                .ok()
                .filter(|&f| f > 0)
                .ok_or_else(|| wrong_type("fps", "positive integer"))?
        } else {
            defaults.fps
        };

        let subject_speeds = if settings.contains("subjectSpeeds") {
            settings.get_float_list("subjectSpeeds")?
        } else {
            defaults.subject_speeds
        };
        if subject_speeds.is_empty() {
            return Err(ConfigError::InvalidParameters(
                "subjectSpeeds must not be empty".to_string(),
            ));
        }

        let max_ticks = if settings.contains("maxTicks") {
            let n = settings.get_int("maxTicks")?;
            Some(u64::try_from(n).map_err(|_| wrong_type("maxTicks", "non-negative integer"))?)
        } else {
            None
        };

        let decision_process = if settings.contains("decisionCommand") {
            let mut config = DecisionProcessConfig::new(settings.get_string("decisionCommand")?);
            if settings.contains("decisionShell") {
                config.shell = settings.get_string("decisionShell")?.to_string();
            }
            if settings.contains("decisionShellArgs") {
                config.shell_args = settings.get_string_list("decisionShellArgs")?;
            }
            Some(config)
        } else {
            None
        };

        Ok(Self {
            fps,
            subject_speeds,
            subject_radius: settings.get_float_or("subjectRadius", defaults.subject_radius)?,
            target_radius: settings.get_float_or("targetRadius", defaults.target_radius)?,
            trial_repetitions_per_block: settings
                .get_count_or("trialRepetitionsPerBlock", defaults.trial_repetitions_per_block)?,
            blocks_per_session: settings
                .get_count_or("blocksPerSession", defaults.blocks_per_session)?,
            max_ticks,
            decision_process,
        })
    }

    /// Fixed timestep in seconds
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / f64::from(self.fps)
    }

    pub fn min_subject_speed(&self) -> f64 {
        self.subject_speeds.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_subject_speed(&self) -> f64 {
        self.subject_speeds
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_lookups() {
        let settings = Settings::from_json_str(
            r#"{"approachAngles": [135, 140.5], "fps": 60, "name": "pilot", "roads": true, "targetInitDistance": 45}"#,
        )
        .unwrap();
        assert_eq!(settings.get_float_list("approachAngles").unwrap(), vec![135.0, 140.5]);
        assert_eq!(settings.get_int("fps").unwrap(), 60);
        assert_eq!(settings.get_float("targetInitDistance").unwrap(), 45.0);
        assert_eq!(settings.get_string("name").unwrap(), "pilot");
        assert!(settings.get_bool("roads").unwrap());
    }

    #[test]
    fn test_missing_and_mistyped_keys() {
        let settings = Settings::from_json_str(r#"{"name": "pilot", "speeds": [1, "x"]}"#).unwrap();
        assert_eq!(
            settings.get_float("targetInitDistance"),
            Err(ConfigError::MissingKey("targetInitDistance".to_string()))
        );
        assert!(matches!(
            settings.get_float("name"),
            Err(ConfigError::WrongType { expected: "number", .. })
        ));
        assert!(settings.get_float_list("speeds").is_err());
        assert!(settings.get_float_or("name", 1.0).is_err());
        assert_eq!(settings.get_float_or("absent", 1.5).unwrap(), 1.5);
    }

    #[test]
    fn test_top_level_must_be_object() {
        assert!(matches!(
            Settings::from_json_str("[1, 2]"),
            Err(ConfigError::Parse(_))
        ));
        assert!(Settings::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::from_settings(&Settings::new()).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.min_subject_speed(), 2.0);
        assert_eq!(config.max_subject_speed(), 14.0);
        assert!((config.dt() - 1.0 / 30.0).abs() < 1e-15);
    }

    #[test]
    fn test_session_overrides() {
        let mut settings = Settings::new();
        settings.set_value("fps", 60);
        settings.set_value("subjectSpeeds", vec![3.0, 6.0]);
        settings.set_value("decisionCommand", "python3 agent.py");
        settings.set_value("blocksPerSession", 4);
        let config = SessionConfig::from_settings(&settings).unwrap();
        assert_eq!(config.fps, 60);
        assert_eq!(config.subject_speeds, vec![3.0, 6.0]);
        assert_eq!(config.blocks_per_session, 4);
        let process = config.decision_process.unwrap();
        assert_eq!(process.command, "python3 agent.py");
        assert_eq!(process.shell, "sh");
    }

    #[test]
    fn test_zero_fps_rejected() {
        let mut settings = Settings::new();
        settings.set_value("fps", 0);
        assert!(SessionConfig::from_settings(&settings).is_err());
    }
}
