//! Trial parameter sampling
//!
//! Each trial parameter is produced by one [`ParamSpec`]: a fixed value, a
//! uniform pick from a list, a uniform draw from a range, or a clamped
//! Gaussian. Parameters pinned through [`Overrides`] are taken as given and
//! never drawn.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::fmt;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::settings::{SessionConfig, Settings};
use crate::sim::TrialParameters;

/// Names of the sampled trial parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamKey {
    ApproachAngleDeg,
    HeightAboveGround,
    SubjectInitDistance,
    SubjectSpeedMin,
    SubjectSpeedMax,
    LagCoefficient,
    SubjectRadius,
    TargetInitDistance,
    TargetInitSpeed,
    TargetFinalSpeed,
    TargetSpeedChangeDuration,
    TimeToChangeSpeed,
    TargetRadius,
}

impl ParamKey {
    /// Every parameter, in sampling order
    pub const ALL: [ParamKey; 13] = [
        ParamKey::ApproachAngleDeg,
        ParamKey::HeightAboveGround,
        ParamKey::SubjectInitDistance,
        ParamKey::SubjectSpeedMin,
        ParamKey::SubjectSpeedMax,
        ParamKey::LagCoefficient,
        ParamKey::SubjectRadius,
        ParamKey::TargetInitDistance,
        ParamKey::TargetInitSpeed,
        ParamKey::TargetFinalSpeed,
        ParamKey::TargetSpeedChangeDuration,
        ParamKey::TimeToChangeSpeed,
        ParamKey::TargetRadius,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::ApproachAngleDeg => "approachAngleDeg",
            ParamKey::HeightAboveGround => "heightAboveGround",
            ParamKey::SubjectInitDistance => "subjectInitDistance",
            ParamKey::SubjectSpeedMin => "subjectSpeedMin",
            ParamKey::SubjectSpeedMax => "subjectSpeedMax",
            ParamKey::LagCoefficient => "lagCoefficient",
            ParamKey::SubjectRadius => "subjectRadius",
            ParamKey::TargetInitDistance => "targetInitDistance",
            ParamKey::TargetInitSpeed => "targetInitSpeed",
            ParamKey::TargetFinalSpeed => "targetFinalSpeed",
            ParamKey::TargetSpeedChangeDuration => "targetSpeedChangeDuration",
            ParamKey::TimeToChangeSpeed => "timeToChangeSpeed",
            ParamKey::TargetRadius => "targetRadius",
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one parameter is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamSpec {
    Fixed(f64),
    /// Uniform pick among the listed values
    Choice(Vec<f64>),
    /// Uniform real in `[min, max]`
    Uniform { min: f64, max: f64 },
    /// Gaussian, clamped into `[min, max]` when bounds are given
    #[serde(rename_all = "camelCase")]
    Normal {
        mean: f64,
        std_dev: f64,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl ParamSpec {
    pub fn validate(&self, key: ParamKey) -> Result<(), ConfigError> {
        let finite = |value: f64| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::NonFinite { key, value })
            }
        };
        match self {
            ParamSpec::Fixed(value) => finite(*value),
            ParamSpec::Choice(values) => {
                if values.is_empty() {
                    return Err(ConfigError::EmptyChoice(key));
                }
                values.iter().try_for_each(|v| finite(*v))
            }
            ParamSpec::Uniform { min, max } => {
                finite(*min)?;
                finite(*max)?;
                check_range(key, *min, *max)?;
                // Width must be finite too
                finite(*max - *min)
            }
            ParamSpec::Normal {
                mean,
                std_dev,
                min,
                max,
            } => {
                finite(*mean)?;
                if !(std_dev.is_finite() && *std_dev > 0.0) {
                    return Err(ConfigError::NonPositiveStdDev {
                        key,
                        std_dev: *std_dev,
                    });
                }
                if let Some(min) = min {
                    finite(*min)?;
                }
                if let Some(max) = max {
                    finite(*max)?;
                }
                match (min, max) {
                    (Some(min), Some(max)) => check_range(key, *min, *max),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Draw one value. The spec must already be valid.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            ParamSpec::Fixed(value) => *value,
            ParamSpec::Choice(values) => values.choose(rng).copied().unwrap_or(f64::NAN),
            ParamSpec::Uniform { min, max } => {
                if min == max {
                    *min
                } else {
                    rng.random_range(*min..=*max)
                }
            }
            ParamSpec::Normal {
                mean,
                std_dev,
                min,
                max,
            } => {
                let mut value = sample_normal(rng, *mean, *std_dev);
                if let Some(max) = max {
                    value = value.min(*max);
                }
                if let Some(min) = min {
                    value = value.max(*min);
                }
                value
            }
        }
    }
}

fn check_range(key: ParamKey, min: f64, max: f64) -> Result<(), ConfigError> {
    if min > max {
        Err(ConfigError::InvertedRange { key, min, max })
    } else {
        Ok(())
    }
}

/// Standard normal deviate via Box–Muller, sine branch.
///
/// Both uniforms are taken from `(0, 1]` so `ln(u1)` is always finite.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = 1.0 - rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).sin()
}

/// `mean + std_dev * z` with `z` from [`standard_normal`]
#[inline]
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    mean + std_dev * standard_normal(rng)
}

/// Parameters pinned by an orchestrator; these bypass sampling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overrides(BTreeMap<ParamKey, f64>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&mut self, key: ParamKey, value: f64) -> &mut Self {
        self.0.insert(key, value);
        self
    }

    pub fn with(mut self, key: ParamKey, value: f64) -> Self {
        self.pin(key, value);
        self
    }

    pub fn get(&self, key: ParamKey) -> Option<f64> {
        self.0.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sampling rule for every trial parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SamplerConfig {
    specs: BTreeMap<ParamKey, ParamSpec>,
}

impl SamplerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: ParamKey, spec: ParamSpec) -> &mut Self {
        self.specs.insert(key, spec);
        self
    }

    pub fn with(mut self, key: ParamKey, spec: ParamSpec) -> Self {
        self.set(key, spec);
        self
    }

    pub fn spec(&self, key: ParamKey) -> Option<&ParamSpec> {
        self.specs.get(&key)
    }

    /// Build rules from the task's flat settings keys.
    ///
    /// Ranged keys (`approachAngles`, `subjectInitDistanceMin/Max`,
    /// `targetInitSpeeds`, `timeToChangeSpeedMin/Max`,
    /// `targetSpeedMin/Max/Mean/StdDev`, `targetInitDistance`) are required.
    /// The remaining parameters read a same-named scalar key or fall back to
    /// the session and task defaults.
    pub fn from_settings(settings: &Settings, session: &SessionConfig) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        config
            .set(
                ParamKey::ApproachAngleDeg,
                ParamSpec::Choice(settings.get_float_list("approachAngles")?),
            )
            .set(
                ParamKey::SubjectInitDistance,
                ParamSpec::Uniform {
                    min: settings.get_float("subjectInitDistanceMin")?,
                    max: settings.get_float("subjectInitDistanceMax")?,
                },
            )
            .set(
                ParamKey::TargetInitDistance,
                ParamSpec::Fixed(settings.get_float("targetInitDistance")?),
            )
            .set(
                ParamKey::TargetInitSpeed,
                ParamSpec::Choice(settings.get_float_list("targetInitSpeeds")?),
            )
            .set(
                ParamKey::TimeToChangeSpeed,
                ParamSpec::Uniform {
                    min: settings.get_float("timeToChangeSpeedMin")?,
                    max: settings.get_float("timeToChangeSpeedMax")?,
                },
            )
            .set(
                ParamKey::TargetFinalSpeed,
                ParamSpec::Normal {
                    mean: settings.get_float("targetSpeedMean")?,
                    std_dev: settings.get_float("targetSpeedStdDev")?,
                    min: Some(settings.get_float("targetSpeedMin")?),
                    max: Some(settings.get_float("targetSpeedMax")?),
                },
            );

        let scalars = [
            (ParamKey::HeightAboveGround, DEFAULT_HEIGHT_ABOVE_GROUND),
            (ParamKey::SubjectSpeedMin, session.min_subject_speed()),
            (ParamKey::SubjectSpeedMax, session.max_subject_speed()),
            (ParamKey::LagCoefficient, DEFAULT_LAG_COEFFICIENT),
            (ParamKey::SubjectRadius, session.subject_radius),
            (ParamKey::TargetSpeedChangeDuration, 0.0),
            (ParamKey::TargetRadius, session.target_radius),
        ];
        for (key, default) in scalars {
            config.set(key, ParamSpec::Fixed(settings.get_float_or(key.as_str(), default)?));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every rule, so bad configuration surfaces before the first trial
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.specs.iter().try_for_each(|(key, spec)| spec.validate(*key))
    }

    /// Produce one trial's parameters; pinned values are used as-is
    pub fn sample<R: Rng + ?Sized>(
        &self,
        overrides: &Overrides,
        rng: &mut R,
    ) -> Result<TrialParameters, ConfigError> {
        let mut values = [0.0; ParamKey::ALL.len()];
        for (slot, key) in values.iter_mut().zip(ParamKey::ALL) {
            *slot = match overrides.get(key) {
                Some(pinned) => pinned,
                None => {
                    let spec = self.spec(key).ok_or(ConfigError::MissingParameter(key))?;
                    spec.validate(key)?;
                    spec.sample(rng)
                }
            };
        }

        let [
            approach_angle_deg,
            height_above_ground,
            subject_init_distance,
            subject_speed_min,
            subject_speed_max,
            lag_coefficient,
            subject_radius,
            target_init_distance,
            target_init_speed,
            target_final_speed,
            target_speed_change_duration,
            time_to_change_speed,
            target_radius,
        ] = values;
        let params = TrialParameters {
            approach_angle_deg,
            height_above_ground,
            subject_init_distance,
            subject_speed_min,
            subject_speed_max,
            lag_coefficient,
            subject_radius,
            target_init_distance,
            target_init_speed,
            target_final_speed,
            target_speed_change_duration,
            time_to_change_speed,
            target_radius,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
pub(crate) fn task_settings() -> Settings {
    Settings::from_json_str(
        r#"{
            "approachAngles": [135, 140, 145],
            "subjectInitDistanceMin": 20,
            "subjectInitDistanceMax": 30,
            "targetInitDistance": 45,
            "targetInitSpeeds": [11.25, 9.47, 8.18],
            "timeToChangeSpeedMin": 2.5,
            "timeToChangeSpeedMax": 3.25,
            "targetSpeedMin": 10,
            "targetSpeedMax": 20,
            "targetSpeedMean": 15,
            "targetSpeedStdDev": 5
        }"#,
    )
    .unwrap()
}
