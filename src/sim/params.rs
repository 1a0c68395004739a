//! Trial parameters
//!
//! One immutable parameter set per trial, produced by the sampler and consumed
//! by [`Engine::reset`](super::Engine::reset).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Concrete parameters for a single trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialParameters {
    /// Angle between the subject's and the target's approach rays (degrees)
    pub approach_angle_deg: f64,
    /// Display height of both entities (render only)
    pub height_above_ground: f64,
    pub subject_init_distance: f64,
    /// Slowest selectable subject speed; the subject starts at this speed
    pub subject_speed_min: f64,
    pub subject_speed_max: f64,
    /// Gain of the first-order speed response
    pub lag_coefficient: f64,
    pub subject_radius: f64,
    pub target_init_distance: f64,
    pub target_init_speed: f64,
    pub target_final_speed: f64,
    /// Ramp length in seconds (0 = instantaneous change)
    pub target_speed_change_duration: f64,
    /// Elapsed time at which the target starts changing speed
    pub time_to_change_speed: f64,
    pub target_radius: f64,
}

impl TrialParameters {
    /// Check the parameter invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("approachAngleDeg", self.approach_angle_deg),
            ("heightAboveGround", self.height_above_ground),
            ("subjectInitDistance", self.subject_init_distance),
            ("subjectSpeedMin", self.subject_speed_min),
            ("subjectSpeedMax", self.subject_speed_max),
            ("lagCoefficient", self.lag_coefficient),
            ("subjectRadius", self.subject_radius),
            ("targetInitDistance", self.target_init_distance),
            ("targetInitSpeed", self.target_init_speed),
            ("targetFinalSpeed", self.target_final_speed),
            ("targetSpeedChangeDuration", self.target_speed_change_duration),
            ("timeToChangeSpeed", self.time_to_change_speed),
            ("targetRadius", self.target_radius),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{name} is not finite ({value})")));
        }

        let non_negative = [
            ("subjectInitDistance", self.subject_init_distance),
            ("subjectRadius", self.subject_radius),
            ("targetInitDistance", self.target_init_distance),
            ("targetRadius", self.target_radius),
            ("timeToChangeSpeed", self.time_to_change_speed),
            ("targetSpeedChangeDuration", self.target_speed_change_duration),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, v)| *v < 0.0) {
            return Err(invalid(format!("{name} must be >= 0, got {value}")));
        }

        if self.subject_speed_min > self.subject_speed_max {
            return Err(invalid(format!(
                "subjectSpeedMin {} exceeds subjectSpeedMax {}",
                self.subject_speed_min, self.subject_speed_max
            )));
        }
        Ok(())
    }

    /// Whether the target switches speed in a single tick
    #[inline]
    pub fn is_instantaneous_change(&self) -> bool {
        self.target_speed_change_duration == 0.0
    }

    /// Sum of the two radii (contact threshold)
    #[inline]
    pub fn contact_distance(&self) -> f64 {
        self.subject_radius + self.target_radius
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::InvalidParameters(message)
}

#[cfg(test)]
pub(crate) fn reference_params() -> TrialParameters {
    TrialParameters {
        approach_angle_deg: 135.0,
        height_above_ground: 0.5,
        subject_init_distance: 25.0,
        subject_speed_min: 2.0,
        subject_speed_max: 14.0,
        lag_coefficient: 5.0,
        subject_radius: 0.35,
        target_init_distance: 45.0,
        target_init_speed: 10.0,
        target_final_speed: 10.0,
        target_speed_change_duration: 0.0,
        time_to_change_speed: 999.0,
        target_radius: 0.35,
    }
}
