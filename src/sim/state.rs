//! Trial state and observable quantities
//!
//! Everything needed to reproduce a trial tick-for-tick lives here.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::params::TrialParameters;

/// Why a trial ended without contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// Subject passed the convergence point first
    SubjectOvershoot,
    /// Target passed the convergence point first
    TargetOvershoot,
}

/// How a finished trial ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Intercepted,
    Missed(MissReason),
}

impl Outcome {
    #[inline]
    pub fn is_won(&self) -> bool {
        matches!(self, Outcome::Intercepted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Intercepted => "intercepted",
            Outcome::Missed(MissReason::SubjectOvershoot) => "missed (subject overshoot)",
            Outcome::Missed(MissReason::TargetOvershoot) => "missed (target overshoot)",
        }
    }
}

/// The five quantities visible to a speed source each tick.
///
/// Serializes to the decision-process request line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub subject_speed: f64,
    pub subject_distance: f64,
    pub has_changed_speed: bool,
    pub target_speed: f64,
    pub target_distance: f64,
}

/// Mutable per-trial state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    /// Parameters this trial was reset with
    pub params: TrialParameters,
    /// Seconds since reset
    pub elapsed_time: f64,
    /// Signed distance to the convergence point (negative = past it)
    pub subject_distance: f64,
    pub subject_speed: f64,
    pub target_distance: f64,
    pub target_speed: f64,
    pub has_changed_speed: bool,
    pub terminal: bool,
    /// Set once, on the tick `terminal` becomes true
    pub won: Option<bool>,
    /// Ticks applied since reset
    pub ticks: u64,
    /// Terminal condition, when terminal
    pub outcome: Option<Outcome>,
}

impl SimulationState {
    /// Fresh state at the start of a trial
    pub fn new(params: TrialParameters) -> Self {
        Self {
            params,
            elapsed_time: 0.0,
            subject_distance: params.subject_init_distance,
            subject_speed: params.subject_speed_min,
            target_distance: params.target_init_distance,
            target_speed: params.target_init_speed,
            has_changed_speed: false,
            terminal: false,
            won: None,
            ticks: 0,
            outcome: None,
        }
    }

    pub fn observation(&self) -> Observation {
        Observation {
            subject_speed: self.subject_speed,
            subject_distance: self.subject_distance,
            has_changed_speed: self.has_changed_speed,
            target_speed: self.target_speed,
            target_distance: self.target_distance,
        }
    }

    /// Planar subject–target separation
    pub fn separation(&self) -> f64 {
        super::geometry::separation(
            self.subject_distance,
            self.target_distance,
            self.params.approach_angle_deg,
        )
    }

    /// Display positions (subject, target)
    pub fn positions(&self) -> (DVec3, DVec3) {
        super::geometry::positions(
            self.subject_distance,
            self.target_distance,
            self.params.approach_angle_deg,
            self.params.height_above_ground,
        )
    }

    /// Freeze the trial with its outcome
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.terminal = true;
        self.won = Some(outcome.is_won());
        self.outcome = Some(outcome);
    }
}
