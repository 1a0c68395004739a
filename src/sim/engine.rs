//! Trial state machine
//!
//! `Idle -> Running -> Terminal`. `reset` starts (or restarts) a trial from
//! any state; `step` is only legal while running.

use super::params::TrialParameters;
use super::state::{Observation, Outcome, SimulationState};
use super::tick::{TickInput, tick};
use crate::error::{ConfigError, StateError};

/// Engine lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No trial has been reset yet
    Idle,
    Running,
    Terminal { won: bool },
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Terminal { .. } => "terminal",
        }
    }
}

/// Owns the state of at most one trial
#[derive(Debug, Clone, Default)]
pub struct Engine {
    state: Option<SimulationState>,
}

impl Engine {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Discard any current trial and start a new one
    pub fn reset(&mut self, params: TrialParameters) -> Result<(), ConfigError> {
        params.validate()?;
        log::debug!(
            "trial reset: angle={} subject={} target={}@{} -> {} at t={}",
            params.approach_angle_deg,
            params.subject_init_distance,
            params.target_init_distance,
            params.target_init_speed,
            params.target_final_speed,
            params.time_to_change_speed
        );
        self.state = Some(SimulationState::new(params));
        Ok(())
    }

    /// Advance the running trial by `dt` seconds with the given commanded speed.
    ///
    /// Returns the outcome on the tick the trial ends, `None` while it keeps running.
    pub fn step(&mut self, dt: f64, commanded_speed: f64) -> Result<Option<Outcome>, StateError> {
        let phase = self.phase();
        let state = match self.state.as_mut() {
            Some(state) if phase == Phase::Running => state,
            _ => return Err(StateError::NotRunning(phase.as_str())),
        };
        if !dt.is_finite() || dt <= 0.0 {
            return Err(StateError::InvalidTimestep(dt));
        }

        let outcome = tick(state, &TickInput::new(commanded_speed), dt);
        if let Some(outcome) = outcome {
            log::debug!(
                "trial ended after {} ticks ({:.3}s): {}",
                state.ticks,
                state.elapsed_time,
                outcome.as_str()
            );
        }
        Ok(outcome)
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            None => Phase::Idle,
            Some(state) => match state.won {
                Some(won) if state.terminal => Phase::Terminal { won },
                _ => Phase::Running,
            },
        }
    }

    /// Current trial state, if any trial has been reset
    pub fn state(&self) -> Option<&SimulationState> {
        self.state.as_ref()
    }

    pub fn observation(&self) -> Option<Observation> {
        self.state.as_ref().map(SimulationState::observation)
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TASK_DT;
    use crate::sim::params::reference_params;
    use proptest::prelude::*;

    #[test]
    fn test_step_before_reset_is_refused() {
        let mut engine = Engine::new();
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(
            engine.step(TASK_DT, 2.0),
            Err(StateError::NotRunning("idle"))
        );
    }

    #[test]
    fn test_step_after_terminal_is_refused() {
        let mut engine = Engine::new();
        engine.reset(reference_params()).unwrap();
        let mut outcome = None;
        while outcome.is_none() {
            outcome = engine.step(TASK_DT, 0.0).unwrap();
        }
        assert_eq!(engine.phase(), Phase::Terminal { won: false });
        let frozen = engine.state().cloned();
        assert_eq!(
            engine.step(TASK_DT, 0.0),
            Err(StateError::NotRunning("terminal"))
        );
        assert_eq!(engine.state().cloned(), frozen);
    }

    #[test]
    fn test_reset_after_terminal_restarts() {
        let mut engine = Engine::new();
        engine.reset(reference_params()).unwrap();
        while engine.step(TASK_DT, 14.0).unwrap().is_none() {}
        engine.reset(reference_params()).unwrap();
        assert_eq!(engine.phase(), Phase::Running);
        let state = engine.state().unwrap();
        assert_eq!(state.elapsed_time, 0.0);
        assert_eq!(state.won, None);
    }

    #[test]
    fn test_invalid_params_rejected_on_reset() {
        let mut engine = Engine::new();
        let mut params = reference_params();
        params.subject_radius = -1.0;
        assert!(engine.reset(params).is_err());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_invalid_timestep() {
        let mut engine = Engine::new();
        engine.reset(reference_params()).unwrap();
        assert_eq!(
            engine.step(0.0, 2.0),
            Err(StateError::InvalidTimestep(0.0))
        );
        assert!(engine.step(f64::NAN, 2.0).is_err());
        assert_eq!(engine.state().unwrap().ticks, 0);
    }

    proptest! {
        #[test]
        fn prop_min_speed_always_terminates(
            angle in 90.0f64..180.0,
            subject_distance in 1.0f64..60.0,
            target_distance in 1.0f64..60.0,
            subject_min in 0.5f64..10.0,
            target_speed in 0.5f64..20.0,
            lag in 0.5f64..10.0,
        ) {
            let params = TrialParameters {
                approach_angle_deg: angle,
                subject_init_distance: subject_distance,
                target_init_distance: target_distance,
                subject_speed_min: subject_min,
                subject_speed_max: subject_min + 10.0,
                target_init_speed: target_speed,
                target_final_speed: target_speed,
                lag_coefficient: lag,
                ..reference_params()
            };
            let mut engine = Engine::new();
            engine.reset(params).unwrap();
            // Each entity covers at least speed * dt per tick
            let bound = ((subject_distance + 1.0) / (subject_min * TASK_DT)).ceil() as u64 + 1;
            let mut ticks = 0u64;
            while engine.step(TASK_DT, subject_min).unwrap().is_none() {
                ticks += 1;
                prop_assert!(ticks <= bound);
            }
        }

        #[test]
        fn prop_speed_change_flips_once_after_threshold(
            change_at in 0.0f64..3.0,
            duration in prop_oneof![Just(0.0f64), 0.1f64..2.0],
            final_speed in 5.0f64..25.0,
        ) {
            let params = TrialParameters {
                time_to_change_speed: change_at,
                target_speed_change_duration: duration,
                target_final_speed: final_speed,
                target_init_distance: 500.0,
                subject_init_distance: 500.0,
                ..reference_params()
            };
            let mut engine = Engine::new();
            engine.reset(params).unwrap();
            let mut flips = 0;
            let mut changed = false;
            for _ in 0..150 {
                engine.step(TASK_DT, 2.0).unwrap();
                let state = engine.state().unwrap();
                if state.has_changed_speed && !changed {
                    flips += 1;
                    prop_assert!(state.elapsed_time >= change_at);
                }
                prop_assert!(!(changed && !state.has_changed_speed));
                changed = state.has_changed_speed;
            }
            prop_assert!(flips <= 1);
        }

        #[test]
        fn prop_filter_is_idle_at_equilibrium(speed in 0.0f64..20.0) {
            let mut engine = Engine::new();
            engine.reset(TrialParameters {
                subject_speed_min: speed,
                subject_speed_max: speed,
                ..reference_params()
            }).unwrap();
            engine.step(TASK_DT, speed).unwrap();
            prop_assert_eq!(engine.state().unwrap().subject_speed, speed);
        }
    }
}
