//! Single simulation tick
//!
//! Advances a running trial by one timestep. Order matters and is fixed:
//! target schedule, subject speed response, kinematics, contact, termination.

use super::geometry::separation;
use super::state::{MissReason, Outcome, SimulationState};

/// Input for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Speed the subject is being told to reach
    pub commanded_speed: f64,
}

impl TickInput {
    pub fn new(commanded_speed: f64) -> Self {
        Self { commanded_speed }
    }
}

/// Advance a running trial by `dt` seconds.
///
/// Returns the outcome on the tick the trial ends. The caller guarantees the
/// state is not terminal and `dt` is positive.
pub fn tick(state: &mut SimulationState, input: &TickInput, dt: f64) -> Option<Outcome> {
    debug_assert!(!state.terminal);
    let params = state.params;
    let next_time = state.elapsed_time + dt;

    // Target speed schedule
    if !state.has_changed_speed && next_time >= params.time_to_change_speed {
        state.has_changed_speed = true;
        log::debug!(
            "target speed change at t={:.3}s ({} -> {})",
            next_time,
            params.target_init_speed,
            params.target_final_speed
        );
        if params.is_instantaneous_change() {
            state.target_speed = params.target_final_speed;
        }
    }
    if state.has_changed_speed && !params.is_instantaneous_change() {
        state.target_speed = ramp_speed(
            params.target_init_speed,
            params.target_final_speed,
            next_time - params.time_to_change_speed,
            params.target_speed_change_duration,
        );
    }

    // First-order lag toward the commanded speed (no clamp)
    state.subject_speed +=
        params.lag_coefficient * (input.commanded_speed - state.subject_speed) * dt;

    state.subject_distance -= state.subject_speed * dt;
    state.target_distance -= state.target_speed * dt;
    state.elapsed_time = next_time;
    state.ticks += 1;

    log::trace!(
        "tick {} t={:.3} subject={:.3}@{:.3} target={:.3}@{:.3}",
        state.ticks,
        state.elapsed_time,
        state.subject_distance,
        state.subject_speed,
        state.target_distance,
        state.target_speed
    );

    let outcome = check_termination(state);
    if let Some(outcome) = outcome {
        state.finish(outcome);
    }
    outcome
}

/// Linear ramp from `init` toward `target`, capped with `min` at `target`.
///
/// The cap only bounds an increasing ramp; a decreasing one keeps falling
/// past `target`.
#[inline]
pub fn ramp_speed(init: f64, target: f64, since_change: f64, duration: f64) -> f64 {
    let progress = since_change / duration;
    target.min(init + progress * (target - init))
}

fn check_termination(state: &SimulationState) -> Option<Outcome> {
    let params = &state.params;
    let sep = separation(
        state.subject_distance,
        state.target_distance,
        params.approach_angle_deg,
    );
    if sep < params.contact_distance() {
        Some(Outcome::Intercepted)
    } else if state.subject_distance < -2.0 * params.subject_radius {
        Some(Outcome::Missed(MissReason::SubjectOvershoot))
    } else if state.target_distance < -2.0 * params.target_radius {
        Some(Outcome::Missed(MissReason::TargetOvershoot))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TASK_DT;
    use crate::sim::params::{TrialParameters, reference_params};

    fn run_constant(params: TrialParameters, speed: f64) -> SimulationState {
        let mut state = SimulationState::new(params);
        let input = TickInput::new(speed);
        while tick(&mut state, &input, TASK_DT).is_none() {
            assert!(state.ticks < 10_000, "trial never ended");
        }
        state
    }

    #[test]
    fn test_synchronized_arrival_intercepts() {
        let state = run_constant(reference_params(), 5.6);
        assert!(state.terminal);
        assert_eq!(state.won, Some(true));
        assert_eq!(state.outcome, Some(Outcome::Intercepted));
        assert!(state.separation() < 0.7);
    }

    #[test]
    fn test_fast_subject_overshoots() {
        // At 14 u/s the subject reaches the crossing ~2.5s before the target
        let state = run_constant(reference_params(), 14.0);
        assert_eq!(state.won, Some(false));
        assert_eq!(
            state.outcome,
            Some(Outcome::Missed(MissReason::SubjectOvershoot))
        );
        assert!(state.subject_distance < -0.7);
        assert!(state.target_distance > 20.0);
    }

    #[test]
    fn test_stationary_subject_target_overshoots() {
        let state = run_constant(reference_params(), 0.0);
        assert_eq!(state.won, Some(false));
        assert_eq!(
            state.outcome,
            Some(Outcome::Missed(MissReason::TargetOvershoot))
        );
        assert!(state.target_distance < -0.7);
    }

    #[test]
    fn test_instantaneous_speed_change() {
        let params = TrialParameters {
            target_init_speed: 8.0,
            target_final_speed: 16.0,
            time_to_change_speed: 1.0,
            ..reference_params()
        };
        let mut state = SimulationState::new(params);
        let input = TickInput::new(2.0);
        let mut previous = state.target_speed;
        while !state.has_changed_speed {
            assert_eq!(state.target_speed, 8.0);
            previous = state.target_speed;
            tick(&mut state, &input, TASK_DT);
        }
        assert_eq!(previous, 8.0);
        assert_eq!(state.target_speed, 16.0);
        assert!(state.elapsed_time >= 1.0);
        assert!(state.elapsed_time - TASK_DT < 1.0);
    }

    #[test]
    fn test_ramp_reaches_final_speed() {
        let params = TrialParameters {
            target_init_speed: 10.0,
            target_final_speed: 20.0,
            time_to_change_speed: 0.5,
            target_speed_change_duration: 1.0,
            target_init_distance: 200.0,
            subject_init_distance: 200.0,
            ..reference_params()
        };
        let mut state = SimulationState::new(params);
        let input = TickInput::new(2.0);
        let mut last = state.target_speed;
        for _ in 0..90 {
            tick(&mut state, &input, TASK_DT);
            assert!(state.target_speed >= last);
            assert!(state.target_speed <= 20.0);
            if state.elapsed_time - params.time_to_change_speed >= 1.0 {
                assert_eq!(state.target_speed, 20.0);
            }
            last = state.target_speed;
        }
        assert_eq!(state.target_speed, 20.0);
    }

    #[test]
    fn test_ramp_cap_is_one_sided() {
        assert_eq!(ramp_speed(10.0, 20.0, 0.5, 1.0), 15.0);
        assert_eq!(ramp_speed(10.0, 20.0, 2.0, 1.0), 20.0);
        // Decreasing: snaps to the final speed, then keeps falling past the end of the ramp
        assert_eq!(ramp_speed(20.0, 10.0, 0.5, 1.0), 10.0);
        assert_eq!(ramp_speed(20.0, 10.0, 2.0, 1.0), 0.0);
    }

    #[test]
    fn test_filter_equilibrium() {
        let mut state = SimulationState::new(reference_params());
        let speed = state.subject_speed;
        tick(&mut state, &TickInput::new(speed), TASK_DT);
        assert_eq!(state.subject_speed, speed);
    }

    #[test]
    fn test_filter_moves_toward_command() {
        let mut state = SimulationState::new(reference_params());
        tick(&mut state, &TickInput::new(14.0), TASK_DT);
        // 2 + 5 * 12 / 30
        assert!((state.subject_speed - 4.0).abs() < 1e-12);
        assert!((state.subject_distance - (25.0 - 4.0 / 30.0)).abs() < 1e-12);
        assert!((state.target_distance - (45.0 - 10.0 / 30.0)).abs() < 1e-12);
    }

    #[test]
    fn test_determinism() {
        let params = TrialParameters {
            time_to_change_speed: 1.2,
            target_final_speed: 13.0,
            target_speed_change_duration: 0.8,
            ..reference_params()
        };
        let a = run_constant(params, 6.0);
        let b = run_constant(params, 6.0);
        assert_eq!(a, b);
    }
}
