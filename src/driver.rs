//! Fixed-timestep trial driver
//!
//! Owns the engine and the timing; asks a [`SpeedSource`] for the commanded
//! speed each tick and records what the subject saw.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, StateError};
use crate::settings::SessionConfig;
use crate::sim::{Engine, Observation, Outcome, SimulationState, TrialParameters};
use crate::speed::SpeedSource;

/// One recorded tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    /// Timestep that produced this row (0 for the reset state)
    pub delta_time: f64,
    pub subject_speed: f64,
    pub subject_distance: f64,
    pub has_changed_speed: bool,
    pub target_speed: f64,
    pub target_distance: f64,
}

impl RecordRow {
    fn new(delta_time: f64, obs: &Observation) -> Self {
        Self {
            delta_time,
            subject_speed: obs.subject_speed,
            subject_distance: obs.subject_distance,
            has_changed_speed: obs.has_changed_speed,
            target_speed: obs.target_speed,
            target_distance: obs.target_distance,
        }
    }
}

/// Everything needed to reproduce and score one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub parameters: TrialParameters,
    pub intercepted: bool,
    pub outcome: Outcome,
    pub ticks: u64,
    pub elapsed_time: f64,
    /// Reset state followed by one row per tick
    pub rows: Vec<RecordRow>,
}

impl TrialRecord {
    /// File stem used when saving: `state_data_won` or `state_data_lost`
    pub fn file_stem(&self) -> &'static str {
        if self.intercepted {
            "state_data_won"
        } else {
            "state_data_lost"
        }
    }

    /// Write as pretty JSON into `dir`, prefixing the file with `trial_index`
    pub fn save(&self, dir: impl AsRef<Path>, trial_index: usize) -> Result<PathBuf, Error> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("trial_{trial_index:03}_{}.json", self.file_stem()));
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        log::debug!("Saved trial record to {}", path.display());
        Ok(path)
    }
}

/// Runs trials at a fixed timestep
#[derive(Debug, Clone)]
pub struct TrialRunner {
    engine: Engine,
    dt: f64,
    max_ticks: Option<u64>,
    record: bool,
}

impl TrialRunner {
    pub fn new(dt: f64) -> Self {
        Self {
            engine: Engine::new(),
            dt,
            max_ticks: None,
            record: true,
        }
    }

    pub fn from_session(session: &SessionConfig) -> Self {
        Self::new(session.dt()).with_max_ticks(session.max_ticks)
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Skip per-tick rows (records then only carry the reset state)
    pub fn with_recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run one trial to completion.
    ///
    /// Blocks for as long as the speed source does; a decision process that
    /// never answers stalls here.
    pub fn run(
        &mut self,
        params: TrialParameters,
        source: &mut dyn SpeedSource,
    ) -> Result<TrialRecord, Error> {
        self.engine.reset(params)?;
        source.reset();

        let mut observation = self.current_observation()?;
        let mut rows = vec![RecordRow::new(0.0, &observation)];

        let outcome = loop {
            if let Some(limit) = self.max_ticks {
                if self.ticks() >= limit {
                    log::warn!("Trial aborted at tick limit {limit}");
                    return Err(StateError::TickLimitExceeded(limit).into());
                }
            }
            let speed = source.commanded_speed(&observation)?;
            let outcome = self.engine.step(self.dt, speed)?;
            observation = self.current_observation()?;
            if self.record {
                rows.push(RecordRow::new(self.dt, &observation));
            }
            if let Some(outcome) = outcome {
                break outcome;
            }
        };

        let state = self.finished_state()?;
        log::info!(
            "Trial {} after {:.2}s ({} ticks, source: {})",
            outcome.as_str(),
            state.elapsed_time,
            state.ticks,
            source.name()
        );
        Ok(TrialRecord {
            parameters: params,
            intercepted: outcome.is_won(),
            outcome,
            ticks: state.ticks,
            elapsed_time: state.elapsed_time,
            rows,
        })
    }

    fn ticks(&self) -> u64 {
        self.engine.state().map_or(0, |s| s.ticks)
    }

    fn current_observation(&self) -> Result<Observation, StateError> {
        self.engine
            .observation()
            .ok_or(StateError::NotRunning("idle"))
    }

    fn finished_state(&self) -> Result<&SimulationState, StateError> {
        self.engine.state().ok_or(StateError::NotRunning("idle"))
    }
}

/// Win/loss tally over a run of trials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub trials: usize,
    pub intercepted: usize,
}

impl Summary {
    pub fn add(&mut self, record: &TrialRecord) {
        self.trials += 1;
        if record.intercepted {
            self.intercepted += 1;
        }
    }

    pub fn hit_rate(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.intercepted as f64 / self.trials as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TASK_DT;
    use crate::sim::params::reference_params;
    use crate::sim::{MissReason, Outcome};
    use crate::speed::ScriptedSpeed;

    /// A source that never moves the subject and a target that never arrives
    fn stalled_params() -> TrialParameters {
        TrialParameters {
            subject_speed_min: 0.0,
            target_init_speed: 0.0,
            target_final_speed: 0.0,
            ..reference_params()
        }
    }

    #[test]
    fn test_records_every_tick() {
        let mut runner = TrialRunner::new(TASK_DT);
        let record = runner
            .run(reference_params(), &mut ScriptedSpeed::constant(0.0))
            .unwrap();
        assert!(!record.intercepted);
        assert_eq!(record.outcome, Outcome::Missed(MissReason::TargetOvershoot));
        assert_eq!(record.rows.len() as u64, record.ticks + 1);
        assert_eq!(record.rows[0].delta_time, 0.0);
        assert_eq!(record.rows[0].subject_distance, 25.0);
        assert_eq!(record.file_stem(), "state_data_lost");
        let last = record.rows.last().unwrap();
        assert!(last.target_distance < -0.7);
    }

    #[test]
    fn test_intercept_run() {
        let mut runner = TrialRunner::new(TASK_DT).with_recording(false);
        let record = runner
            .run(reference_params(), &mut ScriptedSpeed::constant(5.6))
            .unwrap();
        assert!(record.intercepted);
        assert_eq!(record.rows.len(), 1);
        assert_eq!(record.file_stem(), "state_data_won");
    }

    #[test]
    fn test_tick_limit() {
        let mut runner = TrialRunner::new(TASK_DT).with_max_ticks(Some(100));
        let err = runner
            .run(stalled_params(), &mut ScriptedSpeed::constant(0.0))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::State(StateError::TickLimitExceeded(100))
        ));
    }

    #[test]
    fn test_summary() {
        let mut runner = TrialRunner::new(TASK_DT);
        let mut summary = Summary::default();
        for speed in [5.6, 0.0, 14.0, 5.7] {
            let record = runner
                .run(reference_params(), &mut ScriptedSpeed::constant(speed))
                .unwrap();
            summary.add(&record);
        }
        assert_eq!(summary.trials, 4);
        assert_eq!(summary.intercepted, 2);
        assert_eq!(summary.hit_rate(), 0.5);
    }

    #[test]
    fn test_save_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = TrialRunner::new(TASK_DT);
        let record = runner
            .run(reference_params(), &mut ScriptedSpeed::constant(14.0))
            .unwrap();
        let path = record.save(dir.path(), 3).unwrap();
        assert!(path.ends_with("trial_003_state_data_lost.json"));
        let loaded: TrialRecord =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded.outcome, record.outcome);
        assert_eq!(loaded.ticks, record.ticks);
        assert_eq!(loaded.rows.len(), record.rows.len());
        assert_eq!(loaded.parameters.approach_angle_deg, 135.0);
    }
}
