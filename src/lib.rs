//! Interception - a moving-target interception task
//!
//! Core modules:
//! - `sim`: Deterministic trial simulation (kinematics, speed schedule, contact)
//! - `sampler`: Per-trial parameter sampling from ranges, lists and distributions
//! - `plan`: Practice and experimental block layout for a session
//! - `bridge`: Line-protocol client for an external decision process
//! - `speed`: Sources of the subject's commanded speed
//! - `driver`: Fixed-timestep trial loop and recording
//! - `settings`: Typed settings lookups and session-wide configuration

pub mod bridge;
pub mod driver;
pub mod error;
pub mod plan;
pub mod sampler;
pub mod settings;
pub mod sim;
pub mod speed;

pub use bridge::{DecisionBridge, DecisionProcessConfig};
pub use driver::{TrialRecord, TrialRunner};
pub use error::{ConfigError, Error, ProtocolError, StateError};
pub use sampler::{Overrides, ParamKey, ParamSpec, SamplerConfig};
pub use settings::{SessionConfig, Settings};
pub use sim::{Engine, Observation, Outcome, TrialParameters};
pub use speed::{ManualSpeed, ScriptedSpeed, SpeedSource};

/// Task configuration constants
pub mod consts {
    /// Simulation rate of the task
    pub const TASK_FPS: u32 = 30;
    /// Fixed timestep at [`TASK_FPS`]
    pub const TASK_DT: f64 = 1.0 / TASK_FPS as f64;

    /// Speeds the subject can select, slowest first
    pub const DEFAULT_SUBJECT_SPEEDS: [f64; 6] = [2.0, 4.0, 8.0, 10.0, 12.0, 14.0];
    /// Subject and target radius
    pub const DEFAULT_RADIUS: f64 = 0.35;

    /// Speed response gain (1/s)
    pub const DEFAULT_LAG_COEFFICIENT: f64 = 5.0;
    /// Eye height of the display camera
    pub const DEFAULT_HEIGHT_ABOVE_GROUND: f64 = 0.5;
}
