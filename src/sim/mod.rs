//! Deterministic interception simulation
//!
//! All trial dynamics live here. This module must stay pure and deterministic:
//! - Caller-supplied timestep only
//! - No randomness (parameters arrive fully sampled)
//! - No rendering, input or I/O dependencies

pub mod engine;
pub mod geometry;
pub mod params;
pub mod state;
pub mod tick;

pub use engine::{Engine, Phase};
pub use geometry::{positions, separation};
pub use params::TrialParameters;
pub use state::{MissReason, Observation, Outcome, SimulationState};
pub use tick::{TickInput, ramp_speed, tick};
