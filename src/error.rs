//! Error taxonomy
//!
//! Every error here is fatal to the operation that raised it. Nothing in the
//! crate retries; a trial that ends without interception is an outcome, not
//! an error.

use thiserror::Error;

use crate::sampler::ParamKey;

/// Bad or missing configuration, surfaced before a trial starts
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing setting `{0}`")]
    MissingKey(String),
    #[error("setting `{key}` is not a {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("no sampling rule for parameter `{0}`")]
    MissingParameter(ParamKey),
    #[error("parameter `{0}` has an empty choice list")]
    EmptyChoice(ParamKey),
    #[error("parameter `{key}` range is inverted (min {min} > max {max})")]
    InvertedRange { key: ParamKey, min: f64, max: f64 },
    #[error("parameter `{key}` standard deviation must be positive, got {std_dev}")]
    NonPositiveStdDev { key: ParamKey, std_dev: f64 },
    #[error("parameter `{key}` is not finite ({value})")]
    NonFinite { key: ParamKey, value: f64 },
    #[error("invalid trial parameters: {0}")]
    InvalidParameters(String),
    #[error("failed to parse settings: {0}")]
    Parse(String),
}

/// Decision process broke the line protocol
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to launch decision process `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decision process closed its output before answering")]
    Closed,
    #[error("decision process I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed decision response {line:?}: {reason}")]
    Malformed { line: String, reason: String },
    #[error("decision process was already shut down")]
    ShutDown,
}

/// Engine API misuse
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("step called while the engine is {0}")]
    NotRunning(&'static str),
    #[error("timestep must be finite and positive, got {0}")]
    InvalidTimestep(f64),
    #[error("trial did not finish within {0} ticks")]
    TickLimitExceeded(u64),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
