//! Session planning
//!
//! A session opens with a practice block holding one trial per
//! (approach angle, initial target speed) pair, followed by
//! `blocks_per_session` blocks that repeat every pair
//! `trial_repetitions_per_block` times. Trials are shuffled within each block.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sampler::{Overrides, ParamKey, ParamSpec, SamplerConfig};
use crate::settings::SessionConfig;
use crate::sim::TrialParameters;

/// One planned block of trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 0 for the practice block, then 1-based
    pub number: usize,
    pub practice: bool,
    pub trials: Vec<TrialParameters>,
}

/// All trials of a session, in run order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub blocks: Vec<Block>,
}

impl SessionPlan {
    pub fn trial_count(&self) -> usize {
        self.blocks.iter().map(|b| b.trials.len()).sum()
    }

    /// Trials in run order with their block number
    pub fn trials(&self) -> impl Iterator<Item = (usize, &TrialParameters)> {
        self.blocks
            .iter()
            .flat_map(|b| b.trials.iter().map(move |t| (b.number, t)))
    }
}

/// Plan a session from the sampler's angle and initial-speed lists
pub fn plan_session<R: Rng + ?Sized>(
    sampler: &SamplerConfig,
    session: &SessionConfig,
    rng: &mut R,
) -> Result<SessionPlan, ConfigError> {
    sampler.validate()?;
    let angles = categories(sampler, ParamKey::ApproachAngleDeg)?;
    let speeds = categories(sampler, ParamKey::TargetInitSpeed)?;

    let mut blocks = Vec::with_capacity(session.blocks_per_session + 1);
    blocks.push(plan_block(sampler, 0, true, 1, &angles, &speeds, rng)?);
    for number in 1..=session.blocks_per_session {
        blocks.push(plan_block(
            sampler,
            number,
            false,
            session.trial_repetitions_per_block,
            &angles,
            &speeds,
            rng,
        )?);
    }

    let plan = SessionPlan { blocks };
    log::info!(
        "Planned {} blocks, {} trials",
        plan.blocks.len(),
        plan.trial_count()
    );
    Ok(plan)
}

fn categories(sampler: &SamplerConfig, key: ParamKey) -> Result<Vec<f64>, ConfigError> {
    match sampler.spec(key) {
        Some(ParamSpec::Choice(values)) => Ok(values.clone()),
        Some(ParamSpec::Fixed(value)) => Ok(vec![*value]),
        Some(_) => Err(ConfigError::InvalidParameters(format!(
            "{key} must be a fixed value or a choice list to plan a session"
        ))),
        None => Err(ConfigError::MissingParameter(key)),
    }
}

fn plan_block<R: Rng + ?Sized>(
    sampler: &SamplerConfig,
    number: usize,
    practice: bool,
    repetitions: usize,
    angles: &[f64],
    speeds: &[f64],
    rng: &mut R,
) -> Result<Block, ConfigError> {
    let mut trials = Vec::with_capacity(angles.len() * speeds.len() * repetitions);
    for &angle in angles {
        for &speed in speeds {
            let overrides = Overrides::new()
                .with(ParamKey::ApproachAngleDeg, angle)
                .with(ParamKey::TargetInitSpeed, speed);
            for _ in 0..repetitions {
                trials.push(sampler.sample(&overrides, rng)?);
            }
        }
    }
    trials.shuffle(rng);
    Ok(Block {
        number,
        practice,
        trials,
    })
}
