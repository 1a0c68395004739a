//! Interception task runner
//!
//! Loads a settings file, samples or plans trials and drives them with a
//! scripted speed or an external decision process.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use interception::driver::Summary;
use interception::plan::plan_session;
use interception::{
    DecisionBridge, Overrides, SamplerConfig, ScriptedSpeed, SessionConfig, Settings, SpeedSource,
    TrialParameters, TrialRunner,
};

#[derive(Debug, Parser)]
#[command(name = "interception", about = "Moving-target interception task")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run trials to completion and report outcomes
    Run {
        /// Settings JSON file
        #[arg(long)]
        settings: PathBuf,
        /// RNG seed (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Number of independently sampled trials
        #[arg(long, default_value_t = 1, conflicts_with = "session")]
        trials: usize,
        /// Run a full planned session (practice block plus blocks)
        #[arg(long)]
        session: bool,
        /// Drive the subject at a constant commanded speed
        #[arg(long)]
        speed: Option<f64>,
        /// Drive the subject with the decision process configured in settings
        #[arg(long, conflicts_with = "speed")]
        decision_process: bool,
        /// Directory for per-trial JSON records
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print sampled trial parameters as JSON
    Sample {
        #[arg(long)]
        settings: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            settings,
            seed,
            trials,
            session,
            speed,
            decision_process,
            output,
        } => {
            let source = match speed {
                Some(speed) => Source::Scripted(speed),
                None if decision_process => Source::Decision,
                None => Source::Default,
            };
            run(&settings, seed, trials, session, source, output.as_deref())
        }
        Commands::Sample {
            settings,
            seed,
            count,
        } => sample(&settings, seed, count),
    }
}

/// Speed source requested on the command line
enum Source {
    Scripted(f64),
    Decision,
    /// Decision process when settings configure one
    Default,
}

struct Loaded {
    session: SessionConfig,
    sampler: SamplerConfig,
    rng: Pcg32,
}

fn load(path: &Path, seed: Option<u64>) -> Result<Loaded> {
    let settings = Settings::load(path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    let session = SessionConfig::from_settings(&settings).context("invalid session settings")?;
    let sampler =
        SamplerConfig::from_settings(&settings, &session).context("invalid sampling settings")?;
    let seed = seed.unwrap_or_else(rand::random);
    log::info!("Using seed {seed}");
    Ok(Loaded {
        session,
        sampler,
        rng: Pcg32::seed_from_u64(seed),
    })
}

fn run(
    settings: &Path,
    seed: Option<u64>,
    trials: usize,
    planned: bool,
    source: Source,
    output: Option<&Path>,
) -> Result<()> {
    let Loaded {
        session,
        sampler,
        mut rng,
    } = load(settings, seed)?;

    let schedule: Vec<(usize, TrialParameters)> = if planned {
        plan_session(&sampler, &session, &mut rng)?
            .trials()
            .map(|(block, params)| (block, *params))
            .collect()
    } else {
        (0..trials)
            .map(|_| sampler.sample(&Overrides::new(), &mut rng).map(|p| (1, p)))
            .collect::<Result<_, _>>()?
    };

    // The bridge, if any, is dropped (and its process reaped) on every return path
    let mut source: Box<dyn SpeedSource> = match (source, &session.decision_process) {
        (Source::Scripted(speed), _) => Box::new(ScriptedSpeed::constant(speed)),
        (Source::Decision | Source::Default, Some(process)) => Box::new(
            DecisionBridge::spawn(process).context("failed to start decision process")?,
        ),
        (Source::Decision, None) => {
            bail!("--decision-process needs decisionCommand in settings")
        }
        (Source::Default, None) => {
            bail!("no speed source: pass --speed or set decisionCommand in settings")
        }
    };

    let mut runner = TrialRunner::from_session(&session);
    let mut summary = Summary::default();
    for (index, (block, params)) in schedule.iter().enumerate() {
        let record = runner
            .run(*params, source.as_mut())
            .with_context(|| format!("trial {} failed", index + 1))?;
        println!(
            "block {block} trial {:>3}: {} in {:.2}s (angle {}, target {} -> {})",
            index + 1,
            record.outcome.as_str(),
            record.elapsed_time,
            params.approach_angle_deg,
            params.target_init_speed,
            params.target_final_speed
        );
        if let Some(dir) = output {
            record.save(dir, index + 1)?;
        }
        summary.add(&record);
    }

    println!(
        "{} of {} trials intercepted ({:.0}%)",
        summary.intercepted,
        summary.trials,
        summary.hit_rate() * 100.0
    );
    Ok(())
}

fn sample(settings: &Path, seed: Option<u64>, count: usize) -> Result<()> {
    let Loaded {
        sampler, mut rng, ..
    } = load(settings, seed)?;
    let params = (0..count)
        .map(|_| sampler.sample(&Overrides::new(), &mut rng))
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_decision_process_flag() {
        let cli =
            Cli::try_parse_from(["interception", "run", "--settings", "s.json", "--decision-process"])
                .unwrap();
        let Commands::Run {
            decision_process,
            speed,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert!(decision_process);
        assert_eq!(speed, None);
    }

    #[test]
    fn test_speed_conflicts_with_decision_process() {
        let err = Cli::try_parse_from([
            "interception",
            "run",
            "--settings",
            "s.json",
            "--speed",
            "4",
            "--decision-process",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
