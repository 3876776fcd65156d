mod cli;
mod harness;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use scrabble_compute::{MergeMode, RunError, ScoringKernel, ScrabbleKernel, StrategyKind};
use scrabble_core::{load_dotenv, BenchConfig, Corpus};

use crate::cli::CliArgs;
use crate::harness::{measure, render_table, HarnessPlan, Measurement};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<RunError>() {
                Some(RunError::Source(stall)) => error!(error = %stall, "run aborted, consumer stalled"),
                _ => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();
    let measurements = bench(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&measurements)?);
    } else {
        print!("{}", render_table(&measurements));
    }
    Ok(())
}

/// Run every selected strategy and merge mode against the configured corpus.
fn bench(args: &CliArgs) -> Result<Vec<Measurement>> {
    let mut config = match args.profile.as_deref() {
        Some(profile) => BenchConfig::for_profile(profile),
        None => BenchConfig::from_env(),
    };
    args.apply(&mut config);
    config.validate().context("invalid benchmark configuration")?;
    config.log_summary();

    let strategies = parse_list(&args.strategies, &StrategyKind::all())?;
    let merges = parse_list(&args.merge, &MergeMode::all())?;

    // Missing word files are logged by the loader; the runs still go ahead.
    let corpus = Corpus::load(&config);
    let kernel: Arc<dyn ScoringKernel> = Arc::new(
        ScrabbleKernel::new(corpus.dictionary)
            .with_hash_cost(config.hash_iterations, config.hash_suffix.clone()),
    );

    let plan = HarnessPlan { warmup: args.warmup, iterations: args.iterations };
    let mut measurements = Vec::with_capacity(strategies.len() * merges.len());
    for &kind in &strategies {
        for &merge in &merges {
            let m = measure(kind, merge, &config, &kernel, &corpus.words, plan)
                .with_context(|| format!("strategy {kind} ({merge}) failed"))?;
            measurements.push(m);
        }
    }
    info!(measurements = measurements.len(), "benchmark complete");
    Ok(measurements)
}

/// Parse a comma-separated selection, where `all` expands to every value.
/// Repeats are dropped, keeping the first occurrence.
fn parse_list<T>(raw: &[String], all: &[T]) -> Result<Vec<T>>
where
    T: Copy + PartialEq + std::str::FromStr<Err = RunError>,
{
    let mut picked: Vec<T> = Vec::new();
    for name in raw {
        let chosen = if name.trim().eq_ignore_ascii_case("all") {
            all.to_vec()
        } else {
            vec![name.parse::<T>()?]
        };
        for value in chosen {
            if !picked.contains(&value) {
                picked.push(value);
            }
        }
    }
    if picked.is_empty() {
        bail!("nothing selected");
    }
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_expands_all() {
        let kinds = parse_list(&["all".to_string()], &StrategyKind::all()).unwrap();
        assert_eq!(kinds.len(), 8);

        let merges = parse_list(&["deferred".to_string()], &MergeMode::all()).unwrap();
        assert_eq!(merges, vec![MergeMode::Deferred]);

        assert!(parse_list::<MergeMode>(&["eventually".to_string()], &MergeMode::all()).is_err());
    }

    #[test]
    fn parse_list_drops_repeats_in_first_seen_order() {
        let raw = ["mailbox".to_string(), "direct".to_string(), "all".to_string(), "direct".to_string()];
        let kinds = parse_list(&raw, &StrategyKind::all()).unwrap();
        assert_eq!(kinds.len(), 8);
        assert_eq!(kinds[0], StrategyKind::Mailbox);
        assert_eq!(kinds[1], StrategyKind::Direct);
        assert_eq!(kinds.iter().filter(|&&k| k == StrategyKind::Direct).count(), 1);
    }

    #[test]
    fn missing_corpus_runs_to_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let dictionary = dir.path().join("no-dictionary.txt").display().to_string();
        let corpus = dir.path().join("no-words.txt").display().to_string();
        let args = CliArgs::parse_from([
            "scrabble-bench",
            "--strategies",
            "direct,shared-queue",
            "--merge",
            "all",
            "--workers",
            "2",
            "--warmup",
            "0",
            "--iterations",
            "1",
            "--dictionary",
            dictionary.as_str(),
            "--corpus",
            corpus.as_str(),
        ]);

        let measurements = bench(&args).unwrap();
        assert_eq!(measurements.len(), 4);
        for m in &measurements {
            assert_eq!(m.emitted, 0, "{} / {}", m.strategy, m.merge);
            assert!(m.top.is_empty());
        }
    }
}
