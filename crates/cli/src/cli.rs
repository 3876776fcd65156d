use std::path::PathBuf;

use clap::Parser;
use scrabble_core::BenchConfig;

/// Benchmark work-distribution strategies on a Scrabble word-scoring workload.
///
/// Settings come from `SCRABBLE_*` environment variables (and `.env`);
/// flags given here override them.
#[derive(Parser, Debug)]
#[command(name = "scrabble-bench", about = "Benchmark work-distribution strategies")]
pub struct CliArgs {
    /// Strategies to run, comma separated, or `all`
    #[arg(long, short, value_delimiter = ',', default_value = "all", env = "SCRABBLE_STRATEGIES")]
    pub strategies: Vec<String>,

    /// Merge modes to run: immediate, deferred, or `all`
    #[arg(long, value_delimiter = ',', default_value = "immediate")]
    pub merge: Vec<String>,

    /// Config profile prefix for environment lookups
    #[arg(long, env = "SCRABBLE_PROFILE")]
    pub profile: Option<String>,

    /// Worker pool size (0 = available parallelism minus one)
    #[arg(long, short)]
    pub workers: Option<usize>,

    /// Capacity of every channel, lane and mailbox
    #[arg(long)]
    pub channel_capacity: Option<usize>,

    /// Outstanding items before the source starts waiting
    #[arg(long)]
    pub soft_limit: Option<usize>,

    #[arg(long)]
    pub slack: Option<usize>,

    /// Yield rounds per wait; any value above 0 turns throttling on
    #[arg(long)]
    pub wait_budget: Option<u32>,

    #[arg(long)]
    pub max_stalls: Option<u32>,

    /// Feed at most this many words per run
    #[arg(long)]
    pub max_items: Option<usize>,

    #[arg(long)]
    pub hash_iterations: Option<u32>,

    /// Words ending with this suffix pay the simulated hash cost
    #[arg(long)]
    pub hash_suffix: Option<String>,

    /// Distinct priorities kept in the ranked table
    #[arg(long)]
    pub num_save: Option<usize>,

    /// Keep every priority instead of only the top `num_save`
    #[arg(long)]
    pub unbounded: bool,

    #[arg(long)]
    pub dictionary: Option<PathBuf>,

    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Untimed runs per strategy before measuring
    #[arg(long, default_value_t = 1)]
    pub warmup: usize,

    /// Measured runs per strategy
    #[arg(long, default_value_t = 3)]
    pub iterations: usize,

    /// Print measurements as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl CliArgs {
    /// Overlay explicitly given flags on top of the env config.
    pub fn apply(&self, config: &mut BenchConfig) {
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.channel_capacity {
            config.channel_capacity = v;
        }
        if let Some(v) = self.soft_limit {
            config.soft_limit = v;
        }
        if let Some(v) = self.slack {
            config.slack = v;
        }
        if let Some(v) = self.wait_budget {
            config.wait_budget = v;
        }
        if let Some(v) = self.max_stalls {
            config.max_stalls = v;
        }
        if self.max_items.is_some() {
            config.max_items = self.max_items;
        }
        if let Some(v) = self.hash_iterations {
            config.hash_iterations = v;
        }
        if self.hash_suffix.is_some() {
            config.hash_suffix = self.hash_suffix.clone();
        }
        if let Some(v) = self.num_save {
            config.num_save = v;
        }
        if self.unbounded {
            config.fast = false;
        }
        if let Some(ref path) = self.dictionary {
            config.dictionary_path = path.clone();
        }
        if let Some(ref path) = self.corpus {
            config.corpus_path = path.clone();
        }
    }
}
