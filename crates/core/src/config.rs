use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

// ── Benchmark config ──────────────────────────────────────────

/// Process-wide benchmark configuration, read once before any run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Worker pool size. 0 = available parallelism minus one (at least 1).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of every bounded channel, queue and mailbox.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Soft limit on outstanding (emitted but not disposed) items.
    #[serde(default = "default_soft_limit")]
    pub soft_limit: usize,
    /// Extra outstanding items tolerated above `soft_limit` before waiting.
    #[serde(default = "default_slack")]
    pub slack: usize,
    /// Yield rounds before the source escalates to sleeping. 0 = unthrottled.
    #[serde(default)]
    pub wait_budget: u32,
    /// Waits past the budget tolerated before the run aborts.
    #[serde(default = "default_max_stalls")]
    pub max_stalls: u32,
    /// Cap the source to the first N items.
    #[serde(default)]
    pub max_items: Option<usize>,
    /// SHA-256 rounds applied to words ending with `hash_suffix`.
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    #[serde(default)]
    pub hash_suffix: Option<String>,
    /// Width of the ranked table (distinct priority keys kept).
    #[serde(default = "default_num_save")]
    pub num_save: usize,
    /// Bounded ("fast") table mode. When false the table keeps every key.
    #[serde(default = "default_fast")]
    pub fast: bool,
    #[serde(default = "default_dictionary_path")]
    pub dictionary_path: PathBuf,
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
}

fn default_workers() -> usize { 0 }
fn default_channel_capacity() -> usize { 1 << 10 }
fn default_soft_limit() -> usize { 1 << 8 }
fn default_slack() -> usize { 32 }
fn default_max_stalls() -> u32 { 1000 }
fn default_hash_iterations() -> u32 { 1000 }
fn default_num_save() -> usize { 3 }
fn default_fast() -> bool { true }
fn default_dictionary_path() -> PathBuf { PathBuf::from("files/ospd.txt") }
fn default_corpus_path() -> PathBuf { PathBuf::from("files/words.shakespeare.txt") }

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: default_channel_capacity(),
            soft_limit: default_soft_limit(),
            slack: default_slack(),
            wait_budget: 0,
            max_stalls: default_max_stalls(),
            max_items: None,
            hash_iterations: default_hash_iterations(),
            hash_suffix: None,
            num_save: default_num_save(),
            fast: default_fast(),
            dictionary_path: default_dictionary_path(),
            corpus_path: default_corpus_path(),
        }
    }
}

impl BenchConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SCRABBLE_PROFILE`. When set (e.g. `STRESS`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SCRABBLE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let d = Self::default();
        Self {
            workers: profiled_env_parse(p, "SCRABBLE_WORKERS", d.workers),
            channel_capacity: profiled_env_parse(p, "SCRABBLE_CHANNEL_CAPACITY", d.channel_capacity),
            soft_limit: profiled_env_parse(p, "SCRABBLE_SOFT_LIMIT", d.soft_limit),
            slack: profiled_env_parse(p, "SCRABBLE_SLACK", d.slack),
            wait_budget: profiled_env_parse(p, "SCRABBLE_WAIT_BUDGET", d.wait_budget),
            max_stalls: profiled_env_parse(p, "SCRABBLE_MAX_STALLS", d.max_stalls),
            max_items: profiled_env_opt(p, "SCRABBLE_MAX_ITEMS").and_then(|v| v.parse().ok()),
            hash_iterations: profiled_env_parse(p, "SCRABBLE_HASH_ITERATIONS", d.hash_iterations),
            hash_suffix: profiled_env_opt(p, "SCRABBLE_HASH_SUFFIX"),
            num_save: profiled_env_parse(p, "SCRABBLE_NUM_SAVE", d.num_save),
            fast: profiled_env_bool(p, "SCRABBLE_FAST", d.fast),
            dictionary_path: profiled_env_opt(p, "SCRABBLE_DICTIONARY")
                .map(PathBuf::from)
                .unwrap_or(d.dictionary_path),
            corpus_path: profiled_env_opt(p, "SCRABBLE_CORPUS")
                .map(PathBuf::from)
                .unwrap_or(d.corpus_path),
        }
    }

    /// Resolve the worker pool size (0 means available parallelism minus one).
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(1))
                .unwrap_or(3)
        } else {
            self.workers
        }
    }

    /// Outstanding-item threshold at which the source starts waiting.
    pub fn outstanding_limit(&self) -> usize {
        self.soft_limit + self.slack
    }

    pub fn is_throttled(&self) -> bool {
        self.wait_budget > 0
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.num_save == 0 {
            return Err(CoreError::InvalidConfig("num_save must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Bench config:");
        tracing::info!("  workers:     {} (configured {})", self.resolved_workers(), self.workers);
        tracing::info!("  channels:    capacity={}", self.channel_capacity);
        tracing::info!(
            "  throttle:    soft={}, slack={}, wait_budget={}, max_stalls={}",
            self.soft_limit, self.slack, self.wait_budget, self.max_stalls
        );
        tracing::info!(
            "  kernel:      hash_iterations={}, suffix={}",
            self.hash_iterations,
            self.hash_suffix.as_deref().unwrap_or("(none)")
        );
        tracing::info!("  table:       num_save={}, fast={}", self.num_save, self.fast);
        tracing::info!(
            "  corpora:     dictionary={}, words={}",
            self.dictionary_path.display(),
            self.corpus_path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_benchmark_constants() {
        let config = BenchConfig::default();
        assert_eq!(config.channel_capacity, 1024);
        assert_eq!(config.soft_limit, 256);
        assert_eq!(config.slack, 32);
        assert_eq!(config.outstanding_limit(), 288);
        assert_eq!(config.max_stalls, 1000);
        assert_eq!(config.num_save, 3);
        assert!(config.fast);
        assert!(!config.is_throttled());
    }

    #[test]
    fn resolved_workers() {
        let mut config = BenchConfig::default();
        assert!(config.resolved_workers() >= 1);

        config.workers = 6;
        assert_eq!(config.resolved_workers(), 6);
    }

    #[test]
    fn validate_rejects_zero_width_table() {
        let config = BenchConfig { num_save: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let config = BenchConfig { channel_capacity: 0, ..Default::default() };
        assert!(config.validate().is_err());
        assert!(BenchConfig::default().validate().is_ok());
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let config: BenchConfig = serde_json::from_str(r#"{"workers": 4, "fast": false}"#).unwrap();
        assert_eq!(config.workers, 4);
        assert!(!config.fast);
        assert_eq!(config.num_save, 3);
        assert_eq!(config.channel_capacity, 1024);
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        env::set_var("ZZTEST_SCRABBLE_NUM_SAVE", "7");
        env::set_var("SCRABBLE_SLACK", "16");
        let config = BenchConfig::for_profile("zztest");
        assert_eq!(config.num_save, 7);
        assert_eq!(config.slack, 16);
        env::remove_var("ZZTEST_SCRABBLE_NUM_SAVE");
        env::remove_var("SCRABBLE_SLACK");
    }
}
