//! Dictionary and word-stream loading.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::error::CoreError;

/// The two input corpora, loaded once before any run.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Words accepted by the scoring kernel.
    pub dictionary: HashSet<String>,
    /// Distinct words fed to every run, in stable (sorted) order.
    pub words: Vec<String>,
}

impl Corpus {
    /// Load both corpora. Unreadable files are reported and yield empty sets.
    pub fn load(config: &BenchConfig) -> Self {
        let dictionary: HashSet<String> = load_or_warn(&config.dictionary_path).into_iter().collect();
        let words: Vec<String> = load_or_warn(&config.corpus_path).into_iter().collect();
        info!(
            dictionary = dictionary.len(),
            words = words.len(),
            "corpus loaded"
        );
        Self { dictionary, words }
    }
}

fn load_or_warn(path: &Path) -> BTreeSet<String> {
    match read_word_set(path) {
        Ok(set) => set,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read word file");
            BTreeSet::new()
        }
    }
}

/// Read a flat word file: one word per line, trimmed, lowercased, de-duplicated.
pub fn read_word_set(path: &Path) -> Result<BTreeSet<String>, CoreError> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_lowercase)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_word_set_normalizes_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Cat\n  dog \n\ncat\nDOG").unwrap();

        let set = read_word_set(file.path()).unwrap();
        let words: Vec<&str> = set.iter().map(String::as_str).collect();
        assert_eq!(words, vec!["cat", "dog"]);
    }

    #[test]
    fn load_reports_missing_files_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig {
            dictionary_path: dir.path().join("missing-dictionary.txt"),
            corpus_path: dir.path().join("missing-words.txt"),
            ..Default::default()
        };
        let corpus = Corpus::load(&config);
        assert!(corpus.dictionary.is_empty());
        assert!(corpus.words.is_empty());
    }

    #[test]
    fn load_keeps_sorted_distinct_feed_order() {
        let dir = tempfile::tempdir().unwrap();
        let dict = dir.path().join("dict.txt");
        let words = dir.path().join("words.txt");
        fs::write(&dict, "cat\ndog\n").unwrap();
        fs::write(&words, "dog\ncats\ncat\ndog\n").unwrap();

        let config = BenchConfig {
            dictionary_path: dict,
            corpus_path: words,
            ..Default::default()
        };
        let corpus = Corpus::load(&config);
        assert_eq!(corpus.words, vec!["cat", "cats", "dog"]);
        assert!(corpus.dictionary.contains("dog"));
    }
}
