//! Scoring kernels: pure functions from a word to an optional priority.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// Maps a word to a priority, or rejects it with `None`.
///
/// Kernels must be pure: every strategy scores the same word the same way.
pub trait ScoringKernel: Send + Sync {
    fn score(&self, word: &str) -> Option<i32>;
}

impl<F> ScoringKernel for F
where
    F: Fn(&str) -> Option<i32> + Send + Sync,
{
    fn score(&self, word: &str) -> Option<i32> {
        self(word)
    }
}

/// Points per letter, a..z.
pub const LETTER_SCORES: [i32; 26] = [
    1, 3, 3, 2, 1, 4, 2, 4, 1, 8, 5, 1, 3, 1, 1, 3, 10, 1, 1, 1, 1, 4, 4, 8, 4, 10,
];

/// Tiles available per letter, a..z.
pub const AVAILABLE_LETTERS: [i32; 26] = [
    9, 2, 2, 1, 12, 2, 3, 2, 9, 1, 1, 4, 2, 6, 8, 2, 1, 6, 4, 6, 4, 2, 2, 1, 2, 1,
];

/// Blank tiles a word may use.
const MAX_BLANKS: i32 = 2;

/// Scores dictionary words by their Scrabble value.
///
/// A word is accepted when it is in the dictionary, is made of `a..z` only,
/// and needs at most two blanks. Its priority is
/// `2 * (letter sum + best letter anywhere in the word) + 50` for seven-letter words (no bonus
/// otherwise), plus the simulated cost term from [`ScrabbleKernel::hash_cost`].
#[derive(Debug, Clone)]
pub struct ScrabbleKernel {
    dictionary: HashSet<String>,
    hash_iterations: u32,
    hash_suffix: Option<String>,
}

impl ScrabbleKernel {
    pub fn new(dictionary: HashSet<String>) -> Self {
        Self { dictionary, hash_iterations: 0, hash_suffix: None }
    }

    /// Make words ending in `suffix` cost `iterations` SHA-256 rounds.
    pub fn with_hash_cost(mut self, iterations: u32, suffix: Option<String>) -> Self {
        self.hash_iterations = iterations;
        self.hash_suffix = suffix;
        self
    }

    /// Simulated per-item cost. Each round hashes the word, adds 1 when the
    /// first digest byte (as a signed byte) is below 32, then appends `a`.
    pub fn hash_cost(&self, word: &str) -> i32 {
        let Some(suffix) = self.hash_suffix.as_deref() else {
            return 0;
        };
        if self.hash_iterations == 0 || !word.ends_with(suffix) {
            return 0;
        }

        let mut buf = word.to_string();
        let mut score = 0;
        for _ in 0..self.hash_iterations {
            let digest = Sha256::digest(buf.as_bytes());
            if (digest[0] as i8) < 32 {
                score += 1;
            }
            buf.push('a');
        }
        score
    }

    fn letter_histogram(word: &str) -> Option<[i32; 26]> {
        let mut histogram = [0i32; 26];
        for b in word.bytes() {
            if !b.is_ascii_lowercase() {
                return None;
            }
            histogram[(b - b'a') as usize] += 1;
        }
        Some(histogram)
    }
}

impl ScoringKernel for ScrabbleKernel {
    fn score(&self, word: &str) -> Option<i32> {
        if !self.dictionary.contains(word) {
            return None;
        }
        // Every dictionary word pays the simulated cost, accepted or not.
        let cost = self.hash_cost(word);
        let histogram = Self::letter_histogram(word)?;

        let blanks: i32 = histogram
            .iter()
            .zip(AVAILABLE_LETTERS)
            .map(|(&count, available)| (count - available).max(0))
            .sum();
        if blanks > MAX_BLANKS {
            return None;
        }

        let letters: i32 = histogram
            .iter()
            .zip(AVAILABLE_LETTERS)
            .zip(LETTER_SCORES)
            .map(|((&count, available), points)| points * count.min(available))
            .sum();
        let best_letter = word
            .bytes()
            .map(|b| LETTER_SCORES[(b - b'a') as usize])
            .max()
            .unwrap_or(0);
        let bonus = if word.len() == 7 { 50 } else { 0 };

        Some(2 * (letters + best_letter) + bonus + cost)
    }
}
