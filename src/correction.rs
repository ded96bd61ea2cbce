//! # OCR-Aware Word Correction
//!
//! Word-level correction for tokens that survived normalization but are not
//! in the product/brand dictionary. Strategies, in order of specificity:
//!
//! - Direct lookup of known OCR misreadings (`m1lk` → `milk`)
//! - Single, then double character substitutions drawn from the OCR
//!   letter-confusion map, accepting the first candidate found in the
//!   dictionary
//! - Levenshtein matching against the dictionary, where a substitution of a
//!   known confusion pair costs half as much, biasing fuzzy matching toward
//!   OCR-plausible corrections over generic spelling similarity

use crate::lexicon::Lexicon;
use std::sync::Arc;
use tracing::trace;

/// Configuration for word-level OCR correction
#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    /// Whether to enable dictionary fuzzy matching
    pub enable_fuzzy_matching: bool,
    /// Maximum raw edit distance for fuzzy matching
    pub max_edit_distance: usize,
    /// Maximum confusion-weighted distance for accepting a fuzzy match
    pub max_effective_distance: f64,
    /// Words shorter than this are never fuzzy-corrected
    pub fuzzy_min_chars: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enable_fuzzy_matching: true,
            max_edit_distance: 2,
            max_effective_distance: 1.5,
            fuzzy_min_chars: 4,
        }
    }
}

/// Word-level corrector backed by the lexicon's tables.
pub struct WordCorrector {
    lexicon: Arc<Lexicon>,
    config: CorrectionConfig,
}

impl WordCorrector {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self::with_config(lexicon, CorrectionConfig::default())
    }

    pub fn with_config(lexicon: Arc<Lexicon>, config: CorrectionConfig) -> Self {
        Self { lexicon, config }
    }

    /// Correct a single lowercased token. Returns `None` when the token is
    /// already a dictionary word or no plausible correction exists.
    pub fn correct(&self, word: &str) -> Option<String> {
        if word.is_empty() || self.lexicon.is_known_word(word) {
            return None;
        }

        if let Some(fix) = self.lexicon.word_misread(word) {
            trace!(word = %word, fix = %fix, "Direct misread correction");
            return Some(fix.to_string());
        }

        if let Some(fix) = self.confusion_substitution(word) {
            trace!(word = %word, fix = %fix, "Confusion-substitution correction");
            return Some(fix);
        }

        if self.config.enable_fuzzy_matching {
            if let Some(fix) = self.fuzzy_lookup(word) {
                trace!(word = %word, fix = %fix, "Fuzzy dictionary correction");
                return Some(fix);
            }
        }

        None
    }

    /// Try rejoining a split word fragment pair (`"s" + "prite"`), accepting
    /// the join only when the concatenation is a dictionary word and the pair
    /// is not two legitimate words on its own.
    pub fn rejoin_pair(&self, left: &str, right: &str) -> Option<String> {
        if self.lexicon.is_known_word(left) && self.lexicon.is_known_word(right) {
            return None;
        }
        let joined = format!("{}{}", left, right);
        if self.lexicon.is_known_word(&joined) {
            trace!(left = %left, right = %right, "Rejoined word fragments");
            Some(joined)
        } else {
            None
        }
    }

    /// Single, then double confusion-map substitutions. The first candidate
    /// landing in the dictionary wins; positions are scanned left to right so
    /// the result is deterministic.
    fn confusion_substitution(&self, word: &str) -> Option<String> {
        let chars: Vec<char> = word.chars().collect();

        for (i, &c) in chars.iter().enumerate() {
            for alt in self.lexicon.confusion_candidates(c) {
                let mut candidate = chars.clone();
                candidate[i] = alt;
                let candidate: String = candidate.into_iter().collect();
                if self.lexicon.is_known_word(&candidate) {
                    return Some(candidate);
                }
            }
        }

        // Double substitutions only for short words; the search space grows
        // quadratically and long words are better served by fuzzy matching.
        if chars.len() > 10 {
            return None;
        }
        for i in 0..chars.len() {
            for alt_i in self.lexicon.confusion_candidates(chars[i]) {
                for j in (i + 1)..chars.len() {
                    for alt_j in self.lexicon.confusion_candidates(chars[j]) {
                        let mut candidate = chars.clone();
                        candidate[i] = alt_i;
                        candidate[j] = alt_j;
                        let candidate: String = candidate.into_iter().collect();
                        if self.lexicon.is_known_word(&candidate) {
                            return Some(candidate);
                        }
                    }
                }
            }
        }

        None
    }

    /// Confusion-weighted Levenshtein scan over the dictionary.
    fn fuzzy_lookup(&self, word: &str) -> Option<String> {
        let word_len = word.chars().count();
        if word_len < self.config.fuzzy_min_chars {
            return None;
        }

        let mut best: Option<(f64, &str)> = None;
        for candidate in self.lexicon.dictionary_words() {
            let cand_len = candidate.chars().count();
            if cand_len.abs_diff(word_len) > self.config.max_edit_distance {
                continue;
            }
            if strsim::levenshtein(word, candidate) > self.config.max_edit_distance {
                continue;
            }
            let effective = self.weighted_levenshtein(word, candidate);
            if effective <= 0.0 || effective > self.config.max_effective_distance {
                continue;
            }
            // Strictly-less keeps the alphabetically first candidate on ties
            // (dictionary_words is sorted).
            if best.map(|(d, _)| effective < d).unwrap_or(true) {
                best = Some((effective, candidate));
            }
        }

        best.map(|(_, candidate)| candidate.to_string())
    }

    /// Levenshtein distance where substituting a known OCR confusion pair
    /// costs 0.5 instead of 1.0. Insertions and deletions always cost 1.0.
    fn weighted_levenshtein(&self, s1: &str, s2: &str) -> f64 {
        let s1_chars: Vec<char> = s1.chars().collect();
        let s2_chars: Vec<char> = s2.chars().collect();

        let len1 = s1_chars.len();
        let len2 = s2_chars.len();

        let mut matrix = vec![vec![0.0f64; len2 + 1]; len1 + 1];

        #[allow(clippy::needless_range_loop)]
        for i in 0..=len1 {
            matrix[i][0] = i as f64;
        }
        for j in 0..=len2 {
            matrix[0][j] = j as f64;
        }

        for i in 1..=len1 {
            for j in 1..=len2 {
                let a = s1_chars[i - 1];
                let b = s2_chars[j - 1];
                let cost = if a == b {
                    0.0
                } else if self.lexicon.confusable(a, b) {
                    0.5
                } else {
                    1.0
                };

                matrix[i][j] = (matrix[i - 1][j] + 1.0)
                    .min(matrix[i][j - 1] + 1.0)
                    .min(matrix[i - 1][j - 1] + cost);
            }
        }

        matrix[len1][len2]
    }
}
