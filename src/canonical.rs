//! # Canonical Product Keys
//!
//! Maps a normalized name to a stable canonical product key using the
//! lexicon's multilingual synonym table, then re-attaches the size suffix.
//! Size is part of product identity: `sucre_5kg` and `sucre_1kg` are
//! different keys.
//!
//! Matching rule, in order: the whole space-stripped base against a synonym,
//! then the first, then the last whitespace-delimited word. Never an interior
//! substring: `castel lite` must not match the fragment `te`.

use crate::lexicon::Lexicon;
use crate::normalize::{NormalizedName, Normalizer};
use std::sync::Arc;
use tracing::debug;

/// A fully resolved product identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProduct {
    /// Stable key: canonical base plus size suffix (`sucre_5kg`)
    pub key: String,
    /// Canonical base without the size suffix (`sucre`)
    pub base_key: String,
    /// The normalized name the key was derived from
    pub normalized: NormalizedName,
    /// Original name as printed on the receipt, for display
    pub display_name: String,
}

/// Resolves raw OCR names to canonical product keys.
pub struct Canonicalizer {
    lexicon: Arc<Lexicon>,
    normalizer: Normalizer,
}

impl Canonicalizer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self {
            normalizer: Normalizer::new(lexicon.clone()),
            lexicon,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Resolve a raw name into its canonical product identity.
    pub fn resolve(&self, raw: &str) -> CanonicalProduct {
        let normalized = self.normalizer.normalize_parts(raw);
        let base_key = self.canonical_base(&normalized);

        let key = match &normalized.size {
            Some(size) if !base_key.is_empty() => format!("{}_{}", base_key, size),
            Some(size) => size.clone(),
            None => base_key.clone(),
        };

        debug!(raw = %raw, key = %key, "Resolved canonical key");

        CanonicalProduct {
            key,
            base_key,
            normalized,
            display_name: raw.trim().to_string(),
        }
    }

    /// Convenience wrapper returning only the key.
    pub fn canonical_key(&self, raw: &str) -> String {
        self.resolve(raw).key
    }

    /// Synonym resolution with the word-boundary rule: whole string first,
    /// then first word, then last word. Unknown products keep their
    /// space-stripped normalized base, so they still get a stable key.
    fn canonical_base(&self, normalized: &NormalizedName) -> String {
        let spaceless = normalized.spaceless_base();
        if spaceless.is_empty() {
            return spaceless;
        }

        if let Some(root) = self.lexicon.canonical_root(&spaceless) {
            return root.to_string();
        }

        let words: Vec<&str> = normalized.base.split_whitespace().collect();
        if let Some(first) = words.first() {
            if let Some(root) = self.lexicon.canonical_root(first) {
                return root.to_string();
            }
        }
        if words.len() > 1 {
            if let Some(last) = words.last() {
                if let Some(root) = self.lexicon.canonical_root(last) {
                    return root.to_string();
                }
            }
        }

        spaceless
    }
}
