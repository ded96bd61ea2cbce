//! # Receipt-Level Merge Resolution
//!
//! Reconciles a single receipt's raw item list before aggregation:
//!
//! 1. **Multi-line merge**: a size/quantity-only line (`"1lt(lb)"`,
//!    `"18.9 L Recharge"`) whose price is absent, zero, or within ~10% of the
//!    preceding item's price is a continuation of that item, not a product.
//! 2. **Duplicate merge**: items with near-equal unit price and similar
//!    normalized names are collapsed into one; the longer name is kept for
//!    display.
//!
//! Multi-image receipts are merged page-wise: pages carrying an explicit
//! store name must agree on it, and near-duplicate items across pages are
//! reconciled before quantities and totals are summed. Duplicate-*page*
//! detection is an image-similarity concern handled upstream; this resolver
//! only ever sees pre-screened pages.

use crate::config::AggregationConfig;
use crate::errors::{AppError, AppResult};
use crate::lexicon::Lexicon;
use crate::models::{RawItem, ReceiptPage};
use crate::normalize::Normalizer;
use std::sync::Arc;
use tracing::debug;

/// Resolves continuations, duplicates and multi-page overlap in raw item
/// lists.
pub struct MergeResolver {
    lexicon: Arc<Lexicon>,
    normalizer: Normalizer,
    config: AggregationConfig,
}

impl MergeResolver {
    pub fn new(lexicon: Arc<Lexicon>, config: AggregationConfig) -> Self {
        Self {
            normalizer: Normalizer::new(lexicon.clone()),
            lexicon,
            config,
        }
    }

    /// Run both passes over a single page's item list.
    pub fn resolve_items(&self, items: &[RawItem]) -> Vec<RawItem> {
        let merged = self.merge_continuation_lines(items);
        self.merge_duplicates(merged)
    }

    /// Merge a multi-image receipt into one logical item list.
    ///
    /// Pages that carry an explicit, non-"unknown" store name must agree on
    /// it; a disagreement means the images belong to different receipts.
    pub fn merge_pages(
        &self,
        pages: &[ReceiptPage],
    ) -> AppResult<(Option<String>, Vec<RawItem>)> {
        let mut store_name: Option<String> = None;
        for page in pages {
            let name = match &page.store_name {
                Some(name) if !name.trim().is_empty() && !self.lexicon.is_unknown_sentinel(name) => {
                    name.trim().to_string()
                }
                _ => continue,
            };
            match &store_name {
                Some(agreed) if !agreed.eq_ignore_ascii_case(&name) => {
                    return Err(AppError::Validation(format!(
                        "pages disagree on store name ('{}' vs '{}'): multiple receipts",
                        agreed, name
                    )));
                }
                Some(_) => {}
                None => store_name = Some(name),
            }
        }

        // Continuation lines only make sense within one page; resolve them
        // per page, then reconcile near-duplicates across pages.
        let mut combined: Vec<RawItem> = Vec::new();
        for page in pages {
            let resolved = self.merge_continuation_lines(&page.items);
            'item: for item in resolved {
                for existing in combined.iter_mut() {
                    if self.names_similar(
                        &existing.name,
                        &item.name,
                        self.config.cross_page_name_overlap,
                    ) {
                        debug!(
                            kept = %existing.name,
                            merged = %item.name,
                            "Cross-page item reconciled"
                        );
                        absorb_duplicate(existing, &item, true);
                        continue 'item;
                    }
                }
                combined.push(item);
            }
        }

        Ok((store_name, self.merge_duplicates(combined)))
    }

    /// Pass 1: fold size-only continuation lines into the preceding item.
    fn merge_continuation_lines(&self, items: &[RawItem]) -> Vec<RawItem> {
        let mut out: Vec<RawItem> = Vec::new();

        for item in items {
            if let Some(prev) = out.last_mut() {
                if self.is_continuation_name(&item.name)
                    && continuation_price_compatible(
                        prev.unit_price,
                        item.unit_price,
                        self.config.continuation_price_tolerance,
                    )
                {
                    debug!(
                        prev = %prev.name,
                        continuation = %item.name,
                        "Merging size-only continuation line"
                    );
                    prev.name = format!("{} {}", prev.name.trim(), item.name.trim());
                    if prev.unit_price <= 0.0 && item.unit_price > 0.0 {
                        prev.unit_price = item.unit_price;
                    }
                    if prev.total_price.unwrap_or(0.0) <= 0.0 && item.total_price.is_some() {
                        prev.total_price = item.total_price;
                    }
                    continue;
                }
            }
            out.push(item.clone());
        }

        out
    }

    /// Pass 2: collapse near-identical lines into one item.
    fn merge_duplicates(&self, items: Vec<RawItem>) -> Vec<RawItem> {
        let mut out: Vec<RawItem> = Vec::new();

        'item: for item in items {
            for existing in out.iter_mut() {
                if unit_prices_close(
                    existing.unit_price,
                    item.unit_price,
                    self.config.duplicate_price_tolerance,
                ) && self.names_similar(
                    &existing.name,
                    &item.name,
                    self.config.duplicate_name_overlap,
                ) {
                    debug!(kept = %existing.name, merged = %item.name, "Merging duplicate line");
                    absorb_duplicate(existing, &item, false);
                    continue 'item;
                }
            }
            out.push(item);
        }

        out
    }

    /// A continuation line carries a size token and nothing else of
    /// substance: once sizes are stripped, at most a couple of letters or a
    /// known continuation word ("Recharge") remain.
    pub fn is_continuation_name(&self, name: &str) -> bool {
        let (_, token) = self.normalizer.size_extractor().extract(name);
        if token.is_none() {
            return false;
        }

        let residue = self.normalizer.size_extractor().strip_all(name);
        let folded: String = residue
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        let stray_letters: usize = folded
            .split_whitespace()
            .filter(|token| !self.lexicon.is_continuation_word(token))
            .map(|token| token.chars().filter(|c| c.is_alphabetic()).count())
            .sum();

        stray_letters < 3
    }

    /// Similarity rule shared by duplicate and cross-page merging: substring
    /// relationship, or ordered-character overlap at or above `threshold`,
    /// both computed after case/diacritics folding with all separators
    /// removed. Size tokens stay in place, so different sizes never merge.
    fn names_similar(&self, a: &str, b: &str, threshold: f64) -> bool {
        let norm_a = similarity_form(a);
        let norm_b = similarity_form(b);
        if norm_a.is_empty() || norm_b.is_empty() {
            return false;
        }
        if norm_a == norm_b || norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
            return true;
        }
        ordered_overlap(&norm_a, &norm_b) >= threshold
    }
}

/// Lowercased, diacritics-folded name with every separator removed.
fn similarity_form(name: &str) -> String {
    use unicode_normalization::char::is_combining_mark;
    use unicode_normalization::UnicodeNormalization;

    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn continuation_price_compatible(prev: f64, continuation: f64, tolerance: f64) -> bool {
    if continuation <= 0.0 || prev <= 0.0 {
        return true;
    }
    (continuation - prev).abs() / prev <= tolerance
}

fn unit_prices_close(a: f64, b: f64, tolerance: f64) -> bool {
    if a <= 0.0 && b <= 0.0 {
        return true;
    }
    if a <= 0.0 || b <= 0.0 {
        return false;
    }
    (a - b).abs() / a.max(b) <= tolerance
}

/// Merge `incoming` into `kept`: longer display name wins, quantities and
/// totals are summed (cross-page reconciliation always sums; same-page
/// duplicate merging sums only when both sides carry a quantity).
fn absorb_duplicate(kept: &mut RawItem, incoming: &RawItem, always_sum: bool) {
    if incoming.name.trim().len() > kept.name.trim().len() {
        kept.name = incoming.name.clone();
    }
    if kept.unit_price <= 0.0 && incoming.unit_price > 0.0 {
        kept.unit_price = incoming.unit_price;
    }
    match (kept.quantity, incoming.quantity) {
        (Some(a), Some(b)) => kept.quantity = Some(a + b),
        (None, Some(b)) if always_sum => kept.quantity = Some(1.0 + b),
        (Some(a), None) if always_sum => kept.quantity = Some(a + 1.0),
        _ => {}
    }
    match (kept.total_price, incoming.total_price) {
        (Some(a), Some(b)) => kept.total_price = Some(a + b),
        (None, Some(b)) => kept.total_price = Some(b),
        _ => {}
    }
}

/// Ordered-character overlap: longest common subsequence length over the
/// longer string's length.
pub fn ordered_overlap(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (la, lb) = (a_chars.len(), b_chars.len());
    if la == 0 || lb == 0 {
        return 0.0;
    }

    let mut matrix = vec![vec![0usize; lb + 1]; la + 1];
    for i in 1..=la {
        for j in 1..=lb {
            matrix[i][j] = if a_chars[i - 1] == b_chars[j - 1] {
                matrix[i - 1][j - 1] + 1
            } else {
                matrix[i - 1][j].max(matrix[i][j - 1])
            };
        }
    }

    matrix[la][lb] as f64 / la.max(lb) as f64
}
