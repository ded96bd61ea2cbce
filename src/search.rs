//! # Community Relevance Search
//!
//! Scores and ranks community ledger entries against a free-text query.
//! Relevance signals gate first: an entry with zero matching signal is
//! excluded entirely, and popularity or recency never promote an otherwise
//! irrelevant item. Entries that pass the gate receive popularity, recency
//! and distinct-user trust boosts, then results are sorted and paginated.
//!
//! Search is read-only and failure-tolerant: a storage or ranking problem
//! degrades to an empty response with a log line, never an error to the
//! caller.

use crate::config::SearchConfig;
use crate::errors::error_logging::log_search_error;
use crate::lexicon::Lexicon;
use crate::models::{CommunityAggregate, RankedItem, SearchResponse};
use crate::normalize::Normalizer;
use crate::store::{DocumentStore, COMMUNITY_COLLECTION};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Community search engine over the abstract document store.
pub struct SearchEngine {
    store: Arc<dyn DocumentStore>,
    normalizer: Normalizer,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn DocumentStore>, lexicon: Arc<Lexicon>, config: SearchConfig) -> Self {
        Self {
            store,
            normalizer: Normalizer::new(lexicon),
            config,
        }
    }

    /// Rank a city's community entries against `query`.
    ///
    /// `page` is 1-based; a `page_size` of 0 selects the configured default.
    /// Queries shorter than the configured minimum return an empty response
    /// without scanning.
    pub async fn search(
        &self,
        city: &str,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> SearchResponse {
        let query = query.trim();
        if query.chars().count() < self.config.min_query_chars {
            debug!(query = %query, "Query below minimum length, returning empty result");
            return SearchResponse::default();
        }

        let page = page.max(1);
        let page_size = match page_size {
            0 => self.config.default_page_size,
            n => n.min(self.config.max_page_size),
        };

        let normalized_query = self.normalizer.normalize_parts(query);
        let query_spaceless = normalized_query.spaceless_base();
        if query_spaceless.is_empty() {
            return SearchResponse::default();
        }

        let prefix = format!("{}_", city.trim());
        let docs = match self.store.list_prefix(COMMUNITY_COLLECTION, &prefix).await {
            Ok(docs) => docs,
            Err(err) => {
                log_search_error(&err, city, query);
                return SearchResponse::default();
            }
        };

        let now = Utc::now();
        let mut ranked: Vec<RankedItem> = Vec::new();
        for (doc_id, value) in docs {
            let entry: CommunityAggregate = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(doc_id = %doc_id, error = %err, "Skipping malformed community entry");
                    continue;
                }
            };

            let relevance =
                relevance_score(&entry, &normalized_query.base, &query_spaceless, &self.config);
            if relevance <= 0.0 {
                continue;
            }

            let mut score = relevance;
            score += (1.0 + entry.stats.total_purchases as f64).ln() * 2.0;
            score += (1.0 + entry.user_count as f64).ln() * 1.5;
            if let Some(last) = entry.stats.last_purchase {
                let days = ((now - last).num_seconds() as f64 / 86_400.0).max(0.0);
                let freshness = 1.0 - days / self.config.recency_window_days;
                score += self.config.recency_boost_max * freshness.clamp(0.0, 1.0);
            }

            ranked.push(RankedItem {
                canonical_key: entry.canonical_key,
                display_name: entry.display_name,
                category: entry.category,
                score,
                min_price: entry.stats.min_price,
                max_price: entry.stats.max_price,
                avg_price: entry.stats.avg_price,
                primary_currency: entry.stats.primary_currency,
                total_purchases: entry.stats.total_purchases,
                user_count: entry.user_count,
                last_purchase: entry.stats.last_purchase,
            });
        }

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.canonical_key.cmp(&b.canonical_key))
        });

        let total = ranked.len();
        let start = (page - 1) * page_size;
        let items: Vec<RankedItem> = if start >= total {
            Vec::new()
        } else {
            ranked[start..(start + page_size).min(total)].to_vec()
        };
        let has_more = start + items.len() < total;

        debug!(
            city = %city,
            query = %query,
            total = total,
            returned = items.len(),
            "Search completed"
        );

        SearchResponse {
            items,
            total,
            has_more,
        }
    }
}

/// Pure relevance scoring for one community entry. Name-match tiers are
/// exclusive (exact > prefix > substring); keyword, category, fuzzy and
/// word-overlap signals are additive.
pub fn relevance_score(
    entry: &CommunityAggregate,
    query_base: &str,
    query_spaceless: &str,
    config: &SearchConfig,
) -> f64 {
    let name_spaceless: String = entry
        .normalized_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if name_spaceless.is_empty() {
        return 0.0;
    }

    let mut score = if name_spaceless == query_spaceless {
        100.0
    } else if name_spaceless.starts_with(query_spaceless) {
        50.0
    } else if name_spaceless.contains(query_spaceless) {
        25.0
    } else {
        0.0
    };

    if entry
        .search_keywords
        .iter()
        .any(|k| k == query_spaceless || k.starts_with(query_spaceless))
    {
        score += 30.0;
    }

    if let Some(category) = &entry.category {
        if category.eq_ignore_ascii_case(query_spaceless) {
            score += 15.0;
        }
    }

    if name_spaceless.chars().count() >= config.fuzzy_min_chars
        && query_spaceless.chars().count() >= config.fuzzy_min_chars
    {
        let similarity = strsim::normalized_levenshtein(&name_spaceless, query_spaceless);
        if similarity > config.fuzzy_similarity_floor {
            score += similarity * 20.0;
        }
    }

    let name_words: Vec<&str> = entry.normalized_name.split_whitespace().collect();
    for word in query_base.split_whitespace() {
        if name_words.contains(&word) {
            score += 10.0;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceStats;

    fn entry(name: &str, keywords: &[&str], category: Option<&str>) -> CommunityAggregate {
        CommunityAggregate {
            city: "kinshasa".to_string(),
            canonical_key: name.replace(' ', ""),
            display_name: name.to_string(),
            normalized_name: name.to_string(),
            category: category.map(|c| c.to_string()),
            search_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            observations: Vec::new(),
            user_ids: Vec::new(),
            user_count: 0,
            stats: PriceStats::default(),
            price_volatility: 0.0,
            price_change_percent: 0.0,
            store_breakdown: Vec::new(),
            popularity_score: 0.0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_match_tiers_are_exclusive() {
        let config = SearchConfig::default();
        let exact = relevance_score(&entry("riz", &[], None), "riz", "riz", &config);
        let prefix = relevance_score(&entry("riz basmati", &[], None), "riz", "riz", &config);
        let none = relevance_score(&entry("farine", &[], None), "riz", "riz", &config);

        assert!(exact >= 100.0);
        assert!((50.0..100.0).contains(&prefix) || prefix >= 50.0);
        assert_eq!(none, 0.0);
        assert!(exact > prefix);
    }

    #[test]
    fn test_prefix_outranks_interior_substring() {
        let config = SearchConfig::default();
        let prefix = relevance_score(&entry("riz basmati", &[], None), "riz", "riz", &config);
        let interior = relevance_score(&entry("marizelle", &[], None), "riz", "riz", &config);
        assert!(prefix > interior);
        assert!(interior >= 25.0);
    }

    #[test]
    fn test_keyword_and_category_signals() {
        let config = SearchConfig::default();
        let with_keyword =
            relevance_score(&entry("farine", &["staples"], None), "staples", "staples", &config);
        assert!(with_keyword >= 30.0);

        let with_category = relevance_score(
            &entry("farine", &[], Some("staples")),
            "staples",
            "staples",
            &config,
        );
        assert!(with_category >= 15.0);
    }

    #[test]
    fn test_zero_signal_is_excluded_regardless_of_popularity() {
        let config = SearchConfig::default();
        let mut popular = entry("farine", &[], None);
        popular.stats.total_purchases = 100_000;
        popular.user_count = 5_000;
        assert_eq!(relevance_score(&popular, "riz", "riz", &config), 0.0);
    }

    #[test]
    fn test_fuzzy_similarity_gated_by_length_and_floor() {
        let config = SearchConfig::default();
        // "rizz" vs "riz" - both must be >= 4 chars, so no fuzzy signal, but
        // the prefix tier still fires on "riz" being a prefix of "rizz".
        let short = relevance_score(&entry("riz", &[], None), "rizz", "rizz", &config);
        assert_eq!(short, 0.0);

        // "farime" vs "farine": similarity ~0.83 adds a fuzzy bonus.
        let fuzzy = relevance_score(&entry("farine", &[], None), "farime", "farime", &config);
        assert!(fuzzy > 15.0);
    }
}
