//! # Category and Keyword Detection
//!
//! Data-driven category and search-keyword derivation for community ledger
//! entries, plus the administrative backfill that re-runs the same detector
//! over a city's existing entries.
//!
//! The heuristics live entirely in the lexicon's tables; this module is only
//! the generic lookup and expansion machinery.

use crate::config::AggregationConfig;
use crate::errors::AppResult;
use crate::lexicon::Lexicon;
use crate::models::CommunityAggregate;
use crate::store::{DocumentStore, WriteOp, COMMUNITY_COLLECTION};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Detect the category of a product from its normalized base name. The first
/// rule with a matching keyword wins; rules match whole words only.
pub fn detect_category(lexicon: &Lexicon, normalized_base: &str) -> Option<String> {
    let spaceless: String = normalized_base
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let tokens: Vec<&str> = normalized_base.split_whitespace().collect();

    for rule in lexicon.category_rules() {
        for keyword in &rule.keywords {
            if spaceless == *keyword || tokens.iter().any(|t| *t == keyword.as_str()) {
                return Some(rule.category.clone());
            }
        }
    }
    None
}

/// Build the search keyword list for a community entry: base tokens, the
/// space-stripped base, the canonical root with its synonym variants, and
/// the category. Order-preserving, deduplicated, lowercase.
pub fn build_search_keywords(
    lexicon: &Lexicon,
    normalized_base: &str,
    base_key: &str,
    category: Option<&str>,
) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut push = |keyword: &str| {
        let keyword = keyword.trim().to_lowercase();
        if keyword.chars().count() >= 2 && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    };

    for token in normalized_base.split_whitespace() {
        push(token);
    }
    let spaceless: String = normalized_base
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    push(&spaceless);
    push(base_key);
    for variant in lexicon.synonym_variants(base_key) {
        push(variant);
    }
    if let Some(category) = category {
        push(category);
    }

    keywords
}

/// Administrative backfill: recompute `category` and `search_keywords` for a
/// city's community entries with the same detector used at write time.
///
/// Entries that already carry both are skipped unless `force` is set.
/// Updates are committed in bounded batch chunks; returns the number of
/// updated entries.
pub async fn backfill_city(
    store: &dyn DocumentStore,
    lexicon: &Lexicon,
    config: &AggregationConfig,
    city: &str,
    force: bool,
) -> AppResult<usize> {
    let prefix = format!("{}_", city);
    let docs = store.list_prefix(COMMUNITY_COLLECTION, &prefix).await?;
    info!(city = %city, entries = docs.len(), force = force, "Starting category backfill");

    let mut pending: Vec<WriteOp> = Vec::new();
    let mut updated = 0usize;

    for (doc_id, value) in docs {
        let mut entry: CommunityAggregate = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(doc_id = %doc_id, error = %err, "Skipping malformed community entry");
                continue;
            }
        };

        if !force && entry.category.is_some() && !entry.search_keywords.is_empty() {
            continue;
        }

        let base_key = entry
            .canonical_key
            .split('_')
            .next()
            .unwrap_or(entry.canonical_key.as_str());
        let category = detect_category(lexicon, &entry.normalized_name)
            .or_else(|| detect_category(lexicon, base_key));
        let keywords =
            build_search_keywords(lexicon, &entry.normalized_name, base_key, category.as_deref());

        if !force && entry.category == category && entry.search_keywords == keywords {
            continue;
        }

        debug!(doc_id = %doc_id, category = ?category, "Backfilling community entry");
        entry.category = category;
        entry.search_keywords = keywords;
        entry.updated_at = Utc::now();

        pending.push(WriteOp::put(
            COMMUNITY_COLLECTION,
            &doc_id,
            serde_json::to_value(&entry)?,
        ));
        updated += 1;

        if pending.len() >= config.backfill_chunk_size {
            store.commit_batch(std::mem::take(&mut pending)).await?;
        }
    }

    if !pending.is_empty() {
        store.commit_batch(pending).await?;
    }

    info!(city = %city, updated = updated, "Category backfill finished");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceStats;
    use crate::store::MemoryStore;

    fn bare_entry(city: &str, key: &str, normalized: &str) -> CommunityAggregate {
        CommunityAggregate {
            city: city.to_string(),
            canonical_key: key.to_string(),
            display_name: normalized.to_string(),
            normalized_name: normalized.to_string(),
            category: None,
            search_keywords: Vec::new(),
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

    async fn put_entry(store: &MemoryStore, entry: &CommunityAggregate) {
        let id = format!("{}_{}", entry.city, entry.canonical_key);
        store
            .commit_batch(vec![WriteOp::put(
                COMMUNITY_COLLECTION,
                &id,
                serde_json::to_value(entry).unwrap(),
            )])
            .await
            .unwrap();
    }

    async fn read_entry(store: &MemoryStore, id: &str) -> CommunityAggregate {
        let value = store.get(COMMUNITY_COLLECTION, id).await.unwrap().unwrap();
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_backfill_fills_missing_categories_and_keywords() {
        let store = MemoryStore::new();
        let lexicon = Lexicon::shared();

        put_entry(&store, &bare_entry("kinshasa", "lait", "lait")).await;
        put_entry(&store, &bare_entry("kinshasa", "creneglace_1l", "crene glace")).await;
        put_entry(&store, &bare_entry("goma", "riz", "riz")).await;

        let updated = backfill_city(
            &store,
            &lexicon,
            &AggregationConfig::default(),
            "kinshasa",
            false,
        )
        .await
        .unwrap();
        assert_eq!(updated, 2);

        let lait = read_entry(&store, "kinshasa_lait").await;
        assert_eq!(lait.category.as_deref(), Some("dairy"));
        assert!(lait.search_keywords.contains(&"milk".to_string()));

        // Other cities are untouched
        let goma = read_entry(&store, "goma_riz").await;
        assert!(goma.category.is_none());
    }

    #[tokio::test]
    async fn test_backfill_skips_complete_entries_unless_forced() {
        let store = MemoryStore::new();
        let lexicon = Lexicon::shared();

        let mut entry = bare_entry("kinshasa", "lait", "lait");
        entry.category = Some("handmade".to_string());
        entry.search_keywords = vec!["handmade".to_string()];
        put_entry(&store, &entry).await;

        let updated = backfill_city(
            &store,
            &lexicon,
            &AggregationConfig::default(),
            "kinshasa",
            false,
        )
        .await
        .unwrap();
        assert_eq!(updated, 0);
        assert_eq!(
            read_entry(&store, "kinshasa_lait").await.category.as_deref(),
            Some("handmade")
        );

        let updated = backfill_city(
            &store,
            &lexicon,
            &AggregationConfig::default(),
            "kinshasa",
            true,
        )
        .await
        .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(
            read_entry(&store, "kinshasa_lait").await.category.as_deref(),
            Some("dairy")
        );
    }

    #[test]
    fn test_detect_category_whole_words_only() {
        let lexicon = Lexicon::shared();
        assert_eq!(detect_category(&lexicon, "lait"), Some("dairy".to_string()));
        assert_eq!(
            detect_category(&lexicon, "riz basmati"),
            Some("staples".to_string())
        );
        // "rizotto" contains "riz" as a substring but is not the word "riz"
        assert_eq!(detect_category(&lexicon, "rizotto"), None);
        assert_eq!(detect_category(&lexicon, "chose inconnue"), None);
    }

    #[test]
    fn test_build_search_keywords_expands_synonyms() {
        let lexicon = Lexicon::shared();
        let keywords = build_search_keywords(&lexicon, "lait", "lait", Some("dairy"));
        assert!(keywords.contains(&"lait".to_string()));
        assert!(keywords.contains(&"milk".to_string()));
        assert!(keywords.contains(&"maziwa".to_string()));
        assert!(keywords.contains(&"dairy".to_string()));
        // no duplicates
        let mut deduped = keywords.clone();
        deduped.dedup();
        assert_eq!(keywords.len(), deduped.len());
    }

    #[test]
    fn test_build_search_keywords_unknown_product() {
        let lexicon = Lexicon::shared();
        let keywords =
            build_search_keywords(&lexicon, "crene glace caramel", "creneglacecaramel", None);
        assert!(keywords.contains(&"crene".to_string()));
        assert!(keywords.contains(&"glace".to_string()));
        assert!(keywords.contains(&"caramel".to_string()));
        assert!(keywords.contains(&"creneglacecaramel".to_string()));
    }
}
