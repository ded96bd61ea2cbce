//! # Dual-Ledger Aggregation Engine
//!
//! For every valid receipt item, updates a personal ledger entry
//! (`{user_id}_{canonical_key}`) and, when the user has a city, a community
//! ledger entry (`{city}_{canonical_key}`).
//!
//! Update protocol: per-document transactional read-modify-write with
//! optimistic version checking, retried on conflict with jittered backoff.
//! Two receipts updating the same key concurrently both land; neither batch
//! can overwrite the other's observations.
//!
//! Statistics (`min/max/avg/store_count/primary_currency`) are always fully
//! recomputed from the retained observation list, never incrementally
//! adjusted. `total_purchases` is the one lifetime counter: the retained
//! list is capped, so it is adjusted by the observations added or removed.
//!
//! The community ledger is append-mostly: receipt deletion touches only the
//! personal ledger, and community entries survive the deletion of any
//! contributing user's personal data.

use crate::canonical::{CanonicalProduct, Canonicalizer};
use crate::categories::{build_search_keywords, detect_category};
use crate::config::AggregationConfig;
use crate::errors::error_logging::{log_aggregation_error, log_item_skipped};
use crate::errors::{AppError, AppResult};
use crate::lexicon::Lexicon;
use crate::merge::MergeResolver;
use crate::models::{
    CommunityAggregate, PersonalAggregate, PriceObservation, PriceStats, RawItem, Receipt,
    ReceiptIndex, StoreBreakdown, UserContext,
};
use crate::store::{
    DocumentStore, Version, WriteOp, COMMUNITY_COLLECTION, PERSONAL_COLLECTION,
    RECEIPT_INDEX_COLLECTION,
};
use crate::validity::check_product;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of processing one receipt.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProcessSummary {
    pub receipt_id: String,
    pub items_seen: usize,
    pub items_aggregated: usize,
    pub items_skipped: usize,
    pub personal_keys: Vec<String>,
    pub community_keys: Vec<String>,
}

/// Outcome of deleting one receipt's observations.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeleteSummary {
    pub receipt_id: String,
    pub entries_updated: usize,
    pub entries_removed: usize,
}

/// One canonical key's share of a receipt.
struct KeyGroup {
    product: CanonicalProduct,
    observations: Vec<PriceObservation>,
}

/// Dual-ledger aggregation engine over an abstract document store.
pub struct AggregationEngine {
    store: Arc<dyn DocumentStore>,
    lexicon: Arc<Lexicon>,
    canonicalizer: Canonicalizer,
    merge: MergeResolver,
    config: AggregationConfig,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn DocumentStore>, lexicon: Arc<Lexicon>, config: AggregationConfig) -> Self {
        Self {
            canonicalizer: Canonicalizer::new(lexicon.clone()),
            merge: MergeResolver::new(lexicon.clone(), config.clone()),
            store,
            lexicon,
            config,
        }
    }

    pub fn merge_resolver(&self) -> &MergeResolver {
        &self.merge
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Receipt-write event entry point: aggregation failures are logged and
    /// swallowed so the receipt-write path never observes them.
    pub async fn on_receipt_written(&self, receipt: &Receipt, user: &UserContext) {
        if let Err(err) = self.process_receipt(receipt, user).await {
            log_aggregation_error(&err, "process_receipt", &user.user_id, &receipt.receipt_id);
        }
    }

    /// Receipt-delete event entry point, same swallowing contract.
    pub async fn on_receipt_deleted(&self, user_id: &str, receipt_id: &str) {
        if let Err(err) = self.delete_receipt(user_id, receipt_id).await {
            log_aggregation_error(&err, "delete_receipt", user_id, receipt_id);
        }
    }

    /// Process one receipt (create or update) into both ledgers.
    ///
    /// Re-processing is idempotent: each key update first strips the
    /// receipt's previous observations, so process-twice equals
    /// process-once-with-final-content.
    pub async fn process_receipt(
        &self,
        receipt: &Receipt,
        user: &UserContext,
    ) -> AppResult<ProcessSummary> {
        let items = self.merge.resolve_items(&receipt.items);
        let currency = self.lexicon.fold_currency(&receipt.currency);
        let store_name = receipt.store_name.trim().to_string();

        let mut groups: BTreeMap<String, KeyGroup> = BTreeMap::new();
        let mut skipped = 0usize;

        for item in &items {
            match self.prepare_item(item, receipt, &currency, &store_name) {
                Ok((product, observation)) => {
                    let entry = groups.entry(product.key.clone()).or_insert_with(|| KeyGroup {
                        product: product.clone(),
                        observations: Vec::new(),
                    });
                    if product.display_name.len() > entry.product.display_name.len() {
                        entry.product = product;
                    }
                    entry.observations.push(observation);
                }
                Err(reason) => {
                    log_item_skipped(&reason, &item.name, &receipt.receipt_id);
                    skipped += 1;
                }
            }
        }

        // Keys this receipt touched before but no longer does (edit path):
        // strip their observations first.
        let index_id = format!("{}_{}", user.user_id, receipt.receipt_id);
        let previous_keys = self.read_index_keys(&index_id).await?;
        for stale_key in previous_keys
            .iter()
            .filter(|key| !groups.contains_key(key.as_str()))
        {
            self.strip_personal_observations(&user.user_id, stale_key, &receipt.receipt_id)
                .await?;
        }

        let mut personal_keys = Vec::new();
        let mut community_keys = Vec::new();
        let mut aggregated = 0usize;

        for (key, group) in &groups {
            self.update_personal(user, key, group, &receipt.receipt_id)
                .await?;
            personal_keys.push(key.clone());
            aggregated += group.observations.len();

            if let Some(city) = user.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                let gated: Vec<PriceObservation> = group
                    .observations
                    .iter()
                    .filter(|obs| self.community_gate(obs))
                    .cloned()
                    .collect();
                if gated.is_empty() {
                    debug!(key = %key, "No observation passed the community gate");
                    continue;
                }
                self.update_community(city, user, key, group, gated, &receipt.receipt_id)
                    .await?;
                community_keys.push(key.clone());
            }
        }

        let index = ReceiptIndex {
            user_id: user.user_id.clone(),
            receipt_id: receipt.receipt_id.clone(),
            personal_keys: personal_keys.clone(),
            updated_at: Utc::now(),
        };
        self.store
            .commit_batch(vec![WriteOp::put(
                RECEIPT_INDEX_COLLECTION,
                &index_id,
                serde_json::to_value(&index)?,
            )])
            .await?;

        info!(
            receipt_id = %receipt.receipt_id,
            user_id = %user.user_id,
            aggregated = aggregated,
            skipped = skipped,
            "Receipt aggregated"
        );

        Ok(ProcessSummary {
            receipt_id: receipt.receipt_id.clone(),
            items_seen: items.len(),
            items_aggregated: aggregated,
            items_skipped: skipped,
            personal_keys,
            community_keys,
        })
    }

    /// Remove one receipt's observations from the personal ledger. The
    /// community ledger is never touched by this path.
    pub async fn delete_receipt(
        &self,
        user_id: &str,
        receipt_id: &str,
    ) -> AppResult<DeleteSummary> {
        let index_id = format!("{}_{}", user_id, receipt_id);
        let keys = self.read_index_keys(&index_id).await?;

        let mut updated = 0usize;
        let mut removed = 0usize;
        for key in &keys {
            match self
                .strip_personal_observations(user_id, key, receipt_id)
                .await?
            {
                StripOutcome::Updated => updated += 1,
                StripOutcome::Removed => removed += 1,
                StripOutcome::Untouched => {}
            }
        }

        self.store
            .commit_batch(vec![WriteOp::delete(RECEIPT_INDEX_COLLECTION, &index_id)])
            .await?;

        info!(
            receipt_id = %receipt_id,
            user_id = %user_id,
            entries_updated = updated,
            entries_removed = removed,
            "Receipt observations deleted from personal ledger"
        );

        Ok(DeleteSummary {
            receipt_id: receipt_id.to_string(),
            entries_updated: updated,
            entries_removed: removed,
        })
    }

    /// Validate one item and build its observation. Per-item failures are
    /// reported as reasons, never as hard errors.
    fn prepare_item(
        &self,
        item: &RawItem,
        receipt: &Receipt,
        currency: &str,
        store_name: &str,
    ) -> Result<(CanonicalProduct, PriceObservation), String> {
        if item.name.trim().is_empty() {
            return Err("missing item name".to_string());
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(format!("unusable unit price {}", item.unit_price));
        }

        let product = self.canonicalizer.resolve(&item.name);
        check_product(&self.lexicon, &product).map_err(|reason| reason.to_string())?;

        let observation = PriceObservation {
            store_name: store_name.to_string(),
            original_name: product.display_name.clone(),
            price: item.unit_price,
            currency: currency.to_string(),
            timestamp: receipt.date,
            receipt_id: receipt.receipt_id.clone(),
            user_id: None,
        };
        Ok((product, observation))
    }

    /// Community-ledger write gate: no zero/negative/non-finite prices, no
    /// "unknown" item or store names.
    fn community_gate(&self, obs: &PriceObservation) -> bool {
        obs.price.is_finite()
            && obs.price > 0.0
            && !self.lexicon.is_unknown_sentinel(&obs.original_name)
            && !self.lexicon.is_unknown_sentinel(&obs.store_name)
    }

    async fn update_personal(
        &self,
        user: &UserContext,
        key: &str,
        group: &KeyGroup,
        receipt_id: &str,
    ) -> AppResult<()> {
        let doc_id = format!("{}_{}", user.user_id, key);
        let cap = self.config.personal_history_cap;

        self.with_txn(PERSONAL_COLLECTION, &doc_id, |doc| {
            let mut entry: PersonalAggregate = match doc {
                Some(value) => serde_json::from_value(value)?,
                None => PersonalAggregate {
                    user_id: user.user_id.clone(),
                    canonical_key: key.to_string(),
                    display_name: group.product.display_name.clone(),
                    observations: Vec::new(),
                    stats: PriceStats::default(),
                    updated_at: Utc::now(),
                },
            };

            let before = entry.observations.len();
            entry.observations.retain(|obs| obs.receipt_id != receipt_id);
            let replaced = before - entry.observations.len();

            entry.observations.extend(group.observations.iter().cloned());
            entry.observations.sort_by_key(|obs| obs.timestamp);
            if entry.observations.len() > cap {
                let drop = entry.observations.len() - cap;
                entry.observations.drain(..drop);
            }

            if entry.observations.is_empty() {
                return Ok(None);
            }

            if group.product.display_name.len() > entry.display_name.len() {
                entry.display_name = group.product.display_name.clone();
            }
            let total = entry
                .stats
                .total_purchases
                .saturating_sub(replaced as u64)
                .saturating_add(group.observations.len() as u64);
            entry.stats = recompute_stats(&entry.observations, total);
            entry.updated_at = Utc::now();

            Ok(Some(serde_json::to_value(&entry)?))
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_community(
        &self,
        city: &str,
        user: &UserContext,
        key: &str,
        group: &KeyGroup,
        gated: Vec<PriceObservation>,
        receipt_id: &str,
    ) -> AppResult<()> {
        let doc_id = format!("{}_{}", city, key);
        let cap = self.config.community_history_cap;

        self.with_txn(COMMUNITY_COLLECTION, &doc_id, |doc| {
            let mut entry: CommunityAggregate = match doc {
                Some(value) => serde_json::from_value(value)?,
                None => CommunityAggregate {
                    city: city.to_string(),
                    canonical_key: key.to_string(),
                    display_name: group.product.display_name.clone(),
                    normalized_name: group.product.normalized.base.clone(),
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
                },
            };

            // A receipt edit replaces that receipt's earlier contribution;
            // only the deletion path is forbidden from touching this ledger.
            let before = entry.observations.len();
            entry.observations.retain(|obs| {
                obs.receipt_id != receipt_id || obs.user_id.as_deref() != Some(user.user_id.as_str())
            });
            let replaced = before - entry.observations.len();

            entry.observations.extend(gated.iter().cloned().map(|mut obs| {
                obs.user_id = Some(user.user_id.clone());
                obs
            }));
            entry.observations.sort_by_key(|obs| obs.timestamp);
            if entry.observations.len() > cap {
                let drop = entry.observations.len() - cap;
                entry.observations.drain(..drop);
            }

            if !entry.user_ids.iter().any(|id| id == &user.user_id) {
                entry.user_ids.push(user.user_id.clone());
            }
            entry.user_count = entry.user_ids.len();

            if group.product.display_name.len() > entry.display_name.len() {
                entry.display_name = group.product.display_name.clone();
            }

            let total = entry
                .stats
                .total_purchases
                .saturating_sub(replaced as u64)
                .saturating_add(gated.len() as u64);
            entry.stats = recompute_stats(&entry.observations, total);
            entry.price_volatility = price_volatility(&entry.observations);
            entry.price_change_percent = price_change_percent(&entry.observations);
            entry.store_breakdown = store_breakdown(&entry.observations);
            entry.popularity_score = popularity_score(
                entry.user_count,
                &entry.observations,
                Utc::now(),
            );

            if entry.category.is_none() {
                entry.category = detect_category(&self.lexicon, &entry.normalized_name)
                    .or_else(|| detect_category(&self.lexicon, &group.product.base_key));
            }
            entry.search_keywords = build_search_keywords(
                &self.lexicon,
                &entry.normalized_name,
                &group.product.base_key,
                entry.category.as_deref(),
            );
            entry.updated_at = Utc::now();

            Ok(Some(serde_json::to_value(&entry)?))
        })
        .await
    }

    async fn read_index_keys(&self, index_id: &str) -> AppResult<Vec<String>> {
        match self.store.get(RECEIPT_INDEX_COLLECTION, index_id).await? {
            Some(value) => {
                let index: ReceiptIndex = serde_json::from_value(value)?;
                Ok(index.personal_keys)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn strip_personal_observations(
        &self,
        user_id: &str,
        key: &str,
        receipt_id: &str,
    ) -> AppResult<StripOutcome> {
        let doc_id = format!("{}_{}", user_id, key);
        let mut outcome = StripOutcome::Untouched;

        self.with_txn(PERSONAL_COLLECTION, &doc_id, |doc| {
            let Some(value) = doc else {
                outcome = StripOutcome::Untouched;
                return Ok(None);
            };
            let mut entry: PersonalAggregate = serde_json::from_value(value)?;

            let before = entry.observations.len();
            entry.observations.retain(|obs| obs.receipt_id != receipt_id);
            let removed = before - entry.observations.len();
            if removed == 0 {
                outcome = StripOutcome::Untouched;
                return Ok(Some(serde_json::to_value(&entry)?));
            }

            if entry.observations.is_empty() {
                outcome = StripOutcome::Removed;
                return Ok(None);
            }

            let total = entry.stats.total_purchases.saturating_sub(removed as u64);
            entry.stats = recompute_stats(&entry.observations, total);
            entry.updated_at = Utc::now();
            outcome = StripOutcome::Updated;
            Ok(Some(serde_json::to_value(&entry)?))
        })
        .await?;

        Ok(outcome)
    }

    /// Per-document transactional read-modify-write with optimistic retry.
    ///
    /// `apply` receives the current document and returns the replacement
    /// (`None` deletes it). On version conflict the read-modify-write is
    /// retried with jittered backoff, up to the configured limit.
    async fn with_txn<F>(&self, collection: &str, id: &str, mut apply: F) -> AppResult<()>
    where
        F: FnMut(Option<serde_json::Value>) -> AppResult<Option<serde_json::Value>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let (doc, version) = self.store.get_versioned(collection, id).await?;
            let next = apply(doc)?;

            let result = match next {
                Some(value) => self.store.put_versioned(collection, id, value, version).await,
                None => match version {
                    Version::Missing => Ok(()),
                    _ => self.store.delete_versioned(collection, id, version).await,
                },
            };

            match result {
                Ok(()) => return Ok(()),
                Err(AppError::Conflict(msg)) => {
                    attempt += 1;
                    if attempt >= self.config.max_txn_retries {
                        return Err(AppError::Conflict(format!(
                            "{}/{} still conflicting after {} attempts: {}",
                            collection, id, attempt, msg
                        )));
                    }
                    let base = self.config.txn_retry_base_delay_ms.max(1);
                    let jitter: u64 = rand::rng().random_range(0..base);
                    let delay = base * u64::from(attempt) + jitter;
                    debug!(
                        collection = %collection,
                        doc_id = %id,
                        attempt = attempt,
                        delay_ms = delay,
                        "Version conflict, retrying transactional update"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StripOutcome {
    Untouched,
    Updated,
    Removed,
}

/// Recompute price statistics from the retained observation list.
/// `total_purchases` is carried in by the caller (lifetime counter).
pub fn recompute_stats(observations: &[PriceObservation], total_purchases: u64) -> PriceStats {
    if observations.is_empty() {
        return PriceStats {
            total_purchases,
            ..PriceStats::default()
        };
    }

    let mut min_price = f64::INFINITY;
    let mut max_price = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for obs in observations {
        min_price = min_price.min(obs.price);
        max_price = max_price.max(obs.price);
        sum += obs.price;
    }

    let mut stores: Vec<String> = Vec::new();
    for obs in observations {
        let store = obs.store_name.trim().to_lowercase();
        if !store.is_empty() && !stores.contains(&store) {
            stores.push(store);
        }
    }

    PriceStats {
        min_price,
        max_price,
        avg_price: sum / observations.len() as f64,
        store_count: stores.len(),
        primary_currency: primary_currency(observations),
        total_purchases,
        last_purchase: observations.iter().map(|obs| obs.timestamp).max(),
    }
}

/// Most frequent currency among retained observations; ties broken by list
/// order (the earliest-seen currency wins).
pub fn primary_currency(observations: &[PriceObservation]) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for obs in observations {
        match counts.iter_mut().find(|(currency, _)| *currency == obs.currency) {
            Some((_, count)) => *count += 1,
            None => counts.push((obs.currency.clone(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (currency, count) in &counts {
        if best.map(|(_, c)| *count > c).unwrap_or(true) {
            best = Some((currency, *count));
        }
    }
    best.map(|(currency, _)| currency.to_string()).unwrap_or_default()
}

/// Coefficient of variation of retained prices (population standard
/// deviation over mean).
pub fn price_volatility(observations: &[PriceObservation]) -> f64 {
    if observations.len() < 2 {
        return 0.0;
    }
    let n = observations.len() as f64;
    let mean = observations.iter().map(|obs| obs.price).sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = observations
        .iter()
        .map(|obs| (obs.price - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt() / mean
}

/// Oldest vs newest retained observation, in percent. Observations are kept
/// sorted by timestamp ascending.
pub fn price_change_percent(observations: &[PriceObservation]) -> f64 {
    if observations.len() < 2 {
        return 0.0;
    }
    let oldest = observations[0].price;
    let newest = observations[observations.len() - 1].price;
    if oldest <= 0.0 {
        return 0.0;
    }
    (newest - oldest) / oldest * 100.0
}

/// Per-store sub-aggregates over the retained observations, sorted by store
/// name for deterministic output.
pub fn store_breakdown(observations: &[PriceObservation]) -> Vec<StoreBreakdown> {
    let mut grouped: BTreeMap<String, Vec<&PriceObservation>> = BTreeMap::new();
    for obs in observations {
        let store = obs.store_name.trim().to_string();
        if store.is_empty() {
            continue;
        }
        grouped.entry(store).or_default().push(obs);
    }

    grouped
        .into_iter()
        .map(|(store_name, group)| {
            let mut min_price = f64::INFINITY;
            let mut max_price = f64::NEG_INFINITY;
            let mut sum = 0.0;
            let mut last = group[0].timestamp;
            for obs in &group {
                min_price = min_price.min(obs.price);
                max_price = max_price.max(obs.price);
                sum += obs.price;
                last = last.max(obs.timestamp);
            }
            StoreBreakdown {
                store_name,
                min_price,
                max_price,
                avg_price: sum / group.len() as f64,
                observation_count: group.len(),
                last_purchase: last,
            }
        })
        .collect()
}

/// Popularity: distinct users (log-scaled), weekly purchase rate over the
/// retained window, and a recency decay with a 30-day constant.
pub fn popularity_score(
    user_count: usize,
    observations: &[PriceObservation],
    now: DateTime<Utc>,
) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }

    let oldest = observations[0].timestamp;
    let newest = observations[observations.len() - 1].timestamp;
    let span_weeks = ((newest - oldest).num_seconds() as f64 / (7.0 * 86_400.0)).max(1.0);
    let weekly_rate = observations.len() as f64 / span_weeks;

    let days_since_last = ((now - newest).num_seconds() as f64 / 86_400.0).max(0.0);
    let recency = (-days_since_last / 30.0).exp();

    (1.0 + user_count as f64).ln() * 10.0 + weekly_rate * 2.0 + recency * 5.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(price: f64, currency: &str, store: &str, day: u32) -> PriceObservation {
        PriceObservation {
            store_name: store.to_string(),
            original_name: "Sucre 5kg".to_string(),
            price,
            currency: currency.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 7, day, 12, 0, 0).unwrap(),
            receipt_id: format!("r{}", day),
            user_id: None,
        }
    }

    #[test]
    fn test_recompute_stats() {
        let observations = vec![
            obs(4000.0, "CDF", "Kin Marche", 1),
            obs(5000.0, "CDF", "Shoprite", 2),
            obs(4500.0, "USD", "Kin Marche", 3),
        ];
        let stats = recompute_stats(&observations, 7);
        assert_eq!(stats.min_price, 4000.0);
        assert_eq!(stats.max_price, 5000.0);
        assert_eq!(stats.avg_price, 4500.0);
        assert_eq!(stats.store_count, 2);
        assert_eq!(stats.primary_currency, "CDF");
        assert_eq!(stats.total_purchases, 7);
        assert_eq!(
            stats.last_purchase,
            Some(Utc.with_ymd_and_hms(2026, 7, 3, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_primary_currency_tie_breaks_by_list_order() {
        let observations = vec![
            obs(1.0, "USD", "a", 1),
            obs(2.0, "CDF", "a", 2),
            obs(3.0, "CDF", "a", 3),
            obs(4.0, "USD", "a", 4),
        ];
        // 2 vs 2: USD was seen first
        assert_eq!(primary_currency(&observations), "USD");
    }

    #[test]
    fn test_price_volatility_and_change() {
        let observations = vec![
            obs(4000.0, "CDF", "a", 1),
            obs(4000.0, "CDF", "a", 2),
            obs(5000.0, "CDF", "a", 3),
        ];
        assert!(price_volatility(&observations) > 0.0);
        assert!((price_change_percent(&observations) - 25.0).abs() < 1e-9);

        let flat = vec![obs(4000.0, "CDF", "a", 1), obs(4000.0, "CDF", "a", 2)];
        assert_eq!(price_volatility(&flat), 0.0);
        assert_eq!(price_change_percent(&flat), 0.0);
    }

    #[test]
    fn test_store_breakdown_groups_and_sorts() {
        let observations = vec![
            obs(4000.0, "CDF", "Shoprite", 1),
            obs(5000.0, "CDF", "Kin Marche", 2),
            obs(4500.0, "CDF", "Shoprite", 3),
            obs(1.0, "CDF", "  ", 4),
        ];
        let breakdown = store_breakdown(&observations);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].store_name, "Kin Marche");
        assert_eq!(breakdown[1].store_name, "Shoprite");
        assert_eq!(breakdown[1].observation_count, 2);
        assert_eq!(breakdown[1].min_price, 4000.0);
        assert_eq!(breakdown[1].max_price, 4500.0);
    }

    #[test]
    fn test_popularity_prefers_recent_and_popular() {
        let now = Utc.with_ymd_and_hms(2026, 7, 10, 0, 0, 0).unwrap();
        let recent = vec![obs(1.0, "CDF", "a", 8), obs(1.0, "CDF", "a", 9)];
        let stale = vec![obs(1.0, "CDF", "a", 1), obs(1.0, "CDF", "a", 2)];
        let popular = popularity_score(10, &recent, now);
        let lonely = popularity_score(1, &recent, now);
        assert!(popular > lonely);
        assert!(popularity_score(1, &recent, now) > popularity_score(1, &stale, now));
    }
}
