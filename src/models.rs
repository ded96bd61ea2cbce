//! # Ledger Data Model
//!
//! Receipt input types (as delivered by the external OCR/AI extraction
//! collaborator) and the persisted aggregate documents for the personal and
//! community ledgers.
//!
//! Input deserialization is deliberately lenient: the extraction collaborator
//! sometimes emits numbers as strings, nulls, or garbage, and a malformed
//! field must never make the whole receipt unreadable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One raw line item from the extraction collaborator. Ephemeral, consumed
/// once per receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// One page of a multi-image receipt, pre-screened for duplicates by the
/// external image-similarity collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptPage {
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// A logical receipt, ready for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: String,
    pub user_id: String,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub currency: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// The user context the aggregation engine needs beyond the receipt itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    /// Community ledger city; users without a city only feed their personal
    /// ledger.
    #[serde(default)]
    pub city: Option<String>,
}

/// One purchase event for one canonical key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub store_name: String,
    pub original_name: String,
    pub price: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub receipt_id: String,
    /// Present only in community observations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Derived price statistics, always fully recomputed from the retained
/// observation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PriceStats {
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub store_count: usize,
    pub primary_currency: String,
    pub total_purchases: u64,
    #[serde(default)]
    pub last_purchase: Option<DateTime<Utc>>,
}

/// Personal ledger entry, keyed by `(user_id, canonical_key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalAggregate {
    pub user_id: String,
    pub canonical_key: String,
    pub display_name: String,
    pub observations: Vec<PriceObservation>,
    pub stats: PriceStats,
    pub updated_at: DateTime<Utc>,
}

/// Per-store sub-aggregate inside a community entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreBreakdown {
    pub store_name: String,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub observation_count: usize,
    pub last_purchase: DateTime<Utc>,
}

/// Community ledger entry, keyed by `(city, canonical_key)`. Append-mostly:
/// personal-data deletion never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityAggregate {
    pub city: String,
    pub canonical_key: String,
    pub display_name: String,
    /// Normalized base name, used by the search ranker.
    pub normalized_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    pub observations: Vec<PriceObservation>,
    pub user_ids: Vec<String>,
    pub user_count: usize,
    pub stats: PriceStats,
    /// Coefficient of variation of retained prices.
    pub price_volatility: f64,
    /// Oldest vs newest retained observation, in percent.
    pub price_change_percent: f64,
    pub store_breakdown: Vec<StoreBreakdown>,
    pub popularity_score: f64,
    pub updated_at: DateTime<Utc>,
}

/// Per-receipt index of the personal keys it touched; drives deletion and
/// re-processing without collection scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptIndex {
    pub user_id: String,
    pub receipt_id: String,
    pub personal_keys: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// One ranked community entry in a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub canonical_key: String,
    pub display_name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub score: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub primary_currency: String,
    pub total_purchases: u64,
    pub user_count: usize,
    #[serde(default)]
    pub last_purchase: Option<DateTime<Utc>>,
}

/// Paginated search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    pub items: Vec<RankedItem>,
    pub total: usize,
    pub has_more: bool,
}

/// Accept a number, a numeric string, or garbage (mapped to 0.0).
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value).unwrap_or(0.0))
}

/// Accept a number, a numeric string, null, or garbage (mapped to `None`).
fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
}
