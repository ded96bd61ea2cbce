//! # Unified Application Configuration
//!
//! Centralized configuration for the aggregation engine and the community
//! search ranker. Supports loading from environment variables, validation,
//! and provides a clean interface for accessing configuration throughout the
//! application.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Aggregation engine configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Maximum retained price observations per personal ledger entry
    pub personal_history_cap: usize,
    /// Maximum retained price observations per community ledger entry
    pub community_history_cap: usize,
    /// Relative price tolerance for merging a size-only continuation line
    /// into the preceding item (~10%)
    pub continuation_price_tolerance: f64,
    /// Relative unit-price tolerance for duplicate-line merging (~1%)
    pub duplicate_price_tolerance: f64,
    /// Ordered-character overlap required to merge duplicate lines (~80%)
    pub duplicate_name_overlap: f64,
    /// Ordered-character overlap required to reconcile items across pages (~70%)
    pub cross_page_name_overlap: f64,
    /// Maximum optimistic-concurrency retries per ledger document
    pub max_txn_retries: u32,
    /// Base delay between retries in milliseconds (jitter is added on top)
    pub txn_retry_base_delay_ms: u64,
    /// Maximum documents per administrative backfill batch commit
    pub backfill_chunk_size: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            personal_history_cap: 50,
            community_history_cap: 100,
            continuation_price_tolerance: 0.10,
            duplicate_price_tolerance: 0.01,
            duplicate_name_overlap: 0.80,
            cross_page_name_overlap: 0.70,
            max_txn_retries: 5,
            txn_retry_base_delay_ms: 25,
            backfill_chunk_size: 400,
        }
    }
}

impl AggregationConfig {
    /// Validate aggregation configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.personal_history_cap == 0 {
            return Err(AppError::Config(
                "personal_history_cap must be greater than 0".to_string(),
            ));
        }

        if self.community_history_cap == 0 {
            return Err(AppError::Config(
                "community_history_cap must be greater than 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.continuation_price_tolerance) {
            return Err(AppError::Config(
                "continuation_price_tolerance must be in [0, 1)".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.duplicate_price_tolerance) {
            return Err(AppError::Config(
                "duplicate_price_tolerance must be in [0, 1)".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.duplicate_name_overlap) || self.duplicate_name_overlap == 0.0
        {
            return Err(AppError::Config(
                "duplicate_name_overlap must be in (0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.cross_page_name_overlap)
            || self.cross_page_name_overlap == 0.0
        {
            return Err(AppError::Config(
                "cross_page_name_overlap must be in (0, 1]".to_string(),
            ));
        }

        if self.max_txn_retries == 0 {
            return Err(AppError::Config(
                "max_txn_retries must be greater than 0".to_string(),
            ));
        }

        if self.backfill_chunk_size == 0 || self.backfill_chunk_size > 500 {
            return Err(AppError::Config(
                "backfill_chunk_size must be in 1..=500".to_string(),
            ));
        }

        Ok(())
    }
}

/// Community search configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Queries shorter than this many characters return empty without a scan
    pub min_query_chars: usize,
    /// Page size used when the caller passes 0
    pub default_page_size: usize,
    /// Hard upper bound on page size
    pub max_page_size: usize,
    /// Minimum Levenshtein similarity for the fuzzy relevance signal
    pub fuzzy_similarity_floor: f64,
    /// Both strings must be at least this long before fuzzy matching runs
    pub fuzzy_min_chars: usize,
    /// Maximum recency boost for recently purchased items
    pub recency_boost_max: f64,
    /// Days over which the recency boost decays to zero
    pub recency_window_days: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_chars: 2,
            default_page_size: 20,
            max_page_size: 100,
            fuzzy_similarity_floor: 0.7,
            fuzzy_min_chars: 4,
            recency_boost_max: 5.0,
            recency_window_days: 50.0,
        }
    }
}

impl SearchConfig {
    /// Validate search configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.min_query_chars == 0 {
            return Err(AppError::Config(
                "min_query_chars must be greater than 0".to_string(),
            ));
        }

        if self.default_page_size == 0 {
            return Err(AppError::Config(
                "default_page_size must be greater than 0".to_string(),
            ));
        }

        if self.max_page_size < self.default_page_size {
            return Err(AppError::Config(
                "max_page_size cannot be smaller than default_page_size".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.fuzzy_similarity_floor) {
            return Err(AppError::Config(
                "fuzzy_similarity_floor must be in [0, 1]".to_string(),
            ));
        }

        if self.fuzzy_min_chars < 2 {
            return Err(AppError::Config(
                "fuzzy_min_chars must be at least 2".to_string(),
            ));
        }

        if self.recency_boost_max < 0.0 {
            return Err(AppError::Config(
                "recency_boost_max cannot be negative".to_string(),
            ));
        }

        if self.recency_window_days <= 0.0 {
            return Err(AppError::Config(
                "recency_window_days must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Aggregation engine configuration
    pub aggregation: AggregationConfig,
    /// Community search configuration
    pub search: SearchConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        config.aggregation.personal_history_cap =
            read_env_parse("SOKO_PERSONAL_HISTORY_CAP", 50)?;
        config.aggregation.community_history_cap =
            read_env_parse("SOKO_COMMUNITY_HISTORY_CAP", 100)?;
        config.aggregation.max_txn_retries = read_env_parse("SOKO_MAX_TXN_RETRIES", 5)?;
        config.aggregation.txn_retry_base_delay_ms =
            read_env_parse("SOKO_TXN_RETRY_BASE_DELAY_MS", 25)?;
        config.aggregation.backfill_chunk_size = read_env_parse("SOKO_BACKFILL_CHUNK_SIZE", 400)?;

        config.search.default_page_size = read_env_parse("SOKO_SEARCH_PAGE_SIZE", 20)?;
        config.search.max_page_size = read_env_parse("SOKO_SEARCH_MAX_PAGE_SIZE", 100)?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.aggregation.validate()?;
        self.search.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: personal_cap={}, community_cap={}, txn_retries={}, search_page_size={}",
            self.aggregation.personal_history_cap,
            self.aggregation.community_history_cap,
            self.aggregation.max_txn_retries,
            self.search.default_page_size
        )
    }
}

/// Read an environment variable and parse it, falling back to a default when
/// the variable is unset.
fn read_env_parse<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number", key))),
        Err(_) => Ok(default),
    }
}
