//! # Application Error Types
//!
//! This module defines common error types used throughout the price ledger
//! core. It provides structured error handling for configuration, validation,
//! storage, aggregation and search components.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (item names, receipts, inputs)
    Validation(String),
    /// Document store operation errors
    Storage(String),
    /// Optimistic concurrency conflicts (document version moved under us)
    Conflict(String),
    /// Receipt aggregation errors
    Aggregation(String),
    /// Community search errors
    Search(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Storage(msg) => write!(f, "[STORAGE] {}", msg),
            AppError::Conflict(msg) => write!(f, "[CONFLICT] {}", msg),
            AppError::Aggregation(msg) => write!(f, "[AGGREGATION] {}", msg),
            AppError::Search(msg) => write!(f, "[SEARCH] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("document (de)serialization failed: {}", err))
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::{error, warn};

    /// Log document store operation errors with contextual information
    pub fn log_storage_error(
        error: &impl std::fmt::Display,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            collection = %collection,
            doc_id = ?doc_id,
            "Document store operation failed"
        );
    }

    /// Log receipt aggregation errors with receipt-specific context
    pub fn log_aggregation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        user_id: &str,
        receipt_id: &str,
    ) {
        error!(
            error = %error,
            operation = %operation,
            user_id = %user_id,
            receipt_id = %receipt_id,
            "Receipt aggregation failed"
        );
    }

    /// Log a skipped receipt item; per-item failures never abort the receipt
    pub fn log_item_skipped(reason: &str, item_name: &str, receipt_id: &str) {
        warn!(
            reason = %reason,
            item_name = %item_name,
            receipt_id = %receipt_id,
            "Skipping receipt item"
        );
    }

    /// Log community search errors with query context
    pub fn log_search_error(error: &impl std::fmt::Display, city: &str, query: &str) {
        error!(
            error = %error,
            city = %city,
            query = %query,
            "Community search failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_prefixes() {
        assert_eq!(
            AppError::Config("bad".to_string()).to_string(),
            "[CONFIG] bad"
        );
        assert_eq!(
            AppError::Conflict("v1 != v2".to_string()).to_string(),
            "[CONFLICT] v1 != v2"
        );
        assert_eq!(
            AppError::Search("oops".to_string()).to_string(),
            "[SEARCH] oops"
        );
    }

    #[test]
    fn test_from_anyhow() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err, AppError::Internal("boom".to_string()));
    }
}
