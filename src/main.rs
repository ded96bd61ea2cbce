use anyhow::{Context, Result};
use serde::Deserialize;
use soko_prices::config::AppConfig;
use soko_prices::models::{Receipt, UserContext};
use soko_prices::store::{DocumentStore, COMMUNITY_COLLECTION, PERSONAL_COLLECTION};
use soko_prices::{AggregationEngine, Lexicon, MemoryStore, SearchEngine};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Demo input: one user context plus the receipts to aggregate.
#[derive(Debug, Deserialize)]
struct DemoInput {
    user: UserContext,
    receipts: Vec<Receipt>,
    /// Optional community search to run after aggregation.
    #[serde(default)]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!("{}", config.summary());

    let path = env::args()
        .nth(1)
        .context("Usage: soko-prices <receipts.json>")?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read input file '{}'", path))?;
    let input: DemoInput =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse '{}'", path))?;

    let lexicon = Lexicon::shared();
    let store = Arc::new(MemoryStore::new());
    let engine = AggregationEngine::new(store.clone(), lexicon.clone(), config.aggregation.clone());

    for receipt in &input.receipts {
        let summary = engine
            .process_receipt(receipt, &input.user)
            .await
            .with_context(|| format!("Aggregation failed for receipt '{}'", receipt.receipt_id))?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let personal = store.list_prefix(PERSONAL_COLLECTION, "").await?;
    info!(entries = personal.len(), "Personal ledger entries");
    for (id, value) in &personal {
        println!("personal {} => {}", id, value);
    }

    let community = store.list_prefix(COMMUNITY_COLLECTION, "").await?;
    info!(entries = community.len(), "Community ledger entries");
    for (id, value) in &community {
        println!("community {} => {}", id, value);
    }

    if let (Some(query), Some(city)) = (&input.query, &input.user.city) {
        let search = SearchEngine::new(store.clone(), lexicon, config.search.clone());
        let results = search.search(city, query, 1, 0).await;
        println!("search '{}' => {}", query, serde_json::to_string_pretty(&results)?);
    }

    Ok(())
}
