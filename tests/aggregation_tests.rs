#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use soko_prices::aggregation::AggregationEngine;
    use soko_prices::config::AggregationConfig;
    use soko_prices::lexicon::Lexicon;
    use soko_prices::models::{
        CommunityAggregate, PersonalAggregate, RawItem, Receipt, UserContext,
    };
    use soko_prices::store::{
        DocumentStore, MemoryStore, COMMUNITY_COLLECTION, PERSONAL_COLLECTION,
        RECEIPT_INDEX_COLLECTION,
    };
    use std::sync::Arc;

    fn engine_with(store: Arc<MemoryStore>, config: AggregationConfig) -> AggregationEngine {
        AggregationEngine::new(store, Lexicon::shared(), config)
    }

    fn engine(store: Arc<MemoryStore>) -> AggregationEngine {
        engine_with(store, AggregationConfig::default())
    }

    fn user() -> UserContext {
        UserContext {
            user_id: "u1".to_string(),
            city: Some("kinshasa".to_string()),
        }
    }

    fn item(name: &str, unit_price: f64) -> RawItem {
        RawItem {
            name: name.to_string(),
            quantity: Some(1.0),
            unit_price,
            total_price: Some(unit_price),
            unit: None,
            category: None,
        }
    }

    fn receipt(id: &str, day: u32, store: &str, items: Vec<RawItem>) -> Receipt {
        Receipt {
            receipt_id: id.to_string(),
            user_id: "u1".to_string(),
            store_name: store.to_string(),
            currency: "FC".to_string(),
            date: Utc.with_ymd_and_hms(2026, 7, day, 12, 0, 0).unwrap(),
            items,
        }
    }

    async fn personal(store: &MemoryStore, id: &str) -> Option<PersonalAggregate> {
        store
            .get(PERSONAL_COLLECTION, id)
            .await
            .unwrap()
            .map(|v| serde_json::from_value(v).unwrap())
    }

    async fn community(store: &MemoryStore, id: &str) -> Option<CommunityAggregate> {
        store
            .get(COMMUNITY_COLLECTION, id)
            .await
            .unwrap()
            .map(|v| serde_json::from_value(v).unwrap())
    }

    #[tokio::test]
    async fn test_receipt_feeds_both_ledgers() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let summary = engine
            .process_receipt(
                &receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]),
                &user(),
            )
            .await
            .unwrap();

        assert_eq!(summary.items_aggregated, 1);
        assert_eq!(summary.personal_keys, vec!["sucre_5kg".to_string()]);
        assert_eq!(summary.community_keys, vec!["sucre_5kg".to_string()]);

        let p = personal(&store, "u1_sucre_5kg").await.unwrap();
        assert_eq!(p.observations.len(), 1);
        assert_eq!(p.stats.total_purchases, 1);
        assert_eq!(p.stats.primary_currency, "CDF");

        let c = community(&store, "kinshasa_sucre_5kg").await.unwrap();
        assert_eq!(c.observations.len(), 1);
        assert_eq!(c.observations[0].user_id.as_deref(), Some("u1"));
        assert_eq!(c.user_count, 1);
        assert_eq!(c.category.as_deref(), Some("staples"));
        assert!(c.search_keywords.contains(&"sucre".to_string()));
        assert!(c.search_keywords.contains(&"sugar".to_string()));
    }

    #[tokio::test]
    async fn test_community_gate_blocks_invalid_prices_and_unknown_names() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let summary = engine
            .process_receipt(
                &receipt(
                    "r1",
                    1,
                    "Kin Marche",
                    vec![
                        item("Sucre 5kg", 4500.0),
                        item("Article inconnu", 2000.0),
                        item("Lait Nido 400g", 0.0),
                    ],
                ),
                &user(),
            )
            .await
            .unwrap();

        // The placeholder never reaches either ledger
        assert_eq!(summary.items_skipped, 1);

        // Zero price: written to the personal ledger...
        let p = personal(&store, "u1_lait_400g").await.unwrap();
        assert_eq!(p.observations.len(), 1);
        assert_eq!(p.observations[0].price, 0.0);

        // ...but never to the community ledger
        assert!(community(&store, "kinshasa_lait_400g").await.is_none());
        assert!(community(&store, "kinshasa_sucre_5kg").await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_store_blocks_community_but_not_personal() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        engine
            .process_receipt(
                &receipt("r1", 1, "Magasin inconnu", vec![item("Sucre 5kg", 4500.0)]),
                &user(),
            )
            .await
            .unwrap();

        assert!(personal(&store, "u1_sucre_5kg").await.is_some());
        assert!(community(&store, "kinshasa_sucre_5kg").await.is_none());
    }

    #[tokio::test]
    async fn test_user_without_city_feeds_personal_only() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let no_city = UserContext {
            user_id: "u1".to_string(),
            city: None,
        };
        engine
            .process_receipt(
                &receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]),
                &no_city,
            )
            .await
            .unwrap();

        assert!(personal(&store, "u1_sucre_5kg").await.is_some());
        assert!(store.is_empty(COMMUNITY_COLLECTION));
    }

    #[tokio::test]
    async fn test_deletion_removes_personal_but_never_community() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        engine
            .process_receipt(
                &receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]),
                &user(),
            )
            .await
            .unwrap();

        let before = community(&store, "kinshasa_sucre_5kg").await.unwrap();

        let summary = engine.delete_receipt("u1", "r1").await.unwrap();
        assert_eq!(summary.entries_removed, 1);

        // Personal entry became empty and was deleted entirely
        assert!(personal(&store, "u1_sucre_5kg").await.is_none());
        assert!(store.is_empty(RECEIPT_INDEX_COLLECTION));

        // Community entry is byte-for-byte untouched
        let after = community(&store, "kinshasa_sucre_5kg").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_deletion_keeps_other_receipts_observations() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        for (id, day, price) in [("r1", 1, 4500.0), ("r2", 2, 4800.0)] {
            engine
                .process_receipt(
                    &receipt(id, day, "Kin Marche", vec![item("Sucre 5kg", price)]),
                    &user(),
                )
                .await
                .unwrap();
        }

        engine.delete_receipt("u1", "r1").await.unwrap();

        let p = personal(&store, "u1_sucre_5kg").await.unwrap();
        assert_eq!(p.observations.len(), 1);
        assert_eq!(p.observations[0].receipt_id, "r2");
        assert_eq!(p.stats.total_purchases, 1);
        assert_eq!(p.stats.min_price, 4800.0);
    }

    #[tokio::test]
    async fn test_reprocessing_a_receipt_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let r = receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]);
        engine.process_receipt(&r, &user()).await.unwrap();
        engine.process_receipt(&r, &user()).await.unwrap();

        let p = personal(&store, "u1_sucre_5kg").await.unwrap();
        assert_eq!(p.observations.len(), 1);
        assert_eq!(p.stats.total_purchases, 1);

        let c = community(&store, "kinshasa_sucre_5kg").await.unwrap();
        assert_eq!(c.observations.len(), 1);
        assert_eq!(c.stats.total_purchases, 1);
        assert_eq!(c.user_count, 1);
    }

    #[tokio::test]
    async fn test_receipt_edit_drops_stale_keys() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        engine
            .process_receipt(
                &receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]),
                &user(),
            )
            .await
            .unwrap();

        // The edited receipt no longer contains sugar
        engine
            .process_receipt(
                &receipt("r1", 1, "Kin Marche", vec![item("Riz 1kg", 3000.0)]),
                &user(),
            )
            .await
            .unwrap();

        assert!(personal(&store, "u1_sucre_5kg").await.is_none());
        assert!(personal(&store, "u1_riz_1kg").await.is_some());
    }

    #[tokio::test]
    async fn test_personal_history_cap_keeps_most_recent() {
        let store = Arc::new(MemoryStore::new());
        let mut config = AggregationConfig::default();
        config.personal_history_cap = 3;
        let engine = engine_with(store.clone(), config);

        for day in 1..=5u32 {
            engine
                .process_receipt(
                    &receipt(
                        &format!("r{}", day),
                        day,
                        "Kin Marche",
                        vec![item("Sucre 5kg", 4000.0 + day as f64)],
                    ),
                    &user(),
                )
                .await
                .unwrap();
        }

        let p = personal(&store, "u1_sucre_5kg").await.unwrap();
        assert_eq!(p.observations.len(), 3);
        assert_eq!(p.stats.total_purchases, 5);
        // Oldest observations were dropped first
        assert_eq!(p.observations[0].receipt_id, "r3");
        assert_eq!(p.observations[2].receipt_id, "r5");
    }

    #[tokio::test]
    async fn test_primary_currency_follows_majority() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let mut r1 = receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]);
        r1.currency = "FC".to_string();
        let mut r2 = receipt("r2", 2, "Kin Marche", vec![item("Sucre 5kg", 3.0)]);
        r2.currency = "$".to_string();
        let mut r3 = receipt("r3", 3, "Kin Marche", vec![item("Sucre 5kg", 3.2)]);
        r3.currency = "usd".to_string();

        for r in [&r1, &r2, &r3] {
            engine.process_receipt(r, &user()).await.unwrap();
        }

        let p = personal(&store, "u1_sucre_5kg").await.unwrap();
        assert_eq!(p.stats.primary_currency, "USD");
    }

    #[tokio::test]
    async fn test_concurrent_receipts_for_same_key_both_land() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(engine(store.clone()));

        let a = receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]);
        let b = receipt("r2", 2, "Shoprite", vec![item("Sucre 5kg", 4700.0)]);

        let u = user();
        let (ra, rb) = tokio::join!(
            engine.process_receipt(&a, &u),
            engine.process_receipt(&b, &u),
        );
        ra.unwrap();
        rb.unwrap();

        let p = personal(&store, "u1_sucre_5kg").await.unwrap();
        assert_eq!(p.observations.len(), 2);
        assert_eq!(p.stats.store_count, 2);

        let c = community(&store, "kinshasa_sucre_5kg").await.unwrap();
        assert_eq!(c.observations.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_items_are_skipped_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let summary = engine
            .process_receipt(
                &receipt(
                    "r1",
                    1,
                    "Kin Marche",
                    vec![
                        item("", 1000.0),
                        item("Sucre 5kg", f64::NAN),
                        item("Riz 1kg", -5.0),
                        item("Farine 1kg", 2500.0),
                    ],
                ),
                &user(),
            )
            .await
            .unwrap();

        assert_eq!(summary.items_aggregated, 1);
        assert_eq!(summary.items_skipped, 3);
        assert!(personal(&store, "u1_farine_1kg").await.is_some());
    }

    #[tokio::test]
    async fn test_event_handlers_swallow_failures() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        // Deleting a receipt that was never aggregated must not panic or
        // error through the event path.
        engine.on_receipt_deleted("u1", "missing").await;

        engine
            .on_receipt_written(
                &receipt("r1", 1, "Kin Marche", vec![item("Sucre 5kg", 4500.0)]),
                &user(),
            )
            .await;
        assert!(personal(&store, "u1_sucre_5kg").await.is_some());
    }
}
