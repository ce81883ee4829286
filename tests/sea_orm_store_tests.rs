//! Postgres-backed store tests. Skipped unless TEST_DATABASE_URL is set.

mod common;

use chrono::{Duration, Utc};
use sea_orm_migration::MigratorTrait;
use serde_json::json;

use kaitori_tracker::models::catalog::{Capacity, Series};
use kaitori_tracker::models::official::OfficialPriceDoc;
use kaitori_tracker::models::records::HistoryRecord;
use kaitori_tracker::services::sea_orm_store::SeaOrmStore;
use kaitori_tracker::services::store::DocumentStore;

use crate::common::{catalog, record, setup_test_db};

async fn store() -> Option<SeaOrmStore> {
    let db = setup_test_db().await?.expect("Test database connection should succeed");
    migration::Migrator::up(&db, None)
        .await
        .expect("Migrations should apply");
    Some(SeaOrmStore::new(db, catalog()))
}

#[tokio::test]
async fn test_postgres_store_round_trip() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    store.ping().await.unwrap();
    store.wipe_current().await.unwrap();

    // Upsert is idempotent per (series, capacity)
    assert!(catalog().is_allowed(Series::ProMax, Capacity::Tb1));
    let now = Utc::now();
    let first = record(Series::ProMax, Capacity::Tb1, &[("Black", 200_000)], now);
    let second = record(Series::ProMax, Capacity::Tb1, &[("Black", 195_000), ("White", 199_000)], now);
    store.upsert_current(&first).await.unwrap();
    store.upsert_current(&second).await.unwrap();
    store.upsert_current(&second).await.unwrap();

    let current = store.current_for_series(Series::ProMax).await.unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].kaitori_price_min.get(), 195_000);
    assert_eq!(current[0].colors.len(), 2);

    // History: append, query ascending, expire
    let stale = record(Series::ProMax, Capacity::Tb1, &[("Black", 190_000)], now - Duration::days(20));
    let stale_id = store
        .append_history(&HistoryRecord::from_current(&stale, 14))
        .await
        .unwrap();
    store
        .append_history(&HistoryRecord::from_current(&second, 14))
        .await
        .unwrap();

    let since = (now - Duration::days(30)).timestamp();
    let history = store
        .history_for(Series::ProMax, Capacity::Tb1, since)
        .await
        .unwrap();
    assert!(history.windows(2).all(|w| w[0].record.timestamp <= w[1].record.timestamp));

    let expired = store
        .history_older_than((now - Duration::days(14)).timestamp())
        .await
        .unwrap();
    assert!(expired.contains(&stale_id));
    for id in &expired {
        store.delete_history(id).await.unwrap();
    }
    assert!(store
        .history_older_than((now - Duration::days(14)).timestamp())
        .await
        .unwrap()
        .is_empty());

    // Official documents are replaced by id
    store
        .replace_official(&[OfficialPriceDoc {
            id: "iPhone 16 Pro Max".to_string(),
            price: json!({"1TB": 329800}),
        }])
        .await
        .unwrap();
    let official = store.official_prices().await.unwrap();
    let doc = official.iter().find(|d| d.id == "iPhone 16 Pro Max").unwrap();
    assert_eq!(doc.price_for(Capacity::Tb1), 329_800);

    assert_eq!(store.wipe_current().await.unwrap(), 1);
}
