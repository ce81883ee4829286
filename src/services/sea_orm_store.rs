//! Postgres-backed document store
//!
//! `current_prices` relies on the unique (series, capacity) index so that an
//! upsert is a single `INSERT .. ON CONFLICT DO UPDATE` statement.

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect, SqlErr,
};
use std::collections::BTreeMap;
use tracing::warn;

use super::store::DocumentStore;
use crate::entities::{current_prices, official_prices, price_history, prelude::*};
use crate::error::StoreError;
use crate::models::catalog::{Capacity, Catalog, Series};
use crate::models::official::OfficialPriceDoc;
use crate::models::price::Price;
use crate::models::records::{CurrentPriceRecord, HistoryId, HistoryRecord, StoredHistory};

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
    catalog: Catalog,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection, catalog: Catalog) -> Self {
        Self { db, catalog }
    }

    fn current_from_model(&self, m: current_prices::Model) -> Result<CurrentPriceRecord, StoreError> {
        let series = self.series_of(&m.series)?;
        Ok(CurrentPriceRecord {
            series,
            capacity: capacity_of(&m.capacity)?,
            colors: serde_json::from_value::<BTreeMap<String, Price>>(m.colors)?,
            kaitori_price_min: price_of(m.kaitori_price_min)?,
            kaitori_price_max: price_of(m.kaitori_price_max)?,
            source: m.source,
            updated_at: m.updated_at.with_timezone(&chrono::Utc),
        })
    }

    fn history_from_model(&self, m: price_history::Model) -> Result<StoredHistory, StoreError> {
        let series = self.series_of(&m.series)?;
        Ok(StoredHistory {
            id: HistoryId(m.id.to_string()),
            record: HistoryRecord {
                series,
                capacity: capacity_of(&m.capacity)?,
                colors: serde_json::from_value::<BTreeMap<String, Price>>(m.colors)?,
                price_min: price_of(m.kaitori_price_min)?,
                price_max: price_of(m.kaitori_price_max)?,
                source: m.source,
                timestamp: m.timestamp,
                date: m.date,
                expiration_time: m.expiration_time,
            },
        })
    }

    fn series_of(&self, name: &str) -> Result<Series, StoreError> {
        self.catalog
            .parse_series(name)
            .ok_or_else(|| StoreError::Serialization(format!("unknown series '{}'", name)))
    }
}

fn capacity_of(raw: &str) -> Result<Capacity, StoreError> {
    raw.parse().map_err(StoreError::Serialization)
}

fn price_of(raw: i64) -> Result<Price, StoreError> {
    Price::new(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Classify a database error for the cycle's failure policy.
fn map_db_err(context: &str, e: DbErr) -> StoreError {
    if matches!(e, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) {
        return StoreError::Unavailable(format!("{}: {}", context, e));
    }
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            StoreError::WriteConflict(format!("{}: {}", context, detail))
        }
        _ => StoreError::Backend(format!("{}: {}", context, e)),
    }
}

/// Decode rows, skipping (and logging) documents this catalog cannot read.
fn decode_all<M, T>(
    rows: Vec<M>,
    decode: impl Fn(M) -> Result<T, StoreError>,
    collection: &str,
) -> Vec<T> {
    rows.into_iter()
        .filter_map(|m| match decode(m) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(collection = collection, error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect()
}

#[async_trait]
impl DocumentStore for SeaOrmStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.ping().await.map_err(|e| map_db_err("ping", e))
    }

    async fn upsert_current(&self, record: &CurrentPriceRecord) -> Result<(), StoreError> {
        let model = current_prices::ActiveModel {
            id: NotSet,
            series: Set(self.catalog.name(record.series)),
            capacity: Set(record.capacity.as_str().to_string()),
            colors: Set(serde_json::to_value(&record.colors)?),
            kaitori_price_min: Set(record.kaitori_price_min.get()),
            kaitori_price_max: Set(record.kaitori_price_max.get()),
            source: Set(record.source.clone()),
            updated_at: Set(record.updated_at.into()),
        };

        CurrentPrices::insert(model)
            .on_conflict(
                OnConflict::columns([current_prices::Column::Series, current_prices::Column::Capacity])
                    .update_columns([
                        current_prices::Column::Colors,
                        current_prices::Column::KaitoriPriceMin,
                        current_prices::Column::KaitoriPriceMax,
                        current_prices::Column::Source,
                        current_prices::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| map_db_err("upsert current_prices", e))?;

        Ok(())
    }

    async fn current_for_series(&self, series: Series) -> Result<Vec<CurrentPriceRecord>, StoreError> {
        let rows = CurrentPrices::find()
            .filter(current_prices::Column::Series.eq(self.catalog.name(series)))
            .order_by(current_prices::Column::Capacity, Order::Asc)
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("query current_prices", e))?;

        Ok(decode_all(rows, |m| self.current_from_model(m), "current_prices"))
    }

    async fn all_current(&self) -> Result<Vec<CurrentPriceRecord>, StoreError> {
        let rows = CurrentPrices::find()
            .order_by(current_prices::Column::Series, Order::Asc)
            .order_by(current_prices::Column::Capacity, Order::Asc)
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("query current_prices", e))?;

        Ok(decode_all(rows, |m| self.current_from_model(m), "current_prices"))
    }

    async fn wipe_current(&self) -> Result<u64, StoreError> {
        let result = CurrentPrices::delete_many()
            .exec(&self.db)
            .await
            .map_err(|e| map_db_err("wipe current_prices", e))?;
        Ok(result.rows_affected)
    }

    async fn official_prices(&self) -> Result<Vec<OfficialPriceDoc>, StoreError> {
        let rows = OfficialPrices::find()
            .order_by(official_prices::Column::Id, Order::Asc)
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("query official_prices", e))?;

        Ok(rows
            .into_iter()
            .map(|m| OfficialPriceDoc {
                id: m.id,
                price: m.price,
            })
            .collect())
    }

    async fn replace_official(&self, docs: &[OfficialPriceDoc]) -> Result<(), StoreError> {
        for doc in docs {
            let model = official_prices::ActiveModel {
                id: Set(doc.id.clone()),
                price: Set(doc.price.clone()),
            };
            OfficialPrices::insert(model)
                .on_conflict(
                    OnConflict::column(official_prices::Column::Id)
                        .update_column(official_prices::Column::Price)
                        .to_owned(),
                )
                .exec(&self.db)
                .await
                .map_err(|e| map_db_err("upsert official_prices", e))?;
        }
        Ok(())
    }

    async fn append_history(&self, record: &HistoryRecord) -> Result<HistoryId, StoreError> {
        let model = price_history::ActiveModel {
            id: NotSet,
            series: Set(self.catalog.name(record.series)),
            capacity: Set(record.capacity.as_str().to_string()),
            colors: Set(serde_json::to_value(&record.colors)?),
            kaitori_price_min: Set(record.price_min.get()),
            kaitori_price_max: Set(record.price_max.get()),
            source: Set(record.source.clone()),
            timestamp: Set(record.timestamp),
            date: Set(record.date),
            expiration_time: Set(record.expiration_time),
            created_at: NotSet,
        };

        let result = PriceHistory::insert(model)
            .exec(&self.db)
            .await
            .map_err(|e| map_db_err("insert price_history", e))?;

        Ok(HistoryId(result.last_insert_id.to_string()))
    }

    async fn history_for(
        &self,
        series: Series,
        capacity: Capacity,
        since: i64,
    ) -> Result<Vec<StoredHistory>, StoreError> {
        let rows = PriceHistory::find()
            .filter(price_history::Column::Series.eq(self.catalog.name(series)))
            .filter(price_history::Column::Capacity.eq(capacity.as_str()))
            .filter(price_history::Column::Timestamp.gte(since))
            .order_by(price_history::Column::Timestamp, Order::Asc)
            .order_by(price_history::Column::Id, Order::Asc)
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("query price_history", e))?;

        Ok(decode_all(rows, |m| self.history_from_model(m), "price_history"))
    }

    async fn history_older_than(&self, cutoff: i64) -> Result<Vec<HistoryId>, StoreError> {
        let ids: Vec<i64> = PriceHistory::find()
            .select_only()
            .column(price_history::Column::Id)
            .filter(price_history::Column::Timestamp.lt(cutoff))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("query expired price_history", e))?;

        Ok(ids.into_iter().map(|id| HistoryId(id.to_string())).collect())
    }

    async fn delete_history(&self, id: &HistoryId) -> Result<(), StoreError> {
        let key: i64 = id
            .0
            .parse()
            .map_err(|_| StoreError::Backend(format!("malformed history id '{}'", id)))?;

        PriceHistory::delete_by_id(key)
            .exec(&self.db)
            .await
            .map_err(|e| map_db_err("delete price_history", e))?;
        Ok(())
    }
}
