//! SeaORM Entity for append-only price history

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "price_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub series: String,
    pub capacity: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub colors: Json,
    pub kaitori_price_min: i64,
    pub kaitori_price_max: i64,
    pub source: String,
    /// Epoch seconds of the cycle that wrote the record
    pub timestamp: i64,
    pub date: Date,
    /// Advisory TTL, epoch seconds
    pub expiration_time: i64,
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
