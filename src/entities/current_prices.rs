//! `SeaORM` Entity for the current_prices collection

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "current_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub series: String,
    pub capacity: String,
    /// color -> price
    #[sea_orm(column_type = "JsonBinary")]
    pub colors: Json,
    pub kaitori_price_min: i64,
    pub kaitori_price_max: i64,
    pub source: String,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
