use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One reconciled count-correction line. `old_quantity` snapshots the
/// on-hand balance at reconciliation time and `new_quantity` the counted
/// value, independent of (but expected to agree with) the ledger delta
/// recorded for the same event.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustment_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub adjustment_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub old_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub new_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub shelf_number: Option<String>,
    pub pack_list: Option<String>,
    pub receiving_no: Option<String>,
    pub supplier: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_adjustments::Entity",
        from = "Column::AdjustmentId",
        to = "super::stock_adjustments::Column::Id"
    )]
    StockAdjustment,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id"
    )]
    Product,
}

impl Related<super::stock_adjustments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAdjustment.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
