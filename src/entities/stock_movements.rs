use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Kinds of quantity movements the ledger records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Adjustment,
    PurchaseReceive,
    Reserve,
    Release,
}

/// Closed reference to the document a movement originated from. The type
/// tag written to the row is fixed per variant, so a movement can never
/// point at a misspelled document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceDocument {
    StockAdjustment(i64),
    VendorInvoice(i64),
    PurchaseOrder(i64),
}

impl SourceDocument {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StockAdjustment(_) => "STOCK_ADJUSTMENT",
            Self::VendorInvoice(_) => "VENDOR_INVOICE",
            Self::PurchaseOrder(_) => "PURCHASE_ORDER",
        }
    }

    pub fn document_id(&self) -> i64 {
        match self {
            Self::StockAdjustment(id) | Self::VendorInvoice(id) | Self::PurchaseOrder(id) => *id,
        }
    }
}

/// Append-only ledger row. One row per quantity change, carrying the full
/// before/after snapshot for both axes. `after = before + delta` holds for
/// every row, forever; nothing updates or deletes these.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub movement_type: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub delta_on_hand: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub delta_reserved: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub before_on_hand: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub after_on_hand: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub before_reserved: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub after_reserved: Decimal,
    pub source_document_type: String,
    pub source_document_id: i64,
    pub reference_no: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub shelf_number: Option<String>,
    pub pack_list: Option<String>,
    pub supplier: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn movement_type(&self) -> Option<MovementType> {
        self.movement_type.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
