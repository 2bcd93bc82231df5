#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use std::sync::Arc;
use uuid::Uuid;

use stockledger_api::{
    db,
    entities::{products, purchase_order_items, purchase_orders, vendors, warehouses},
    filestore::LocalFileStore,
    services::{
        inventory_ledger::InventoryLedger,
        lookups::{ProductCatalogLookup, WarehouseDirectory},
        purchase_receipts::PurchaseReceiptService,
        stock_adjustments::StockAdjustmentService,
    },
};

/// Fresh in-memory database, one per test, migrated through the real
/// migrator. The named shared-cache URL keeps every pooled connection on
/// the same database.
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let url = format!(
        "sqlite:file:{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let pool = db::establish_connection(&url)
        .await
        .expect("Failed to create test DB pool");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Arc::new(pool)
}

pub fn dec(value: i64) -> Decimal {
    Decimal::new(value * 10_000, 4)
}

pub fn ledger(db: &Arc<DatabaseConnection>) -> Arc<InventoryLedger> {
    Arc::new(InventoryLedger::new(db.clone(), None))
}

pub fn adjustment_service(db: &Arc<DatabaseConnection>) -> StockAdjustmentService {
    StockAdjustmentService::new(
        db.clone(),
        ledger(db),
        ProductCatalogLookup::new(db.clone()),
        WarehouseDirectory::new(db.clone(), None),
        None,
    )
}

pub fn receipt_service(
    db: &Arc<DatabaseConnection>,
    upload_root: &std::path::Path,
) -> PurchaseReceiptService {
    PurchaseReceiptService::new(
        db.clone(),
        ledger(db),
        WarehouseDirectory::new(db.clone(), None),
        Arc::new(LocalFileStore::new(upload_root)),
        None,
    )
}

pub async fn create_product(db: &DatabaseConnection, sku: &str, name: &str) -> products::Model {
    let now = Utc::now();
    products::ActiveModel {
        sku: Set(sku.to_string()),
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create product")
}

pub async fn create_warehouse(
    db: &DatabaseConnection,
    code: &str,
    name: &str,
    is_default: bool,
    is_active: bool,
) -> warehouses::Model {
    let now = Utc::now();
    warehouses::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        is_default: Set(is_default),
        is_active: Set(is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create warehouse")
}

pub async fn create_vendor(db: &DatabaseConnection, name: &str) -> vendors::Model {
    let now = Utc::now();
    vendors::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create vendor")
}

pub async fn create_purchase_order(
    db: &DatabaseConnection,
    vendor_id: i64,
) -> purchase_orders::Model {
    let now = Utc::now();
    purchase_orders::ActiveModel {
        vendor_id: Set(vendor_id),
        order_number: Set(format!("PO-{}", Uuid::new_v4().simple())),
        order_date: Set(now.date_naive()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create purchase order")
}

pub async fn create_po_item(
    db: &DatabaseConnection,
    purchase_order_id: i64,
    product_id: i64,
    ordered: i64,
    received: i64,
    unit_price: i64,
) -> purchase_order_items::Model {
    let now = Utc::now();
    purchase_order_items::ActiveModel {
        purchase_order_id: Set(purchase_order_id),
        product_id: Set(product_id),
        ordered_quantity: Set(dec(ordered)),
        received_quantity: Set(dec(received)),
        unit_price: Set(dec(unit_price)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create purchase order item")
}
