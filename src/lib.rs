//! Stockledger API Library
//!
//! Inventory ledger and reconciliation engine: per-warehouse, per-product
//! balances mutated only through an append-only movement ledger, fed by
//! spreadsheet stock-count imports and vendor-invoice receipts.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod filestore;
pub mod handlers;
pub mod migrator;
pub mod services;
pub mod tabular;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::services::{
    inventory_ledger::InventoryLedger,
    lookups::{ProductCatalogLookup, WarehouseDirectory},
    purchase_receipts::PurchaseReceiptService,
    stock_adjustments::StockAdjustmentService,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub ledger: Arc<InventoryLedger>,
    pub stock_adjustments: Arc<StockAdjustmentService>,
    pub purchase_receipts: Arc<PurchaseReceiptService>,
}

impl AppState {
    /// Wires the service graph over one connection pool. The ledger is the
    /// only component both reconcilers mutate quantities through.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let ledger = Arc::new(InventoryLedger::new(db.clone(), Some(event_sender.clone())));
        let catalog = ProductCatalogLookup::new(db.clone());
        let warehouses = WarehouseDirectory::new(db.clone(), config.fallback_warehouse_id);
        let file_store = Arc::new(filestore::LocalFileStore::new(config.upload_dir.clone()));

        let stock_adjustments = Arc::new(StockAdjustmentService::new(
            db.clone(),
            ledger.clone(),
            catalog,
            warehouses.clone(),
            Some(event_sender.clone()),
        ));
        let purchase_receipts = Arc::new(PurchaseReceiptService::new(
            db.clone(),
            ledger.clone(),
            warehouses,
            file_store,
            Some(event_sender.clone()),
        ));

        Self {
            db,
            config,
            event_sender,
            ledger,
            stock_adjustments,
            purchase_receipts,
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Builds the application router with tracing, CORS, and a request timeout.
pub fn app_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", handlers::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}
