use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    entities::{
        stock_adjustment_items, stock_adjustments,
        stock_movements::{MovementType, SourceDocument},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory_ledger::{InventoryLedger, MovementDraft, MovementMetadata},
        lookups::{normalize_label, normalize_sku, ProductCatalogLookup, WarehouseDirectory},
    },
    tabular::{AdjustmentRow, TabularRowReader},
};

/// One count-correction batch: header fields plus parsed rows, in file
/// order.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdjustmentBatch {
    pub adjustment_date: NaiveDate,
    pub description: Option<String>,
    pub rows: Vec<AdjustmentRow>,
}

/// Soft per-row problem. Collected into the batch result, never raised.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RowWarning {
    /// 1-based row number in the source file.
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
    pub reason: String,
}

/// Batch outcome: what was applied, what was skipped, and why.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdjustmentSummary {
    pub adjustment_id: i64,
    pub processed: usize,
    pub skipped: usize,
    pub warnings: Vec<RowWarning>,
}

/// Reconciles a spreadsheet count against the ledger: resolves references
/// up front, applies each row as an absolute-target adjustment, and commits
/// header, lines, and movements as one unit of work.
#[derive(Clone)]
pub struct StockAdjustmentService {
    db: Arc<DatabaseConnection>,
    ledger: Arc<InventoryLedger>,
    catalog: ProductCatalogLookup,
    warehouses: WarehouseDirectory,
    event_sender: Option<EventSender>,
}

impl StockAdjustmentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: Arc<InventoryLedger>,
        catalog: ProductCatalogLookup,
        warehouses: WarehouseDirectory,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            ledger,
            catalog,
            warehouses,
            event_sender,
        }
    }

    /// Parses an uploaded workbook through the given reader and reconciles
    /// the resulting batch. An unreadable document aborts before any
    /// persistence.
    #[instrument(skip(self, reader, bytes), fields(size = bytes.len()))]
    pub async fn reconcile_document(
        &self,
        reader: &dyn TabularRowReader,
        adjustment_date: NaiveDate,
        description: Option<String>,
        bytes: &[u8],
    ) -> Result<AdjustmentSummary, ServiceError> {
        let rows = reader.parse(bytes)?;
        self.reconcile(AdjustmentBatch {
            adjustment_date,
            description,
            rows,
        })
        .await
    }

    /// Runs one batch. A row with an unknown SKU is skipped with a warning
    /// and the batch continues; a row with an unknown warehouse label falls
    /// back to the default warehouse with a warning. Anything harder than
    /// that aborts the batch with nothing persisted, the header included.
    #[instrument(skip(self, batch), fields(rows = batch.rows.len()))]
    pub async fn reconcile(
        &self,
        batch: AdjustmentBatch,
    ) -> Result<AdjustmentSummary, ServiceError> {
        // Resolve every reference once, before any row work.
        let skus: HashSet<String> = batch
            .rows
            .iter()
            .map(|r| normalize_sku(&r.product_code))
            .filter(|s| !s.is_empty())
            .collect();
        let products = self.catalog.resolve_by_sku(&skus).await?;

        let labels: HashSet<String> = batch
            .rows
            .iter()
            .filter_map(|r| r.warehouse_label.as_deref())
            .map(normalize_label)
            .filter(|l| !l.is_empty())
            .collect();
        let warehouses = self.warehouses.resolve_by_name_or_code(&labels).await?;

        let default_warehouse = self.warehouses.default_warehouse_id().await?;

        let occurred_at = batch
            .adjustment_date
            .and_time(NaiveTime::MIN)
            .and_utc();

        let mut warnings = Vec::new();
        let mut processed = 0usize;
        let mut skipped = 0usize;
        let mut adjusted_events = Vec::new();

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let now = Utc::now();
        let header = stock_adjustments::ActiveModel {
            adjustment_date: Set(batch.adjustment_date),
            description: Set(batch.description.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (index, row) in batch.rows.iter().enumerate() {
            let row_number = index + 1;

            let sku = normalize_sku(&row.product_code);
            let Some(product) = products.get(&sku) else {
                warn!(row = row_number, sku = %sku, "unknown product code, skipping row");
                warnings.push(RowWarning {
                    row: row_number,
                    product_code: Some(row.product_code.clone()),
                    reason: "Product not found.".to_string(),
                });
                skipped += 1;
                continue;
            };

            let warehouse_id = match row.warehouse_label.as_deref() {
                Some(label) if !normalize_label(label).is_empty() => {
                    match warehouses.get(&normalize_label(label)) {
                        Some(id) => *id,
                        None => {
                            warnings.push(RowWarning {
                                row: row_number,
                                product_code: Some(row.product_code.clone()),
                                reason: format!(
                                    "Warehouse '{}' not found; default warehouse used.",
                                    label
                                ),
                            });
                            self.require_default(default_warehouse)?
                        }
                    }
                }
                _ => self.require_default(default_warehouse)?,
            };

            // The ledger contract is delta-based; the counted quantity is an
            // absolute target, so read the current balance first.
            let old_quantity = self
                .ledger
                .current_on_hand(&txn, product.id, warehouse_id)
                .await?;
            let delta = row.quantity - old_quantity;

            let applied = self
                .ledger
                .apply_movement(
                    &txn,
                    MovementDraft {
                        product_id: product.id,
                        warehouse_id,
                        movement_type: MovementType::Adjustment,
                        delta_on_hand: delta,
                        delta_reserved: Decimal::ZERO,
                        source: SourceDocument::StockAdjustment(header.id),
                        reference_no: row.receiving_no.clone(),
                        occurred_at,
                        metadata: MovementMetadata {
                            shelf_number: row.shelf_number.clone(),
                            pack_list: row.pack_list.clone(),
                            supplier: row.supplier.clone(),
                        },
                    },
                )
                .await?;

            stock_adjustment_items::ActiveModel {
                adjustment_id: Set(header.id),
                product_id: Set(product.id),
                warehouse_id: Set(warehouse_id),
                old_quantity: Set(old_quantity),
                new_quantity: Set(row.quantity),
                price: Set(row.price),
                currency: Set(row.currency.clone()),
                shelf_number: Set(row.shelf_number.clone()),
                pack_list: Set(row.pack_list.clone()),
                receiving_no: Set(row.receiving_no.clone()),
                supplier: Set(row.supplier.clone()),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            adjusted_events.push(Event::InventoryAdjusted {
                product_id: product.id,
                warehouse_id,
                old_quantity,
                new_quantity: row.quantity,
                movement_id: applied.movement_id,
                reference_number: row.receiving_no.clone(),
            });
            processed += 1;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            adjustment_id = header.id,
            processed, skipped, "stock adjustment batch reconciled"
        );

        if let Some(sender) = &self.event_sender {
            for event in adjusted_events {
                sender.send_or_log(event).await;
            }
            sender
                .send_or_log(Event::StockAdjustmentReconciled {
                    adjustment_id: header.id,
                    processed,
                    skipped,
                })
                .await;
        }

        Ok(AdjustmentSummary {
            adjustment_id: header.id,
            processed,
            skipped,
            warnings,
        })
    }

    fn require_default(&self, default_warehouse: Option<i64>) -> Result<i64, ServiceError> {
        default_warehouse.ok_or_else(|| {
            ServiceError::ReferenceNotFound(
                "No default warehouse is configured or active".to_string(),
            )
        })
    }
}
