use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    entities::{
        purchase_order_items::{self, Entity as PurchaseOrderItems},
        purchase_orders::{self, Entity as PurchaseOrders},
        stock_movements::{MovementType, SourceDocument},
        vendor_invoices::{self, Entity as VendorInvoices},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    filestore::{FileStore, INVOICE_EXTENSIONS},
    services::{
        inventory_ledger::{InventoryLedger, MovementDraft, MovementMetadata},
        lookups::WarehouseDirectory,
    },
};

/// One invoice line asserted against an open purchase order.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReceiptLine {
    pub purchase_order_item_id: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Target warehouse; absent means the default warehouse.
    pub warehouse_id: Option<i64>,
    pub shelf_number: Option<String>,
    pub pack_list: Option<String>,
    pub receiving_date: Option<NaiveDate>,
}

/// Invoice header fields accompanying a receipt.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InvoiceDetails {
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub description: Option<String>,
}

/// An uploaded invoice document.
#[derive(Debug, Clone)]
pub struct InvoiceAttachment {
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// Outcome of one reconciled receipt.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReceiptSummary {
    pub invoice_id: i64,
    pub lines_received: usize,
    pub total_amount: Decimal,
}

/// Ordered-versus-received rollup for a purchase order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReceiptStatus {
    pub purchase_order_id: i64,
    pub total_ordered: Decimal,
    pub total_received: Decimal,
    /// Negative when more was received than ordered; receipts are not
    /// clamped against the ordered quantity.
    pub remaining: Decimal,
    pub status: String,
}

/// Reconciles vendor-invoice lines against a purchase order: bumps the
/// cumulative received counters, records one PurchaseReceive movement per
/// line, and upserts the vendor invoice, all in one unit of work.
#[derive(Clone)]
pub struct PurchaseReceiptService {
    db: Arc<DatabaseConnection>,
    ledger: Arc<InventoryLedger>,
    warehouses: WarehouseDirectory,
    file_store: Arc<dyn FileStore>,
    event_sender: Option<EventSender>,
}

impl PurchaseReceiptService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: Arc<InventoryLedger>,
        warehouses: WarehouseDirectory,
        file_store: Arc<dyn FileStore>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            ledger,
            warehouses,
            file_store,
            event_sender,
        }
    }

    /// Runs one receipt. Lines with zero or negative quantity are ignored
    /// entirely. An unknown purchase order or line id aborts with nothing
    /// persisted. The attachment, when present, is written to the file
    /// store before the transaction opens and removed again (best effort)
    /// if the commit never happens.
    #[instrument(skip(self, invoice, lines, attachment), fields(
        purchase_order_id,
        invoice_number = %invoice.invoice_number,
        lines = lines.len(),
    ))]
    pub async fn reconcile_receipt(
        &self,
        purchase_order_id: i64,
        invoice: InvoiceDetails,
        lines: Vec<ReceiptLine>,
        attachment: Option<InvoiceAttachment>,
    ) -> Result<ReceiptSummary, ServiceError> {
        let order = PurchaseOrders::find_by_id(purchase_order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ReferenceNotFound(format!(
                    "Purchase order {} not found",
                    purchase_order_id
                ))
            })?;

        let needs_default = lines
            .iter()
            .any(|l| l.quantity > Decimal::ZERO && l.warehouse_id.is_none());
        let default_warehouse = if needs_default {
            Some(self.warehouses.default_warehouse_id().await?.ok_or_else(
                || {
                    ServiceError::ReferenceNotFound(
                        "No default warehouse is configured or active".to_string(),
                    )
                },
            )?)
        } else {
            None
        };

        let total_amount: Decimal = lines
            .iter()
            .filter(|l| l.quantity > Decimal::ZERO)
            .map(|l| l.quantity * l.unit_price)
            .sum();

        let stored_path = match &attachment {
            Some(upload) => Some(
                self.file_store
                    .store(&upload.bytes, &upload.extension, INVOICE_EXTENSIONS)
                    .await?,
            ),
            None => None,
        };

        let outcome = self
            .reconcile_in_transaction(
                &order,
                &invoice,
                &lines,
                default_warehouse,
                total_amount,
                stored_path.as_deref(),
            )
            .await;

        let (invoice_id, lines_received) = match outcome {
            Ok(result) => result,
            Err(err) => {
                if let Some(path) = &stored_path {
                    // The commit never happened; don't leave the file behind.
                    let _ = self.file_store.remove(path).await;
                }
                return Err(err);
            }
        };

        info!(
            purchase_order_id,
            invoice_id, lines_received, %total_amount, "purchase receipt reconciled"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderReceived {
                    purchase_order_id,
                    invoice_id,
                    lines_received,
                })
                .await;
            sender
                .send_or_log(Event::VendorInvoiceUpserted {
                    invoice_id,
                    vendor_id: order.vendor_id,
                    invoice_number: invoice.invoice_number.clone(),
                    total_amount,
                })
                .await;
        }

        Ok(ReceiptSummary {
            invoice_id,
            lines_received,
            total_amount,
        })
    }

    async fn reconcile_in_transaction(
        &self,
        order: &purchase_orders::Model,
        invoice: &InvoiceDetails,
        lines: &[ReceiptLine],
        default_warehouse: Option<i64>,
        total_amount: Decimal,
        stored_path: Option<&str>,
    ) -> Result<(i64, usize), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let invoice_row = self
            .upsert_invoice(&txn, order.vendor_id, invoice, total_amount, stored_path)
            .await?;

        let mut lines_received = 0usize;
        for line in lines {
            if line.quantity <= Decimal::ZERO {
                continue;
            }

            let po_item = PurchaseOrderItems::find_by_id(line.purchase_order_item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::ReferenceNotFound(format!(
                        "Purchase order item {} not found",
                        line.purchase_order_item_id
                    ))
                })?;
            if po_item.purchase_order_id != order.id {
                return Err(ServiceError::ReferenceNotFound(format!(
                    "Purchase order item {} does not belong to order {}",
                    po_item.id, order.id
                )));
            }

            let warehouse_id = match (line.warehouse_id, default_warehouse) {
                (Some(id), _) => id,
                (None, Some(default)) => default,
                // Unreachable: the caller resolves the default whenever a
                // positive line omits its warehouse.
                (None, None) => {
                    return Err(ServiceError::InternalError(
                        "Default warehouse was not resolved".to_string(),
                    ))
                }
            };

            let received = po_item.received_quantity + line.quantity;
            let mut active: purchase_order_items::ActiveModel = po_item.clone().into();
            active.received_quantity = Set(received);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;

            let occurred_at = line
                .receiving_date
                .unwrap_or(invoice.invoice_date)
                .and_time(NaiveTime::MIN)
                .and_utc();

            self.ledger
                .apply_movement(
                    &txn,
                    MovementDraft {
                        product_id: po_item.product_id,
                        warehouse_id,
                        movement_type: MovementType::PurchaseReceive,
                        delta_on_hand: line.quantity,
                        delta_reserved: Decimal::ZERO,
                        source: SourceDocument::VendorInvoice(invoice_row.id),
                        reference_no: Some(invoice.invoice_number.clone()),
                        occurred_at,
                        metadata: MovementMetadata {
                            shelf_number: line.shelf_number.clone(),
                            pack_list: line.pack_list.clone(),
                            supplier: None,
                        },
                    },
                )
                .await?;

            lines_received += 1;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        Ok((invoice_row.id, lines_received))
    }

    /// Creates or refreshes the invoice row for (vendor, invoice number).
    /// The file path is only touched when a new attachment was stored; an
    /// existing path is never cleared.
    async fn upsert_invoice(
        &self,
        txn: &DatabaseTransaction,
        vendor_id: i64,
        invoice: &InvoiceDetails,
        total_amount: Decimal,
        stored_path: Option<&str>,
    ) -> Result<vendor_invoices::Model, ServiceError> {
        let existing = VendorInvoices::find()
            .filter(vendor_invoices::Column::VendorId.eq(vendor_id))
            .filter(vendor_invoices::Column::InvoiceNumber.eq(invoice.invoice_number.clone()))
            .one(txn)
            .await?;

        let row = match existing {
            Some(found) => {
                let mut active: vendor_invoices::ActiveModel = found.into();
                active.invoice_date = Set(invoice.invoice_date);
                active.description = Set(invoice.description.clone());
                active.total_amount = Set(total_amount);
                if let Some(path) = stored_path {
                    active.file_path = Set(Some(path.to_string()));
                }
                active.updated_at = Set(Utc::now());
                active.update(txn).await?
            }
            None => {
                let now = Utc::now();
                vendor_invoices::ActiveModel {
                    vendor_id: Set(vendor_id),
                    invoice_number: Set(invoice.invoice_number.clone()),
                    invoice_date: Set(invoice.invoice_date),
                    description: Set(invoice.description.clone()),
                    total_amount: Set(total_amount),
                    file_path: Set(stored_path.map(|p| p.to_string())),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?
            }
        };

        Ok(row)
    }

    /// Ordered-versus-received rollup across all lines of an order.
    #[instrument(skip(self))]
    pub async fn receipt_status(
        &self,
        purchase_order_id: i64,
    ) -> Result<ReceiptStatus, ServiceError> {
        let order = PurchaseOrders::find_by_id(purchase_order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ReferenceNotFound(format!(
                    "Purchase order {} not found",
                    purchase_order_id
                ))
            })?;

        let items = PurchaseOrderItems::find()
            .filter(purchase_order_items::Column::PurchaseOrderId.eq(order.id))
            .all(&*self.db)
            .await?;

        let mut total_ordered = Decimal::ZERO;
        let mut total_received = Decimal::ZERO;
        for item in &items {
            total_ordered += item.ordered_quantity;
            total_received += item.received_quantity;
        }

        let status = if total_received == Decimal::ZERO {
            "NOT_RECEIVED"
        } else if total_received < total_ordered {
            "PARTIALLY_RECEIVED"
        } else {
            "FULLY_RECEIVED"
        };

        if total_received > total_ordered {
            warn!(
                purchase_order_id,
                %total_ordered,
                %total_received,
                "received more than ordered"
            );
        }

        Ok(ReceiptStatus {
            purchase_order_id: order.id,
            total_ordered,
            total_received,
            remaining: total_ordered - total_received,
            status: status.to_string(),
        })
    }
}
