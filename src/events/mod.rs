use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Events emitted by the reconciliation services, always after their unit
/// of work committed. Nothing inside a transaction publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockAdjustmentReconciled {
        adjustment_id: i64,
        processed: usize,
        skipped: usize,
    },
    InventoryAdjusted {
        product_id: i64,
        warehouse_id: i64,
        old_quantity: Decimal,
        new_quantity: Decimal,
        movement_id: i64,
        reference_number: Option<String>,
    },
    PurchaseOrderReceived {
        purchase_order_id: i64,
        invoice_id: i64,
        lines_received: usize,
    },
    VendorInvoiceUpserted {
        invoice_id: i64,
        vendor_id: i64,
        invoice_number: String,
        total_amount: Decimal,
    },
    InventoryReserved {
        product_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
    },
    InventoryReleased {
        product_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is gone.
    /// Reconciliation results are already committed by the time events go
    /// out, so a dead consumer must not fail the request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Consumes the event stream. Downstream integrations (webhooks, search
/// indexing) hang off this loop; today it records the stream in the log.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockAdjustmentReconciled {
                adjustment_id,
                processed,
                skipped,
            } => {
                info!(
                    adjustment_id,
                    processed, skipped, "stock adjustment reconciled"
                );
            }
            Event::InventoryAdjusted {
                product_id,
                warehouse_id,
                old_quantity,
                new_quantity,
                ..
            } => {
                info!(
                    product_id,
                    warehouse_id,
                    %old_quantity,
                    %new_quantity,
                    "inventory adjusted"
                );
            }
            Event::PurchaseOrderReceived {
                purchase_order_id,
                invoice_id,
                lines_received,
            } => {
                info!(
                    purchase_order_id,
                    invoice_id, lines_received, "purchase order received"
                );
            }
            Event::VendorInvoiceUpserted {
                invoice_id,
                vendor_id,
                invoice_number,
                total_amount,
            } => {
                info!(
                    invoice_id,
                    vendor_id,
                    %invoice_number,
                    %total_amount,
                    "vendor invoice upserted"
                );
            }
            Event::InventoryReserved {
                product_id,
                warehouse_id,
                quantity,
            } => {
                info!(product_id, warehouse_id, %quantity, "inventory reserved");
            }
            Event::InventoryReleased {
                product_id,
                warehouse_id,
                quantity,
            } => {
                info!(product_id, warehouse_id, %quantity, "inventory released");
            }
        }
    }

    info!("Event processing loop stopped");
}
