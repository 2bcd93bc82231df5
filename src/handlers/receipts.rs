use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    services::purchase_receipts::{
        InvoiceAttachment, InvoiceDetails, ReceiptLine, ReceiptStatus, ReceiptSummary,
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/receipts", post(receive_invoice))
        .route("/:id/receipt-status", get(receipt_status))
}

/// Invoice document uploaded alongside the receipt, base64-encoded.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachmentUpload {
    pub extension: String,
    pub content_base64: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReceiveInvoiceRequest {
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub description: Option<String>,
    pub lines: Vec<ReceiptLine>,
    pub attachment: Option<AttachmentUpload>,
}

/// Reconcile vendor-invoice lines against a purchase order.
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/receipts",
    params(("id" = i64, Path, description = "Purchase order id")),
    request_body = ReceiveInvoiceRequest,
    responses(
        (status = 200, description = "Receipt reconciled", body = ReceiptSummary),
        (status = 404, description = "Unknown purchase order or line", body = crate::errors::ErrorResponse),
    )
)]
pub async fn receive_invoice(
    State(state): State<AppState>,
    Path(purchase_order_id): Path<i64>,
    Json(request): Json<ReceiveInvoiceRequest>,
) -> Result<Json<ReceiptSummary>, ServiceError> {
    let attachment = match request.attachment {
        Some(upload) => {
            let bytes = STANDARD.decode(upload.content_base64.as_bytes()).map_err(|e| {
                ServiceError::InvalidInput(format!("Attachment is not valid base64: {}", e))
            })?;
            Some(InvoiceAttachment {
                bytes,
                extension: upload.extension,
            })
        }
        None => None,
    };

    let summary = state
        .purchase_receipts
        .reconcile_receipt(
            purchase_order_id,
            InvoiceDetails {
                invoice_number: request.invoice_number,
                invoice_date: request.invoice_date,
                description: request.description,
            },
            request.lines,
            attachment,
        )
        .await?;

    Ok(Json(summary))
}

/// Ordered-versus-received rollup for a purchase order.
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}/receipt-status",
    params(("id" = i64, Path, description = "Purchase order id")),
    responses(
        (status = 200, description = "Receipt status", body = ReceiptStatus),
        (status = 404, description = "Unknown purchase order", body = crate::errors::ErrorResponse),
    )
)]
pub async fn receipt_status(
    State(state): State<AppState>,
    Path(purchase_order_id): Path<i64>,
) -> Result<Json<ReceiptStatus>, ServiceError> {
    let status = state
        .purchase_receipts
        .receipt_status(purchase_order_id)
        .await?;
    Ok(Json(status))
}
