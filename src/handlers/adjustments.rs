use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

use crate::{
    errors::ServiceError,
    services::stock_adjustments::{AdjustmentBatch, AdjustmentSummary},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(import_adjustments))
}

/// Reconcile a parsed count-correction batch against the ledger.
#[utoipa::path(
    post,
    path = "/api/v1/stock-adjustments",
    request_body = AdjustmentBatch,
    responses(
        (status = 200, description = "Batch reconciled; skipped rows are reported as warnings", body = AdjustmentSummary),
        (status = 400, description = "Unreadable document", body = crate::errors::ErrorResponse),
        (status = 404, description = "Missing reference", body = crate::errors::ErrorResponse),
    )
)]
pub async fn import_adjustments(
    State(state): State<AppState>,
    Json(batch): Json<AdjustmentBatch>,
) -> Result<Json<AdjustmentSummary>, ServiceError> {
    let summary = state.stock_adjustments.reconcile(batch).await?;
    Ok(Json(summary))
}
