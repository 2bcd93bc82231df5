use axum::{
    extract::{Json, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entities::stock_movements::{self, SourceDocument},
    errors::ServiceError,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(get_balance))
        .route("/movements", get(list_movements))
        .route("/reserve", post(reserve_inventory))
        .route("/release", post(release_inventory))
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct BalanceQuery {
    pub product_id: i64,
    pub warehouse_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity_on_hand: Decimal,
    pub quantity_reserved: Decimal,
    pub quantity_available: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shelf_number: Option<String>,
}

/// Balance for one (product, warehouse) pair. A pair with no movements yet
/// reads as zero on both axes, matching the ledger's view.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/balance",
    params(BalanceQuery),
    responses((status = 200, description = "Current balance", body = BalanceResponse))
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, ServiceError> {
    let item = state
        .ledger
        .balance(query.product_id, query.warehouse_id)
        .await?;

    let response = match item {
        Some(item) => BalanceResponse {
            product_id: item.product_id,
            warehouse_id: item.warehouse_id,
            quantity_on_hand: item.quantity_on_hand,
            quantity_reserved: item.quantity_reserved,
            quantity_available: item.quantity_available(),
            shelf_number: item.shelf_number,
        },
        None => BalanceResponse {
            product_id: query.product_id,
            warehouse_id: query.warehouse_id,
            quantity_on_hand: Decimal::ZERO,
            quantity_reserved: Decimal::ZERO,
            quantity_available: Decimal::ZERO,
            shelf_number: None,
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct MovementQuery {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementResponse {
    pub id: i64,
    pub movement_type: String,
    pub delta_on_hand: Decimal,
    pub delta_reserved: Decimal,
    pub before_on_hand: Decimal,
    pub after_on_hand: Decimal,
    pub before_reserved: Decimal,
    pub after_reserved: Decimal,
    pub source_document_type: String,
    pub source_document_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_no: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shelf_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
}

impl From<stock_movements::Model> for MovementResponse {
    fn from(m: stock_movements::Model) -> Self {
        Self {
            id: m.id,
            movement_type: m.movement_type,
            delta_on_hand: m.delta_on_hand,
            delta_reserved: m.delta_reserved,
            before_on_hand: m.before_on_hand,
            after_on_hand: m.after_on_hand,
            before_reserved: m.before_reserved,
            after_reserved: m.after_reserved,
            source_document_type: m.source_document_type,
            source_document_id: m.source_document_id,
            reference_no: m.reference_no,
            occurred_at: m.occurred_at,
            shelf_number: m.shelf_number,
            pack_list: m.pack_list,
            supplier: m.supplier,
        }
    }
}

/// Recent ledger rows for a pair, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/movements",
    params(MovementQuery),
    responses((status = 200, description = "Movement history", body = [MovementResponse]))
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> Result<Json<Vec<MovementResponse>>, ServiceError> {
    let movements = state
        .ledger
        .movement_history(
            query.product_id,
            query.warehouse_id,
            query.limit.unwrap_or(50),
        )
        .await?;

    Ok(Json(movements.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReservationRequest {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: Decimal,
    /// Order the reservation is earmarked against.
    pub purchase_order_id: i64,
    pub reference_no: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationResponse {
    pub movement_id: i64,
    pub after_on_hand: Decimal,
    pub after_reserved: Decimal,
}

/// Earmark on-hand quantity against an order.
#[utoipa::path(
    post,
    path = "/api/v1/inventory/reserve",
    request_body = ReservationRequest,
    responses((status = 200, description = "Quantity reserved", body = ReservationResponse))
)]
pub async fn reserve_inventory(
    State(state): State<AppState>,
    Json(request): Json<ReservationRequest>,
) -> Result<Json<ReservationResponse>, ServiceError> {
    let applied = state
        .ledger
        .reserve(
            request.product_id,
            request.warehouse_id,
            request.quantity,
            SourceDocument::PurchaseOrder(request.purchase_order_id),
            request.reference_no,
        )
        .await?;

    Ok(Json(ReservationResponse {
        movement_id: applied.movement_id,
        after_on_hand: applied.after_on_hand,
        after_reserved: applied.after_reserved,
    }))
}

/// Release previously reserved quantity.
#[utoipa::path(
    post,
    path = "/api/v1/inventory/release",
    request_body = ReservationRequest,
    responses((status = 200, description = "Quantity released", body = ReservationResponse))
)]
pub async fn release_inventory(
    State(state): State<AppState>,
    Json(request): Json<ReservationRequest>,
) -> Result<Json<ReservationResponse>, ServiceError> {
    let applied = state
        .ledger
        .release(
            request.product_id,
            request.warehouse_id,
            request.quantity,
            SourceDocument::PurchaseOrder(request.purchase_order_id),
            request.reference_no,
        )
        .await?;

    Ok(Json(ReservationResponse {
        movement_id: applied.movement_id,
        after_on_hand: applied.after_on_hand,
        after_reserved: applied.after_reserved,
    }))
}
