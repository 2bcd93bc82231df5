pub mod adjustments;
pub mod inventory;
pub mod receipts;

use axum::Router;

use crate::AppState;

/// Assembles the versioned API surface.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/stock-adjustments", adjustments::router())
        .nest("/purchase-orders", receipts::router())
        .nest("/inventory", inventory::router())
}
