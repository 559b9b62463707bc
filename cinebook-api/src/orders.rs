use axum::{extract::State, middleware, routing::get, Extension, Json, Router};

use cinebook_core::OrderSummary;

use crate::error::AppError;
use crate::middleware::{require_user, AuthUser};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    Ok(Json(state.engine.list_orders(user.user_id).await?))
}
