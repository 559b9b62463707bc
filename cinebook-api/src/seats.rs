use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use cinebook_booking::{BookingConfirmation, Reservation};
use cinebook_core::{SeatRequest, ShowtimeLayout};

use crate::error::AppError;
use crate::middleware::{require_user, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SeatSelectionRequest {
    pub show_id: Uuid,
    #[serde(default)]
    pub seat_ids: Vec<Uuid>,
}

impl SeatSelectionRequest {
    fn for_user(self, user: AuthUser) -> SeatRequest {
        SeatRequest::new(self.show_id, user.user_id, self.seat_ids)
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/seats/showtime/reserve", post(reserve_seats))
        .route("/seats/showtime/book", post(book_seats))
        .route_layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/seats/showtime/{id}", get(seat_layout))
        .merge(protected)
}

async fn seat_layout(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<ShowtimeLayout>, AppError> {
    Ok(Json(state.engine.seat_layout(showtime_id).await?))
}

async fn reserve_seats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<SeatSelectionRequest>, AppError>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.engine.reserve(&req.for_user(user)).await?;
    Ok(Json(reservation))
}

async fn book_seats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<SeatSelectionRequest>, AppError>,
) -> Result<Json<BookingConfirmation>, AppError> {
    let confirmation = state.engine.book(&req.for_user(user)).await?;
    Ok(Json(confirmation))
}
