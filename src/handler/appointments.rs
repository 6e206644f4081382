use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    dtos::{offerdtos::AdvanceAppointmentDto, Response},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn appointments_handler() -> Router {
    Router::new()
        .route("/advance", put(advance_appointment))
        // property id for POST, appointment id for DELETE
        .route("/:id", post(request_appointment).delete(cancel_appointment))
        .route("/property/:property_id", get(get_property_appointments))
}

pub async fn request_appointment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(property_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .offer_ledger
        .request_appointment(property_id, user.user_id, Utc::now())
        .await?;

    Ok(Json(Response::success(request)))
}

pub async fn advance_appointment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<AdvanceAppointmentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state
        .offer_ledger
        .advance_appointment(body.appointment_id, user.user_id, Utc::now())
        .await?;

    Ok(Json(Response::success(outcome)))
}

pub async fn cancel_appointment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let appointment = app_state
        .offer_ledger
        .cancel_appointment(appointment_id, user.user_id, Utc::now())
        .await?;

    Ok(Json(Response::success(appointment)))
}

pub async fn get_property_appointments(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(property_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let appointments = app_state
        .offer_ledger
        .property_appointments(property_id, user.user_id)
        .await?;

    Ok(Json(Response::success(appointments)))
}
