use std::sync::Arc;

use axum::{
    extract::Path,
    response::{IntoResponse, Response as AxumResponse},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    dtos::{
        propertydtos::{AlreadyClosedDto, ChangeListingModeDto},
        Response,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    service::{error::MarketError, finalization::CloseTrigger},
    AppState,
};

pub fn properties_handler() -> Router {
    Router::new()
        .route("/:property_id/end-bidding", post(end_bidding))
        .route("/:property_id/disable", put(disable_property))
        .route("/:property_id/enable", put(enable_property))
        .route("/:property_id/listing-mode", put(change_listing_mode))
        .route("/:property_id/deal", get(get_deal))
}

/// A second "end bidding" after the property closed is answered with the
/// deal that won, not an error.
pub async fn end_bidding(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(property_id): Path<Uuid>,
) -> Result<AxumResponse, HttpError> {
    let result = app_state
        .finalization
        .end_bidding(property_id, CloseTrigger::Owner(user.user_id))
        .await;

    match result {
        Ok(finalized) => Ok(Json(Response::success(finalized)).into_response()),
        Err(MarketError::AlreadyFinalized(_)) => {
            let deal = app_state.finalization.deal_for_property(property_id).await?;
            Ok(Json(AlreadyClosedDto {
                status: "already_closed",
                message: "Property has already been closed".to_string(),
                deal,
            })
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn disable_property(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(property_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state
        .listing_service
        .disable_property(property_id, user.user_id)
        .await?;

    Ok(Json(Response::success(outcome)))
}

pub async fn enable_property(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(property_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let property = app_state
        .listing_service
        .enable_property(property_id, user.user_id, Utc::now())
        .await?;

    Ok(Json(Response::success(property)))
}

pub async fn change_listing_mode(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(property_id): Path<Uuid>,
    Json(body): Json<ChangeListingModeDto>,
) -> Result<impl IntoResponse, HttpError> {
    let property = app_state
        .listing_service
        .change_listing_mode(
            property_id,
            user.user_id,
            body.listing_mode,
            body.bidding_deadline,
            Utc::now(),
        )
        .await?;

    Ok(Json(Response::success(property)))
}

pub async fn get_deal(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let deal = app_state
        .finalization
        .deal_for_property(property_id)
        .await?
        .ok_or_else(|| {
            HttpError::not_found(format!("No deal recorded for property {}", property_id))
                .with_kind("not_found")
        })?;

    Ok(Json(Response::success(deal)))
}
