use std::sync::Arc;

use axum::{extract::Path, response::IntoResponse, routing::post, Extension, Json, Router};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        offerdtos::{RankedBidsDto, SubmitBidDto},
        Response,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

// `:id` is the property for POST/GET and the bid for DELETE
pub fn bids_handler() -> Router {
    Router::new().route(
        "/:id",
        post(submit_bid).get(get_ranked_bids).delete(remove_bid),
    )
}

pub async fn submit_bid(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(property_id): Path<Uuid>,
    Json(body): Json<SubmitBidDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()).with_kind("validation"))?;

    let placement = app_state
        .offer_ledger
        .submit_bid(property_id, user.user_id, body.amount, Utc::now())
        .await?;

    Ok(Json(Response::success(placement)))
}

pub async fn get_ranked_bids(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let bids = app_state.offer_ledger.ranked_bids(property_id).await?;

    Ok(Json(Response::success(RankedBidsDto {
        property_id,
        results: bids.len(),
        bids,
    })))
}

pub async fn remove_bid(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Path(bid_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let bid = app_state.offer_ledger.remove_bid(bid_id, user.user_id).await?;

    Ok(Json(Response::success(bid)))
}
