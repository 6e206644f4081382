use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};

/// Outcomes of the marketplace core. Everything except `Database` is an
/// expected result the caller can act on.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("{0} {1} not found")]
    NotFound(&'static str, Uuid),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("The bidding deadline has passed")]
    DeadlinePassed,

    #[error("Bid of {amount} must be higher than the current highest bid of {current_max}")]
    BidTooLow { amount: i64, current_max: i64 },

    #[error("An active offer already exists for this property")]
    DuplicateActive,

    #[error("Property {0} has already been closed")]
    AlreadyFinalized(Uuid),

    #[error("Property {0} has no active bids to select a winner from")]
    NoWinner(Uuid),

    #[error("Bidding on property {0} is not due to close")]
    NotDue(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MarketError {
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::NotFound(_, _) => "not_found",
            MarketError::InvalidState(_) => "invalid_state",
            MarketError::Unauthorized(_) => "unauthorized",
            MarketError::DeadlinePassed => "deadline_passed",
            MarketError::BidTooLow { .. } => "bid_too_low",
            MarketError::DuplicateActive => "duplicate_active",
            MarketError::AlreadyFinalized(_) => "already_finalized",
            MarketError::NoWinner(_) => "no_winner",
            MarketError::NotDue(_) => "not_due",
            MarketError::Validation(_) => "validation",
            MarketError::Database(_) => "internal",
        }
    }

    pub fn is_expected(&self) -> bool {
        !matches!(self, MarketError::Database(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketError::NotFound(_, _) => StatusCode::NOT_FOUND,

            MarketError::Unauthorized(_) => StatusCode::FORBIDDEN,

            MarketError::BidTooLow { .. }
            | MarketError::DuplicateActive
            | MarketError::AlreadyFinalized(_)
            | MarketError::NotDue(_) => StatusCode::CONFLICT,

            MarketError::InvalidState(_)
            | MarketError::DeadlinePassed
            | MarketError::NoWinner(_)
            | MarketError::Validation(_) => StatusCode::BAD_REQUEST,

            MarketError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MarketError> for HttpError {
    fn from(error: MarketError) -> Self {
        let kind = error.kind();
        let status = error.status_code();

        let message = if error.is_expected() {
            error.to_string()
        } else {
            tracing::error!("Marketplace failure: {}", error);
            ErrorMessage::ServerError.to_string()
        };

        HttpError::new(message, status).with_kind(kind)
    }
}
