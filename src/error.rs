use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{DraftError, TradeId};
use crate::engine::InsufficientHoldings;
use crate::ledger::LedgerError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidTrade(String),
    #[error(transparent)]
    InsufficientHoldings(#[from] InsufficientHoldings),
    #[error("trade {0} not found")]
    NotFound(TradeId),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        AppError::InvalidTrade(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => AppError::NotFound(id),
            LedgerError::Insufficient(err) => AppError::InsufficientHoldings(err),
            LedgerError::Store(err) => AppError::StoreUnavailable(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidTrade(_) | AppError::InsufficientHoldings(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "status": "FAILED",
            "data": { "error": self.to_string() },
        }));

        (status, body).into_response()
    }
}
