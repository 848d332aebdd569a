use axum::extract::State;
use axum::Json;

use super::envelope::Envelope;
use super::AppState;
use crate::domain::{Decimal, Position};
use crate::error::AppError;

pub async fn get_portfolio(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Position>>>, AppError> {
    let positions = state.reporter.portfolio().await?;
    Ok(Json(Envelope::ok(positions)))
}

pub async fn get_returns(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Decimal>>, AppError> {
    let returns = state.reporter.total_returns().await?;
    Ok(Json(Envelope::ok(returns)))
}
