use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::envelope::Envelope;
use super::AppState;
use crate::domain::{Decimal, Side, Ticker, Trade, TradeDraft, TradeId, TradePatch};
use crate::error::AppError;

const MISSING_KEYS: &str = "One of the following keys is missing or is empty in request body: \
     'type', 'ticker', 'price', 'quantity'";

/// Create request body. Fields are optional at the parse stage so missing
/// keys produce the contract's 400 message rather than a rejection from
/// the JSON extractor.
#[derive(Debug, Deserialize)]
pub struct CreateTradeBody {
    #[serde(rename = "type")]
    pub side: Option<String>,
    pub ticker: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
}

impl CreateTradeBody {
    /// Build a validated draft. Absent keys, empty tickers and zero
    /// price/quantity all count as missing; other invalid values get a
    /// field-specific message.
    fn into_draft(self) -> Result<TradeDraft, AppError> {
        let side = self.side.filter(|s| !s.is_empty());
        let ticker = self.ticker.filter(|t| !t.is_empty());
        let price = self.price.filter(|p| !p.is_zero());
        let quantity = self.quantity.filter(|q| *q != 0);

        let (side, ticker, price, quantity) = match (side, ticker, price, quantity) {
            (Some(side), Some(ticker), Some(price), Some(quantity)) => {
                (side, ticker, price, quantity)
            }
            _ => return Err(AppError::InvalidTrade(MISSING_KEYS.to_string())),
        };

        let side = Side::from_wire(&side)
            .ok_or_else(|| AppError::InvalidTrade("type must be BUY or SELL".to_string()))?;

        Ok(TradeDraft::new(side, Ticker::new(ticker), price, quantity)?)
    }
}

pub async fn list_trades(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Trade>>>, AppError> {
    let trades = state.coordinator.list_trades().await?;
    Ok(Json(Envelope::ok(trades)))
}

pub async fn get_trade(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Trade>>, AppError> {
    let trade = state.coordinator.get_trade(TradeId::new(id)).await?;
    Ok(Json(Envelope::ok(trade)))
}

pub async fn create_trade(
    State(state): State<AppState>,
    Json(body): Json<CreateTradeBody>,
) -> Result<(StatusCode, Json<Envelope<Trade>>), AppError> {
    let draft = body.into_draft()?;
    let trade = state.coordinator.create_trade(draft).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(trade))))
}

pub async fn update_trade(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(patch): Json<TradePatch>,
) -> Result<Json<Envelope<Trade>>, AppError> {
    let trade = state
        .coordinator
        .update_trade(TradeId::new(id), patch)
        .await?;
    Ok(Json(Envelope::ok(trade)))
}

pub async fn delete_trade(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.coordinator.delete_trade(TradeId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
