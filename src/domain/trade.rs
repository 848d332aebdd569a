//! Trade types: the persisted ledger event, the validated draft it is
//! created from, and the partial patch applied on update.

use crate::domain::{Decimal, Side, Ticker, TradeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A persisted ledger event: one BUY or SELL of a security.
///
/// The id is assigned by the ledger store; the remaining fields are exactly
/// the wire shape (`type`, `ticker`, `price`, `quantity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    #[serde(rename = "type")]
    pub side: Side,
    pub ticker: Ticker,
    pub price: Decimal,
    pub quantity: i64,
}

impl Trade {
    /// The draft carrying this trade's effect, without the identity.
    pub fn draft(&self) -> TradeDraft {
        TradeDraft {
            side: self.side,
            ticker: self.ticker.clone(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

/// A validated trade candidate: what a trade contributes to a position,
/// before (or independent of) persistence.
///
/// Construction via [`TradeDraft::new`] is the only validation gate; a draft
/// always has a non-empty ticker, a positive price, and a positive quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeDraft {
    pub side: Side,
    pub ticker: Ticker,
    pub price: Decimal,
    pub quantity: i64,
}

impl TradeDraft {
    /// Validate the field invariants and build a draft.
    ///
    /// # Errors
    /// Returns a [`DraftError`] naming the first violated invariant.
    pub fn new(
        side: Side,
        ticker: Ticker,
        price: Decimal,
        quantity: i64,
    ) -> Result<Self, DraftError> {
        if ticker.is_empty() {
            return Err(DraftError::EmptyTicker);
        }
        if !price.is_positive() {
            return Err(DraftError::NonPositivePrice);
        }
        if quantity <= 0 {
            return Err(DraftError::NonPositiveQuantity);
        }
        Ok(TradeDraft {
            side,
            ticker,
            price,
            quantity,
        })
    }
}

/// Field-level validation failure for a trade candidate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DraftError {
    #[error("ticker must not be empty")]
    EmptyTicker,
    #[error("price must be a positive number")]
    NonPositivePrice,
    #[error("quantity must be a positive integer")]
    NonPositiveQuantity,
}

/// Partial update to a trade, as received on PATCH.
///
/// The merge is permissive: each field replaces the stored value only when
/// it is present and passes the same check as creation; absent or invalid
/// fields silently keep the stored value. `type` arrives as a raw string so
/// an unrecognized side is ignored rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradePatch {
    #[serde(rename = "type")]
    pub side: Option<String>,
    pub ticker: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
}

impl TradePatch {
    /// Merge this patch onto an existing trade, yielding the draft to apply.
    pub fn apply_to(&self, existing: &Trade) -> TradeDraft {
        let mut merged = existing.draft();

        if let Some(side) = self.side.as_deref().and_then(Side::from_wire) {
            merged.side = side;
        }
        if let Some(ticker) = self.ticker.as_deref().filter(|t| !t.is_empty()) {
            merged.ticker = Ticker::new(ticker);
        }
        if let Some(price) = self.price.filter(Decimal::is_positive) {
            merged.price = price;
        }
        if let Some(quantity) = self.quantity.filter(|q| *q > 0) {
            merged.quantity = quantity;
        }

        merged
    }

    /// True when no field would survive the merge.
    pub fn is_empty(&self) -> bool {
        self.side.is_none()
            && self.ticker.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
    }
}
