//! Position: the derived per-ticker holdings aggregate.

use crate::domain::{Decimal, Ticker};
use serde::{Deserialize, Serialize};

/// Current holdings of one security: volume-weighted average cost and
/// quantity held.
///
/// A position only exists while quantity > 0. Selling a holding down to
/// exactly zero deletes the record instead of storing a zero row, so a
/// lookup returns `Option<Position>`, never a zero-quantity position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: Ticker,
    pub average_buy_price: Decimal,
    pub quantity: i64,
}

impl Position {
    pub fn new(ticker: Ticker, average_buy_price: Decimal, quantity: i64) -> Self {
        Position {
            ticker,
            average_buy_price,
            quantity,
        }
    }
}
