//! Pure position engine: how one trade mutates one position, and how that
//! mutation is undone.
//!
//! No I/O. The ledger coordinator owns reading and writing the stores; this
//! module only computes the next position value.

use crate::domain::{Decimal, Position, Ticker, TradeDraft};
use thiserror::Error;

/// A sell that exceeds what is currently held. Rejected before any mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("insufficient holdings for {ticker}: held {held}, requested {requested}")]
pub struct InsufficientHoldings {
    pub ticker: Ticker,
    pub held: i64,
    pub requested: i64,
}

/// Compute the position resulting from applying `trade` to `current`.
///
/// `None` in means no position is held for the ticker; `None` out means the
/// position record must be deleted (quantity reached exactly zero).
///
/// - BUY with no position opens one at the trade's price.
/// - BUY onto a position moves the average to the volume-weighted mean of
///   the old holding and the new lot.
/// - SELL of the full quantity deletes the position; the average price is
///   not preserved anywhere.
/// - Partial SELL reduces quantity and leaves the average cost untouched.
///
/// # Errors
/// Returns [`InsufficientHoldings`] when a sell exceeds the held quantity
/// (including selling a ticker with no position at all).
pub fn apply_trade(
    current: Option<&Position>,
    trade: &TradeDraft,
) -> Result<Option<Position>, InsufficientHoldings> {
    use crate::domain::Side;

    match (trade.side, current) {
        (Side::Buy, None) => Ok(Some(Position::new(
            trade.ticker.clone(),
            trade.price,
            trade.quantity,
        ))),
        (Side::Buy, Some(held)) => {
            let new_quantity = held.quantity + trade.quantity;
            let held_value = held.average_buy_price * Decimal::from(held.quantity);
            let lot_value = trade.price * Decimal::from(trade.quantity);
            let new_average = (held_value + lot_value) / Decimal::from(new_quantity);
            Ok(Some(Position::new(
                trade.ticker.clone(),
                new_average,
                new_quantity,
            )))
        }
        (Side::Sell, None) => Err(InsufficientHoldings {
            ticker: trade.ticker.clone(),
            held: 0,
            requested: trade.quantity,
        }),
        (Side::Sell, Some(held)) if held.quantity < trade.quantity => Err(InsufficientHoldings {
            ticker: trade.ticker.clone(),
            held: held.quantity,
            requested: trade.quantity,
        }),
        (Side::Sell, Some(held)) if held.quantity == trade.quantity => Ok(None),
        (Side::Sell, Some(held)) => Ok(Some(Position::new(
            trade.ticker.clone(),
            held.average_buy_price,
            held.quantity - trade.quantity,
        ))),
    }
}

/// The draft that undoes `trade`: same ticker, price, and quantity with the
/// side flipped. Applying it reverts the original trade's effect.
///
/// Reverting a sell that emptied a position cannot restore the old average
/// price; the re-opened position carries the reverted trade's price instead.
/// That loss is inherent to keeping no position history.
pub fn invert(trade: &TradeDraft) -> TradeDraft {
    TradeDraft {
        side: trade.side.invert(),
        ticker: trade.ticker.clone(),
        price: trade.price,
        quantity: trade.quantity,
    }
}
