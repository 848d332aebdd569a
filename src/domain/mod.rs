//! Domain types for the trade ledger and derived portfolio.
//!
//! This module provides:
//! - Decimal-safe numeric handling via the Decimal wrapper
//! - Domain primitives: TradeId, Ticker, Side
//! - Trade (ledger event), TradeDraft (validated candidate), TradePatch
//! - Position (derived per-ticker holdings aggregate)

pub mod decimal;
pub mod position;
pub mod primitives;
pub mod trade;

pub use decimal::Decimal;
pub use position::Position;
pub use primitives::{Side, Ticker, TradeId};
pub use trade::{DraftError, Trade, TradeDraft, TradePatch};
