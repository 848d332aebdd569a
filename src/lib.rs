pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod reporting;
pub mod store;

pub use config::Config;
pub use domain::{Decimal, Position, Side, Ticker, Trade, TradeDraft, TradeId, TradePatch};
pub use error::AppError;
pub use ledger::{LedgerCoordinator, LedgerError};
pub use reporting::Reporter;
pub use store::{
    init_db, LedgerStore, MemoryLedgerStore, MemoryPositionStore, PositionStore,
    SqliteLedgerStore, SqlitePositionStore, StoreError,
};
