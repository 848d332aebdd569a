//! Storage layer: the trade ledger store and the position store.
//!
//! Both stores are traits so the coordinator can run against SQLite in
//! production and against the in-memory implementations in tests or
//! embedded use. The SQLite stores bound every call with a timeout and
//! surface expiry as [`StoreError::Timeout`].

pub mod memory;
pub mod migrations;
pub mod sqlite;

use crate::domain::{Position, Ticker, Trade, TradeDraft, TradeId};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::{MemoryLedgerStore, MemoryPositionStore};
pub use migrations::init_db;
pub use sqlite::{SqliteLedgerStore, SqlitePositionStore};

/// Durable storage of trade records with store-assigned identifiers.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All trades, in insertion order.
    async fn list(&self) -> Result<Vec<Trade>, StoreError>;

    /// Fetch one trade by id.
    async fn get(&self, id: TradeId) -> Result<Option<Trade>, StoreError>;

    /// Persist a new trade, returning it with its assigned id.
    async fn insert(&self, draft: &TradeDraft) -> Result<Trade, StoreError>;

    /// Overwrite the trade stored under `id`. Returns `None` if absent.
    async fn update(&self, id: TradeId, draft: &TradeDraft)
        -> Result<Option<Trade>, StoreError>;

    /// Remove the trade stored under `id`. Returns whether it existed.
    async fn delete(&self, id: TradeId) -> Result<bool, StoreError>;
}

/// Durable storage of at most one position per ticker.
///
/// Implementations enforce the no-zero-quantity invariant at the boundary:
/// writing a position with quantity <= 0 fails with
/// [`StoreError::EmptyPosition`] instead of persisting a zero row.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// All positions, in ticker order.
    async fn list(&self) -> Result<Vec<Position>, StoreError>;

    /// Fetch the position held for `ticker`, if any.
    async fn get(&self, ticker: &Ticker) -> Result<Option<Position>, StoreError>;

    /// Persist a new position for a ticker not currently held.
    async fn insert(&self, position: &Position) -> Result<(), StoreError>;

    /// Overwrite the position stored for the ticker.
    async fn update(&self, position: &Position) -> Result<(), StoreError>;

    /// Remove the position for `ticker`. Returns whether it existed.
    async fn delete(&self, ticker: &Ticker) -> Result<bool, StoreError>;
}

/// Failure of an underlying store call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out after {0}ms")]
    Timeout(u64),
    #[error("refusing to store zero-quantity position for {0}")]
    EmptyPosition(Ticker),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
