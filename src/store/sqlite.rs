//! SQLite-backed stores for trades and positions.
//!
//! Prices are persisted as canonical decimal strings and decoded with a
//! warn-and-default fallback so one bad row cannot poison a listing.

use crate::domain::{Decimal, Position, Side, Ticker, Trade, TradeDraft, TradeId};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::{LedgerStore, PositionStore, StoreError};

/// Run a store call with an upper bound on wall-clock time.
async fn bounded<T, F>(op_timeout: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(op_timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Timeout(op_timeout.as_millis() as u64)),
    }
}

fn decode_trade(row: &SqliteRow) -> Trade {
    let id: i64 = row.get("id");
    let side_str: String = row.get("type");
    let price_str: String = row.get("price");

    let side = Side::from_wire(&side_str).unwrap_or_else(|| {
        warn!(id, side = %side_str, "Unknown trade side in row, defaulting to BUY");
        Side::Buy
    });
    let price = Decimal::from_str_canonical(&price_str).unwrap_or_else(|e| {
        warn!(id, price = %price_str, error = %e, "Failed to parse price decimal, using default");
        Decimal::default()
    });

    Trade {
        id: TradeId::new(id),
        side,
        ticker: Ticker::new(row.get::<String, _>("ticker")),
        price,
        quantity: row.get("quantity"),
    }
}

fn decode_position(row: &SqliteRow) -> Position {
    let ticker: String = row.get("ticker");
    let price_str: String = row.get("average_buy_price");

    let average_buy_price = Decimal::from_str_canonical(&price_str).unwrap_or_else(|e| {
        warn!(ticker = %ticker, average_buy_price = %price_str, error = %e, "Failed to parse average decimal, using default");
        Decimal::default()
    });

    Position::new(Ticker::new(ticker), average_buy_price, row.get("quantity"))
}

/// Trade ledger persisted in the `trades` table.
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
    op_timeout: Duration,
}

impl SqliteLedgerStore {
    pub fn new(pool: SqlitePool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn list(&self) -> Result<Vec<Trade>, StoreError> {
        let rows = bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                SELECT id, type, ticker, price, quantity
                FROM trades
                ORDER BY id ASC
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(decode_trade).collect())
    }

    async fn get(&self, id: TradeId) -> Result<Option<Trade>, StoreError> {
        let row = bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                SELECT id, type, ticker, price, quantity
                FROM trades
                WHERE id = ?
                "#,
            )
            .bind(id.as_i64())
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(decode_trade))
    }

    async fn insert(&self, draft: &TradeDraft) -> Result<Trade, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                INSERT INTO trades (type, ticker, price, quantity, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(draft.side.to_string())
            .bind(draft.ticker.as_str())
            .bind(draft.price.to_canonical_string())
            .bind(draft.quantity)
            .bind(now)
            .bind(now)
            .execute(&self.pool),
        )
        .await?;

        Ok(Trade {
            id: TradeId::new(result.last_insert_rowid()),
            side: draft.side,
            ticker: draft.ticker.clone(),
            price: draft.price,
            quantity: draft.quantity,
        })
    }

    async fn update(
        &self,
        id: TradeId,
        draft: &TradeDraft,
    ) -> Result<Option<Trade>, StoreError> {
        let result = bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                UPDATE trades
                SET type = ?, ticker = ?, price = ?, quantity = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(draft.side.to_string())
            .bind(draft.ticker.as_str())
            .bind(draft.price.to_canonical_string())
            .bind(draft.quantity)
            .bind(chrono::Utc::now().timestamp_millis())
            .bind(id.as_i64())
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Trade {
            id,
            side: draft.side,
            ticker: draft.ticker.clone(),
            price: draft.price,
            quantity: draft.quantity,
        }))
    }

    async fn delete(&self, id: TradeId) -> Result<bool, StoreError> {
        let result = bounded(
            self.op_timeout,
            sqlx::query("DELETE FROM trades WHERE id = ?")
                .bind(id.as_i64())
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Positions persisted in the `positions` table, one row per held ticker.
#[derive(Clone)]
pub struct SqlitePositionStore {
    pool: SqlitePool,
    op_timeout: Duration,
}

impl SqlitePositionStore {
    pub fn new(pool: SqlitePool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }
}

#[async_trait]
impl PositionStore for SqlitePositionStore {
    async fn list(&self) -> Result<Vec<Position>, StoreError> {
        let rows = bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                SELECT ticker, average_buy_price, quantity
                FROM positions
                ORDER BY ticker ASC
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(decode_position).collect())
    }

    async fn get(&self, ticker: &Ticker) -> Result<Option<Position>, StoreError> {
        let row = bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                SELECT ticker, average_buy_price, quantity
                FROM positions
                WHERE ticker = ?
                "#,
            )
            .bind(ticker.as_str())
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(decode_position))
    }

    async fn insert(&self, position: &Position) -> Result<(), StoreError> {
        if position.quantity <= 0 {
            return Err(StoreError::EmptyPosition(position.ticker.clone()));
        }

        let now = chrono::Utc::now().timestamp_millis();
        bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                INSERT INTO positions (ticker, average_buy_price, quantity, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(position.ticker.as_str())
            .bind(position.average_buy_price.to_canonical_string())
            .bind(position.quantity)
            .bind(now)
            .bind(now)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn update(&self, position: &Position) -> Result<(), StoreError> {
        if position.quantity <= 0 {
            return Err(StoreError::EmptyPosition(position.ticker.clone()));
        }

        bounded(
            self.op_timeout,
            sqlx::query(
                r#"
                UPDATE positions
                SET average_buy_price = ?, quantity = ?, updated_at = ?
                WHERE ticker = ?
                "#,
            )
            .bind(position.average_buy_price.to_canonical_string())
            .bind(position.quantity)
            .bind(chrono::Utc::now().timestamp_millis())
            .bind(position.ticker.as_str())
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn delete(&self, ticker: &Ticker) -> Result<bool, StoreError> {
        let result = bounded(
            self.op_timeout,
            sqlx::query("DELETE FROM positions WHERE ticker = ?")
                .bind(ticker.as_str())
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
