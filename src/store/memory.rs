//! In-memory store implementations backed by mutex-guarded maps.
//!
//! Used by tests and embedded callers that want ledger semantics without
//! a database file. Ids are assigned from a counter starting at 1.

use crate::domain::{Position, Ticker, Trade, TradeDraft, TradeId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{LedgerStore, PositionStore, StoreError};

#[derive(Default)]
struct LedgerInner {
    next_id: i64,
    trades: Vec<Trade>,
}

/// Trade ledger held in process memory.
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<LedgerInner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn list(&self) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.lock().expect("ledger store lock poisoned");
        Ok(inner.trades.clone())
    }

    async fn get(&self, id: TradeId) -> Result<Option<Trade>, StoreError> {
        let inner = self.inner.lock().expect("ledger store lock poisoned");
        Ok(inner.trades.iter().find(|t| t.id == id).cloned())
    }

    async fn insert(&self, draft: &TradeDraft) -> Result<Trade, StoreError> {
        let mut inner = self.inner.lock().expect("ledger store lock poisoned");
        inner.next_id += 1;
        let trade = Trade {
            id: TradeId::new(inner.next_id),
            side: draft.side,
            ticker: draft.ticker.clone(),
            price: draft.price,
            quantity: draft.quantity,
        };
        inner.trades.push(trade.clone());
        Ok(trade)
    }

    async fn update(
        &self,
        id: TradeId,
        draft: &TradeDraft,
    ) -> Result<Option<Trade>, StoreError> {
        let mut inner = self.inner.lock().expect("ledger store lock poisoned");
        match inner.trades.iter_mut().find(|t| t.id == id) {
            Some(slot) => {
                slot.side = draft.side;
                slot.ticker = draft.ticker.clone();
                slot.price = draft.price;
                slot.quantity = draft.quantity;
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: TradeId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("ledger store lock poisoned");
        let before = inner.trades.len();
        inner.trades.retain(|t| t.id != id);
        Ok(inner.trades.len() < before)
    }
}

/// Position book held in process memory, keyed by ticker.
#[derive(Default)]
pub struct MemoryPositionStore {
    // BTreeMap keeps listings in ticker order, matching the SQLite store.
    inner: Mutex<BTreeMap<Ticker, Position>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn list(&self) -> Result<Vec<Position>, StoreError> {
        let inner = self.inner.lock().expect("position store lock poisoned");
        Ok(inner.values().cloned().collect())
    }

    async fn get(&self, ticker: &Ticker) -> Result<Option<Position>, StoreError> {
        let inner = self.inner.lock().expect("position store lock poisoned");
        Ok(inner.get(ticker).cloned())
    }

    async fn insert(&self, position: &Position) -> Result<(), StoreError> {
        if position.quantity <= 0 {
            return Err(StoreError::EmptyPosition(position.ticker.clone()));
        }
        let mut inner = self.inner.lock().expect("position store lock poisoned");
        inner.insert(position.ticker.clone(), position.clone());
        Ok(())
    }

    async fn update(&self, position: &Position) -> Result<(), StoreError> {
        if position.quantity <= 0 {
            return Err(StoreError::EmptyPosition(position.ticker.clone()));
        }
        let mut inner = self.inner.lock().expect("position store lock poisoned");
        inner.insert(position.ticker.clone(), position.clone());
        Ok(())
    }

    async fn delete(&self, ticker: &Ticker) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("position store lock poisoned");
        Ok(inner.remove(ticker).is_some())
    }
}
