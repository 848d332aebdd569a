//! Per-ticker mutual exclusion for position read-modify-write sequences.

use crate::domain::Ticker;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per ticker.
///
/// Entries are never evicted; the registry grows with the set of tickers
/// ever traded.
#[derive(Default)]
pub struct TickerLocks {
    registry: Mutex<HashMap<Ticker, Arc<AsyncMutex<()>>>>,
}

impl TickerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, ticker: &Ticker) -> Arc<AsyncMutex<()>> {
        let mut registry = self.registry.lock().expect("ticker lock registry poisoned");
        registry
            .entry(ticker.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Serialize work on one ticker.
    pub async fn acquire(&self, ticker: &Ticker) -> OwnedMutexGuard<()> {
        self.handle(ticker).lock_owned().await
    }

    /// Serialize work on two tickers.
    ///
    /// Locks are taken in ticker order so two callers crossing the same
    /// pair cannot deadlock. When both tickers are equal only one guard
    /// is taken.
    pub async fn acquire_pair(
        &self,
        first: &Ticker,
        second: &Ticker,
    ) -> (OwnedMutexGuard<()>, Option<OwnedMutexGuard<()>>) {
        if first == second {
            return (self.acquire(first).await, None);
        }

        let (lo, hi) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let lo_guard = self.acquire(lo).await;
        let hi_guard = self.acquire(hi).await;
        (lo_guard, Some(hi_guard))
    }
}
