//! Read-side views over the position book.

use crate::domain::{Decimal, Position};
use crate::store::{PositionStore, StoreError};
use std::sync::Arc;

/// Computes portfolio listings and returns from stored positions.
///
/// Returns are unrealized and marked against one configured reference
/// price for every ticker.
pub struct Reporter {
    positions: Arc<dyn PositionStore>,
    reference_price: Decimal,
}

impl Reporter {
    pub fn new(positions: Arc<dyn PositionStore>, reference_price: Decimal) -> Self {
        Self {
            positions,
            reference_price,
        }
    }

    /// All held positions, in ticker order.
    pub async fn portfolio(&self) -> Result<Vec<Position>, StoreError> {
        self.positions.list().await
    }

    /// Sum of `(reference price - average buy price) * quantity` over all
    /// held positions. Zero when nothing is held.
    pub async fn total_returns(&self) -> Result<Decimal, StoreError> {
        let positions = self.positions.list().await?;

        let mut returns = Decimal::zero();
        for position in &positions {
            let per_share = self.reference_price - position.average_buy_price;
            returns = returns + per_share * Decimal::from(position.quantity);
        }
        Ok(returns)
    }
}
