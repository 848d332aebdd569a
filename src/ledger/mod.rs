//! The trade ledger and the position book derived from it.

pub mod coordinator;
pub mod locks;

pub use coordinator::{LedgerCoordinator, LedgerError};
pub use locks::TickerLocks;
