//! Reply rendering.
//!
//! Pure functions that turn store snapshots and exchange records into the
//! text sent back to the chat. Nothing here performs I/O.

pub mod balances;
pub mod catalog;
pub mod rates;

pub use balances::format_balances;
pub use catalog::{format_catalog, format_watchlist};
pub use rates::{annualized_percent, format_rates};
