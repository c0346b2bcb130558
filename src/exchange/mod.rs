//! Exchange integration.
//!
//! Defines the collaborator traits the conversation layer consumes and
//! provides implementations for:
//! - FTX-style signed REST API (`ftx`): catalog, rates, balances, offers
//! - Auto-compounding lending loop (`lending`): start/stop lifecycle

pub mod ftx;
pub mod lending;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Balance, CatalogEntry, LendingInfo, RateResult};

/// Read-side exchange access used by chat commands.
///
/// Rate fetches may return `None` entries for coins without an estimate;
/// callers skip them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingExchange: Send + Sync {
    /// Every lendable coin with its display name.
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>>;

    /// Highest `limit` estimates across all lendable coins.
    async fn fetch_rates_for_all(&self, limit: usize) -> Result<Vec<Option<RateResult>>>;

    /// Highest `limit` estimates among crypto (non-fiat) coins.
    async fn fetch_crypto_rates(&self, limit: usize) -> Result<Vec<Option<RateResult>>>;

    /// Estimates for the given tickers, in order; `None` where unknown.
    async fn fetch_rates_for_tickers(&self, tickers: &[String]) -> Result<Vec<Option<RateResult>>>;

    async fn fetch_balances(&self) -> Result<Vec<Balance>>;
}

/// Write-side access used by the compounding loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingVenue: Send + Sync {
    async fn fetch_lending_info(&self) -> Result<Vec<LendingInfo>>;

    /// Replace the standing offer for `coin`.
    async fn submit_lending_offer(&self, coin: &str, size: f64, rate: f64) -> Result<()>;
}

/// Lifecycle of the lending loop as seen from chat commands.
///
/// Both calls return immediately; nothing is confirmed back.
#[cfg_attr(test, mockall::automock)]
pub trait LendingControl: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn is_running(&self) -> bool;
}
