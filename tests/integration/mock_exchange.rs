//! Mock exchange for integration testing.
//!
//! Provides deterministic `LendingExchange` and `LendingControl`
//! implementations: a fixed catalog, fixed rates and balances, and a
//! lifecycle flag, all in-memory with no external dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use lendbot::exchange::{LendingControl, LendingExchange};
use lendbot::types::{Balance, CatalogEntry, RateResult};

/// A mock exchange for deterministic testing.
///
/// Catalog, rates and balances are fully controllable from test code.
pub struct MockExchange {
    catalog: Vec<CatalogEntry>,
    /// (coin, estimate, is_fiat)
    rates: Vec<(String, Option<f64>, bool)>,
    balances: Vec<Balance>,
    calls: Arc<Mutex<Vec<String>>>,
    /// If set, all operations will return this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            catalog: vec![
                CatalogEntry::new("BTC", "Bitcoin"),
                CatalogEntry::new("ETH", "Ethereum"),
                CatalogEntry::new("USD", "US Dollar"),
                CatalogEntry::new("SOL", "Solana"),
            ],
            rates: vec![
                ("BTC".into(), Some(0.000005), false),
                ("ETH".into(), Some(0.00001), false),
                ("USD".into(), Some(0.0001), true),
                ("SOL".into(), None, false),
            ],
            balances: vec![
                Balance {
                    coin: "USD".into(),
                    total: 250.0,
                    usd_value: 250.0,
                },
                Balance {
                    coin: "BTC".into(),
                    total: 0.0,
                    usd_value: 0.0,
                },
            ],
            calls: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Names of the operations called so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call.to_string());
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }

    fn ranked(&self, limit: usize, crypto_only: bool) -> Vec<Option<RateResult>> {
        let mut known: Vec<RateResult> = self
            .rates
            .iter()
            .filter(|(_, _, fiat)| !(crypto_only && *fiat))
            .filter_map(|(coin, estimate, _)| {
                estimate.map(|estimate| RateResult {
                    coin: coin.clone(),
                    estimate,
                })
            })
            .collect();
        known.sort_by(|a, b| b.estimate.total_cmp(&a.estimate));
        known.into_iter().take(limit).map(Some).collect()
    }
}

#[async_trait]
impl LendingExchange for MockExchange {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>> {
        self.record("fetch_catalog")?;
        Ok(self.catalog.clone())
    }

    async fn fetch_rates_for_all(&self, limit: usize) -> Result<Vec<Option<RateResult>>> {
        self.record("fetch_rates_for_all")?;
        Ok(self.ranked(limit, false))
    }

    async fn fetch_crypto_rates(&self, limit: usize) -> Result<Vec<Option<RateResult>>> {
        self.record("fetch_crypto_rates")?;
        Ok(self.ranked(limit, true))
    }

    async fn fetch_rates_for_tickers(&self, tickers: &[String]) -> Result<Vec<Option<RateResult>>> {
        self.record("fetch_rates_for_tickers")?;
        Ok(tickers
            .iter()
            .map(|t| {
                self.rates.iter().find(|(coin, _, _)| coin == t).and_then(|(coin, estimate, _)| {
                    estimate.map(|estimate| RateResult {
                        coin: coin.clone(),
                        estimate,
                    })
                })
            })
            .collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>> {
        self.record("fetch_balances")?;
        Ok(self.balances.clone())
    }
}

/// Records lifecycle calls instead of running a loop.
#[derive(Default)]
pub struct MockLending {
    running: Mutex<bool>,
}

impl LendingControl for MockLending {
    fn start(&self) {
        *self.running.lock().unwrap() = true;
    }

    fn stop(&self) {
        *self.running.lock().unwrap() = false;
    }

    fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }
}
