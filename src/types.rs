//! Shared types for the LENDBOT agent.
//!
//! These types form the data model used across all modules: the persisted
//! store document, the catalog entries it holds, and the rate/balance
//! records handed over by the exchange collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A lendable asset known to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Ticker, e.g. "BTC".
    pub id: String,
    /// Display name, e.g. "Bitcoin".
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] - {}", self.id, self.name)
    }
}

// ---------------------------------------------------------------------------
// Store document
// ---------------------------------------------------------------------------

/// The single persisted aggregate.
///
/// On disk: `{ "lastUpdated": <ms>, "db": [{id, name}], "watchlist": [..] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Time of the last catalog refresh. Absent until the first `/update`.
    #[serde(
        rename = "lastUpdated",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(rename = "db")]
    pub catalog: Vec<CatalogEntry>,
    /// Upper-cased tickers. Duplicates are allowed.
    pub watchlist: Vec<String>,
}

impl StoreDocument {
    /// Find a catalog entry by ticker, matching ids exactly as stored.
    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.catalog.iter().find(|entry| entry.id == id)
    }
}

// ---------------------------------------------------------------------------
// Exchange records
// ---------------------------------------------------------------------------

/// Estimated lending rate for the next hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateResult {
    pub coin: String,
    /// Hourly fractional rate (0.0001 = 0.01% per hour).
    pub estimate: f64,
}

/// Wallet balance for one coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub coin: String,
    pub total: f64,
    pub usd_value: f64,
}

/// Lending position for one coin, as used by the compounding loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingInfo {
    pub coin: String,
    /// Amount available to lend, including interest already earned.
    pub lendable: f64,
    /// Amount currently locked in active loans.
    #[serde(default)]
    pub locked: f64,
    /// Size of the standing offer.
    #[serde(default)]
    pub offered: f64,
    /// Hourly rate of the standing offer.
    #[serde(default)]
    pub min_rate: Option<f64>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for LENDBOT.
#[derive(Debug, thiserror::Error)]
pub enum LendbotError {
    #[error("Failed to load store from {path}: {message}")]
    Startup { path: String, message: String },

    #[error("{0} is not in the list")]
    NotInWatchlist(String),

    #[error("{0} does not exist in the database")]
    UnknownTicker(String),

    #[error("Exchange error ({endpoint}): {message}")]
    Exchange { endpoint: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
