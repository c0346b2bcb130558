//! FTX-style exchange REST integration.
//!
//! Serves the catalog, hourly lending-rate estimates, wallet balances and
//! lending offers.
//!
//! Public endpoints: `/wallet/coins`, `/spot_margin/lending_rates`
//! Private endpoints: `/wallet/balances`, `/spot_margin/lending_info`,
//! `/spot_margin/offers`
//! Auth: `FTX-KEY`, `FTX-TS` (ms), `FTX-SIGN` = hex HMAC-SHA256 of
//! `ts + METHOD + /api/path + body`, optional `FTX-SUBACCOUNT`.
//! Responses are wrapped in `{ "success": bool, "result": .. }`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashSet;
use tracing::{debug, info};

use super::{LendingExchange, LendingVenue};
use crate::types::{Balance, CatalogEntry, LendbotError, LendingInfo, RateResult};

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// API response types (exchange JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// `/wallet/coins` entry. Only the fields we need.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinInfo {
    id: String,
    name: String,
    #[serde(default)]
    fiat: bool,
}

/// `/spot_margin/lending_rates` entry.
#[derive(Debug, Clone, Deserialize)]
struct LendingRate {
    coin: String,
    /// Estimated hourly rate for the next hour. Null when not yet known.
    #[serde(default)]
    estimate: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OfferRequest<'a> {
    coin: &'a str,
    size: f64,
    rate: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// API credentials. Without them only public endpoints work.
#[derive(Clone)]
pub struct FtxCredentials {
    pub api_key: SecretString,
    pub api_secret: SecretString,
    pub subaccount: Option<String>,
}

/// Exchange client.
pub struct FtxClient {
    http: Client,
    base_url: String,
    credentials: Option<FtxCredentials>,
}

impl FtxClient {
    /// Create a new client against `base_url` (e.g. `https://ftx.com/api`).
    pub fn new(base_url: &str, credentials: Option<FtxCredentials>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("LENDBOT/0.1.0 (lending-assistant)")
            .build()
            .context("Failed to build HTTP client for exchange")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    // -- Internal helpers ------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, signed: bool) -> Result<T> {
        self.request(Method::GET, endpoint, None, signed).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
        signed: bool,
    ) -> Result<T> {
        let url = Url::parse(&format!("{}{}", self.base_url, endpoint))
            .with_context(|| format!("Invalid exchange URL for {endpoint}"))?;

        debug!(url = %url, method = %method, "Exchange request");

        let mut req = self.http.request(method.clone(), url.clone());

        if signed {
            let creds = self.credentials.as_ref().ok_or_else(|| LendbotError::Exchange {
                endpoint: endpoint.to_string(),
                message: "API credentials not configured".into(),
            })?;
            let ts = Utc::now().timestamp_millis();
            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            let signature = sign(
                creds.api_secret.expose_secret(),
                ts,
                method.as_str(),
                &path,
                body.as_deref().unwrap_or(""),
            )?;
            req = req
                .header("FTX-KEY", creds.api_key.expose_secret())
                .header("FTX-TS", ts.to_string())
                .header("FTX-SIGN", signature);
            if let Some(sub) = &creds.subaccount {
                req = req.header("FTX-SUBACCOUNT", sub);
            }
        }

        if let Some(body) = body {
            req = req.header(reqwest::header::CONTENT_TYPE, "application/json").body(body);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Exchange request failed: {endpoint}"))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(LendbotError::Exchange {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {status}: {text}"),
            }
            .into());
        }

        unwrap_envelope(endpoint, &text)
    }

    async fn fetch_coins(&self) -> Result<Vec<CoinInfo>> {
        self.get("/wallet/coins", false).await
    }

    async fn fetch_lending_rates(&self) -> Result<Vec<LendingRate>> {
        self.get("/spot_margin/lending_rates", false).await
    }
}

/// Request signature: `hmac_hex` over `ts + method + path + body`.
fn sign(secret: &str, ts: i64, method: &str, path: &str, body: &str) -> Result<String> {
    hmac_hex(secret, &format!("{ts}{method}{path}{body}"))
}

fn hmac_hex(secret: &str, payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid API secret: {e}"))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn unwrap_envelope<T: DeserializeOwned>(endpoint: &str, text: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(text)
        .with_context(|| format!("Failed to parse exchange response from {endpoint}"))?;

    match envelope {
        Envelope {
            success: true,
            result: Some(result),
            ..
        } => Ok(result),
        // Acknowledgements such as `/spot_margin/offers` carry `"result": null`.
        Envelope {
            success: true,
            result: None,
            ..
        } => serde_json::from_value(serde_json::Value::Null)
            .with_context(|| format!("Missing result in response from {endpoint}")),
        Envelope { error, .. } => Err(LendbotError::Exchange {
            endpoint: endpoint.to_string(),
            message: error.unwrap_or_else(|| "request was not successful".into()),
        }
        .into()),
    }
}

/// Coins that have a lending market, named from the coin list.
fn lendable_catalog(coins: &[CoinInfo], rates: &[LendingRate]) -> Vec<CatalogEntry> {
    let lendable: HashSet<&str> = rates.iter().map(|r| r.coin.as_str()).collect();
    coins
        .iter()
        .filter(|c| lendable.contains(c.id.as_str()))
        .map(|c| CatalogEntry::new(c.id.clone(), c.name.clone()))
        .collect()
}

/// Highest `limit` estimates, highest first. Coins without an estimate or
/// rejected by `keep` are dropped.
fn top_rates(
    rates: &[LendingRate],
    limit: usize,
    keep: impl Fn(&str) -> bool,
) -> Vec<Option<RateResult>> {
    let mut known: Vec<RateResult> = rates
        .iter()
        .filter(|r| keep(&r.coin))
        .filter_map(|r| {
            r.estimate.map(|estimate| RateResult {
                coin: r.coin.clone(),
                estimate,
            })
        })
        .collect();
    known.sort_by(|a, b| b.estimate.total_cmp(&a.estimate));
    known.into_iter().take(limit).map(Some).collect()
}

/// One slot per ticker, `None` where the exchange has no estimate.
fn rates_for(rates: &[LendingRate], tickers: &[String]) -> Vec<Option<RateResult>> {
    tickers
        .iter()
        .map(|ticker| {
            rates
                .iter()
                .find(|r| r.coin == *ticker)
                .and_then(|r| {
                    r.estimate.map(|estimate| RateResult {
                        coin: r.coin.clone(),
                        estimate,
                    })
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl LendingExchange for FtxClient {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let (coins, rates) = futures::try_join!(self.fetch_coins(), self.fetch_lending_rates())?;
        let catalog = lendable_catalog(&coins, &rates);
        info!(coins = coins.len(), lendable = catalog.len(), "Fetched lending catalog");
        Ok(catalog)
    }

    async fn fetch_rates_for_all(&self, limit: usize) -> Result<Vec<Option<RateResult>>> {
        let rates = self.fetch_lending_rates().await?;
        Ok(top_rates(&rates, limit, |_| true))
    }

    async fn fetch_crypto_rates(&self, limit: usize) -> Result<Vec<Option<RateResult>>> {
        let (coins, rates) = futures::try_join!(self.fetch_coins(), self.fetch_lending_rates())?;
        let crypto: HashSet<&str> = coins
            .iter()
            .filter(|c| !c.fiat)
            .map(|c| c.id.as_str())
            .collect();
        Ok(top_rates(&rates, limit, |coin| crypto.contains(coin)))
    }

    async fn fetch_rates_for_tickers(&self, tickers: &[String]) -> Result<Vec<Option<RateResult>>> {
        let rates = self.fetch_lending_rates().await?;
        Ok(rates_for(&rates, tickers))
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>> {
        self.get("/wallet/balances", true).await
    }
}

#[async_trait]
impl LendingVenue for FtxClient {
    async fn fetch_lending_info(&self) -> Result<Vec<LendingInfo>> {
        self.get("/spot_margin/lending_info", true).await
    }

    async fn submit_lending_offer(&self, coin: &str, size: f64, rate: f64) -> Result<()> {
        let body = serde_json::to_string(&OfferRequest { coin, size, rate })
            .context("Failed to serialise lending offer")?;
        let _: serde_json::Value = self
            .request(Method::POST, "/spot_margin/offers", Some(body), true)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(coin: &str, estimate: Option<f64>) -> LendingRate {
        LendingRate {
            coin: coin.to_string(),
            estimate,
        }
    }

    fn coin(id: &str, name: &str, fiat: bool) -> CoinInfo {
        CoinInfo {
            id: id.to_string(),
            name: name.to_string(),
            fiat,
        }
    }

    #[test]
    fn test_hmac_hex_known_vector() {
        // Widely published HMAC-SHA256 example.
        assert_eq!(
            hmac_hex("key", "The quick brown fox jumps over the lazy dog").unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_sign_covers_ts_method_path_body() {
        let sig = sign("secret", 1588591511721, "POST", "/spot_margin/offers", r#"{"coin":"USD"}"#)
            .unwrap();
        assert_eq!(
            sig,
            hmac_hex("secret", r#"1588591511721POST/spot_margin/offers{"coin":"USD"}"#).unwrap()
        );
        let other = sign("secret", 1588591511722, "POST", "/spot_margin/offers", r#"{"coin":"USD"}"#)
            .unwrap();
        assert_ne!(sig, other);
    }

    #[test]
    fn test_unwrap_envelope_success() {
        let text = r#"{"success":true,"result":[{"coin":"BTC","estimate":0.00001,"previous":0.00002}]}"#;
        let rates: Vec<LendingRate> = unwrap_envelope("/spot_margin/lending_rates", text).unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].estimate, Some(0.00001));
    }

    #[test]
    fn test_unwrap_envelope_failure() {
        let text = r#"{"success":false,"error":"Not logged in"}"#;
        let err = unwrap_envelope::<Vec<Balance>>("/wallet/balances", text).unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
    }

    #[test]
    fn test_unwrap_envelope_null_ack() {
        let text = r#"{"success":true,"result":null}"#;
        let ack: serde_json::Value = unwrap_envelope("/spot_margin/offers", text).unwrap();
        assert!(ack.is_null());
        assert!(unwrap_envelope::<Vec<Balance>>("/wallet/balances", text).is_err());
    }

    #[test]
    fn test_balances_parse() {
        let text = r#"{"success":true,"result":[{"coin":"USD","free":1.0,"total":2.5,"usdValue":2.5}]}"#;
        let balances: Vec<Balance> = unwrap_envelope("/wallet/balances", text).unwrap();
        assert_eq!(balances[0].total, 2.5);
        assert_eq!(balances[0].usd_value, 2.5);
    }

    #[test]
    fn test_lendable_catalog_filters_by_rates() {
        let coins = vec![
            coin("BTC", "Bitcoin", false),
            coin("USD", "US Dollar", true),
            coin("XYZ", "Not lendable", false),
        ];
        let rates = vec![rate("BTC", Some(0.00001)), rate("USD", None)];
        let catalog = lendable_catalog(&coins, &rates);
        assert_eq!(
            catalog,
            vec![
                CatalogEntry::new("BTC", "Bitcoin"),
                CatalogEntry::new("USD", "US Dollar"),
            ]
        );
    }

    #[test]
    fn test_top_rates_sorted_and_limited() {
        let rates = vec![
            rate("A", Some(0.00001)),
            rate("B", Some(0.00005)),
            rate("C", None),
            rate("D", Some(0.00003)),
        ];
        let top = top_rates(&rates, 2, |_| true);
        let coins: Vec<String> = top.into_iter().flatten().map(|r| r.coin).collect();
        assert_eq!(coins, vec!["B", "D"]);
    }

    #[test]
    fn test_top_rates_respects_filter() {
        let rates = vec![rate("USD", Some(0.0001)), rate("BTC", Some(0.00001))];
        let top = top_rates(&rates, 10, |coin| coin != "USD");
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].as_ref().unwrap().coin, "BTC");
    }

    #[test]
    fn test_rates_for_tickers_keeps_slots() {
        let rates = vec![rate("BTC", Some(0.00001)), rate("ETH", None)];
        let tickers = vec!["ETH".to_string(), "BTC".to_string(), "NOPE".to_string()];
        let out = rates_for(&rates, &tickers);
        assert_eq!(out.len(), 3);
        assert!(out[0].is_none());
        assert_eq!(out[1].as_ref().unwrap().coin, "BTC");
        assert!(out[2].is_none());
    }

    #[tokio::test]
    async fn test_private_call_without_credentials_fails() {
        let client = FtxClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(!client.is_authenticated());
        let err = client.fetch_balances().await.unwrap_err();
        assert!(err.to_string().contains("credentials"));
    }
}
