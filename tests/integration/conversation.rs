//! End-to-end conversations: router + store + mock exchange, with the
//! store persisted to a temp file and reloaded.

use std::path::PathBuf;
use std::sync::Arc;

use lendbot::chat::router::{GENERIC_FAILURE, UNKNOWN_COMMAND};
use lendbot::chat::{CommitPolicy, Scene, SessionRouter};
use lendbot::exchange::LendingControl;
use lendbot::storage::PersistedStore;
use lendbot::types::StoreDocument;

use crate::mock_exchange::{MockExchange, MockLending};

const CHAT: i64 = 7;

fn temp_path() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("lendbot_it_{}.json", uuid::Uuid::new_v4()));
    p
}

struct Harness {
    path: PathBuf,
    exchange: Arc<MockExchange>,
    lending: Arc<MockLending>,
    router: SessionRouter,
}

impl Harness {
    fn new() -> Self {
        let path = temp_path();
        std::fs::write(&path, r#"{"db":[],"watchlist":[]}"#).unwrap();
        let store = PersistedStore::load(&path).unwrap();
        let exchange = Arc::new(MockExchange::new());
        let lending = Arc::new(MockLending::default());
        let router = SessionRouter::new(store, exchange.clone(), lending.clone())
            .with_commit_policy(CommitPolicy::Awaited);
        Self {
            path,
            exchange,
            lending,
            router,
        }
    }

    async fn say(&mut self, text: &str) -> Vec<String> {
        self.router.handle(CHAT, text).await
    }

    fn reload(&self) -> StoreDocument {
        PersistedStore::load(&self.path).unwrap().get()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[tokio::test]
async fn test_watchlist_session_persists() {
    let mut h = Harness::new();

    assert_eq!(h.say("/whois btc").await, vec![
        "BTC does not exist in the database, please try to update in /watchlist"
    ]);

    h.say("/watchlist").await;
    assert_eq!(h.say("/update").await, vec!["Updated database"]);
    assert_eq!(h.say("/add btc").await, vec!["Added BTC"]);
    assert_eq!(h.say("/add eth").await, vec!["Added ETH"]);
    assert_eq!(h.say("/add btc").await, vec!["Added BTC"]);
    assert_eq!(h.say("/remove btc").await, vec!["Removed BTC"]);
    assert_eq!(h.say("/current").await, vec!["ETH\nBTC\n"]);

    let listing = &h.say("/list").await[0];
    assert!(listing.starts_with("Last updated: "));
    assert!(listing.contains("[SOL] - Solana \n"));

    assert_eq!(h.say("/back").await, vec!["Leaving watch tower"]);
    assert_eq!(h.say("/whois Sol").await, vec!["Solana"]);

    let saved = h.reload();
    assert_eq!(saved.watchlist, vec!["ETH", "BTC"]);
    assert_eq!(saved.catalog.len(), 4);
    assert!(saved.last_updated.is_some());
}

#[tokio::test]
async fn test_lending_scene_rates() {
    let mut h = Harness::new();
    h.router.store().add_to_watchlist("sol");
    h.router.store().add_to_watchlist("eth");

    let welcome = h.say("/lending").await;
    assert!(welcome[0].starts_with("Welcome to lending\n "));
    assert!(!welcome[0].contains("/add"));

    assert_eq!(
        h.say("/top10").await,
        vec!["[USD] Estimate: 87.60% \n[ETH] Estimate: 8.76% \n[BTC] Estimate: 4.38% \n"]
    );
    assert_eq!(
        h.say("/top10crypto").await,
        vec!["[ETH] Estimate: 8.76% \n[BTC] Estimate: 4.38% \n"]
    );
    // SOL has no estimate and is skipped.
    assert_eq!(h.say("/watchlist").await, vec!["[ETH] Estimate: 8.76% \n"]);

    // Watchlist-scene commands are not reachable from here.
    assert_eq!(h.say("/add doge").await, vec![UNKNOWN_COMMAND]);
    assert_eq!(h.router.scene(CHAT), Scene::Lending);

    assert_eq!(h.say("/back").await, vec!["Leaving lending scene"]);
    assert_eq!(h.router.scene(CHAT), Scene::Root);
}

#[tokio::test]
async fn test_scene_switch_requires_back() {
    let mut h = Harness::new();
    h.say("/watchlist").await;
    assert_eq!(h.say("/top10").await, vec![UNKNOWN_COMMAND]);
    assert_eq!(h.say("/lending").await, vec![UNKNOWN_COMMAND]);
    h.say("/back").await;
    h.say("/lending").await;
    assert_eq!(h.say("/top10").await.len(), 1);
    assert_eq!(h.exchange.calls(), vec!["fetch_rates_for_all"]);
}

#[tokio::test]
async fn test_collaborator_failure_is_generic_and_recoverable() {
    let mut h = Harness::new();
    h.exchange.set_error("502 Bad Gateway from upstream");

    assert_eq!(h.say("/balance").await, vec![GENERIC_FAILURE]);
    h.say("/watchlist").await;
    assert_eq!(h.say("/update").await, vec![GENERIC_FAILURE]);
    assert!(h.reload().catalog.is_empty());

    h.exchange.clear_error();
    assert_eq!(h.say("/update").await, vec!["Updated database"]);
    h.say("/back").await;
    assert_eq!(
        h.say("/balance").await,
        vec!["Balances: \n[USD] Total: 250, Value: USD$250.00 \n"]
    );
}

#[tokio::test]
async fn test_start_stop_lending() {
    let mut h = Harness::new();
    assert_eq!(h.say("/start").await, vec!["Start lending"]);
    assert!(h.lending.is_running());
    assert_eq!(h.say("/stop").await, vec!["Stopping lending"]);
    assert!(!h.lending.is_running());
}
