//! Session router.
//!
//! Tracks the active scene per chat, resolves each command through the
//! scene machine and runs its handler. The store is shared by every chat;
//! only the scene is per-session.
//!
//! Failure policy:
//! - exchange errors are logged and answered with a generic retry message
//! - missing tickers are plain replies, not errors
//! - store writes follow the configured `CommitPolicy`

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::scene::{transition, CommandKind, Scene};
use super::ChatCommand;
use crate::exchange::{LendingControl, LendingExchange};
use crate::render;
use crate::storage::PersistedStore;
use crate::types::RateResult;

/// Chat identifier as assigned by the transport.
pub type ChatId = i64;

pub const MISSING_TICKER: &str = "Missing coin ticker symbol";
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again later";
pub const UNKNOWN_COMMAND: &str = "Unknown command here, use /help to see what is available";
pub const EMPTY_WATCHLIST: &str = "Your watchlist is empty";
pub const NO_RATES: &str = "No rate estimates available";
pub const SAVE_FAILED: &str = "Warning: the change could not be saved and will be lost on restart";

/// How mutating commands wait for the durable write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Reply immediately; the write finishes in the background.
    #[default]
    Background,
    /// Wait for the write and tell the user when it failed.
    Awaited,
}

pub struct SessionRouter {
    store: PersistedStore,
    exchange: Arc<dyn LendingExchange>,
    lending: Arc<dyn LendingControl>,
    sessions: HashMap<ChatId, Scene>,
    commit_policy: CommitPolicy,
    top_limit: usize,
}

impl SessionRouter {
    pub fn new(
        store: PersistedStore,
        exchange: Arc<dyn LendingExchange>,
        lending: Arc<dyn LendingControl>,
    ) -> Self {
        Self {
            store,
            exchange,
            lending,
            sessions: HashMap::new(),
            commit_policy: CommitPolicy::default(),
            top_limit: 10,
        }
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn with_top_limit(mut self, limit: usize) -> Self {
        self.top_limit = limit;
        self
    }

    pub fn store(&self) -> &PersistedStore {
        &self.store
    }

    /// Active scene for a chat. New chats start at root.
    pub fn scene(&self, chat: ChatId) -> Scene {
        self.sessions.get(&chat).copied().unwrap_or_default()
    }

    /// Handle one inbound message and return the replies to send, in order.
    /// Plain text (not a `/command`) is ignored.
    pub async fn handle(&mut self, chat: ChatId, text: &str) -> Vec<String> {
        let Some(command) = ChatCommand::parse(text) else {
            debug!(chat, "Ignoring non-command message");
            return Vec::new();
        };

        let current = self.scene(chat);
        let step = transition(current, &command.name);
        debug!(chat, command = %command.name, scene = %current, kind = ?step.kind, "Dispatching");

        if step.next != current {
            info!(chat, from = %current, to = %step.next, "Scene change");
            if step.next == Scene::Root {
                self.sessions.remove(&chat);
            } else {
                self.sessions.insert(chat, step.next);
            }
        }

        if let Some(reply) = step.lifecycle_reply() {
            return vec![reply];
        }

        self.execute(chat, current, step.kind, &command).await
    }

    async fn execute(
        &self,
        chat: ChatId,
        scene: Scene,
        kind: CommandKind,
        command: &ChatCommand,
    ) -> Vec<String> {
        match kind {
            CommandKind::Help => vec![scene.help().to_string()],
            CommandKind::StartLending => {
                self.lending.start();
                vec!["Start lending".to_string()]
            }
            CommandKind::StopLending => {
                self.lending.stop();
                vec!["Stopping lending".to_string()]
            }
            CommandKind::Balance => match self.exchange.fetch_balances().await {
                Ok(balances) => vec![render::format_balances(&balances)],
                Err(e) => collaborator_failure(chat, &command.name, &e),
            },
            CommandKind::Whois => vec![self.whois(command.arg(0))],
            CommandKind::ListCatalog => vec![render::format_catalog(&self.store.get())],
            CommandKind::UpdateCatalog => self.update_catalog(chat, command).await,
            CommandKind::ShowWatchlist => {
                let list = render::format_watchlist(&self.store.get());
                if list.is_empty() {
                    vec![EMPTY_WATCHLIST.to_string()]
                } else {
                    vec![list]
                }
            }
            CommandKind::AddTicker => match command.arg(0) {
                Some(ticker) => {
                    let coin = self.store.add_to_watchlist(ticker);
                    self.with_commit(format!("Added {coin}")).await
                }
                None => vec![MISSING_TICKER.to_string()],
            },
            CommandKind::RemoveTicker => match command.arg(0) {
                Some(ticker) => match self.store.remove_from_watchlist(ticker) {
                    Ok(coin) => self.with_commit(format!("Removed {coin}")).await,
                    Err(not_found) => vec![not_found.to_string()],
                },
                None => vec![MISSING_TICKER.to_string()],
            },
            CommandKind::TopRates => {
                let result = self.exchange.fetch_rates_for_all(self.top_limit).await;
                rates_reply(chat, &command.name, result)
            }
            CommandKind::TopCryptoRates => {
                let result = self.exchange.fetch_crypto_rates(self.top_limit).await;
                rates_reply(chat, &command.name, result)
            }
            CommandKind::WatchlistRates => {
                let tickers = self.store.get().watchlist;
                if tickers.is_empty() {
                    return vec![EMPTY_WATCHLIST.to_string()];
                }
                let result = self.exchange.fetch_rates_for_tickers(&tickers).await;
                rates_reply(chat, &command.name, result)
            }
            // Scene changes are answered by the lifecycle reply; reaching
            // here means the scene did not change.
            CommandKind::EnterWatchlist | CommandKind::EnterLending | CommandKind::Back => {
                Vec::new()
            }
            CommandKind::Unknown => vec![UNKNOWN_COMMAND.to_string()],
        }
    }

    fn whois(&self, ticker: Option<&str>) -> String {
        let Some(ticker) = ticker else {
            return MISSING_TICKER.to_string();
        };
        match self.store.lookup(ticker) {
            Some(entry) => entry.name,
            None => format!(
                "{} does not exist in the database, please try to update in /watchlist",
                ticker.to_uppercase()
            ),
        }
    }

    async fn update_catalog(&self, chat: ChatId, command: &ChatCommand) -> Vec<String> {
        match self.exchange.fetch_catalog().await {
            Ok(entries) => {
                info!(chat, entries = entries.len(), "Catalog refreshed");
                self.store.replace_catalog(entries, Utc::now());
                self.with_commit("Updated database".to_string()).await
            }
            Err(e) => collaborator_failure(chat, &command.name, &e),
        }
    }

    /// Commit the store and build the reply for a mutation that already
    /// happened in memory.
    async fn with_commit(&self, ack: String) -> Vec<String> {
        let handle = self.store.commit();
        match self.commit_policy {
            CommitPolicy::Background => {
                drop(handle);
                vec![ack]
            }
            CommitPolicy::Awaited => match handle.wait().await {
                Ok(()) => vec![ack],
                Err(e) => {
                    error!(error = %e, "Store write failed");
                    vec![ack, SAVE_FAILED.to_string()]
                }
            },
        }
    }
}

fn collaborator_failure(chat: ChatId, command: &str, e: &anyhow::Error) -> Vec<String> {
    error!(chat, command, error = %e, "Exchange call failed");
    vec![GENERIC_FAILURE.to_string()]
}

fn rates_reply(
    chat: ChatId,
    command: &str,
    result: anyhow::Result<Vec<Option<RateResult>>>,
) -> Vec<String> {
    match result {
        Ok(rates) => {
            let message = render::format_rates(&rates);
            if message.is_empty() {
                vec![NO_RATES.to_string()]
            } else {
                vec![message]
            }
        }
        Err(e) => collaborator_failure(chat, command, &e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
