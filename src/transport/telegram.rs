//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates` and answers with `sendMessage`.
//!
//! API docs: https://core.telegram.org/bots/api
//! Base URL: https://api.telegram.org/bot<token>/<method>
//! Auth: bot token embedded in the URL path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatTransport, InboundMessage};
use crate::chat::ChatId;
use crate::types::LendbotError;

// ---------------------------------------------------------------------------
// API response types (Telegram JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: ChatId,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TelegramTransport {
    http: Client,
    api_base: String,
    token: SecretString,
    poll_timeout_secs: u64,
    /// Next `update_id` to request; acknowledges everything before it.
    offset: i64,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: SecretString, poll_timeout_secs: u64) -> Result<Self> {
        // The HTTP timeout must outlive the long-poll window.
        let http = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .user_agent("LENDBOT/0.1.0 (lending-assistant)")
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            poll_timeout_secs,
            offset: 0,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose_secret(), method)
    }
}

fn unwrap_response<T: DeserializeOwned>(method: &str, text: &str) -> Result<T> {
    let resp: ApiResponse<T> = serde_json::from_str(text)
        .with_context(|| format!("Failed to parse Telegram {method} response"))?;
    match resp {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { description, .. } => Err(LendbotError::Transport(format!(
            "{method}: {}",
            description.unwrap_or_else(|| "request failed".into())
        ))
        .into()),
    }
}

/// Text messages only, plus the offset that acknowledges the whole batch.
fn collect_messages(updates: Vec<Update>, offset: i64) -> (Vec<InboundMessage>, i64) {
    let next = updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .map_or(offset, |max| max.max(offset));
    let messages = updates
        .into_iter()
        .filter_map(|u| u.message)
        .filter_map(|m| {
            m.text.map(|text| InboundMessage {
                chat: m.chat.id,
                text,
            })
        })
        .collect();
    (messages, next)
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn poll(&mut self) -> Result<Vec<InboundMessage>> {
        let resp = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", self.offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
            ])
            .send()
            .await
            // reqwest errors include the URL, which carries the token.
            .map_err(|e| LendbotError::Transport(format!("getUpdates failed: {}", e.without_url())))?;

        let text = resp.text().await.context("Failed to read getUpdates body")?;
        let updates: Vec<Update> = unwrap_response("getUpdates", &text)?;
        let (messages, next) = collect_messages(updates, self.offset);
        self.offset = next;

        if !messages.is_empty() {
            debug!(count = messages.len(), offset = self.offset, "Received updates");
        }
        Ok(messages)
    }

    async fn send(&self, chat: ChatId, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&SendMessage { chat_id: chat, text })
            .send()
            .await
            .map_err(|e| LendbotError::Transport(format!("sendMessage failed: {}", e.without_url())))?;

        let body = resp.text().await.context("Failed to read sendMessage body")?;
        let _: serde_json::Value = unwrap_response("sendMessage", &body)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
