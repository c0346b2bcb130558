//! Chat transports.
//!
//! Defines the `ChatTransport` trait and the serve loop that feeds inbound
//! messages to the `SessionRouter`. The Telegram Bot API implementation
//! lives in `telegram`.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatId, SessionRouter};

/// One inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat: ChatId,
    pub text: String,
}

/// Abstraction over chat delivery.
#[async_trait]
pub trait ChatTransport: Send {
    /// Wait for the next batch of messages. May return an empty batch.
    async fn poll(&mut self) -> Result<Vec<InboundMessage>>;

    async fn send(&self, chat: ChatId, text: &str) -> Result<()>;
}

/// First pause after a failed poll. Doubles on each consecutive failure.
pub const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for the pause between failed polls.
pub const MAX_POLL_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Serve until `shutdown` resolves.
///
/// Messages are handled one at a time, each to completion, so commands from
/// the same chat never interleave. Transport errors are logged and the loop
/// keeps going after a backoff pause, which a successful poll resets.
pub async fn serve<T, S>(transport: &mut T, router: &mut SessionRouter, shutdown: S) -> Result<()>
where
    T: ChatTransport,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!("Serving chat commands");

    let mut retry_delay = POLL_RETRY_DELAY;

    loop {
        let batch = tokio::select! {
            batch = transport.poll() => batch,
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                return Ok(());
            }
        };

        let messages = match batch {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, retry_in = ?retry_delay, "Polling failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(retry_delay) => {}
                    _ = &mut shutdown => {
                        info!("Shutdown signal received.");
                        return Ok(());
                    }
                }
                retry_delay = (retry_delay * 2).min(MAX_POLL_RETRY_DELAY);
                continue;
            }
        };
        retry_delay = POLL_RETRY_DELAY;

        for message in messages {
            debug!(chat = message.chat, text = %message.text, "Inbound message");
            let replies = router.handle(message.chat, &message.text).await;
            for reply in replies.iter().filter(|r| !r.is_empty()) {
                if let Err(e) = transport.send(message.chat, reply).await {
                    error!(chat = message.chat, error = %e, "Failed to send reply");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
