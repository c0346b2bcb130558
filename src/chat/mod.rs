//! Conversation layer.
//!
//! `scene` holds the per-state command tables and the pure transition
//! function; `router` executes commands against the store and the exchange
//! collaborators and produces the replies.

pub mod router;
pub mod scene;

pub use router::{ChatId, CommitPolicy, SessionRouter};
pub use scene::{transition, CommandKind, Scene, Transition};

/// A parsed `/command arg ...` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ChatCommand {
    /// Parse a chat message. Returns `None` for plain text.
    ///
    /// A `@botname` suffix on the command (as sent in group chats) is dropped.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head);
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            args: parts.map(String::from).collect(),
        })
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}
