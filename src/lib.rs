//! LENDBOT: chat-driven watchlist and lending-rate assistant
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod storage;
pub mod render;
pub mod exchange;
pub mod chat;
pub mod transport;
