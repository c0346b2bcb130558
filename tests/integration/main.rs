//! Integration tests: full conversations against an in-memory exchange.

mod conversation;
mod mock_exchange;
