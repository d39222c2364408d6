//! tabrelay - MCP tools for browser tabs, relayed to browser extensions
//!
//! An agent talks MCP over stdio. Each tool call becomes a JSON request
//! frame sent over WebSocket to one or every connected browser extension,
//! tagged with a fresh guid. The extension answers asynchronously with the
//! same guid as `responseGuid`, and the correlation table wakes the caller.
//! Calls that get no answer within the configured window fail with a
//! timeout.

pub mod correlation;
pub mod error;
pub mod handler;
pub mod listener;
pub mod peers;
pub mod relay;
pub mod router;
pub mod stdio;
pub mod telemetry;

pub use error::RelayError;
pub use relay::Relay;
