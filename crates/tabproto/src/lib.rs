//! tabproto - Protocol types for the tabrelay browser bridge
//!
//! Two audiences share these types:
//!
//! - The **peer wire protocol** between tabrelay and a browser extension.
//!   Requests carry a method tag, positional args, and a `guid`; the
//!   extension echoes the `guid` back as `responseGuid` alongside either a
//!   `response` value or an `error` string. See [`envelope`].
//!
//! - The **MCP tool parameters** exposed by tabrelay. The `params` module
//!   derives `JsonSchema` so rmcp can publish accurate input schemas, and
//!   each params type knows how to turn itself into wire args.
//!
//! ## Wire Example
//!
//! ```json
//! {"type": "tabs.query", "args": [{"active": true}], "guid": "5f0c..."}
//! {"responseType": "tabs.query", "responseGuid": "5f0c...", "response": [{"id": 1}]}
//! ```

pub mod envelope;
pub mod method;
pub mod params;

pub use envelope::{parse_inbound, Inbound, PeerResponse, RequestEnvelope, ResponseEnvelope};
pub use method::{BrowserMethod, DeliveryMode, Guid};

use thiserror::Error;

/// Inbound data that could not be understood.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("responseGuid is not a UUID: {0}")]
    InvalidGuid(String),
}
