//! Request and response envelopes for the peer wire protocol.
//!
//! Everything travels as a JSON text frame. Outbound requests are fully
//! typed; inbound frames are classified by [`parse_inbound`] so the listener
//! can route responses and drop everything else.

use crate::method::{BrowserMethod, Guid};
use crate::ProtoError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request sent to a peer. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "type")]
    pub method: BrowserMethod,
    pub args: Vec<Value>,
    pub guid: Guid,
}

impl RequestEnvelope {
    pub fn new(method: BrowserMethod, args: Vec<Value>, guid: Guid) -> Self {
        Self { method, args, guid }
    }

    /// Render as a text frame.
    pub fn to_text(&self) -> Result<String, ProtoError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What a peer sends back. Every field is optional on the wire; the
/// extension sends `responseGuid: null` when the request it is answering
/// had no guid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_guid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// A successful answer to `guid`.
    pub fn success(method: BrowserMethod, guid: Guid, response: Value) -> Self {
        Self {
            response_type: Some(method.as_str().to_string()),
            response_guid: Some(guid.to_string()),
            response: Some(response),
            error: None,
        }
    }

    /// A failed answer to `guid`.
    pub fn failure(method: BrowserMethod, guid: Guid, message: impl Into<String>) -> Self {
        Self {
            response_type: Some(method.as_str().to_string()),
            response_guid: Some(guid.to_string()),
            response: None,
            error: Some(message.into()),
        }
    }
}

/// A response tagged with a guid we can look up.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerResponse {
    pub guid: Guid,
    pub response_type: Option<String>,
    /// `Err` carries the peer's own error message.
    pub outcome: Result<Value, String>,
}

/// Classification of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Carries a `responseGuid`; route it to the correlation table.
    Response(PeerResponse),
    /// Valid JSON object with no guid; nothing can be waiting for it.
    Untagged { response_type: Option<String> },
}

/// Parse and classify an inbound text frame.
///
/// An `error` field wins over `response`. A missing `response` on a
/// success is `null`, which is what `browser.tabs.reload` resolves with.
pub fn parse_inbound(text: &str) -> Result<Inbound, ProtoError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(ProtoError::NotAnObject(json_kind(&value)));
    }

    let envelope: ResponseEnvelope = serde_json::from_value(value)?;
    let Some(raw_guid) = envelope.response_guid else {
        return Ok(Inbound::Untagged {
            response_type: envelope.response_type,
        });
    };

    let guid = raw_guid
        .parse::<Guid>()
        .map_err(|_| ProtoError::InvalidGuid(raw_guid))?;

    let outcome = match envelope.error {
        Some(message) => Err(message),
        None => Ok(envelope.response.unwrap_or(Value::Null)),
    };

    Ok(Inbound::Response(PeerResponse {
        guid,
        response_type: envelope.response_type,
        outcome,
    }))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
