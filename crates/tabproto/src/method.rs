//! Identifiers and tags shared by both ends of the wire.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Guid - correlation identifier
// ============================================================================

/// Correlates one request with its response. Random v4, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Guid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// BrowserMethod - wire tags
// ============================================================================

/// Browser API calls the extension knows how to execute.
///
/// The tag is `<namespace>.<method>`; the extension splits on the dot and
/// calls `browser[namespace][method](...args)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowserMethod {
    #[serde(rename = "tabs.query")]
    TabsQuery,
    #[serde(rename = "tabs.create")]
    TabsCreate,
    #[serde(rename = "tabs.reload")]
    TabsReload,
    #[serde(rename = "tabs.update")]
    TabsUpdate,
    #[serde(rename = "tabs.remove")]
    TabsRemove,
    #[serde(rename = "windows.getAll")]
    WindowsGetAll,
}

impl BrowserMethod {
    pub const ALL: [BrowserMethod; 6] = [
        BrowserMethod::TabsQuery,
        BrowserMethod::TabsCreate,
        BrowserMethod::TabsReload,
        BrowserMethod::TabsUpdate,
        BrowserMethod::TabsRemove,
        BrowserMethod::WindowsGetAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserMethod::TabsQuery => "tabs.query",
            BrowserMethod::TabsCreate => "tabs.create",
            BrowserMethod::TabsReload => "tabs.reload",
            BrowserMethod::TabsUpdate => "tabs.update",
            BrowserMethod::TabsRemove => "tabs.remove",
            BrowserMethod::WindowsGetAll => "windows.getAll",
        }
    }
}

impl fmt::Display for BrowserMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DeliveryMode
// ============================================================================

/// How many peers a call goes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// The earliest connected peer; its answer is returned unwrapped.
    #[default]
    First,
    /// Every open peer; answers are collected in connection order.
    All,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::First => f.write_str("first"),
            DeliveryMode::All => f.write_str("all"),
        }
    }
}
