//! Tool parameter types with JSON Schema derivation
//!
//! tabrelay hands these to rmcp, which publishes the derived schemas and
//! rejects malformed input before any frame reaches a peer. Field names are
//! camelCase to match the browser extension API they are forwarded to.
//!
//! Each type knows how to become the positional `args` of a wire request.

use crate::method::DeliveryMode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// tabs.query
// ============================================================================

/// Match tabs against one or more URL patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum UrlPattern {
    One(String),
    Many(Vec<String>),
}

/// Filter for `tabs.query`. Every field is optional; an empty filter
/// matches every tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryInfo {
    /// Whether the tabs are active in their windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Whether the tabs are audible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audible: Option<bool>,
    /// Whether the tabs can be discarded automatically when resources are low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_discardable: Option<bool>,
    /// Whether the tabs are in the current window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_window: Option<bool>,
    /// Whether the tabs are discarded (unloaded from memory but still in the tab strip).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded: Option<bool>,
    /// Whether the tabs are frozen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
    /// ID of the group the tabs are in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    /// Whether the tabs are highlighted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<bool>,
    /// Position of the tabs within their windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// Whether the tabs are in the last focused window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_focused_window: Option<bool>,
    /// Whether the tabs are muted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    /// Whether the tabs are pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// Tab loading status ("loading", "complete", "unloaded").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Match page titles against a pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Match tabs against one or more URL patterns. Fragments are not matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<UrlPattern>,
    /// ID of the parent window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<i64>,
    /// Type of window the tabs are in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_type: Option<String>,
}

impl QueryInfo {
    /// The active tab of the most recently focused window.
    pub fn current_tab() -> Self {
        Self {
            active: Some(true),
            last_focused_window: Some(true),
            ..Default::default()
        }
    }
}

/// Parameters for tabsQuery tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TabsQueryParams {
    #[serde(flatten)]
    pub query: QueryInfo,
    /// "first" asks one browser, "all" asks every connected browser. Default: first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeliveryMode>,
}

impl TabsQueryParams {
    pub fn args(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![serde_json::to_value(&self.query)?])
    }
}

// ============================================================================
// tabs.create
// ============================================================================

/// Properties for `tabs.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProperties {
    /// Whether the tab should become the active tab in the window. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Position the tab should take in the window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// ID of the tab that opened this tab. Must be in the same window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opener_tab_id: Option<i64>,
    /// Whether the tab should be pinned. Defaults to false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// URL to navigate to. Fully-qualified URLs must include a scheme.
    /// Defaults to the New Tab Page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Window to create the tab in. Defaults to the current window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<i64>,
}

/// Parameters for tabsCreate tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TabsCreateParams {
    #[serde(flatten)]
    pub properties: CreateProperties,
    /// "first" or "all". Default: first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeliveryMode>,
}

impl TabsCreateParams {
    pub fn args(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![serde_json::to_value(&self.properties)?])
    }
}

// ============================================================================
// tabs.reload
// ============================================================================

/// Parameters for tabsReload tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TabsReloadParams {
    /// Tab to reload. Defaults to the selected tab of the current window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    /// Whether to bypass local caching. Defaults to false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass_cache: Option<bool>,
    /// "first" or "all". Default: first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeliveryMode>,
}

impl TabsReloadParams {
    /// `[tabId?, reloadProperties?]`, omitting trailing absent arguments.
    pub fn args(&self) -> Vec<Value> {
        let mut args = Vec::with_capacity(2);
        if let Some(id) = self.tab_id {
            args.push(Value::from(id));
        }
        if let Some(bypass) = self.bypass_cache {
            args.push(serde_json::json!({ "bypassCache": bypass }));
        }
        args
    }
}

// ============================================================================
// tabs.update
// ============================================================================

/// Properties for `tabs.update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProperties {
    /// Make the tab active in its window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Whether the browser may discard the tab when resources are low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_discardable: Option<bool>,
    /// Add the tab to or remove it from the current selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<bool>,
    /// Whether the tab should be muted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    /// ID of the tab that opened this tab.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opener_tab_id: Option<i64>,
    /// Whether the tab should be pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// URL to navigate the tab to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Parameters for tabsUpdate tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TabsUpdateParams {
    /// Tab to update. Defaults to the selected tab of the current window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    #[serde(flatten)]
    pub properties: UpdateProperties,
    /// "first" or "all". Default: first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeliveryMode>,
}

impl TabsUpdateParams {
    /// `[tabId?, updateProperties]`
    pub fn args(&self) -> Result<Vec<Value>, serde_json::Error> {
        let mut args = Vec::with_capacity(2);
        if let Some(id) = self.tab_id {
            args.push(Value::from(id));
        }
        args.push(serde_json::to_value(&self.properties)?);
        Ok(args)
    }
}

// ============================================================================
// tabs.remove
// ============================================================================

/// Parameters for tabsRemove tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TabsRemoveParams {
    /// Tabs to close. At least one.
    pub tab_ids: Vec<i64>,
    /// "first" or "all". Default: first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeliveryMode>,
}

impl TabsRemoveParams {
    pub fn args(&self) -> Vec<Value> {
        vec![Value::from(self.tab_ids.clone())]
    }
}

// ============================================================================
// windows.getAll
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Normal,
    Popup,
    Panel,
    App,
    Devtools,
}

/// Parameters for windowsGetAll tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WindowsGetAllParams {
    /// Include each window's tabs in the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate: Option<bool>,
    /// Only return windows of these types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_types: Option<Vec<WindowType>>,
    /// "first" or "all". Default: first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeliveryMode>,
}

impl WindowsGetAllParams {
    pub fn args(&self) -> Result<Vec<Value>, serde_json::Error> {
        let mut options = serde_json::Map::new();
        if let Some(populate) = self.populate {
            options.insert("populate".to_string(), Value::Bool(populate));
        }
        if let Some(types) = &self.window_types {
            options.insert("windowTypes".to_string(), serde_json::to_value(types)?);
        }
        Ok(vec![Value::Object(options)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn query_args_drop_mode_and_absent_fields() {
        let params: TabsQueryParams = serde_json::from_value(json!({
            "active": true,
            "url": ["*://example.com/*", "*://example.org/*"],
            "mode": "all"
        }))
        .unwrap();

        assert_eq!(params.mode, Some(DeliveryMode::All));
        assert_eq!(
            params.args().unwrap(),
            vec![json!({
                "active": true,
                "url": ["*://example.com/*", "*://example.org/*"]
            })]
        );
    }

    #[test]
    fn empty_query_is_empty_object() {
        let params: TabsQueryParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.mode, None);
        assert_eq!(params.args().unwrap(), vec![json!({})]);
    }

    #[test]
    fn current_tab_filter() {
        assert_eq!(
            serde_json::to_value(QueryInfo::current_tab()).unwrap(),
            json!({"active": true, "lastFocusedWindow": true})
        );
    }

    #[test]
    fn create_args_use_camel_case() {
        let params: TabsCreateParams = serde_json::from_value(json!({
            "url": "https://example.com",
            "openerTabId": 3
        }))
        .unwrap();
        assert_eq!(
            params.args().unwrap(),
            vec![json!({"url": "https://example.com", "openerTabId": 3})]
        );
    }

    #[test]
    fn reload_args_are_positional() {
        let none = TabsReloadParams::default();
        assert_eq!(none.args(), Vec::<Value>::new());

        let id_only = TabsReloadParams {
            tab_id: Some(7),
            ..Default::default()
        };
        assert_eq!(id_only.args(), vec![json!(7)]);

        let both = TabsReloadParams {
            tab_id: Some(7),
            bypass_cache: Some(true),
            mode: None,
        };
        assert_eq!(both.args(), vec![json!(7), json!({"bypassCache": true})]);

        let props_only = TabsReloadParams {
            bypass_cache: Some(false),
            ..Default::default()
        };
        assert_eq!(props_only.args(), vec![json!({"bypassCache": false})]);
    }

    #[test]
    fn update_args_put_id_first() {
        let params: TabsUpdateParams =
            serde_json::from_value(json!({"tabId": 9, "pinned": true})).unwrap();
        assert_eq!(params.args().unwrap(), vec![json!(9), json!({"pinned": true})]);
    }

    #[test]
    fn remove_args_wrap_ids() {
        let params: TabsRemoveParams = serde_json::from_value(json!({"tabIds": [1, 2]})).unwrap();
        assert_eq!(params.args(), vec![json!([1, 2])]);
    }

    #[test]
    fn windows_args() {
        let params: WindowsGetAllParams =
            serde_json::from_value(json!({"populate": true, "windowTypes": ["normal"]})).unwrap();
        assert_eq!(
            params.args().unwrap(),
            vec![json!({"populate": true, "windowTypes": ["normal"]})]
        );
    }

    #[test]
    fn bad_mode_is_rejected() {
        let err = serde_json::from_value::<TabsQueryParams>(json!({"mode": "both"}));
        assert!(err.is_err());
    }
}
