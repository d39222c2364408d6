//! MCP tools exposed to the agent. Each one builds wire args, dispatches
//! through the relay, and shapes the answer.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde_json::{json, Value};
use tabproto::params::{
    QueryInfo, TabsCreateParams, TabsQueryParams, TabsReloadParams, TabsRemoveParams,
    TabsUpdateParams, WindowsGetAllParams,
};
use tabproto::{BrowserMethod, DeliveryMode};
use tracing::warn;

use crate::error::RelayError;
use crate::relay::Relay;
use crate::router::{Dispatch, PeerOutcome};

#[derive(Clone)]
pub struct BrowserTools {
    relay: Arc<Relay>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BrowserTools {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "tabsQuery",
        description = "Query browser tabs. mode=\"all\" asks every connected browser and returns connectionResponses"
    )]
    async fn tabs_query(
        &self,
        Parameters(params): Parameters<TabsQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.args().map_err(encode_error)?;
        let mode = params.mode.unwrap_or_default();
        let result = self.relay.send(BrowserMethod::TabsQuery, args, mode).await;
        shape(result, |tabs| json!({ "tabs": tabs }))
    }

    #[tool(name = "tabsCreate", description = "Create a browser tab")]
    async fn tabs_create(
        &self,
        Parameters(params): Parameters<TabsCreateParams>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.args().map_err(encode_error)?;
        let mode = params.mode.unwrap_or_default();
        let result = self.relay.send(BrowserMethod::TabsCreate, args, mode).await;
        shape(result, tab_object)
    }

    #[tool(
        name = "tabsGetCurrent",
        description = "Get the active tab of the last focused browser window"
    )]
    async fn tabs_get_current(&self) -> Result<CallToolResult, McpError> {
        let args = vec![serde_json::to_value(QueryInfo::current_tab()).map_err(encode_error)?];
        let result = self
            .relay
            .send(BrowserMethod::TabsQuery, args, DeliveryMode::First)
            .await;
        shape(result, |tabs| {
            let tab = tabs
                .as_array()
                .and_then(|list| list.first())
                .cloned()
                .unwrap_or(Value::Null);
            json!({ "tab": tab })
        })
    }

    #[tool(name = "tabsReload", description = "Reload a tab, by default the selected tab of the current window")]
    async fn tabs_reload(
        &self,
        Parameters(params): Parameters<TabsReloadParams>,
    ) -> Result<CallToolResult, McpError> {
        let mode = params.mode.unwrap_or_default();
        let result = self
            .relay
            .send(BrowserMethod::TabsReload, params.args(), mode)
            .await;
        shape(result, |_| json!({ "reloaded": true }))
    }

    #[tool(name = "tabsUpdate", description = "Update a tab's properties, such as navigating it to a new URL")]
    async fn tabs_update(
        &self,
        Parameters(params): Parameters<TabsUpdateParams>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.args().map_err(encode_error)?;
        let mode = params.mode.unwrap_or_default();
        let result = self.relay.send(BrowserMethod::TabsUpdate, args, mode).await;
        shape(result, tab_object)
    }

    #[tool(name = "tabsRemove", description = "Close one or more tabs")]
    async fn tabs_remove(
        &self,
        Parameters(params): Parameters<TabsRemoveParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.tab_ids.is_empty() {
            return Err(McpError::invalid_params("tabIds must not be empty", None));
        }
        let mode = params.mode.unwrap_or_default();
        let removed = params.tab_ids.clone();
        let result = self
            .relay
            .send(BrowserMethod::TabsRemove, params.args(), mode)
            .await;
        shape(result, move |_| json!({ "removed": removed }))
    }

    #[tool(name = "windowsGetAll", description = "List browser windows, optionally with their tabs")]
    async fn windows_get_all(
        &self,
        Parameters(params): Parameters<WindowsGetAllParams>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.args().map_err(encode_error)?;
        let mode = params.mode.unwrap_or_default();
        let result = self
            .relay
            .send(BrowserMethod::WindowsGetAll, args, mode)
            .await;
        shape(result, |windows| json!({ "windows": windows }))
    }

    #[tool(
        name = "listConnectedPeers",
        description = "List browser extensions currently connected to this relay"
    )]
    async fn list_connected_peers(&self) -> Result<CallToolResult, McpError> {
        let peers = self.relay.peers().snapshot();
        Ok(CallToolResult::structured(json!({
            "count": peers.len(),
            "peers": peers,
        })))
    }
}

#[tool_handler]
impl ServerHandler for BrowserTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Browser tab relay.\n\n\
                Tools are forwarded to browser extensions connected over WebSocket. \
                Calls go to the earliest connected browser unless mode is \"all\", \
                in which case every browser is asked and answers come back as \
                connectionResponses in connection order. Failed entries look like \
                {\"error\": ..., \"peer\": <id>}.\n\n\
                If no browser is connected, tools return {\"error\": \"No browser clients connected\"}. \
                Use listConnectedPeers to check."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "tabrelay".to_string(),
                title: Some("Browser Tab Relay".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            ..Default::default()
        }
    }
}

/// Turn a dispatch result into a tool result. `single` shapes a first-mode
/// answer; broadcasts always come back as `connectionResponses`.
fn shape<F>(result: Result<Dispatch, RelayError>, single: F) -> Result<CallToolResult, McpError>
where
    F: FnOnce(Value) -> Value,
{
    match result {
        Ok(Dispatch::Single(value)) => Ok(CallToolResult::structured(single(value))),
        Ok(Dispatch::Broadcast(outcomes)) => {
            let responses: Vec<Value> = outcomes.iter().map(PeerOutcome::to_json).collect();
            Ok(CallToolResult::structured(
                json!({ "connectionResponses": responses }),
            ))
        }
        Err(e) if e.is_tool_error() => {
            Ok(CallToolResult::structured_error(json!({ "error": e.to_string() })))
        }
        Err(e) => {
            warn!(error = %e, "Tool call failed");
            Err(McpError::internal_error(e.to_string(), None))
        }
    }
}

/// Tabs pass through as-is. Anything else, such as the nothing
/// `tabs.update` resolves with when no tab matched, is wrapped as `{tab}`
/// since structured content must be an object.
fn tab_object(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "tab": value })
    }
}

fn encode_error(e: serde_json::Error) -> McpError {
    McpError::internal_error(format!("failed to encode arguments: {}", e), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;
    use tabconf::RelayConfig;
    use tabproto::{Guid, RequestEnvelope};
    use tokio::sync::mpsc;

    fn tools(timeout_ms: u64) -> BrowserTools {
        BrowserTools::new(Arc::new(Relay::new(&RelayConfig {
            timeout_ms,
            outbound_buffer: 8,
        })))
    }

    /// Connect a fake browser that answers each request with `reply`.
    fn connect<F>(tools: &BrowserTools, port: u16, reply: F)
    where
        F: Fn(&RequestEnvelope) -> Result<Value, String> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(8);
        tools
            .relay
            .peers()
            .add(SocketAddr::from(([127, 0, 0, 1], port)), tx);
        let relay = Arc::clone(&tools.relay);
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                let request: RequestEnvelope = serde_json::from_str(&text).unwrap();
                match reply(&request) {
                    Ok(value) => relay.table().complete(&request.guid, value),
                    Err(message) => relay
                        .table()
                        .fail(&request.guid, RelayError::PeerReported { message }),
                };
            }
        });
    }

    fn structured(result: &CallToolResult) -> &Value {
        result.structured_content.as_ref().unwrap()
    }

    #[tokio::test]
    async fn no_peers_is_structured_error() {
        let tools = tools(10_000);
        let result = tools
            .tabs_query(Parameters(TabsQueryParams::default()))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            structured(&result),
            &json!({"error": "No browser clients connected"})
        );
        assert_eq!(tools.relay.table().pending_count(), 0);
    }

    #[tokio::test]
    async fn create_returns_tab_unwrapped() {
        let tools = tools(10_000);
        connect(&tools, 5001, |req| {
            assert_eq!(req.method, BrowserMethod::TabsCreate);
            Ok(json!({"id": 42, "url": req.args[0]["url"]}))
        });

        let params: TabsCreateParams =
            serde_json::from_value(json!({"url": "https://example.com"})).unwrap();
        let result = tools.tabs_create(Parameters(params)).await.unwrap();

        assert_eq!(
            structured(&result),
            &json!({"id": 42, "url": "https://example.com"})
        );
    }

    #[tokio::test]
    async fn update_without_tab_is_still_an_object() {
        let tools = tools(10_000);
        connect(&tools, 5001, |req| {
            assert_eq!(req.method, BrowserMethod::TabsUpdate);
            Ok(Value::Null)
        });

        let params: TabsUpdateParams =
            serde_json::from_value(json!({"tabId": 3, "url": "https://example.com"})).unwrap();
        let result = tools.tabs_update(Parameters(params)).await.unwrap();

        assert_eq!(result.is_error, Some(false));
        assert_eq!(structured(&result), &json!({"tab": null}));
    }

    #[tokio::test]
    async fn create_with_non_object_answer_is_wrapped() {
        let tools = tools(10_000);
        connect(&tools, 5001, |_| Ok(json!([1, 2])));

        let params: TabsCreateParams = serde_json::from_value(json!({})).unwrap();
        let result = tools.tabs_create(Parameters(params)).await.unwrap();

        assert_eq!(structured(&result), &json!({"tab": [1, 2]}));
    }

    #[test]
    fn server_info_names_the_relay() {
        let info = tools(10_000).get_info();
        assert_eq!(info.server_info.name, "tabrelay");
        assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn query_wraps_tabs_and_broadcast_wraps_responses() {
        let tools = tools(10_000);
        connect(&tools, 5001, |_| Ok(json!([{"id": 1}])));
        connect(&tools, 5002, |_| Err("tabs permission missing".to_string()));

        let first = tools
            .tabs_query(Parameters(TabsQueryParams::default()))
            .await
            .unwrap();
        assert_eq!(structured(&first), &json!({"tabs": [{"id": 1}]}));

        let all = TabsQueryParams {
            mode: Some(DeliveryMode::All),
            ..Default::default()
        };
        let result = tools.tabs_query(Parameters(all)).await.unwrap();
        assert_eq!(
            structured(&result),
            &json!({"connectionResponses": [
                [{"id": 1}],
                {"error": "tabs permission missing", "peer": 2}
            ]})
        );
    }

    #[tokio::test]
    async fn get_current_picks_first_match() {
        let tools = tools(10_000);
        connect(&tools, 5001, |req| {
            assert_eq!(req.args, vec![json!({"active": true, "lastFocusedWindow": true})]);
            Ok(json!([{"id": 7, "active": true}]))
        });

        let result = tools.tabs_get_current().await.unwrap();
        assert_eq!(structured(&result), &json!({"tab": {"id": 7, "active": true}}));
    }

    #[tokio::test]
    async fn get_current_with_no_match_is_null() {
        let tools = tools(10_000);
        connect(&tools, 5001, |_| Ok(json!([])));

        let result = tools.tabs_get_current().await.unwrap();
        assert_eq!(structured(&result), &json!({"tab": null}));
    }

    #[tokio::test]
    async fn peer_error_is_structured_error() {
        let tools = tools(10_000);
        connect(&tools, 5001, |_| Err("No tab with id: 99.".to_string()));

        let params = TabsReloadParams {
            tab_id: Some(99),
            ..Default::default()
        };
        let result = tools.tabs_reload(Parameters(params)).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(structured(&result), &json!({"error": "No tab with id: 99."}));
    }

    #[tokio::test]
    async fn reload_and_remove_shapes() {
        let tools = tools(10_000);
        connect(&tools, 5001, |_| Ok(Value::Null));

        let reloaded = tools
            .tabs_reload(Parameters(TabsReloadParams::default()))
            .await
            .unwrap();
        assert_eq!(structured(&reloaded), &json!({"reloaded": true}));

        let params = TabsRemoveParams {
            tab_ids: vec![3, 4],
            mode: None,
        };
        let removed = tools.tabs_remove(Parameters(params)).await.unwrap();
        assert_eq!(structured(&removed), &json!({"removed": [3, 4]}));
    }

    #[tokio::test]
    async fn remove_requires_ids() {
        let tools = tools(10_000);
        connect(&tools, 5001, |_| Ok(Value::Null));

        let err = tools
            .tabs_remove(Parameters(TabsRemoveParams::default()))
            .await
            .unwrap_err();
        assert!(err.message.contains("tabIds"));
        assert_eq!(tools.relay.table().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_protocol_error() {
        let tools = tools(10_000);
        let (tx, _rx) = mpsc::channel::<String>(8);
        tools
            .relay
            .peers()
            .add(SocketAddr::from(([127, 0, 0, 1], 5001)), tx);

        let err = tools
            .windows_get_all(Parameters(WindowsGetAllParams::default()))
            .await
            .unwrap_err();
        assert!(err
            .message
            .starts_with("Timeout waiting for response to guid: "));
        let guid = err.message.rsplit(' ').next().unwrap();
        assert!(guid.parse::<Guid>().is_ok());
    }

    #[tokio::test]
    async fn list_peers_is_local() {
        let tools = tools(10_000);
        connect(&tools, 5001, |_| Ok(Value::Null));
        connect(&tools, 5002, |_| Ok(Value::Null));

        let result = tools.list_connected_peers().await.unwrap();
        let body = structured(&result);
        assert_eq!(body["count"], 2);
        assert_eq!(body["peers"][0]["remoteAddr"], "127.0.0.1:5001");
        assert_eq!(body["peers"][1]["id"], 2);
        assert_eq!(tools.relay.table().pending_count(), 0);
    }

    #[test]
    fn tool_names_are_camel_case() {
        let tools = tools(10_000);
        let mut names: Vec<String> = tools
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "listConnectedPeers",
                "tabsCreate",
                "tabsGetCurrent",
                "tabsQuery",
                "tabsReload",
                "tabsRemove",
                "tabsUpdate",
                "windowsGetAll",
            ]
        );
    }
}
