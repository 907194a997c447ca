//! MCP protocol adapter: tools, resources and prompts over JSON-RPC 2.0.
//!
//! [`handle_request`] is transport agnostic; `stdio` and the `/mcp` HTTP
//! route both feed it.

mod error;
mod prompts;
mod resources;
mod stdio;
mod tools;
pub mod types;

pub use error::McpError;
pub use prompts::{get_prompt, PromptRequest, Timeframe};
pub use resources::{list_resources, read_resource, ResourceUri};
pub use stdio::{serve_lines, serve_stdio};
pub use tools::{call_tool, ToolCall};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url2md_logging::{conv_debug, conv_warn};

use crate::context::AppContext;
use types::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, PromptGetParams, ResourceReadParams,
    ServerInfo, ToolCallParams, PROTOCOL_VERSION,
};

/// Closed set of methods this server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Initialized,
    Ping,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
    PromptsList,
    PromptsGet,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "initialize" => Method::Initialize,
            "notifications/initialized" | "initialized" => Method::Initialized,
            "ping" => Method::Ping,
            "tools/list" => Method::ToolsList,
            "tools/call" => Method::ToolsCall,
            "resources/list" => Method::ResourcesList,
            "resources/read" => Method::ResourcesRead,
            "prompts/list" => Method::PromptsList,
            "prompts/get" => Method::PromptsGet,
            _ => return None,
        })
    }
}

/// Answers one request. Notifications get no response.
pub async fn handle_request(ctx: &AppContext, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    if request.jsonrpc != "2.0" {
        if request.is_notification() {
            conv_warn!("Dropped notification with jsonrpc version {:?}", request.jsonrpc);
            return None;
        }
        return Some(JsonRpcResponse::invalid_request(request.id));
    }
    let notification = request.is_notification();
    let response = dispatch(ctx, request).await;
    if notification {
        None
    } else {
        Some(response)
    }
}

/// Parses and answers one raw frame.
pub async fn handle_message(ctx: &AppContext, text: &str) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<JsonRpcRequest>(text) {
        Ok(request) => handle_request(ctx, request).await,
        Err(err) => {
            conv_warn!("Rejected malformed JSON-RPC frame: {}", err);
            Some(JsonRpcResponse::parse_error(&err.to_string()))
        }
    }
}

async fn dispatch(ctx: &AppContext, request: JsonRpcRequest) -> JsonRpcResponse {
    let JsonRpcRequest {
        method, params, id, ..
    } = request;
    let Some(parsed) = Method::parse(&method) else {
        return JsonRpcResponse::method_not_found(id, &method);
    };
    conv_debug!("MCP request {}", method);

    match parsed {
        Method::Initialize => to_response(
            id,
            &InitializeResult {
                protocol_version: PROTOCOL_VERSION,
                capabilities: json!({
                    "tools": { "listChanged": false },
                    "resources": {},
                    "prompts": {}
                }),
                server_info: ServerInfo::default(),
            },
        ),
        Method::Initialized | Method::Ping => JsonRpcResponse::success(id, json!({})),
        Method::ToolsList => JsonRpcResponse::success(id, json!({ "tools": tools::definitions() })),
        Method::ToolsCall => match parse_params::<ToolCallParams>(params) {
            Ok(call) => {
                let result = call_tool(ctx, &call.name, &call.arguments).await;
                to_response(id, &result)
            }
            Err(detail) => JsonRpcResponse::invalid_params(id, &detail),
        },
        Method::ResourcesList => {
            JsonRpcResponse::success(id, json!({ "resources": list_resources(ctx) }))
        }
        Method::ResourcesRead => match parse_params::<ResourceReadParams>(params) {
            Ok(read) => match read_resource(ctx, &read.uri) {
                Ok(contents) => JsonRpcResponse::success(id, json!({ "contents": [contents] })),
                Err(err) => error_response(id, err),
            },
            Err(detail) => JsonRpcResponse::invalid_params(id, &detail),
        },
        Method::PromptsList => {
            JsonRpcResponse::success(id, json!({ "prompts": prompts::definitions() }))
        }
        Method::PromptsGet => match parse_params::<PromptGetParams>(params) {
            Ok(get) => match get_prompt(ctx, &get.name, &get.arguments) {
                Ok(prompt) => to_response(id, &prompt),
                Err(err) => error_response(id, err),
            },
            Err(detail) => JsonRpcResponse::invalid_params(id, &detail),
        },
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, String> {
    let params = params.ok_or_else(|| "missing params".to_string())?;
    serde_json::from_value(params).map_err(|err| err.to_string())
}

fn to_response<T: serde::Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(err) => JsonRpcResponse::internal_error(id, &err.to_string()),
    }
}

fn error_response(id: Option<Value>, err: McpError) -> JsonRpcResponse {
    JsonRpcResponse::error(id, err.code(), err.to_string())
}
