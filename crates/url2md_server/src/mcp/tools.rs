use serde_json::{json, Value};
use url2md_core::{ConversionJob, JobId, JobStatus};

use super::error::McpError;
use super::types::{McpToolDefinition, ToolCallResult};
use crate::context::AppContext;
use crate::flow::{run_conversion, ConversionRequest};

const DEFAULT_LIST_LIMIT: usize = 10;
const TOOL_ORIGIN: &str = "mcp";

/// Every callable tool with its validated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ConvertUrl(ConversionRequest),
    GetConversionStatus { conversion_id: String },
    ListRecentConversions { limit: usize },
}

impl ToolCall {
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, McpError> {
        match name {
            "convert_url_to_markdown" => {
                let url = arguments
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        McpError::InvalidArguments("URL is required and must be a string".into())
                    })?;
                Ok(ToolCall::ConvertUrl(ConversionRequest {
                    url: url.to_string(),
                    include_images: bool_arg(arguments, "includeImages", true),
                    clean_html: bool_arg(arguments, "cleanHtml", false),
                }))
            }
            "get_conversion_status" => {
                let conversion_id = arguments
                    .get("conversionId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        McpError::InvalidArguments(
                            "Conversion ID is required and must be a string".into(),
                        )
                    })?;
                Ok(ToolCall::GetConversionStatus {
                    conversion_id: conversion_id.to_string(),
                })
            }
            "list_recent_conversions" => {
                let limit = arguments
                    .get("limit")
                    .and_then(Value::as_u64)
                    .filter(|limit| *limit > 0)
                    .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
                    .unwrap_or(DEFAULT_LIST_LIMIT);
                Ok(ToolCall::ListRecentConversions { limit })
            }
            other => Err(McpError::UnknownTool(other.to_string())),
        }
    }
}

fn bool_arg(arguments: &Value, key: &str, default: bool) -> bool {
    arguments.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Runs a tool by name. Never fails: problems come back as an error result.
pub async fn call_tool(ctx: &AppContext, name: &str, arguments: &Value) -> ToolCallResult {
    let call = match ToolCall::parse(name, arguments) {
        Ok(call) => call,
        Err(err) => return ToolCallResult::error(err),
    };
    match execute(ctx, call).await {
        Ok(result) => result,
        Err(err) => ToolCallResult::error(err),
    }
}

pub async fn execute(ctx: &AppContext, call: ToolCall) -> Result<ToolCallResult, McpError> {
    match call {
        ToolCall::ConvertUrl(request) => {
            let job = run_conversion(ctx, &request, TOOL_ORIGIN).await;
            Ok(conversion_result(&job))
        }
        ToolCall::GetConversionStatus { conversion_id } => {
            let job = find_job(ctx, &conversion_id)?;
            Ok(ToolCallResult::text(pretty(&json!({
                "id": job.id,
                "url": job.url,
                "status": job.status,
                "title": job.title,
                "createdAt": job.created_at,
                "completedAt": job.completed_at,
                "errorMessage": job.error_message,
            }))))
        }
        ToolCall::ListRecentConversions { limit } => {
            let summaries: Vec<_> = ctx
                .store
                .list_recent(limit)
                .iter()
                .map(ConversionJob::summary)
                .collect();
            Ok(ToolCallResult::text(pretty(&json!(summaries))))
        }
    }
}

fn conversion_result(job: &ConversionJob) -> ToolCallResult {
    match (job.status, &job.markdown) {
        (JobStatus::Completed, Some(markdown)) => ToolCallResult::text(format!(
            "Successfully converted URL: {}\n\nTitle: {}\n\n{}",
            job.url,
            job.title.as_deref().unwrap_or_default(),
            markdown
        )),
        _ => ToolCallResult::error(
            job.error_message
                .as_deref()
                .unwrap_or("Conversion did not complete"),
        ),
    }
}

/// Looks a job up by its textual id. Ids that do not parse are simply unknown.
pub(crate) fn find_job(ctx: &AppContext, id: &str) -> Result<ConversionJob, McpError> {
    id.parse::<JobId>()
        .ok()
        .and_then(|job_id| ctx.store.get(job_id))
        .ok_or_else(|| McpError::NotFound(id.to_string()))
}

pub(crate) fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn definitions() -> Vec<McpToolDefinition> {
    vec![
        McpToolDefinition {
            name: "convert_url_to_markdown",
            description: "Convert a web page URL to markdown format",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "format": "uri",
                        "description": "The URL of the web page to convert"
                    },
                    "includeImages": {
                        "type": "boolean",
                        "default": true,
                        "description": "Whether to include images in the markdown"
                    },
                    "cleanHtml": {
                        "type": "boolean",
                        "default": false,
                        "description": "Whether to use Readability to clean the HTML before conversion"
                    }
                },
                "required": ["url"]
            }),
        },
        McpToolDefinition {
            name: "get_conversion_status",
            description: "Get the status of a conversion by ID",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "conversionId": {
                        "type": "string",
                        "description": "The ID of the conversion to check"
                    }
                },
                "required": ["conversionId"]
            }),
        },
        McpToolDefinition {
            name: "list_recent_conversions",
            description: "List recent URL conversions",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "number",
                        "default": 10,
                        "minimum": 1,
                        "maximum": 50,
                        "description": "Maximum number of conversions to return"
                    }
                }
            }),
        },
    ]
}
