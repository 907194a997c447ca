use chrono::{Duration, Utc};
use serde_json::{json, Value};
use url2md_core::JobStatus;

use super::error::McpError;
use super::tools::{find_job, pretty};
use super::types::{PromptArgument, PromptDescriptor, PromptMessage, PromptResult};
use crate::context::AppContext;

const ACTIVITY_WINDOW: usize = 50;
const REPORT_JOB_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    LastHour,
    #[default]
    LastDay,
    LastWeek,
}

impl Timeframe {
    /// Unrecognized names fall back to the last day.
    pub fn from_arg(name: Option<&str>) -> Self {
        match name {
            Some("last_hour") => Timeframe::LastHour,
            Some("last_week") => Timeframe::LastWeek,
            _ => Timeframe::LastDay,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::LastHour => "last_hour",
            Timeframe::LastDay => "last_day",
            Timeframe::LastWeek => "last_week",
        }
    }

    pub fn window(self) -> Duration {
        match self {
            Timeframe::LastHour => Duration::hours(1),
            Timeframe::LastDay => Duration::days(1),
            Timeframe::LastWeek => Duration::weeks(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRequest {
    SummarizeConversion { conversion_id: String },
    AnalyzeServerPerformance,
    CreateConversionReport { timeframe: Timeframe },
}

impl PromptRequest {
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, McpError> {
        match name {
            "summarize_conversion" => {
                let conversion_id = arguments
                    .get("conversionId")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| McpError::InvalidArguments("Conversion ID is required".into()))?;
                Ok(PromptRequest::SummarizeConversion {
                    conversion_id: conversion_id.to_string(),
                })
            }
            "analyze_server_performance" => Ok(PromptRequest::AnalyzeServerPerformance),
            "create_conversion_report" => Ok(PromptRequest::CreateConversionReport {
                timeframe: Timeframe::from_arg(arguments.get("timeframe").and_then(Value::as_str)),
            }),
            other => Err(McpError::UnknownPrompt(other.to_string())),
        }
    }
}

pub fn get_prompt(ctx: &AppContext, name: &str, arguments: &Value) -> Result<PromptResult, McpError> {
    match PromptRequest::parse(name, arguments)? {
        PromptRequest::SummarizeConversion { conversion_id } => summarize(ctx, &conversion_id),
        PromptRequest::AnalyzeServerPerformance => Ok(analyze_performance(ctx)),
        PromptRequest::CreateConversionReport { timeframe } => Ok(conversion_report(ctx, timeframe)),
    }
}

fn summarize(ctx: &AppContext, conversion_id: &str) -> Result<PromptResult, McpError> {
    let job = find_job(ctx, conversion_id)?;
    let markdown = match (job.status, job.markdown.as_deref()) {
        (JobStatus::Completed, Some(markdown)) => markdown,
        _ => return Err(McpError::NotCompleted(conversion_id.to_string())),
    };

    let text = format!(
        "Please provide a concise summary of the following markdown content that was converted from the URL: {url}\n\n\
         Title: {title}\n\n\
         Content:\n{markdown}\n\n\
         Please include:\n\
         1. A brief description of what the content is about\n\
         2. Key topics or themes covered\n\
         3. Notable features or highlights\n\
         4. Estimated reading time\n\
         5. Content quality assessment\n\n\
         Keep the summary informative but concise (2-3 paragraphs maximum).",
        url = job.url,
        title = job.title.as_deref().unwrap_or_default(),
        markdown = markdown,
    );

    Ok(PromptResult {
        description: format!("Summarize the conversion of {}", job.url),
        messages: vec![PromptMessage::user(text)],
    })
}

fn analyze_performance(ctx: &AppContext) -> PromptResult {
    let stats = ctx.stats.snapshot();
    let breakdown = ctx.activity.breakdown(ACTIVITY_WINDOW);

    let text = format!(
        "Please analyze the following server performance data and provide insights and recommendations:\n\n\
         Server Statistics:\n{stats}\n\n\
         Active MCP Connections: {connections}\n\n\
         Recent Activity Summary:\n\
         - Total log entries: {total}\n\
         - Success entries: {success}\n\
         - Error entries: {error}\n\
         - Warning entries: {warning}\n\n\
         Please provide:\n\
         1. Overall performance assessment\n\
         2. Identification of any concerning trends\n\
         3. Resource utilization analysis\n\
         4. Recommendations for optimization\n\
         5. Potential areas of improvement\n\
         6. Alert conditions that may need attention\n\n\
         Format your response as a structured analysis with clear sections.",
        stats = pretty(&json!(stats)),
        connections = stats.active_connections,
        total = breakdown.total,
        success = breakdown.success,
        error = breakdown.error,
        warning = breakdown.warning,
    );

    PromptResult {
        description: "Analyze current server performance and provide insights".to_string(),
        messages: vec![PromptMessage::user(text)],
    }
}

fn conversion_report(ctx: &AppContext, timeframe: Timeframe) -> PromptResult {
    let cutoff = Utc::now() - timeframe.window();
    let rows: Vec<Value> = ctx
        .store
        .created_since(cutoff, REPORT_JOB_LIMIT)
        .into_iter()
        .map(|job| {
            json!({
                "id": job.id,
                "url": job.url,
                "status": job.status,
                "title": job.title,
                "createdAt": job.created_at,
                "completedAt": job.completed_at,
                "includeImages": job.include_images,
                "cleanHtml": job.clean_html,
                "errorMessage": job.error_message,
            })
        })
        .collect();

    let text = format!(
        "Please create a comprehensive conversion report based on the following data for the timeframe: {timeframe}\n\n\
         Conversion Data:\n{rows}\n\n\
         Server Statistics:\n{stats}\n\n\
         Please provide:\n\
         1. Executive summary of conversion activity\n\
         2. Success vs failure rate analysis\n\
         3. Most popular domains/websites converted\n\
         4. Average conversion time analysis\n\
         5. Configuration preferences (images, clean HTML usage)\n\
         6. Error analysis and common failure patterns\n\
         7. Performance trends and recommendations\n\
         8. Data-driven insights for service improvement\n\n\
         Format as a professional report with clear sections and actionable insights.",
        timeframe = timeframe.as_str(),
        rows = pretty(&Value::Array(rows)),
        stats = pretty(&json!(ctx.stats.snapshot())),
    );

    PromptResult {
        description: format!("Generate a conversion report for {}", timeframe.as_str()),
        messages: vec![PromptMessage::user(text)],
    }
}

pub fn definitions() -> Vec<PromptDescriptor> {
    vec![
        PromptDescriptor {
            name: "summarize_conversion",
            description: "Create a summary of a URL conversion result",
            arguments: vec![PromptArgument {
                name: "conversionId",
                description: "The ID of the conversion to summarize",
                required: true,
            }],
        },
        PromptDescriptor {
            name: "analyze_server_performance",
            description: "Analyze server performance metrics and provide insights",
            arguments: Vec::new(),
        },
        PromptDescriptor {
            name: "create_conversion_report",
            description: "Generate a detailed report of recent conversions",
            arguments: vec![PromptArgument {
                name: "timeframe",
                description: "Timeframe for the report (e.g., 'last_hour', 'last_day', 'last_week')",
                required: false,
            }],
        },
    ]
}
