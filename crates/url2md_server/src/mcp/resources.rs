use serde_json::json;
use url2md_core::{JobStatus, MAX_LIST_LIMIT, MAX_LOG_PAGE};

use super::error::McpError;
use super::tools::{find_job, pretty};
use super::types::{ResourceContents, ResourceDescriptor};
use crate::context::AppContext;

const STATS_URI: &str = "stats://server";
const LOGS_URI: &str = "logs://activity";
const CONVERSION_SCHEME: &str = "conversion://";

const MARKDOWN: &str = "text/markdown";
const JSON: &str = "application/json";

/// Addressable documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Conversion(String),
    Stats,
    Logs,
}

impl ResourceUri {
    pub fn parse(uri: &str) -> Result<Self, McpError> {
        match uri {
            STATS_URI => Ok(ResourceUri::Stats),
            LOGS_URI => Ok(ResourceUri::Logs),
            _ => match uri.strip_prefix(CONVERSION_SCHEME) {
                Some(id) if !id.is_empty() => Ok(ResourceUri::Conversion(id.to_string())),
                _ => Err(McpError::UnknownResource(uri.to_string())),
            },
        }
    }
}

/// Completed conversions (most recent first) followed by the two aggregates.
pub fn list_resources(ctx: &AppContext) -> Vec<ResourceDescriptor> {
    let mut resources: Vec<ResourceDescriptor> = ctx
        .store
        .list_recent(MAX_LIST_LIMIT)
        .into_iter()
        .filter(|job| job.status == JobStatus::Completed && job.markdown.is_some())
        .map(|job| ResourceDescriptor {
            uri: format!("{}{}", CONVERSION_SCHEME, job.id),
            name: format!(
                "Conversion: {}",
                job.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(&job.url)
            ),
            description: format!("Markdown conversion of {}", job.url),
            mime_type: MARKDOWN,
        })
        .collect();

    resources.push(ResourceDescriptor {
        uri: STATS_URI.to_string(),
        name: "Server Statistics".to_string(),
        description: "Current server performance and usage statistics".to_string(),
        mime_type: JSON,
    });
    resources.push(ResourceDescriptor {
        uri: LOGS_URI.to_string(),
        name: "Activity Logs".to_string(),
        description: "Recent server activity and conversion logs".to_string(),
        mime_type: JSON,
    });
    resources
}

pub fn read_resource(ctx: &AppContext, uri: &str) -> Result<ResourceContents, McpError> {
    match ResourceUri::parse(uri)? {
        ResourceUri::Conversion(id) => {
            let job = find_job(ctx, &id)?;
            match (job.status, job.markdown) {
                (JobStatus::Completed, Some(markdown)) => Ok(ResourceContents {
                    uri: uri.to_string(),
                    mime_type: MARKDOWN,
                    text: markdown,
                }),
                _ => Err(McpError::NotCompleted(id)),
            }
        }
        ResourceUri::Stats => Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: JSON,
            text: pretty(&json!(ctx.stats.snapshot())),
        }),
        ResourceUri::Logs => Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: JSON,
            text: pretty(&json!(ctx.activity.recent(MAX_LOG_PAGE))),
        }),
    }
}
