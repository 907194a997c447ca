use thiserror::Error;

use super::types::{INVALID_PARAMS, RESOURCE_NOT_FOUND};

/// Failures of the protocol adapter. Tool calls turn these into an error
/// result; resource and prompt reads turn them into JSON-RPC errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McpError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),
    #[error("Unknown resource URI: {0}")]
    UnknownResource(String),
    #[error("Conversion {0} not found")]
    NotFound(String),
    #[error("Conversion {0} is not completed or has no markdown content")]
    NotCompleted(String),
    #[error("{0}")]
    InvalidArguments(String),
}

impl McpError {
    pub fn code(&self) -> i32 {
        match self {
            McpError::UnknownResource(_) | McpError::NotFound(_) | McpError::NotCompleted(_) => {
                RESOURCE_NOT_FOUND
            }
            McpError::UnknownTool(_) | McpError::UnknownPrompt(_) | McpError::InvalidArguments(_) => {
                INVALID_PARAMS
            }
        }
    }
}
