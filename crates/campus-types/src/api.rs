use serde::{Deserialize, Serialize};

// -- Groups --

pub use crate::models::NewGroup as CreateGroupRequest;

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub author: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Most recent `limit` messages, still returned oldest first.
    pub limit: Option<u32>,
}

// -- Summaries --

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_window")]
    pub window: usize,
}

pub fn default_window() -> usize {
    5
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub error: String,
}
