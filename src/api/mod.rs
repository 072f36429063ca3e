//! Request/response contract with the knowledge-mapper backend.

mod http;
mod parse;

use thiserror::Error;

use crate::model::{AnalyticsSummary, GraphSnapshot, Node, NodeDetail, Position, Tag};

pub use http::HttpApi;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("server responded with {code}: {message}")]
    Status { code: u16, message: String },
    #[error("server rejected the request: {message}")]
    Rejected { message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { code, .. } => *code >= 500,
            Self::Rejected { .. } | Self::Decode(_) => false,
        }
    }
}

/// Everything the canvas consumes from the backend.
///
/// Implementations block; callers run them off the UI thread.
pub trait GraphApi: Send + Sync {
    fn fetch_graph(&self) -> Result<GraphSnapshot, ApiError>;

    fn fetch_node_detail(&self, id: &str) -> Result<NodeDetail, ApiError>;

    fn persist_node_position(&self, id: &str, position: Position) -> Result<bool, ApiError>;

    fn search_nodes(&self, query: &str) -> Result<Vec<Node>, ApiError>;

    fn fetch_analytics_summary(&self) -> Result<AnalyticsSummary, ApiError>;

    fn fetch_tags(&self) -> Result<Vec<Tag>, ApiError>;
}
