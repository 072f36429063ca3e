use serde_json::{Value, json};
use tracing::debug;

use crate::config::ApiConfig;
use crate::model::{AnalyticsSummary, GraphSnapshot, Node, NodeDetail, Position, Tag};

use super::parse::{
    error_message, parse_analytics, parse_envelope, parse_graph, parse_node_detail,
    parse_node_list, parse_tags,
};
use super::{ApiError, GraphApi};

/// Blocking JSON client for the Flask backend. The agent keeps the session
/// cookie between calls.
pub struct HttpApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpApi {
    pub fn new(config: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            base_url: config.base_url.clone(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let mut request = self.agent.get(&self.url(path));
        for (key, value) in query {
            request = request.query(key, value);
        }
        debug!(path, "GET");
        Self::finish(request.call())
    }

    fn put(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        debug!(path, "PUT");
        Self::finish(self.agent.put(&self.url(path)).send_json(body))
    }

    fn finish(outcome: Result<ureq::Response, ureq::Error>) -> Result<Value, ApiError> {
        match outcome {
            Ok(response) => {
                let raw = response
                    .into_string()
                    .map_err(|error| ApiError::Transport(error.to_string()))?;
                parse_envelope(&raw)
            }
            Err(ureq::Error::Status(code, response)) => {
                let raw = response.into_string().unwrap_or_default();
                let message = serde_json::from_str::<Value>(&raw)
                    .ok()
                    .and_then(|body| error_message(&body))
                    .unwrap_or_else(|| format!("HTTP {code}"));
                Err(ApiError::Status { code, message })
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(ApiError::Transport(transport.to_string()))
            }
        }
    }
}

impl GraphApi for HttpApi {
    fn fetch_graph(&self) -> Result<GraphSnapshot, ApiError> {
        parse_graph(&self.get("/nodes", &[])?)
    }

    fn fetch_node_detail(&self, id: &str) -> Result<NodeDetail, ApiError> {
        parse_node_detail(&self.get(&format!("/nodes/{id}"), &[])?)
    }

    fn persist_node_position(&self, id: &str, position: Position) -> Result<bool, ApiError> {
        let body = self.put(
            &format!("/nodes/{id}"),
            json!({ "position": { "x": position.x, "y": position.y } }),
        )?;
        Ok(body.get("success").and_then(Value::as_bool).unwrap_or(true))
    }

    fn search_nodes(&self, query: &str) -> Result<Vec<Node>, ApiError> {
        Ok(parse_node_list(&self.get("/search", &[("q", query)])?))
    }

    fn fetch_analytics_summary(&self) -> Result<AnalyticsSummary, ApiError> {
        parse_analytics(&self.get("/analytics/summary", &[])?)
    }

    fn fetch_tags(&self) -> Result<Vec<Tag>, ApiError> {
        Ok(parse_tags(&self.get("/tags", &[])?))
    }
}
