use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::model::{
    Category, Connection, GraphSnapshot, Node, NodeDetail, NodeStats, Position, Tag, TagId,
};

use super::ApiError;

#[derive(Debug, Deserialize)]
struct WirePosition {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTagRef {
    Id(TagId),
    Tag(Tag),
}

impl WireTagRef {
    fn into_tag_id(self) -> TagId {
        match self {
            Self::Id(id) => id,
            Self::Tag(tag) => tag.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireNode {
    id: String,
    #[serde(default)]
    title: String,
    category: Category,
    #[serde(default)]
    position: Option<WirePosition>,
    #[serde(default)]
    tags: Vec<WireTagRef>,
}

impl WireNode {
    fn into_node(self) -> Node {
        // (0, 0) is the backend column default for nodes that were never placed
        let position = self
            .position
            .filter(|position| !(position.x == 0.0 && position.y == 0.0))
            .map(|position| Position::new(position.x, position.y));

        Node {
            id: self.id,
            title: self.title,
            category: self.category,
            position,
            tags: self.tags.into_iter().map(WireTagRef::into_tag_id).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireConnection {
    id: String,
    source_id: String,
    target_id: String,
    #[serde(default)]
    connection_type: Option<String>,
    #[serde(default)]
    strength: Option<i32>,
}

impl From<WireConnection> for Connection {
    fn from(value: WireConnection) -> Self {
        Self {
            id: value.id,
            source: value.source_id,
            target: value.target_id,
            kind: value.connection_type.unwrap_or_else(|| "related".to_owned()),
            strength: value.strength.unwrap_or(1),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireStats {
    #[serde(default)]
    versions: u32,
    #[serde(default)]
    comments: u32,
}

#[derive(Debug, Default, Deserialize)]
struct WireNodeConnections {
    #[serde(default)]
    outgoing: Vec<Value>,
    #[serde(default)]
    incoming: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireNodeDetail {
    #[serde(flatten)]
    node: WireNode,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created_at: Option<NaiveDateTime>,
    #[serde(default)]
    updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    stats: Option<WireStats>,
    #[serde(default)]
    connections: Option<WireNodeConnections>,
}

/// Parses a response body and checks the `{"success": bool}` envelope.
pub(super) fn parse_envelope(raw: &str) -> Result<Value, ApiError> {
    let parsed: Value =
        serde_json::from_str(raw).map_err(|error| ApiError::Decode(error.to_string()))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| ApiError::Decode("response body is not a JSON object".to_owned()))?;

    if object.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::Rejected {
            message: error_message(&parsed).unwrap_or_else(|| "request rejected".to_owned()),
        });
    }

    Ok(parsed)
}

pub(super) fn error_message(body: &Value) -> Option<String> {
    body.get("error").and_then(Value::as_str).map(str::to_owned)
}

fn field<T: DeserializeOwned>(body: &Value, name: &str) -> Result<T, ApiError> {
    let value = body
        .get(name)
        .ok_or_else(|| ApiError::Decode(format!("missing `{name}` in response")))?;
    T::deserialize(value).map_err(|error| ApiError::Decode(format!("invalid `{name}`: {error}")))
}

/// Entries that fail to decode are skipped so one bad row cannot take down
/// the whole graph.
fn lenient_list<T: DeserializeOwned>(body: &Value, name: &str) -> Vec<T> {
    let Some(items) = body.get(name).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(field = name, %error, "skipping malformed entry");
                None
            }
        })
        .collect()
}

pub(super) fn parse_graph(body: &Value) -> Result<GraphSnapshot, ApiError> {
    if body.get("nodes").is_none() {
        return Err(ApiError::Decode("missing `nodes` in response".to_owned()));
    }

    Ok(GraphSnapshot {
        nodes: lenient_list::<WireNode>(body, "nodes")
            .into_iter()
            .map(WireNode::into_node)
            .collect(),
        connections: lenient_list::<WireConnection>(body, "connections")
            .into_iter()
            .map(Connection::from)
            .collect(),
    })
}

pub(super) fn parse_node_list(body: &Value) -> Vec<Node> {
    lenient_list::<WireNode>(body, "nodes")
        .into_iter()
        .map(WireNode::into_node)
        .collect()
}

pub(super) fn parse_node_detail(body: &Value) -> Result<NodeDetail, ApiError> {
    let detail: WireNodeDetail = field(body, "node")?;
    let tags = body
        .get("node")
        .and_then(|node| node.get("tags"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| Tag::deserialize(item).ok())
                .collect()
        })
        .unwrap_or_default();
    let stats = detail.stats.unwrap_or_default();
    let connections = detail.connections.unwrap_or_default();

    Ok(NodeDetail {
        node: detail.node.into_node(),
        description: detail.description.filter(|text| !text.trim().is_empty()),
        created_at: detail.created_at,
        updated_at: detail.updated_at,
        tags,
        stats: NodeStats {
            versions: stats.versions,
            comments: stats.comments,
        },
        outgoing: connections.outgoing.len(),
        incoming: connections.incoming.len(),
    })
}

pub(super) fn parse_analytics(body: &Value) -> Result<crate::model::AnalyticsSummary, ApiError> {
    field(body, "analytics")
}

pub(super) fn parse_tags(body: &Value) -> Vec<Tag> {
    lenient_list(body, "tags")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_payload_maps_wire_fields() {
        let body = parse_envelope(
            r#"{
                "success": true,
                "nodes": [
                    {"id": "n1", "title": "Pairing", "category": "socialization",
                     "position": {"x": 120.5, "y": -40}, "tags": ["t1", {"id": "t2", "name": "ops"}]},
                    {"id": "n2", "title": "Docs", "category": "combination",
                     "position": {"x": 0, "y": 0}}
                ],
                "connections": [
                    {"id": "c1", "source_id": "n1", "target_id": "n2", "strength": 3}
                ]
            }"#,
        )
        .unwrap();

        let snapshot = parse_graph(&body).unwrap();

        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.nodes[0].position, Some(Position::new(120.5, -40.0)));
        assert_eq!(snapshot.nodes[0].tags, vec!["t1".to_owned(), "t2".to_owned()]);
        assert_eq!(snapshot.nodes[1].position, None);
        assert_eq!(snapshot.connections[0].source, "n1");
        assert_eq!(snapshot.connections[0].kind, "related");
        assert_eq!(snapshot.connections[0].strength, 3);
    }

    #[test]
    fn malformed_nodes_are_skipped() {
        let body = parse_envelope(
            r#"{"nodes": [
                {"id": "ok", "title": "Fine", "category": "internalization"},
                {"id": "bad", "title": "Unknown", "category": "telepathy"}
            ]}"#,
        )
        .unwrap();

        let snapshot = parse_graph(&body).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert!(snapshot.connections.is_empty());
    }

    #[test]
    fn rejected_envelope_carries_server_message() {
        let error = parse_envelope(r#"{"success": false, "error": "node not found"}"#).unwrap_err();
        assert!(matches!(error, ApiError::Rejected { ref message } if message == "node not found"));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        assert!(matches!(parse_envelope("<html>"), Err(ApiError::Decode(_))));
    }

    #[test]
    fn node_detail_reads_timestamps_and_connection_counts() {
        let body = parse_envelope(
            r#"{"success": true, "node": {
                "id": "n1", "title": "Pairing", "category": "socialization",
                "description": "  ", "created_at": "2024-05-01T09:30:00.123456",
                "updated_at": null,
                "tags": [{"id": "t1", "name": "team", "color": "f00"}],
                "stats": {"versions": 2, "comments": 5},
                "connections": {"outgoing": [{}, {}], "incoming": [{}]}
            }}"#,
        )
        .unwrap();

        let detail = parse_node_detail(&body).unwrap();

        assert_eq!(detail.node.id, "n1");
        assert!(detail.description.is_none());
        assert!(detail.created_at.is_some());
        assert!(detail.updated_at.is_none());
        assert_eq!(detail.tags.len(), 1);
        assert_eq!(detail.stats.comments, 5);
        assert_eq!((detail.outgoing, detail.incoming), (2, 1));
    }

    #[test]
    fn analytics_summary_tolerates_missing_fields() {
        let body = parse_envelope(
            r#"{"success": true, "analytics": {"total_nodes": 4, "completion_score": 62.5}}"#,
        )
        .unwrap();

        let summary = parse_analytics(&body).unwrap();
        assert_eq!(summary.total_nodes, 4);
        assert_eq!(summary.completion_score, 62.5);
        assert!(summary.suggestions.is_empty());
    }
}
