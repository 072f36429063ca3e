use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};

pub type NodeId = String;
pub type ConnectionId = String;
pub type TagId = String;

/// The four SECI knowledge-conversion modes a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Socialization,
    Externalization,
    Combination,
    Internalization,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Self::Socialization,
        Self::Externalization,
        Self::Combination,
        Self::Internalization,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Socialization => "Socialization",
            Self::Externalization => "Externalization",
            Self::Combination => "Combination",
            Self::Internalization => "Internalization",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Socialization => "sharing tacit knowledge",
            Self::Externalization => "articulating tacit knowledge",
            Self::Combination => "integrating explicit knowledge",
            Self::Internalization => "putting explicit knowledge into practice",
        }
    }
}

/// A point in graph space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn to_vec2(self) -> Vec2 {
        vec2(self.x, self.y)
    }
}

impl From<Vec2> for Position {
    fn from(value: Vec2) -> Self {
        Self::new(value.x, value.y)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    pub category: Category,
    /// `None` until the layout or a drag has placed the node.
    pub position: Option<Position>,
    pub tags: Vec<TagId>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category,
            position: None,
            tags: Vec::new(),
        }
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TagId>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: String,
    pub strength: i32,
}

impl Connection {
    pub fn new(
        id: impl Into<ConnectionId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: "related".to_owned(),
            strength: 1,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub versions: u32,
    pub comments: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeDetail {
    pub node: Node,
    pub description: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub tags: Vec<Tag>,
    pub stats: NodeStats,
    pub outgoing: usize,
    pub incoming: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub percentage: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowQuality {
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub ideal_flows: u32,
    #[serde(default)]
    pub total_flows: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    #[serde(default)]
    pub total_nodes: u32,
    #[serde(default)]
    pub total_connections: u32,
    #[serde(default)]
    pub completion_score: f32,
    #[serde(default)]
    pub balance_score: f32,
    #[serde(default)]
    pub category_distribution: BTreeMap<String, CategoryShare>,
    #[serde(default)]
    pub flow_quality: FlowQuality,
    #[serde(default)]
    pub suggestions: Vec<serde_json::Value>,
    #[serde(default)]
    pub insights: Vec<serde_json::Value>,
}
