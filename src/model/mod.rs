mod graph;
mod types;

pub use graph::{GraphChange, GraphModel};
pub use types::{
    AnalyticsSummary, Category, CategoryShare, Connection, ConnectionId, FlowQuality,
    GraphSnapshot, Node, NodeDetail, NodeId, NodeStats, Position, Tag, TagId,
};
