use std::collections::BTreeMap;

use super::types::{Connection, ConnectionId, Node, NodeId, Position};

/// What a mutation did to the working set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphChange {
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub updated_nodes: Vec<NodeId>,
    pub connections_changed: bool,
}

impl GraphChange {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.updated_nodes.is_empty()
            && !self.connections_changed
    }

    pub fn changes_structure(&self) -> bool {
        !self.added_nodes.is_empty() || !self.removed_nodes.is_empty() || self.connections_changed
    }
}

/// In-memory mirror of the server's nodes and connections.
///
/// Connections are kept even when an endpoint is missing; only
/// [`GraphModel::renderable_connections`] filters them out.
#[derive(Debug, Default)]
pub struct GraphModel {
    nodes: BTreeMap<NodeId, Node>,
    connections: BTreeMap<ConnectionId, Connection>,
    structure_revision: u64,
    revision: u64,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped whenever the node set or the renderable link set changes.
    pub fn structure_revision(&self) -> u64 {
        self.structure_revision
    }

    /// Bumped on every effective change, including titles and positions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether any node carries tag references at all.
    pub fn has_tagged_nodes(&self) -> bool {
        self.nodes.values().any(|node| !node.tags.is_empty())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn renderable_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(|connection| {
            self.nodes.contains_key(&connection.source) && self.nodes.contains_key(&connection.target)
        })
    }

    pub fn degree(&self, id: &str) -> (usize, usize) {
        let mut outgoing = 0;
        let mut incoming = 0;
        for connection in self.renderable_connections() {
            if connection.source == id {
                outgoing += 1;
            }
            if connection.target == id {
                incoming += 1;
            }
        }
        (outgoing, incoming)
    }

    /// Replaces the working set, diffing against the current one so that
    /// untouched nodes keep their identity.
    pub fn load(&mut self, nodes: Vec<Node>, connections: Vec<Connection>) -> GraphChange {
        let mut change = GraphChange::default();
        let mut next_nodes = BTreeMap::new();

        for node in nodes {
            match self.nodes.remove(&node.id) {
                Some(previous) if previous == node => {}
                Some(_) => change.updated_nodes.push(node.id.clone()),
                None => change.added_nodes.push(node.id.clone()),
            }
            next_nodes.insert(node.id.clone(), node);
        }
        change.removed_nodes = std::mem::take(&mut self.nodes).into_keys().collect();
        self.nodes = next_nodes;

        let next_connections = connections
            .into_iter()
            .map(|connection| (connection.id.clone(), connection))
            .collect::<BTreeMap<_, _>>();
        change.connections_changed = next_connections != self.connections;
        self.connections = next_connections;

        self.record(&change);
        change
    }

    pub fn upsert_node(&mut self, node: Node) -> GraphChange {
        let mut change = GraphChange::default();
        match self.nodes.get(&node.id) {
            Some(previous) if *previous == node => return change,
            Some(_) => change.updated_nodes.push(node.id.clone()),
            None => {
                change.added_nodes.push(node.id.clone());
                change.connections_changed = self
                    .connections
                    .values()
                    .any(|connection| connection.source == node.id || connection.target == node.id);
            }
        }
        self.nodes.insert(node.id.clone(), node);
        self.record(&change);
        change
    }

    pub fn remove_node(&mut self, id: &str) -> GraphChange {
        let mut change = GraphChange::default();
        if self.nodes.remove(id).is_none() {
            return change;
        }
        change.removed_nodes.push(id.to_owned());
        change.connections_changed = self
            .connections
            .values()
            .any(|connection| connection.source == id || connection.target == id);
        self.record(&change);
        change
    }

    pub fn upsert_connection(&mut self, connection: Connection) -> GraphChange {
        let mut change = GraphChange::default();
        if self.connections.get(&connection.id) == Some(&connection) {
            return change;
        }
        self.connections.insert(connection.id.clone(), connection);
        change.connections_changed = true;
        self.record(&change);
        change
    }

    pub fn remove_connection(&mut self, id: &str) -> GraphChange {
        let mut change = GraphChange::default();
        if self.connections.remove(id).is_some() {
            change.connections_changed = true;
            self.record(&change);
        }
        change
    }

    /// Stores a locally decided position (drag release) without touching the
    /// node or link set.
    pub fn set_position(&mut self, id: &str, position: Position) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if node.position == Some(position) {
            return false;
        }
        node.position = Some(position);
        self.revision = self.revision.wrapping_add(1);
        true
    }

    fn record(&mut self, change: &GraphChange) {
        if change.is_empty() {
            return;
        }
        self.revision = self.revision.wrapping_add(1);
        if change.changes_structure() {
            self.structure_revision = self.structure_revision.wrapping_add(1);
        }
    }
}
