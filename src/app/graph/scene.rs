use std::collections::HashSet;

use eframe::egui::Vec2;

use crate::app::physics::LayoutEngine;
use crate::model::{Category, GraphModel, NodeId};
use crate::util::{LABEL_CHAR_BUDGET, truncate_title};

use super::viewport::Viewport;
use super::visibility::{Visibility, VisibilityFilter};

/// Glyph radius in graph units.
pub const NODE_RADIUS: f32 = 20.0;
pub const NODE_OPACITY: f32 = 1.0;
pub const GHOST_NODE_OPACITY: f32 = 0.2;
pub const EDGE_OPACITY: f32 = 0.6;
pub const DIMMED_EDGE_OPACITY: f32 = 0.1;

#[derive(Clone, Copy, Debug, Default)]
pub struct Emphasis<'a> {
    pub selected: Option<&'a str>,
    pub hovered: Option<&'a str>,
    pub matches: Option<&'a HashSet<NodeId>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    pub label: String,
    pub category: Category,
    /// Canvas coordinates, origin at the canvas center.
    pub center: Vec2,
    pub radius: f32,
    pub opacity: f32,
    pub interactive: bool,
    pub selected: bool,
    pub hovered: bool,
    pub matched: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneEdge {
    pub from: Vec2,
    pub to: Vec2,
    pub opacity: f32,
    pub self_loop: bool,
}

/// Everything the painter needs for one frame, in canvas coordinates.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
    pub node_radius: f32,
}

impl Scene {
    pub fn build(
        model: &GraphModel,
        layout: &LayoutEngine,
        viewport: &Viewport,
        filter: &VisibilityFilter,
        emphasis: Emphasis<'_>,
    ) -> Self {
        let radius = NODE_RADIUS * viewport.scale();

        let edges = model
            .renderable_connections()
            .filter_map(|connection| {
                let opacity = match filter.connection(model, connection) {
                    Visibility::Visible => EDGE_OPACITY,
                    Visibility::Dimmed => DIMMED_EDGE_OPACITY,
                    Visibility::Hidden => return None,
                };
                Some(SceneEdge {
                    from: viewport.to_screen(layout.position(&connection.source)?),
                    to: viewport.to_screen(layout.position(&connection.target)?),
                    opacity,
                    self_loop: connection.is_self_loop(),
                })
            })
            .collect();

        let mut nodes: Vec<SceneNode> = model
            .nodes()
            .filter_map(|node| {
                let position = layout.position(&node.id)?;
                let interactive = filter.node(node) == Visibility::Visible;
                Some(SceneNode {
                    id: node.id.clone(),
                    label: truncate_title(&node.title, LABEL_CHAR_BUDGET),
                    category: node.category,
                    center: viewport.to_screen(position),
                    radius,
                    opacity: if interactive {
                        NODE_OPACITY
                    } else {
                        GHOST_NODE_OPACITY
                    },
                    interactive,
                    selected: emphasis.selected == Some(node.id.as_str()),
                    hovered: emphasis.hovered == Some(node.id.as_str()),
                    matched: emphasis.matches.is_some_and(|matches| matches.contains(&node.id)),
                })
            })
            .collect();

        // ghosts underneath, selection on top
        nodes.sort_by_key(|node| (node.interactive, node.selected));

        Self {
            nodes,
            edges,
            node_radius: radius,
        }
    }
}

/// Interactive node whose glyph contains `at`, nearest center first.
pub fn hit_test(
    model: &GraphModel,
    layout: &LayoutEngine,
    viewport: &Viewport,
    filter: &VisibilityFilter,
    at: Vec2,
) -> Option<NodeId> {
    let reach = NODE_RADIUS * viewport.scale();
    model
        .nodes()
        .filter(|node| filter.node(node) == Visibility::Visible)
        .filter_map(|node| {
            let center = viewport.to_screen(layout.position(&node.id)?);
            let distance = (center - at).length();
            (distance <= reach).then_some((node, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(node, _)| node.id.clone())
}
