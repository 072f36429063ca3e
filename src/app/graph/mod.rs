//! The interactive graph canvas, independent of any rendering surface.

mod interaction;
mod scene;
mod view;
mod viewport;
mod visibility;

use std::collections::{HashMap, HashSet};

use eframe::egui::Vec2;
use tracing::{debug, info};

use crate::config::{LayoutConfig, ViewportConfig};
use crate::model::{GraphChange, GraphModel, GraphSnapshot, NodeId};

use super::physics::{LayoutEngine, LayoutState};
use super::sync::RequestId;

pub(in crate::app) use interaction::{InteractionOutcome, PointerCommand};
pub(in crate::app) use scene::{Emphasis, Scene};
pub(in crate::app) use visibility::{FilterState, Visibility};

use interaction::InteractionController;
use viewport::Viewport;
use visibility::VisibilityFilter;

/// Zoom factors for the toolbar buttons.
pub(in crate::app) const ZOOM_IN_STEP: f32 = 1.3;
pub(in crate::app) const ZOOM_OUT_STEP: f32 = 0.7;

/// Model, layout, viewport, filter and pointer arbitration for one graph.
///
/// Positions flow one way: the model feeds the layout, and only a finished
/// drag writes a position back into the model.
pub(in crate::app) struct GraphCanvas {
    model: GraphModel,
    layout: LayoutEngine,
    viewport: Viewport,
    interaction: InteractionController,
    filter: VisibilityFilter,
    /// Most recent persist request per node.
    pending_persists: HashMap<NodeId, RequestId>,
    /// Nodes whose local position the server has not accepted yet.
    unsynced: HashSet<NodeId>,
}

impl GraphCanvas {
    pub(in crate::app) fn new(layout: LayoutConfig, viewport: ViewportConfig) -> Self {
        Self {
            model: GraphModel::new(),
            layout: LayoutEngine::new(layout),
            viewport: Viewport::new(viewport),
            interaction: InteractionController::default(),
            filter: VisibilityFilter::default(),
            pending_persists: HashMap::new(),
            unsynced: HashSet::new(),
        }
    }

    pub(in crate::app) fn model(&self) -> &GraphModel {
        &self.model
    }

    pub(in crate::app) fn layout_state(&self) -> LayoutState {
        self.layout.state()
    }

    /// Current alpha and mean kinetic energy of the simulation.
    pub(in crate::app) fn layout_heat(&self) -> (f32, f32) {
        (self.layout.alpha(), self.layout.energy())
    }

    #[cfg(test)]
    pub(in crate::app) fn node_position(&self, id: &str) -> Option<Vec2> {
        self.layout.position(id)
    }

    pub(in crate::app) fn scale(&self) -> f32 {
        self.viewport.scale()
    }

    pub(in crate::app) fn translation(&self) -> Vec2 {
        self.viewport.transform().translation
    }

    pub(in crate::app) fn filter(&self) -> &FilterState {
        self.filter.state()
    }

    /// Filters never touch the layout.
    pub(in crate::app) fn filter_mut(&mut self) -> &mut FilterState {
        self.filter.state_mut()
    }

    pub(in crate::app) fn node_visibility(&self, id: &str) -> Option<Visibility> {
        self.model.node(id).map(|node| self.filter.node(node))
    }

    pub(in crate::app) fn dragged_node(&self) -> Option<&str> {
        self.interaction.dragged_node()
    }

    pub(in crate::app) fn gesture_active(&self) -> bool {
        self.interaction.is_active()
    }

    /// Merges a fetched graph into the working set.
    ///
    /// A node that is being dragged, whose latest persist was issued after
    /// `request`, or whose last persist failed keeps its local position.
    pub(in crate::app) fn apply_snapshot(
        &mut self,
        snapshot: GraphSnapshot,
        request: RequestId,
    ) -> GraphChange {
        let GraphSnapshot { mut nodes, connections } = snapshot;
        for node in &mut nodes {
            let held = self.layout.is_pinned(&node.id)
                || self.unsynced.contains(&node.id)
                || self
                    .pending_persists
                    .get(&node.id)
                    .is_some_and(|persist| *persist > request);
            if held && let Some(local) = self.model.node(&node.id) {
                node.position = local.position;
            }
        }

        let change = self.model.load(nodes, connections);
        if !change.is_empty() {
            info!(
                added = change.added_nodes.len(),
                removed = change.removed_nodes.len(),
                updated = change.updated_nodes.len(),
                "graph updated"
            );
        }
        self.pending_persists
            .retain(|id, _| self.model.contains_node(id));
        self.unsynced.retain(|id| self.model.contains_node(id));
        self.layout.sync(&self.model);
        change
    }

    pub(in crate::app) fn persist_issued(&mut self, id: &str, request: RequestId) {
        self.pending_persists.insert(id.to_owned(), request);
    }

    /// Records the outcome of a persist. Only the newest request for a node
    /// decides whether its local position is in sync with the server.
    pub(in crate::app) fn persist_settled(&mut self, id: &str, request: RequestId, saved: bool) {
        if self.pending_persists.get(id) != Some(&request) {
            return;
        }
        self.pending_persists.remove(id);
        if saved {
            self.unsynced.remove(id);
        } else {
            self.unsynced.insert(id.to_owned());
        }
    }

    /// Interactive node under a canvas point.
    pub(in crate::app) fn hit_test(&self, at: Vec2) -> Option<NodeId> {
        scene::hit_test(&self.model, &self.layout, &self.viewport, &self.filter, at)
    }

    pub(in crate::app) fn dispatch(&mut self, command: PointerCommand) -> InteractionOutcome {
        self.layout.sync(&self.model);
        let hit = match command {
            PointerCommand::Down { at } => self.hit_test(at),
            _ => None,
        };

        let outcome =
            self.interaction
                .handle(command, hit, &mut self.layout, &mut self.viewport);

        if let InteractionOutcome::DragFinished { id, position } = &outcome {
            self.model.set_position(id, *position);
            self.layout.sync(&self.model);
        }
        outcome
    }

    /// One simulation step. Returns whether anything on screen may have moved.
    pub(in crate::app) fn tick(&mut self) -> bool {
        self.layout.sync(&self.model);
        self.layout.tick()
    }

    pub(in crate::app) fn scene(&self, emphasis: Emphasis<'_>) -> Scene {
        Scene::build(
            &self.model,
            &self.layout,
            &self.viewport,
            &self.filter,
            emphasis,
        )
    }

    pub(in crate::app) fn zoom_step(&mut self, factor: f32) {
        self.viewport.zoom_by(factor, Vec2::ZERO);
    }

    pub(in crate::app) fn reset_view(&mut self) {
        self.viewport.reset();
    }

    pub(in crate::app) fn restart_layout(&mut self) {
        debug!("layout restarted");
        self.layout.sync(&self.model);
        self.layout.restart();
    }

    pub(in crate::app) fn center_on(&mut self, id: &str) -> bool {
        match self.layout.position(id) {
            Some(position) => {
                self.viewport.center_on(position);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::model::{Category, Connection, Node, Position};

    fn request_ids(count: u64) -> Vec<RequestId> {
        (1..=count).map(RequestId::from_raw).collect()
    }

    fn snapshot(x_position: (f32, f32)) -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![
                Node::new("x", "X", Category::Socialization)
                    .with_position(x_position.0, x_position.1),
                Node::new("y", "Y", Category::Externalization).with_position(-150.0, 40.0),
                Node::new("z", "Z", Category::Combination),
            ],
            connections: vec![
                Connection::new("xy", "x", "y"),
                Connection::new("yz", "y", "z"),
            ],
        }
    }

    fn canvas() -> GraphCanvas {
        GraphCanvas::new(LayoutConfig::default(), ViewportConfig::default())
    }

    fn drag(canvas: &mut GraphCanvas, from: Vec2, to: Vec2) -> InteractionOutcome {
        canvas.dispatch(PointerCommand::Down { at: from });
        canvas.dispatch(PointerCommand::Move { to });
        canvas.dispatch(PointerCommand::Up { at: to })
    }

    #[test]
    fn drag_release_reports_one_final_position() {
        let ids = request_ids(1);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);

        let outcome = drag(&mut canvas, vec2(100.0, 100.0), vec2(250.0, 180.0));

        assert_eq!(
            outcome,
            InteractionOutcome::DragFinished {
                id: "x".to_owned(),
                position: Position::new(250.0, 180.0),
            }
        );
        assert_eq!(
            canvas.model().node("x").unwrap().position,
            Some(Position::new(250.0, 180.0))
        );
    }

    #[test]
    fn refresh_during_a_drag_leaves_the_dragged_node_alone() {
        let ids = request_ids(2);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);

        canvas.dispatch(PointerCommand::Down { at: vec2(100.0, 100.0) });
        canvas.dispatch(PointerCommand::Move { to: vec2(200.0, 100.0) });
        canvas.apply_snapshot(snapshot((-400.0, -400.0)), ids[1]);
        canvas.tick();

        assert_eq!(canvas.node_position("x"), Some(vec2(200.0, 100.0)));
        assert_eq!(canvas.dragged_node(), Some("x"));
    }

    #[test]
    fn snapshot_older_than_a_persist_keeps_the_local_position() {
        let ids = request_ids(3);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);

        drag(&mut canvas, vec2(100.0, 100.0), vec2(250.0, 180.0));
        canvas.persist_issued("x", ids[2]);
        // fetched before the persist landed, still carries the old position
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[1]);

        assert_eq!(canvas.node_position("x"), Some(vec2(250.0, 180.0)));
    }

    #[test]
    fn failed_persist_keeps_the_dropped_position_across_refreshes() {
        let ids = request_ids(5);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);

        drag(&mut canvas, vec2(100.0, 100.0), vec2(250.0, 180.0));
        canvas.persist_issued("x", ids[1]);
        canvas.persist_settled("x", ids[1], false);
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[2]);

        assert_eq!(canvas.node_position("x"), Some(vec2(250.0, 180.0)));

        // a later successful save hands authority back to the server
        canvas.persist_issued("x", ids[3]);
        canvas.persist_settled("x", ids[3], true);
        canvas.apply_snapshot(snapshot((-30.0, 60.0)), ids[4]);

        assert_eq!(canvas.node_position("x"), Some(vec2(-30.0, 60.0)));
    }

    #[test]
    fn superseded_persist_outcome_is_ignored() {
        let ids = request_ids(4);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);

        drag(&mut canvas, vec2(100.0, 100.0), vec2(250.0, 180.0));
        canvas.persist_issued("x", ids[1]);
        drag(&mut canvas, vec2(250.0, 180.0), vec2(300.0, 40.0));
        canvas.persist_issued("x", ids[2]);
        canvas.persist_settled("x", ids[1], false);
        canvas.persist_settled("x", ids[2], true);
        canvas.apply_snapshot(snapshot((300.0, 40.0)), ids[3]);

        assert_eq!(canvas.node_position("x"), Some(vec2(300.0, 40.0)));
        assert_eq!(
            canvas.model().node("x").unwrap().position,
            Some(Position::new(300.0, 40.0))
        );
    }

    #[test]
    fn newer_snapshot_positions_are_adopted() {
        let ids = request_ids(3);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);

        drag(&mut canvas, vec2(100.0, 100.0), vec2(250.0, 180.0));
        canvas.persist_issued("x", ids[1]);
        canvas.persist_settled("x", ids[1], true);
        canvas.apply_snapshot(snapshot((-30.0, 60.0)), ids[2]);

        assert_eq!(canvas.node_position("x"), Some(vec2(-30.0, 60.0)));
    }

    #[test]
    fn identical_refresh_does_not_move_settled_nodes() {
        let ids = request_ids(2);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);
        for _ in 0..3_000 {
            if canvas.layout_state() != LayoutState::Settling {
                break;
            }
            canvas.tick();
        }
        let settled = canvas.node_position("y");

        let change = canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[1]);

        assert!(change.is_empty());
        assert_eq!(canvas.node_position("y"), settled);
        assert_eq!(canvas.layout_state(), LayoutState::Converged);
    }

    #[test]
    fn filtering_does_not_touch_the_layout() {
        let ids = request_ids(1);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);
        let before = canvas.node_position("x");
        let state = canvas.layout_state();

        canvas.filter_mut().set_all_categories(false);

        assert_eq!(canvas.node_position("x"), before);
        assert_eq!(canvas.layout_state(), state);
        assert_eq!(canvas.node_visibility("x"), Some(Visibility::Hidden));
    }

    #[test]
    fn ghost_nodes_cannot_be_dragged() {
        let ids = request_ids(1);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);
        canvas.filter_mut().set_category(Category::Socialization, false);

        canvas.dispatch(PointerCommand::Down { at: vec2(100.0, 100.0) });

        assert_eq!(canvas.dragged_node(), None);
    }

    #[test]
    fn center_on_moves_the_node_to_the_canvas_center() {
        let ids = request_ids(1);
        let mut canvas = canvas();
        canvas.apply_snapshot(snapshot((100.0, 100.0)), ids[0]);
        canvas.zoom_step(ZOOM_IN_STEP);

        assert!(canvas.center_on("x"));
        assert!((canvas.translation() + vec2(100.0, 100.0) * canvas.scale()).length() < 1e-3);
        assert!(!canvas.center_on("missing"));
    }
}
