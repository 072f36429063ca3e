use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{
    self, Align2, Color32, FontId, Painter, Pos2, Rect, Response, Sense, Stroke, Ui, Vec2, vec2,
};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::model::NodeId;

use super::super::render_utils::{
    SEARCH_MATCH, SELECTED, blend_color, category_color, circle_visible, draw_background,
    segment_visible, with_opacity,
};
use super::super::{SearchMatchCache, ViewModel};
use super::scene::{Scene, SceneEdge, SceneNode};
use super::{Emphasis, InteractionOutcome, PointerCommand};

/// Labels are dropped below this zoom unless the node is emphasized.
const LABEL_MIN_SCALE: f32 = 0.6;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

impl ViewModel {
    /// Nodes whose title fuzzily matches the search box, recomputed only when
    /// the query or the model changes.
    fn cached_search_matches(&mut self) -> Option<Arc<HashSet<NodeId>>> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        let revision = self.canvas.model().revision();
        if let Some(cached) = &self.search_match_cache
            && cached.graph_revision == revision
            && cached.query == query
        {
            return Some(Arc::clone(&cached.matches));
        }

        let matcher = SkimMatcherV2::default();
        let matches = Arc::new(
            self.canvas
                .model()
                .nodes()
                .filter(|node| fuzzy_match_score(&matcher, &node.title, query).is_some())
                .map(|node| node.id.clone())
                .collect::<HashSet<_>>(),
        );

        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            graph_revision: revision,
            matches: Arc::clone(&matches),
        });
        Some(matches)
    }

    /// Translates this frame's raw pointer state into canvas commands.
    fn pointer_commands(&self, ui: &Ui, rect: Rect, response: &Response) -> Vec<PointerCommand> {
        let to_canvas = |pos: Pos2| pos - rect.center();
        let gesture_active = self.canvas.gesture_active();

        ui.input(|input| {
            let pointer = &input.pointer;
            let mut commands = Vec::new();

            if pointer.primary_pressed()
                && response.hovered()
                && let Some(origin) = pointer.press_origin()
            {
                commands.push(PointerCommand::Down {
                    at: to_canvas(origin),
                });
            }

            let active = gesture_active || !commands.is_empty();
            if active
                && pointer.is_moving()
                && let Some(pos) = pointer.interact_pos()
            {
                commands.push(PointerCommand::Move { to: to_canvas(pos) });
            }

            if active {
                if pointer.primary_released() {
                    commands.push(match pointer.interact_pos() {
                        Some(pos) => PointerCommand::Up { at: to_canvas(pos) },
                        None => PointerCommand::Cancel,
                    });
                } else if !pointer.has_pointer() || !pointer.primary_down() {
                    commands.push(PointerCommand::Cancel);
                }
            }

            let scroll = input.raw_scroll_delta.y;
            if scroll.abs() > f32::EPSILON
                && response.hovered()
                && let Some(pos) = pointer.hover_pos()
            {
                commands.push(PointerCommand::Wheel {
                    factor: (1.0 + scroll * 0.0018).clamp(0.85, 1.15),
                    at: to_canvas(pos),
                });
            }

            commands
        })
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        let outcomes: Vec<InteractionOutcome> = self
            .pointer_commands(ui, rect, &response)
            .into_iter()
            .map(|command| self.canvas.dispatch(command))
            .collect();
        for outcome in outcomes {
            self.handle_outcome(outcome);
        }

        if self.canvas.tick() || self.canvas.gesture_active() {
            ui.ctx().request_repaint();
        }

        self.hovered = match self.canvas.dragged_node() {
            Some(id) => Some(id.to_owned()),
            None if response.hovered() => ui
                .input(|input| input.pointer.hover_pos())
                .and_then(|pos| self.canvas.hit_test(pos - rect.center())),
            None => None,
        };
        if self.canvas.dragged_node().is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::Grabbing);
        } else if self.hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        draw_background(&painter, rect, self.canvas.translation(), self.canvas.scale());

        let matches = self.cached_search_matches();
        let scene = self.canvas.scene(Emphasis {
            selected: self.selected.as_deref(),
            hovered: self.hovered.as_deref(),
            matches: matches.as_deref(),
        });

        if scene.nodes.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No knowledge nodes yet",
                FontId::proportional(16.0),
                Color32::from_gray(170),
            );
            return;
        }

        paint_scene(&painter, rect, &scene, self.canvas.scale());

        if let Some(id) = &self.hovered
            && let Some(node) = self.canvas.model().node(id)
        {
            let (outgoing, incoming) = self.canvas.model().degree(id);
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!(
                    "{}  |  {}  |  {outgoing} out, {incoming} in",
                    node.title,
                    node.category.label()
                ),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }
    }
}

fn paint_scene(painter: &Painter, rect: Rect, scene: &Scene, scale: f32) {
    let origin = rect.center();
    let line_width = (1.6 * scale.sqrt()).clamp(0.8, 3.0);

    for edge in &scene.edges {
        paint_edge(painter, rect, origin, edge, scene.node_radius, line_width);
    }

    let show_labels = scale >= LABEL_MIN_SCALE;
    let font = FontId::proportional((12.0 * scale.sqrt()).clamp(9.0, 16.0));
    for node in &scene.nodes {
        let center = origin + node.center;
        if !circle_visible(rect, center, node.radius + 40.0) {
            continue;
        }
        paint_node(painter, center, node);

        if show_labels || node.selected || node.hovered {
            painter.text(
                center + vec2(0.0, node.radius + 4.0),
                Align2::CENTER_TOP,
                &node.label,
                font.clone(),
                with_opacity(Color32::from_gray(232), node.opacity),
            );
        }
    }
}

fn paint_edge(
    painter: &Painter,
    rect: Rect,
    origin: Pos2,
    edge: &SceneEdge,
    node_radius: f32,
    line_width: f32,
) {
    let color = with_opacity(Color32::from_rgb(150, 160, 175), edge.opacity);
    let stroke = Stroke::new(line_width, color);
    let from = origin + edge.from;
    let to = origin + edge.to;

    if edge.self_loop {
        let loop_radius = node_radius * 0.7;
        let center = from - vec2(0.0, node_radius + loop_radius * 0.6);
        if circle_visible(rect, center, loop_radius) {
            painter.circle_stroke(center, loop_radius, stroke);
        }
        return;
    }

    let delta = to - from;
    let length = delta.length();
    if length <= node_radius * 2.0 || !segment_visible(rect, from, to, line_width) {
        return;
    }

    // trim to the glyph rims so the arrowhead stays visible
    let direction = delta / length;
    let start = from + direction * node_radius;
    let end = to - direction * node_radius;
    painter.line_segment([start, end], stroke);

    let head = (8.0 * line_width).clamp(6.0, 14.0);
    let back = -direction * head;
    for angle in [0.45_f32, -0.45] {
        let wing = Vec2::angled(back.angle() + angle) * head;
        painter.line_segment([end, end + wing], stroke);
    }
}

fn paint_node(painter: &Painter, center: Pos2, node: &SceneNode) {
    let mut fill = category_color(node.category);
    if node.matched {
        fill = blend_color(fill, SEARCH_MATCH, 0.45);
    }
    if node.hovered {
        fill = blend_color(fill, Color32::WHITE, 0.2);
    }
    painter.circle_filled(center, node.radius, with_opacity(fill, node.opacity));

    let ring = if node.selected {
        Stroke::new(3.0, SELECTED)
    } else if node.matched {
        Stroke::new(2.0, SEARCH_MATCH)
    } else {
        Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
    };
    painter.circle_stroke(
        center,
        node.radius,
        Stroke::new(ring.width, with_opacity(ring.color, node.opacity)),
    );
    if node.selected {
        painter.circle_stroke(
            center,
            node.radius + 5.0,
            Stroke::new(1.2, with_opacity(SELECTED, 0.45)),
        );
    }
}
