use eframe::egui::Vec2;
use tracing::debug;

use crate::app::physics::LayoutEngine;
use crate::model::{NodeId, Position};

use super::viewport::Viewport;

/// Screen distance a press may travel before it stops being a click.
const CLICK_SLOP: f32 = 3.0;

/// Pointer input in canvas coordinates (origin at the canvas center).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerCommand {
    Down { at: Vec2 },
    Move { to: Vec2 },
    Up { at: Vec2 },
    /// Pointer left the window or the gesture was aborted; ends it like `Up`.
    Cancel,
    Wheel { factor: f32, at: Vec2 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum InteractionOutcome {
    Nothing,
    /// Press and release on a node without moving it.
    NodeClicked(NodeId),
    BackgroundClicked,
    DragFinished { id: NodeId, position: Position },
}

#[derive(Clone, Debug, PartialEq)]
enum Gesture {
    Idle,
    Node {
        id: NodeId,
        pressed_at: Vec2,
        last: Vec2,
        dragging: bool,
    },
    Pan {
        pressed_at: Vec2,
        last: Vec2,
        dragging: bool,
    },
}

/// Decides whether pointer input drives a node drag or the viewport.
///
/// Only one gesture is active at a time; a second press before release is
/// ignored.
#[derive(Debug)]
pub struct InteractionController {
    gesture: Gesture,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self {
            gesture: Gesture::Idle,
        }
    }
}

impl InteractionController {
    pub fn dragged_node(&self) -> Option<&str> {
        match &self.gesture {
            Gesture::Node { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    /// `hit` is the interactive node under the pointer for `Down`; it is
    /// ignored for every other command.
    pub fn handle(
        &mut self,
        command: PointerCommand,
        hit: Option<NodeId>,
        layout: &mut LayoutEngine,
        viewport: &mut Viewport,
    ) -> InteractionOutcome {
        match command {
            PointerCommand::Down { at } => {
                self.press(at, hit, layout);
                InteractionOutcome::Nothing
            }
            PointerCommand::Move { to } => {
                self.drag(to, layout, viewport);
                InteractionOutcome::Nothing
            }
            PointerCommand::Up { at } => {
                self.drag(at, layout, viewport);
                self.release(layout)
            }
            PointerCommand::Cancel => self.release(layout),
            PointerCommand::Wheel { factor, at } => {
                viewport.zoom_by(factor, at);
                InteractionOutcome::Nothing
            }
        }
    }

    fn press(&mut self, at: Vec2, hit: Option<NodeId>, layout: &mut LayoutEngine) {
        if self.is_active() {
            debug!("pointer down ignored, gesture already active");
            return;
        }

        self.gesture = match hit {
            Some(id) if layout.pin(&id) => {
                debug!(node = %id, "node drag started");
                Gesture::Node {
                    id,
                    pressed_at: at,
                    last: at,
                    dragging: false,
                }
            }
            _ => Gesture::Pan {
                pressed_at: at,
                last: at,
                dragging: false,
            },
        };
    }

    fn drag(&mut self, to: Vec2, layout: &mut LayoutEngine, viewport: &mut Viewport) {
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Node {
                id,
                pressed_at,
                last,
                dragging,
            } => {
                *last = to;
                *dragging |= (to - *pressed_at).length() > CLICK_SLOP;
                if *dragging {
                    layout.move_pinned(id, viewport.to_graph(to));
                }
            }
            Gesture::Pan {
                pressed_at,
                last,
                dragging,
            } => {
                *dragging |= (to - *pressed_at).length() > CLICK_SLOP;
                if *dragging {
                    viewport.pan_by(to - *last);
                    *last = to;
                }
            }
        }
    }

    fn release(&mut self, layout: &mut LayoutEngine) -> InteractionOutcome {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle => InteractionOutcome::Nothing,
            Gesture::Node { id, dragging, .. } => {
                match (layout.unpin(&id), dragging) {
                    (Some(at), true) => {
                        debug!(node = %id, x = at.x, y = at.y, "node drag finished");
                        InteractionOutcome::DragFinished {
                            id,
                            position: Position::from(at),
                        }
                    }
                    (Some(_), false) => InteractionOutcome::NodeClicked(id),
                    // node vanished from the graph mid-gesture
                    (None, _) => InteractionOutcome::Nothing,
                }
            }
            Gesture::Pan { dragging, .. } => {
                if dragging {
                    InteractionOutcome::Nothing
                } else {
                    InteractionOutcome::BackgroundClicked
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::config::{LayoutConfig, ViewportConfig};
    use crate::model::{Category, GraphModel, Node};

    struct Rig {
        controller: InteractionController,
        layout: LayoutEngine,
        viewport: Viewport,
    }

    impl Rig {
        fn new() -> Self {
            let mut model = GraphModel::new();
            model.load(
                vec![
                    Node::new("x", "X", Category::Socialization).with_position(100.0, 100.0),
                    Node::new("y", "Y", Category::Combination).with_position(-100.0, 0.0),
                ],
                Vec::new(),
            );
            let mut layout = LayoutEngine::new(LayoutConfig::default());
            layout.sync(&model);
            Self {
                controller: InteractionController::default(),
                layout,
                viewport: Viewport::new(ViewportConfig::default()),
            }
        }

        fn send(&mut self, command: PointerCommand, hit: Option<&str>) -> InteractionOutcome {
            self.controller.handle(
                command,
                hit.map(str::to_owned),
                &mut self.layout,
                &mut self.viewport,
            )
        }
    }

    #[test]
    fn dragging_a_node_reports_the_release_position() {
        let mut rig = Rig::new();

        rig.send(PointerCommand::Down { at: vec2(100.0, 100.0) }, Some("x"));
        assert!(rig.layout.is_pinned("x"));
        rig.send(PointerCommand::Move { to: vec2(180.0, 150.0) }, None);
        assert_eq!(rig.layout.position("x"), Some(vec2(180.0, 150.0)));
        let outcome = rig.send(PointerCommand::Up { at: vec2(250.0, 180.0) }, None);

        assert_eq!(
            outcome,
            InteractionOutcome::DragFinished {
                id: "x".to_owned(),
                position: Position::new(250.0, 180.0),
            }
        );
        assert!(!rig.layout.is_pinned("x"));
        assert_eq!(rig.layout.position("x"), Some(vec2(250.0, 180.0)));
    }

    #[test]
    fn drag_follows_the_inverse_viewport_transform() {
        let mut rig = Rig::new();
        rig.viewport.zoom_by(2.0, Vec2::ZERO);
        rig.viewport.pan_by(vec2(40.0, 0.0));

        rig.send(PointerCommand::Down { at: vec2(240.0, 200.0) }, Some("x"));
        rig.send(PointerCommand::Move { to: vec2(440.0, 300.0) }, None);

        assert_eq!(rig.layout.position("x"), Some(vec2(200.0, 150.0)));
    }

    #[test]
    fn press_and_release_in_place_is_a_click() {
        let mut rig = Rig::new();
        rig.send(PointerCommand::Down { at: vec2(100.0, 100.0) }, Some("x"));
        let outcome = rig.send(PointerCommand::Up { at: vec2(101.0, 100.0) }, None);

        assert_eq!(outcome, InteractionOutcome::NodeClicked("x".to_owned()));
        assert_eq!(rig.layout.position("x"), Some(vec2(100.0, 100.0)));
    }

    #[test]
    fn background_press_pans_the_viewport() {
        let mut rig = Rig::new();
        rig.send(PointerCommand::Down { at: vec2(0.0, 0.0) }, None);
        rig.send(PointerCommand::Move { to: vec2(30.0, -10.0) }, None);
        let outcome = rig.send(PointerCommand::Up { at: vec2(30.0, -10.0) }, None);

        assert_eq!(outcome, InteractionOutcome::Nothing);
        assert_eq!(rig.viewport.transform().translation, vec2(30.0, -10.0));
        assert_eq!(rig.layout.position("x"), Some(vec2(100.0, 100.0)));
    }

    #[test]
    fn background_click_is_reported() {
        let mut rig = Rig::new();
        rig.send(PointerCommand::Down { at: vec2(5.0, 5.0) }, None);
        let outcome = rig.send(PointerCommand::Up { at: vec2(5.0, 5.0) }, None);
        assert_eq!(outcome, InteractionOutcome::BackgroundClicked);
    }

    #[test]
    fn second_press_during_a_drag_is_ignored() {
        let mut rig = Rig::new();
        rig.send(PointerCommand::Down { at: vec2(100.0, 100.0) }, Some("x"));
        rig.send(PointerCommand::Down { at: vec2(-100.0, 0.0) }, Some("y"));

        assert_eq!(rig.controller.dragged_node(), Some("x"));
        assert!(!rig.layout.is_pinned("y"));
    }

    #[test]
    fn cancel_ends_the_drag_where_it_is() {
        let mut rig = Rig::new();
        rig.send(PointerCommand::Down { at: vec2(100.0, 100.0) }, Some("x"));
        rig.send(PointerCommand::Move { to: vec2(160.0, 100.0) }, None);
        let outcome = rig.send(PointerCommand::Cancel, None);

        assert_eq!(
            outcome,
            InteractionOutcome::DragFinished {
                id: "x".to_owned(),
                position: Position::new(160.0, 100.0),
            }
        );
        assert!(!rig.controller.is_active());
    }

    #[test]
    fn pressing_an_unknown_node_falls_back_to_panning() {
        let mut rig = Rig::new();
        rig.send(PointerCommand::Down { at: vec2(0.0, 0.0) }, Some("ghost"));
        assert_eq!(rig.controller.dragged_node(), None);
        assert!(rig.controller.is_active());
    }

    #[test]
    fn wheel_zooms_around_the_pointer() {
        let mut rig = Rig::new();
        rig.send(
            PointerCommand::Wheel {
                factor: 1.5,
                at: vec2(50.0, 50.0),
            },
            None,
        );
        assert_eq!(rig.viewport.scale(), 1.5);
        assert!((rig.viewport.to_graph(vec2(50.0, 50.0)) - vec2(50.0, 50.0)).length() < 1e-3);
    }
}
