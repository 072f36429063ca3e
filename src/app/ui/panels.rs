use std::time::Instant;

use eframe::egui::{self, Align, Context, Layout};

use crate::model::Category;

use super::super::ViewModel;
use super::super::graph::{Visibility, ZOOM_IN_STEP, ZOOM_OUT_STEP};
use super::super::physics::LayoutState;

impl ViewModel {
    pub(in crate::app) fn draw_top_bar(&mut self, ctx: &Context, now: Instant) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("SECI Knowledge Mapper");
                    ui.separator();
                    ui.label(format!("nodes: {}", self.canvas.model().node_count()));
                    ui.label(format!(
                        "connections: {}",
                        self.canvas.model().connection_count()
                    ));
                    if let Some(analytics) = &self.analytics {
                        ui.label(format!("completion: {:.0}%", analytics.completion_score));
                    }
                    ui.separator();

                    if ui.button("−").on_hover_text("Zoom out").clicked() {
                        self.canvas.zoom_step(ZOOM_OUT_STEP);
                    }
                    if ui.button("+").on_hover_text("Zoom in").clicked() {
                        self.canvas.zoom_step(ZOOM_IN_STEP);
                    }
                    if ui.button("Reset view").clicked() {
                        self.canvas.reset_view();
                    }
                    if ui.button("Auto layout").clicked() {
                        self.canvas.restart_layout();
                    }

                    let reload = ui.add_enabled(
                        self.graph_request.is_none(),
                        egui::Button::new("Reload"),
                    );
                    if reload.clicked() {
                        self.reload(now);
                    }

                    let mut auto_refresh = self.refresh.is_running();
                    if ui.checkbox(&mut auto_refresh, "Auto refresh").changed() {
                        if auto_refresh {
                            self.refresh.restart(now);
                        } else {
                            self.refresh.stop();
                        }
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!("zoom {:.0}%", self.canvas.scale() * 100.0));
                        let (alpha, energy) = self.canvas.layout_heat();
                        ui.label(self.layout_status())
                            .on_hover_text(format!("alpha {alpha:.3}, energy {energy:.4}"));
                        ui.label(self.visible_graph_text());
                    });
                });
            });
    }

    fn layout_status(&self) -> &'static str {
        match self.canvas.layout_state() {
            LayoutState::Idle => "layout idle",
            LayoutState::Settling => "layout settling",
            LayoutState::Converged => "layout settled",
        }
    }

    fn visible_graph_text(&self) -> String {
        let visible = self
            .canvas
            .model()
            .nodes()
            .filter(|node| self.canvas.node_visibility(&node.id) == Some(Visibility::Visible))
            .count();
        let total = self.canvas.model().node_count();
        if visible == total {
            format!("showing all {total}")
        } else {
            format!("showing {visible} of {total}")
        }
    }

    pub(in crate::app) fn category_count(&self, category: Category) -> usize {
        self.canvas
            .model()
            .nodes()
            .filter(|node| node.category == category)
            .count()
    }
}
