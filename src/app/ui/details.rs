use eframe::egui::{self, Context, RichText, Ui};

use crate::model::{AnalyticsSummary, NodeDetail};
use crate::util::format_timestamp;

use super::super::render_utils::category_color;
use super::super::{DetailState, ViewModel};

impl ViewModel {
    pub(in crate::app) fn draw_details_panel(&mut self, ctx: &Context) {
        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("details_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        self.draw_details(ui);
                        ui.separator();
                        if let Some(analytics) = &self.analytics {
                            draw_analytics(ui, analytics);
                        }
                    });
            });
    }

    fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Node Details");
        ui.add_space(6.0);

        let mut retry = None;
        let mut center = None;
        match &self.detail {
            DetailState::Empty => {
                ui.label("Select a node on the map or in the search results.");
            }
            DetailState::Loading(id) => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    let title = self
                        .canvas
                        .model()
                        .node(id)
                        .map_or(id.as_str(), |node| node.title.as_str());
                    ui.label(format!("Loading {title}..."));
                });
            }
            DetailState::Failed { id, message } => {
                ui.label(RichText::new("Could not load details").strong());
                ui.small(message.as_str());
                if ui.button("Retry").clicked() {
                    retry = Some(id.clone());
                }
            }
            DetailState::Ready(detail) => {
                if draw_node_detail(ui, detail) {
                    center = Some(detail.node.id.clone());
                }
            }
        }

        if let Some(id) = retry {
            self.select(id);
        }
        if let Some(id) = center {
            self.canvas.center_on(&id);
        }
    }
}

/// Returns whether "Center on map" was clicked.
fn draw_node_detail(ui: &mut Ui, detail: &NodeDetail) -> bool {
    let node = &detail.node;
    ui.label(RichText::new(node.title.as_str()).strong().size(16.0));
    ui.colored_label(category_color(node.category), node.category.label());
    ui.small(node.category.description());
    ui.add_space(6.0);

    if let Some(description) = detail.description.as_deref().filter(|text| !text.is_empty()) {
        ui.label(description);
        ui.add_space(6.0);
    }

    ui.label(format!("Created: {}", format_timestamp(detail.created_at)));
    ui.label(format!("Updated: {}", format_timestamp(detail.updated_at)));
    ui.label(format!(
        "Connections: {} outgoing, {} incoming",
        detail.outgoing, detail.incoming
    ));
    ui.label(format!(
        "Versions: {}  Comments: {}",
        detail.stats.versions, detail.stats.comments
    ));
    if let Some(position) = node.position {
        ui.small(format!("Position: ({:.0}, {:.0})", position.x, position.y));
    }

    if !detail.tags.is_empty() {
        ui.add_space(4.0);
        ui.horizontal_wrapped(|ui| {
            ui.label("Tags:");
            for tag in &detail.tags {
                ui.label(RichText::new(tag.name.as_str()).italics());
            }
        });
    }

    ui.add_space(6.0);
    ui.button("Center on map").clicked()
}

fn draw_analytics(ui: &mut Ui, analytics: &AnalyticsSummary) {
    ui.heading("Map Analytics");
    ui.label(format!("Completion score: {:.0}%", analytics.completion_score));
    ui.label(format!("Balance score: {:.0}%", analytics.balance_score));
    ui.label(format!(
        "Flow quality: {:.0}% ({} of {} flows follow the SECI cycle)",
        analytics.flow_quality.score,
        analytics.flow_quality.ideal_flows,
        analytics.flow_quality.total_flows
    ));

    if !analytics.category_distribution.is_empty() {
        ui.add_space(4.0);
        ui.label(RichText::new("Distribution").strong());
        for (category, share) in &analytics.category_distribution {
            ui.label(format!(
                "{category}: {} ({:.0}%)",
                share.count, share.percentage
            ));
        }
    }
}
