use std::time::Instant;

use eframe::egui::{self, Context, RichText, Ui};

use crate::model::{Category, NodeId};
use crate::util::{LABEL_CHAR_BUDGET, truncate_title};

use super::super::ViewModel;
use super::super::render_utils::category_color;

const SEARCH_RESULT_ROWS: usize = 50;

impl ViewModel {
    pub(in crate::app) fn draw_controls_panel(&mut self, ctx: &Context, now: Instant) {
        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("controls_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| self.draw_controls(ui, now));
            });
    }

    fn draw_controls(&mut self, ui: &mut Ui, now: Instant) {
        self.draw_search(ui, now);
        ui.separator();
        self.draw_category_filters(ui);
        ui.separator();
        self.draw_tag_filters(ui);
        ui.separator();
        Self::draw_legend(ui);
    }

    fn draw_search(&mut self, ui: &mut Ui, now: Instant) {
        ui.heading("Search");
        let mut search = self.search.clone();
        let response = ui.add(
            egui::TextEdit::singleline(&mut search)
                .hint_text("Search node titles")
                .desired_width(f32::INFINITY),
        );
        if response.changed() {
            self.set_search(search, now);
        }

        if self.search_in_flight {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Searching...");
            });
        }

        if self.search.trim().is_empty() || self.search_results.is_empty() {
            return;
        }

        let mut focus: Option<NodeId> = None;
        egui::ScrollArea::vertical()
            .id_salt("search_results_scroll")
            .max_height(220.0)
            .show(ui, |ui| {
                for node in self.search_results.iter().take(SEARCH_RESULT_ROWS) {
                    let selected = self.selected.as_deref() == Some(node.id.as_str());
                    let label = RichText::new(truncate_title(&node.title, LABEL_CHAR_BUDGET * 2))
                        .color(category_color(node.category));
                    if ui
                        .selectable_label(selected, label)
                        .on_hover_text(node.category.label())
                        .clicked()
                    {
                        focus = Some(node.id.clone());
                    }
                }
            });

        if let Some(id) = focus {
            self.focus_node(&id);
        }
    }

    fn draw_category_filters(&mut self, ui: &mut Ui) {
        ui.heading("Categories");

        let mut all = self.canvas.filter().all_categories_active();
        if ui.checkbox(&mut all, "All").changed() {
            self.canvas.filter_mut().set_all_categories(all);
        }

        for category in Category::ALL {
            let mut active = self.canvas.filter().is_category_active(category);
            let count = self.category_count(category);
            let label = RichText::new(format!("{} ({count})", category.label()))
                .color(category_color(category));
            if ui.checkbox(&mut active, label).changed() {
                self.canvas.filter_mut().set_category(category, active);
            }
        }
    }

    fn draw_tag_filters(&mut self, ui: &mut Ui) {
        ui.heading("Tags");
        if self.tags.is_empty() {
            ui.label("No tags defined.");
            return;
        }
        if !self.canvas.model().has_tagged_nodes() {
            ui.label("Nodes on this map carry no tags, so tag filtering is unavailable.");
            return;
        }

        let mut toggled: Option<(String, bool)> = None;
        ui.horizontal_wrapped(|ui| {
            for tag in &self.tags {
                let mut active = self.canvas.filter().is_tag_active(&tag.id);
                if ui.checkbox(&mut active, tag.name.as_str()).changed() {
                    toggled = Some((tag.id.clone(), active));
                }
            }
        });
        if let Some((tag, active)) = toggled {
            self.canvas.filter_mut().set_tag(&tag, active);
        }

        if !self.canvas.filter().tags().is_empty() && ui.button("Clear tags").clicked() {
            self.canvas.filter_mut().clear_tags();
        }
    }

    fn draw_legend(ui: &mut Ui) {
        ui.heading("Legend");
        for category in Category::ALL {
            ui.horizontal(|ui| {
                ui.colored_label(category_color(category), "●");
                ui.label(RichText::new(category.label()).strong());
            });
            ui.small(category.description());
        }
    }
}
