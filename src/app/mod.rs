use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Context};
use tracing::{debug, info, warn};

use crate::api::GraphApi;
use crate::config::AppConfig;
use crate::model::{AnalyticsSummary, Node, NodeDetail, NodeId, Tag};

mod graph;
mod notifications;
mod physics;
mod render_utils;
mod sync;
mod ui;

use graph::{GraphCanvas, InteractionOutcome};
use notifications::Notifier;
use sync::{RefreshTimer, RequestId, SearchDebouncer, SearchTrigger, SyncAdapter, SyncEvent};

pub struct MapperApp {
    config: AppConfig,
    api: Arc<dyn GraphApi>,
    state: AppState,
}

enum AppState {
    Loading(Box<ViewModel>),
    Ready(Box<ViewModel>),
    Error(String),
}

/// Status of the first graph fetch.
enum FirstLoad {
    Pending,
    Loaded,
    Failed(String),
}

enum DetailState {
    Empty,
    Loading(NodeId),
    Ready(Box<NodeDetail>),
    Failed { id: NodeId, message: String },
}

struct SearchMatchCache {
    query: String,
    graph_revision: u64,
    matches: Arc<HashSet<NodeId>>,
}

struct ViewModel {
    canvas: GraphCanvas,
    sync: SyncAdapter,
    refresh: RefreshTimer,
    debouncer: SearchDebouncer,
    notifier: Notifier,
    first_load: FirstLoad,
    graph_request: Option<RequestId>,
    analytics: Option<AnalyticsSummary>,
    tags: Vec<Tag>,
    search: String,
    search_results: Vec<Node>,
    search_in_flight: bool,
    search_match_cache: Option<SearchMatchCache>,
    selected: Option<NodeId>,
    hovered: Option<NodeId>,
    detail: DetailState,
}

impl ViewModel {
    fn new(config: &AppConfig, sync: SyncAdapter, now: Instant) -> Self {
        let mut model = Self {
            canvas: GraphCanvas::new(config.layout, config.viewport),
            sync,
            refresh: RefreshTimer::new(config.sync.refresh_interval, now),
            debouncer: SearchDebouncer::new(
                config.sync.search_debounce,
                config.sync.min_search_len,
            ),
            notifier: Notifier::default(),
            first_load: FirstLoad::Pending,
            graph_request: None,
            analytics: None,
            tags: Vec::new(),
            search: String::new(),
            search_results: Vec::new(),
            search_in_flight: false,
            search_match_cache: None,
            selected: None,
            hovered: None,
            detail: DetailState::Empty,
        };
        model.request_graph();
        model.sync.fetch_tags();
        model
    }

    fn request_graph(&mut self) {
        if self.graph_request.is_some() {
            debug!("graph fetch already in flight");
            return;
        }
        self.graph_request = Some(self.sync.fetch_graph());
        self.sync.fetch_analytics();
    }

    fn reload(&mut self, now: Instant) {
        self.refresh.restart(now);
        self.request_graph();
        self.sync.fetch_tags();
    }

    /// Drives timers and applies finished background requests.
    fn pump(&mut self, now: Instant) {
        if self.refresh.poll(now) {
            debug!("periodic refresh");
            self.request_graph();
        }

        match self.debouncer.poll(now) {
            Some(SearchTrigger::Query(query)) => {
                self.sync.search(&query);
                self.search_in_flight = true;
            }
            Some(SearchTrigger::Clear) => {
                self.sync.cancel_search();
                self.search_in_flight = false;
                self.search_results.clear();
            }
            None => {}
        }

        for event in self.sync.poll() {
            debug!(request = ?event.request(), "sync event");
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Graph { request, result } => {
                if self.graph_request == Some(request) {
                    self.graph_request = None;
                }
                match result {
                    Ok(snapshot) => {
                        let change = self.canvas.apply_snapshot(snapshot, request);
                        if !self.canvas.model().has_tagged_nodes()
                            && !self.canvas.filter().tags().is_empty()
                        {
                            debug!("graph carries no node tags, clearing tag filter");
                            self.canvas.filter_mut().clear_tags();
                        }
                        if matches!(self.first_load, FirstLoad::Pending) {
                            info!(nodes = self.canvas.model().node_count(), "graph loaded");
                            self.first_load = FirstLoad::Loaded;
                        } else if change.changes_structure() {
                            self.notifier.info(format!(
                                "Map updated: {} added, {} removed",
                                change.added_nodes.len(),
                                change.removed_nodes.len()
                            ));
                        }
                        if let Some(selected) = &self.selected
                            && !self.canvas.model().contains_node(selected)
                        {
                            self.clear_selection();
                        }
                    }
                    Err(error) => match self.first_load {
                        FirstLoad::Pending => self.first_load = FirstLoad::Failed(error.to_string()),
                        _ if error.is_transient() => {
                            self.notifier.warning(format!("Refresh failed, will retry: {error}"));
                        }
                        _ => self.notifier.error(format!("Refresh failed: {error}")),
                    },
                }
            }
            SyncEvent::NodeDetail { id, result, .. } => {
                if self.selected.as_deref() != Some(id.as_str()) {
                    return;
                }
                self.detail = match result {
                    Ok(detail) => DetailState::Ready(Box::new(detail)),
                    Err(error) => {
                        self.notifier
                            .warning(format!("Could not load details: {error}"));
                        DetailState::Failed {
                            id,
                            message: error.to_string(),
                        }
                    }
                };
            }
            SyncEvent::PositionPersisted {
                request,
                id,
                position,
                result,
            } => {
                self.canvas
                    .persist_settled(&id, request, matches!(result, Ok(true)));
                match result {
                    Ok(true) => debug!(node = %id, x = position.x, y = position.y, "position saved"),
                    Ok(false) => {
                        warn!(node = %id, "server declined position update");
                        self.notifier.warning("The server did not save the new position");
                    }
                    Err(error) => {
                        self.notifier
                            .error(format!("Could not save node position: {error}"));
                    }
                }
            }
            SyncEvent::SearchResults { query, result, .. } => {
                self.search_in_flight = false;
                match result {
                    Ok(nodes) => {
                        debug!(%query, hits = nodes.len(), "search results");
                        self.search_results = nodes;
                    }
                    Err(error) => self.notifier.warning(format!("Search failed: {error}")),
                }
            }
            SyncEvent::Analytics { result, .. } => match result {
                Ok(summary) => self.analytics = Some(summary),
                Err(error) => warn!(%error, "analytics unavailable"),
            },
            SyncEvent::Tags { result, .. } => match result {
                Ok(tags) => {
                    let known: HashSet<&str> = tags.iter().map(|tag| tag.id.as_str()).collect();
                    let stale: Vec<String> = self
                        .canvas
                        .filter()
                        .tags()
                        .iter()
                        .filter(|tag| !known.contains(tag.as_str()))
                        .cloned()
                        .collect();
                    for tag in stale {
                        self.canvas.filter_mut().set_tag(&tag, false);
                    }
                    self.tags = tags;
                }
                Err(error) => warn!(%error, "tag catalogue unavailable"),
            },
        }
    }

    fn handle_outcome(&mut self, outcome: InteractionOutcome) {
        match outcome {
            InteractionOutcome::Nothing => {}
            InteractionOutcome::NodeClicked(id) => self.select(id),
            InteractionOutcome::BackgroundClicked => self.clear_selection(),
            InteractionOutcome::DragFinished { id, position } => {
                let request = self.sync.persist_position(&id, position);
                self.canvas.persist_issued(&id, request);
            }
        }
    }

    fn select(&mut self, id: NodeId) {
        if self.selected.as_ref() == Some(&id)
            && !matches!(self.detail, DetailState::Failed { .. })
        {
            return;
        }
        self.sync.fetch_node_detail(&id);
        self.detail = DetailState::Loading(id.clone());
        self.selected = Some(id);
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.detail = DetailState::Empty;
    }

    fn set_search(&mut self, text: String, now: Instant) {
        if text == self.search {
            return;
        }
        self.debouncer.input(&text, now);
        self.search = text;
    }

    fn focus_node(&mut self, id: &str) {
        self.canvas.center_on(id);
        self.select(id.to_owned());
    }

    /// Earliest moment a timer needs the UI thread again.
    fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        [
            self.refresh.time_until_due(now),
            self.debouncer.time_until_due(now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn show(&mut self, ctx: &Context) {
        let now = Instant::now();
        self.pump(now);

        self.draw_top_bar(ctx, now);
        self.draw_controls_panel(ctx, now);
        self.draw_details_panel(ctx);
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));

        self.notifier.show(ctx);
        if let Some(wait) = self.next_wakeup(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}

impl MapperApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, api: Arc<dyn GraphApi>) -> Self {
        let ctx = cc.egui_ctx.clone();
        let state = Self::start_load(&config, &api, Some(ctx));
        Self { config, api, state }
    }

    fn start_load(config: &AppConfig, api: &Arc<dyn GraphApi>, ctx: Option<Context>) -> AppState {
        let waker = ctx.map(|ctx| Box::new(move || ctx.request_repaint()) as Box<dyn Fn() + Send>);
        let sync = SyncAdapter::spawn_with_waker(Arc::clone(api), waker);
        AppState::Loading(Box::new(ViewModel::new(config, sync, Instant::now())))
    }
}

impl eframe::App for MapperApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.advance_loading();

        let mut retry = false;
        match &mut self.state {
            AppState::Loading(_) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading knowledge map...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Could not load the knowledge map");
                    ui.add_space(6.0);
                    ui.label(format!("{error} ({})", self.config.api.base_url));
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
            }
            AppState::Ready(model) => model.show(ctx),
        }

        if retry {
            info!("retrying initial load");
            self.state = Self::start_load(&self.config, &self.api, Some(ctx.clone()));
            ctx.request_repaint();
        }
    }
}

impl MapperApp {
    /// Moves out of `Loading` once the first graph fetch has finished.
    fn advance_loading(&mut self) {
        let AppState::Loading(model) = &mut self.state else {
            return;
        };
        model.pump(Instant::now());
        let failure = match &model.first_load {
            FirstLoad::Pending => return,
            FirstLoad::Loaded => None,
            FirstLoad::Failed(message) => Some(message.clone()),
        };

        self.state = match failure {
            Some(message) => AppState::Error(message),
            None => match std::mem::replace(&mut self.state, AppState::Error(String::new())) {
                AppState::Loading(model) => AppState::Ready(model),
                other => other,
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use eframe::egui::vec2;

    use super::*;
    use crate::api::ApiError;
    use crate::config::{LayoutConfig, SyncConfig, ViewportConfig};
    use crate::model::{Category, Connection, GraphSnapshot, Position};
    use graph::PointerCommand;

    struct FakeBackend {
        graph: Mutex<GraphSnapshot>,
        persisted: Mutex<Vec<(NodeId, Position)>>,
        fail_graph: bool,
    }

    impl FakeBackend {
        fn new(fail_graph: bool) -> Arc<Self> {
            Arc::new(Self {
                graph: Mutex::new(GraphSnapshot {
                    nodes: vec![
                        Node::new("x", "Pairing session", Category::Socialization)
                            .with_position(100.0, 100.0),
                        Node::new("y", "Design doc", Category::Externalization)
                            .with_position(-200.0, 50.0),
                    ],
                    connections: vec![Connection::new("xy", "x", "y")],
                }),
                persisted: Mutex::new(Vec::new()),
                fail_graph,
            })
        }
    }

    impl GraphApi for FakeBackend {
        fn fetch_graph(&self) -> Result<GraphSnapshot, ApiError> {
            if self.fail_graph {
                return Err(ApiError::Transport("connection refused".to_owned()));
            }
            Ok(self.graph.lock().unwrap().clone())
        }

        fn fetch_node_detail(&self, id: &str) -> Result<NodeDetail, ApiError> {
            let node = self
                .graph
                .lock()
                .unwrap()
                .nodes
                .iter()
                .find(|node| node.id == id)
                .cloned()
                .ok_or_else(|| ApiError::Status {
                    code: 404,
                    message: "Node not found".to_owned(),
                })?;
            Ok(NodeDetail {
                node,
                description: None,
                created_at: None,
                updated_at: None,
                tags: Vec::new(),
                stats: Default::default(),
                outgoing: 1,
                incoming: 0,
            })
        }

        fn persist_node_position(&self, id: &str, position: Position) -> Result<bool, ApiError> {
            self.persisted
                .lock()
                .unwrap()
                .push((id.to_owned(), position));
            Ok(true)
        }

        fn search_nodes(&self, _query: &str) -> Result<Vec<Node>, ApiError> {
            Ok(Vec::new())
        }

        fn fetch_analytics_summary(&self) -> Result<AnalyticsSummary, ApiError> {
            Ok(AnalyticsSummary {
                completion_score: 50.0,
                ..AnalyticsSummary::default()
            })
        }

        fn fetch_tags(&self) -> Result<Vec<Tag>, ApiError> {
            Ok(vec![Tag {
                id: "t1".to_owned(),
                name: "Onboarding".to_owned(),
                color: None,
            }])
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            api: crate::config::ApiConfig {
                base_url: "http://test.invalid/api".to_owned(),
                timeout: Duration::from_secs(1),
            },
            sync: SyncConfig {
                refresh_interval: None,
                ..SyncConfig::default()
            },
            viewport: ViewportConfig::default(),
            layout: LayoutConfig::default(),
        }
    }

    fn settle_until(model: &mut ViewModel, mut done: impl FnMut(&ViewModel) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(model) && Instant::now() < deadline {
            model.pump(Instant::now());
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn loaded(backend: Arc<FakeBackend>) -> ViewModel {
        let mut model = ViewModel::new(&config(), SyncAdapter::spawn(backend), Instant::now());
        settle_until(&mut model, |model| {
            matches!(model.first_load, FirstLoad::Loaded) && model.analytics.is_some()
        });
        model
    }

    fn drag(model: &mut ViewModel, from: (f32, f32), to: (f32, f32)) {
        for command in [
            PointerCommand::Down { at: vec2(from.0, from.1) },
            PointerCommand::Move { to: vec2(to.0, to.1) },
            PointerCommand::Up { at: vec2(to.0, to.1) },
        ] {
            let outcome = model.canvas.dispatch(command);
            model.handle_outcome(outcome);
        }
    }

    #[test]
    fn first_load_populates_the_canvas() {
        let model = loaded(FakeBackend::new(false));
        assert_eq!(model.canvas.model().node_count(), 2);
        assert_eq!(model.analytics.as_ref().unwrap().completion_score, 50.0);
    }

    #[test]
    fn failed_first_load_reports_the_error() {
        let mut model =
            ViewModel::new(&config(), SyncAdapter::spawn(FakeBackend::new(true)), Instant::now());
        settle_until(&mut model, |model| matches!(model.first_load, FirstLoad::Failed(_)));
        assert!(matches!(&model.first_load, FirstLoad::Failed(message) if message.contains("connection refused")));
    }

    #[test]
    fn releasing_a_drag_persists_exactly_once() {
        let backend = FakeBackend::new(false);
        let mut model = loaded(backend.clone());

        drag(&mut model, (100.0, 100.0), (250.0, 180.0));
        settle_until(&mut model, |_| !backend.persisted.lock().unwrap().is_empty());
        model.pump(Instant::now());

        assert_eq!(
            *backend.persisted.lock().unwrap(),
            vec![("x".to_owned(), Position::new(250.0, 180.0))]
        );
    }

    #[test]
    fn back_to_back_drags_issue_independent_persists() {
        let backend = FakeBackend::new(false);
        let mut model = loaded(backend.clone());

        drag(&mut model, (100.0, 100.0), (250.0, 180.0));
        drag(&mut model, (250.0, 180.0), (300.0, 40.0));
        settle_until(&mut model, |_| backend.persisted.lock().unwrap().len() == 2);
        model.pump(Instant::now());

        assert_eq!(
            *backend.persisted.lock().unwrap(),
            vec![
                ("x".to_owned(), Position::new(250.0, 180.0)),
                ("x".to_owned(), Position::new(300.0, 40.0)),
            ]
        );
        assert_eq!(
            model.canvas.model().node("x").unwrap().position,
            Some(Position::new(300.0, 40.0))
        );
        assert_eq!(model.canvas.model().node_count(), 2);
    }

    #[test]
    fn clicking_a_node_loads_its_details() {
        let mut model = loaded(FakeBackend::new(false));
        let outcome = model.canvas.dispatch(PointerCommand::Down { at: vec2(100.0, 100.0) });
        model.handle_outcome(outcome);
        let outcome = model.canvas.dispatch(PointerCommand::Up { at: vec2(100.0, 100.0) });
        model.handle_outcome(outcome);

        assert_eq!(model.selected.as_deref(), Some("x"));
        settle_until(&mut model, |model| matches!(model.detail, DetailState::Ready(_)));
        assert!(matches!(&model.detail, DetailState::Ready(detail) if detail.outgoing == 1));

        model.handle_outcome(InteractionOutcome::BackgroundClicked);
        assert!(model.selected.is_none());
    }

    #[test]
    fn untagged_graph_clears_the_tag_filter() {
        let backend = FakeBackend::new(false);
        let mut model = loaded(backend);
        settle_until(&mut model, |model| !model.tags.is_empty());

        model.canvas.filter_mut().set_tag("t1", true);
        assert_eq!(model.canvas.node_visibility("x"), Some(graph::Visibility::Hidden));

        model.reload(Instant::now());
        settle_until(&mut model, |model| model.canvas.filter().tags().is_empty());

        assert!(model.canvas.filter().tags().is_empty());
        assert_eq!(model.canvas.node_visibility("x"), Some(graph::Visibility::Visible));
    }

    #[test]
    fn refresh_removing_the_selected_node_clears_the_selection() {
        let backend = FakeBackend::new(false);
        let mut model = loaded(backend.clone());
        model.select("y".to_owned());

        backend.graph.lock().unwrap().nodes.retain(|node| node.id != "y");
        model.reload(Instant::now());
        settle_until(&mut model, |model| model.canvas.model().node_count() == 1);

        assert!(model.selected.is_none());
    }
}
