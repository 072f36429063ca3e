//! Background access to the backend.
//!
//! Requests are queued to a single worker thread and executed strictly in
//! submission order; results come back as [`SyncEvent`]s drained on the UI
//! thread with [`SyncAdapter::poll`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::api::{ApiError, GraphApi};
use crate::model::{AnalyticsSummary, GraphSnapshot, Node, NodeDetail, NodeId, Position, Tag};

/// Monotonic stamp given to every request at submission time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum SyncRequest {
    FetchGraph,
    FetchNodeDetail(NodeId),
    PersistPosition { id: NodeId, position: Position },
    Search(String),
    FetchAnalytics,
    FetchTags,
}

#[derive(Debug)]
pub enum SyncEvent {
    Graph {
        request: RequestId,
        result: Result<GraphSnapshot, ApiError>,
    },
    NodeDetail {
        request: RequestId,
        id: NodeId,
        result: Result<NodeDetail, ApiError>,
    },
    PositionPersisted {
        request: RequestId,
        id: NodeId,
        position: Position,
        result: Result<bool, ApiError>,
    },
    SearchResults {
        request: RequestId,
        query: String,
        result: Result<Vec<Node>, ApiError>,
    },
    Analytics {
        request: RequestId,
        result: Result<AnalyticsSummary, ApiError>,
    },
    Tags {
        request: RequestId,
        result: Result<Vec<Tag>, ApiError>,
    },
}

impl SyncEvent {
    pub fn request(&self) -> RequestId {
        match self {
            Self::Graph { request, .. }
            | Self::NodeDetail { request, .. }
            | Self::PositionPersisted { request, .. }
            | Self::SearchResults { request, .. }
            | Self::Analytics { request, .. }
            | Self::Tags { request, .. } => *request,
        }
    }
}

type Waker = Box<dyn Fn() + Send>;

pub struct SyncAdapter {
    next_request: u64,
    requests: Option<Sender<(RequestId, SyncRequest)>>,
    events: Receiver<SyncEvent>,
    shutdown: Arc<AtomicBool>,
    latest_search: Option<RequestId>,
}

impl SyncAdapter {
    pub fn spawn(api: Arc<dyn GraphApi>) -> Self {
        Self::spawn_with_waker(api, None)
    }

    /// `waker` runs on the worker thread after each event is queued, so the
    /// UI can schedule a repaint.
    pub fn spawn_with_waker(api: Arc<dyn GraphApi>, waker: Option<Waker>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<(RequestId, SyncRequest)>();
        let (event_tx, event_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stopping = Arc::clone(&shutdown);

        thread::spawn(move || {
            for (request, work) in request_rx {
                if stopping.load(Ordering::Acquire) {
                    debug!(?request, "sync adapter dropped, skipping queued requests");
                    break;
                }
                let event = execute(api.as_ref(), request, work);
                if event_tx.send(event).is_err() {
                    break;
                }
                if let Some(waker) = &waker {
                    waker();
                }
            }
            debug!("sync worker stopped");
        });

        Self {
            next_request: 0,
            requests: Some(request_tx),
            events: event_rx,
            shutdown,
            latest_search: None,
        }
    }

    fn submit(&mut self, work: SyncRequest) -> RequestId {
        self.next_request += 1;
        let request = RequestId(self.next_request);
        debug!(?request, ?work, "queueing sync request");

        let sent = self
            .requests
            .as_ref()
            .is_some_and(|requests| requests.send((request, work)).is_ok());
        if !sent {
            warn!(?request, "sync worker is gone, request dropped");
        }
        request
    }

    pub fn fetch_graph(&mut self) -> RequestId {
        self.submit(SyncRequest::FetchGraph)
    }

    pub fn fetch_node_detail(&mut self, id: &str) -> RequestId {
        self.submit(SyncRequest::FetchNodeDetail(id.to_owned()))
    }

    pub fn persist_position(&mut self, id: &str, position: Position) -> RequestId {
        self.submit(SyncRequest::PersistPosition {
            id: id.to_owned(),
            position,
        })
    }

    /// Results of any earlier search are discarded once this one is issued.
    pub fn search(&mut self, query: &str) -> RequestId {
        let request = self.submit(SyncRequest::Search(query.to_owned()));
        self.latest_search = Some(request);
        request
    }

    /// Forgets the in-flight search so its results are dropped on arrival.
    pub fn cancel_search(&mut self) {
        self.latest_search = None;
    }

    pub fn fetch_analytics(&mut self) -> RequestId {
        self.submit(SyncRequest::FetchAnalytics)
    }

    pub fn fetch_tags(&mut self) -> RequestId {
        self.submit(SyncRequest::FetchTags)
    }

    /// Drains every completed request without blocking.
    pub fn poll(&mut self) -> Vec<SyncEvent> {
        let mut ready = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let SyncEvent::SearchResults { request, .. } = &event
                && self.latest_search != Some(*request)
            {
                debug!(?request, "dropping stale search results");
                continue;
            }
            ready.push(event);
        }
        ready
    }

    #[cfg(test)]
    fn wait_for(&mut self, count: usize) -> Vec<SyncEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < count && Instant::now() < deadline {
            events.extend(self.poll());
            thread::sleep(Duration::from_millis(2));
        }
        events
    }
}

/// The worker is detached: queued requests are skipped and a call already in
/// flight finishes on its own without holding up the caller.
impl Drop for SyncAdapter {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.requests.take();
    }
}

fn execute(api: &dyn GraphApi, request: RequestId, work: SyncRequest) -> SyncEvent {
    let event = match work {
        SyncRequest::FetchGraph => SyncEvent::Graph {
            request,
            result: api.fetch_graph(),
        },
        SyncRequest::FetchNodeDetail(id) => {
            let result = api.fetch_node_detail(&id);
            SyncEvent::NodeDetail {
                request,
                id,
                result,
            }
        }
        SyncRequest::PersistPosition { id, position } => {
            let result = api.persist_node_position(&id, position);
            SyncEvent::PositionPersisted {
                request,
                id,
                position,
                result,
            }
        }
        SyncRequest::Search(query) => {
            let result = api.search_nodes(&query);
            SyncEvent::SearchResults {
                request,
                query,
                result,
            }
        }
        SyncRequest::FetchAnalytics => SyncEvent::Analytics {
            request,
            result: api.fetch_analytics_summary(),
        },
        SyncRequest::FetchTags => SyncEvent::Tags {
            request,
            result: api.fetch_tags(),
        },
    };

    if let Some(error) = event_error(&event) {
        warn!(?request, %error, "sync request failed");
    }
    event
}

fn event_error(event: &SyncEvent) -> Option<&ApiError> {
    match event {
        SyncEvent::Graph { result, .. } => result.as_ref().err(),
        SyncEvent::NodeDetail { result, .. } => result.as_ref().err(),
        SyncEvent::PositionPersisted { result, .. } => result.as_ref().err(),
        SyncEvent::SearchResults { result, .. } => result.as_ref().err(),
        SyncEvent::Analytics { result, .. } => result.as_ref().err(),
        SyncEvent::Tags { result, .. } => result.as_ref().err(),
    }
}

/// Fixed-interval trigger for background graph refreshes.
#[derive(Clone, Debug)]
pub struct RefreshTimer {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl RefreshTimer {
    /// `None` builds a timer that never fires.
    pub fn new(interval: Option<Duration>, now: Instant) -> Self {
        Self {
            interval,
            next_due: interval.map(|interval| now + interval),
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns true once per elapsed interval.
    pub fn poll(&mut self, now: Instant) -> bool {
        match (self.interval, self.next_due) {
            (Some(interval), Some(due)) if now >= due => {
                self.next_due = Some(now + interval);
                true
            }
            _ => false,
        }
    }

    /// Pushes the next refresh a full interval out, e.g. after a manual reload.
    pub fn restart(&mut self, now: Instant) {
        if self.next_due.is_some() {
            self.next_due = self.interval.map(|interval| now + interval);
        }
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchTrigger {
    Query(String),
    /// Input fell below the minimum query length.
    Clear,
}

/// Issues a query only once input has been quiet for the configured interval.
#[derive(Clone, Debug)]
pub struct SearchDebouncer {
    quiet_period: Duration,
    min_len: usize,
    pending: Option<(String, Instant)>,
    last_issued: Option<String>,
}

impl SearchDebouncer {
    pub fn new(quiet_period: Duration, min_len: usize) -> Self {
        Self {
            quiet_period,
            min_len,
            pending: None,
            last_issued: None,
        }
    }

    pub fn input(&mut self, text: &str, now: Instant) {
        self.pending = Some((text.trim().to_owned(), now));
    }

    pub fn poll(&mut self, now: Instant) -> Option<SearchTrigger> {
        let (_, typed_at) = self.pending.as_ref()?;
        if now.saturating_duration_since(*typed_at) < self.quiet_period {
            return None;
        }
        let (query, _) = self.pending.take()?;

        if query.chars().count() < self.min_len {
            return self.last_issued.take().map(|_| SearchTrigger::Clear);
        }
        if self.last_issued.as_deref() == Some(query.as_str()) {
            return None;
        }
        self.last_issued = Some(query.clone());
        Some(SearchTrigger::Query(query))
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, typed_at)| (*typed_at + self.quiet_period).saturating_duration_since(now))
    }
}
