use std::time::{Duration, Instant};

use eframe::egui::{self, Context};
use egui_notify::{Anchor, Toast, Toasts};

/// Identical messages inside this window collapse into one toast.
const REPEAT_WINDOW: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn lifetime(self) -> Duration {
        match self {
            Self::Info => Duration::from_secs(3),
            Self::Warning => Duration::from_secs(6),
            Self::Error => Duration::from_secs(10),
        }
    }
}

/// Non-blocking toasts for background failures.
pub(in crate::app) struct Notifier {
    toasts: Toasts,
    recent: Vec<(String, Instant)>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self {
            toasts: Toasts::new()
                .with_anchor(Anchor::BottomRight)
                .with_margin(egui::vec2(10.0, 10.0)),
            recent: Vec::new(),
        }
    }
}

impl Notifier {
    pub(in crate::app) fn notify(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        let now = Instant::now();
        self.recent
            .retain(|(_, shown_at)| now.duration_since(*shown_at) < REPEAT_WINDOW);
        if self.recent.iter().any(|(shown, _)| *shown == message) {
            return;
        }

        let mut toast = match severity {
            Severity::Info => Toast::info(message.as_str()),
            Severity::Warning => Toast::warning(message.as_str()),
            Severity::Error => Toast::error(message.as_str()),
        };
        toast.duration(Some(severity.lifetime()));
        self.toasts.add(toast);
        self.recent.push((message, now));
    }

    pub(in crate::app) fn info(&mut self, message: impl Into<String>) {
        self.notify(Severity::Info, message);
    }

    pub(in crate::app) fn warning(&mut self, message: impl Into<String>) {
        self.notify(Severity::Warning, message);
    }

    pub(in crate::app) fn error(&mut self, message: impl Into<String>) {
        self.notify(Severity::Error, message);
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        self.toasts.show(ctx);
    }

    #[cfg(test)]
    pub(in crate::app) fn recent(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(|(message, _)| message.as_str())
    }
}
