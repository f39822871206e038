// 🖼️ Rendering Port - what the core hands to whatever draws the listing
// Terminal UI, headless dump and tests each implement ListingView

use std::sync::Mutex;

use crate::pagination::PageLink;

/// Composed content of one listing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Ready { cells: Vec<String> },
    /// Error placeholder for a row whose enrichment failed
    Failed { message: String },
}

impl Row {
    pub fn is_failed(&self) -> bool {
        matches!(self, Row::Failed { .. })
    }
}

/// Body of a single render: rows in primary-response order, or the
/// designated empty-state row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowsRender {
    Rows(Vec<Row>),
    Empty,
}

/// Rendering layer collaborator.
///
/// Calls arrive from tokio tasks, hence `&self` + `Send + Sync`.
pub trait ListingView: Send + Sync {
    /// Dim the current render while newer data is pending
    fn mark_loading(&self);

    fn hide_pagination(&self);

    /// Replace the loading state with the given rows
    fn render_rows(&self, rows: RowsRender);

    fn render_pagination(&self, links: Vec<PageLink>, summary: String);

    /// User-visible error banner; loading state is left as is
    fn show_error(&self, message: String);

    fn scroll_to_top(&self);
}

// ============================================================================
// RECORDING VIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Loading,
    PaginationHidden,
    Rows(RowsRender),
    Pagination { links: Vec<PageLink>, summary: String },
    Error(String),
    ScrolledToTop,
}

/// Keeps every call in order, for tests.
#[derive(Debug, Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.lock().clone()
    }

    /// Every rows render, oldest first
    pub fn renders(&self) -> Vec<RowsRender> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Rows(rows) => Some(rows.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_render(&self) -> Option<RowsRender> {
        self.renders().pop()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_pagination(&self) -> Option<(Vec<PageLink>, String)> {
        self.lock().iter().rev().find_map(|e| match e {
            ViewEvent::Pagination { links, summary } => Some((links.clone(), summary.clone())),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, event: ViewEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ViewEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ListingView for RecordingView {
    fn mark_loading(&self) {
        self.push(ViewEvent::Loading);
    }

    fn hide_pagination(&self) {
        self.push(ViewEvent::PaginationHidden);
    }

    fn render_rows(&self, rows: RowsRender) {
        self.push(ViewEvent::Rows(rows));
    }

    fn render_pagination(&self, links: Vec<PageLink>, summary: String) {
        self.push(ViewEvent::Pagination { links, summary });
    }

    fn show_error(&self, message: String) {
        self.push(ViewEvent::Error(message));
    }

    fn scroll_to_top(&self) {
        self.push(ViewEvent::ScrolledToTop);
    }
}
