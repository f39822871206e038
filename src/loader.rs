// 📥 List Loader - ordered fan-in of independently fetched rows
//
// One primary request returns N entities; each entity then needs its own
// enrichment requests. Rows are written into slots addressed by their
// original index, so arrival order never leaks into the render.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ListingConfig;
use crate::error::GatewayError;
use crate::gateway::RemoteGateway;
use crate::pagination::{links_for, page_summary, PaginationMeta};
use crate::query::{normalize_ordering, toggle_order, ListingUrl, ORDER_PARAM};
use crate::registry::{ListingModule, ModuleId};
use crate::rows::RowComposer;
use crate::store::FilterSource;
use crate::view::{ListingView, Row, RowsRender};

// ============================================================================
// SLOTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("slot {index} is out of range for {len} rows")]
    OutOfRange { index: usize, len: usize },

    #[error("slot {0} was already written")]
    AlreadyWritten(usize),
}

/// Fixed-size, write-once row buffer for one load.
#[derive(Debug)]
pub struct Slots {
    slots: Vec<Option<Row>>,
    filled: usize,
}

impl Slots {
    pub fn new(len: usize) -> Self {
        Slots {
            slots: vec![None; len],
            filled: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn fill(&mut self, index: usize, row: Row) -> Result<(), SlotError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SlotError::OutOfRange { index, len })?;
        if slot.is_some() {
            return Err(SlotError::AlreadyWritten(index));
        }
        *slot = Some(row);
        self.filled += 1;
        Ok(())
    }

    /// Completion count
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// All rows in index order, once every slot is written
    pub fn into_rows(self) -> Option<Vec<Row>> {
        if !self.is_complete() {
            return None;
        }
        self.slots.into_iter().collect()
    }
}

// ============================================================================
// LOAD REQUEST / OUTCOME
// ============================================================================

/// Immutable descriptor of one `load()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub generation: u64,
    /// Page URL with ordering normalized and without filter parameters
    pub page_url: String,
    pub scroll_to_top: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Rendered { rows: usize, failed: usize },
    Empty,
    /// A newer load started before this one could render
    Superseded,
    Failed(GatewayError),
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    objects: Vec<Value>,
    meta: PaginationMeta,
}

// ============================================================================
// LIST LOADER
// ============================================================================

pub struct ListLoader {
    id: ModuleId,
    config: ListingConfig,
    gateway: Arc<dyn RemoteGateway>,
    view: Arc<dyn ListingView>,
    composer: Arc<dyn RowComposer>,
    filters: Option<Arc<dyn FilterSource>>,
    generation: AtomicU64,
    rendered: AtomicBool,
    last_page: Mutex<Option<String>>,
    /// Held while a load starts or writes to the view
    render: Mutex<()>,
}

impl ListLoader {
    pub fn new(
        config: ListingConfig,
        gateway: Arc<dyn RemoteGateway>,
        view: Arc<dyn ListingView>,
        composer: Arc<dyn RowComposer>,
    ) -> Self {
        ListLoader {
            id: ModuleId::new(&config.id),
            config,
            gateway,
            view,
            composer,
            filters: None,
            generation: AtomicU64::new(0),
            rendered: AtomicBool::new(false),
            last_page: Mutex::new(None),
            render: Mutex::new(()),
        }
    }

    /// Builder: source of the filter fragment appended to every request
    pub fn with_filters(mut self, filters: Arc<dyn FilterSource>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    pub fn headers(&self) -> Vec<String> {
        self.composer.headers()
    }

    /// Page URL of the most recent load (without filters)
    pub fn current_page(&self) -> String {
        self.last_page
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_else(|| self.config.first_page_url())
    }

    pub fn current_order(&self) -> String {
        ListingUrl::parse(&self.current_page())
            .get(ORDER_PARAM)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_order.clone())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn render_guard(&self) -> MutexGuard<'_, ()> {
        self.render.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, page_url: &str, order: Option<&str>, scroll_to_top: bool) -> LoadRequest {
        let _render = self.render_guard();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if self.rendered.load(Ordering::SeqCst) {
            self.view.mark_loading();
            self.view.hide_pagination();
        }

        let mut url = ListingUrl::parse(page_url);
        normalize_ordering(&mut url, order, &self.config.default_order);
        let page_url = url.to_string();

        *self.last_page.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(page_url.clone());

        LoadRequest {
            generation,
            page_url,
            scroll_to_top,
        }
    }

    /// Load one page and render it.
    pub async fn load(&self, page_url: &str, scroll_to_top: bool) -> LoadOutcome {
        self.load_ordered(page_url, None, scroll_to_top).await
    }

    /// Re-sort by `field`, flipping direction when it is already the sort key
    pub async fn toggle_sort(&self, field: &str) -> LoadOutcome {
        let current = self.current_order();
        let order = toggle_order(Some(current.as_str()), field);
        let mut url = ListingUrl::parse(&self.current_page());
        url.set("offset", "0");
        self.load_ordered(&url.to_string(), Some(&order), true).await
    }

    pub async fn load_ordered(&self, page_url: &str, order: Option<&str>, scroll_to_top: bool) -> LoadOutcome {
        let request = self.begin(page_url, order, scroll_to_top);
        info!(listing = %self.id, generation = request.generation, url = %request.page_url, "loading page");

        let page = match self.fetch_page(&request).await {
            Ok(page) => page,
            Err(err) => return self.fail(&request, err),
        };

        if !self.is_current(request.generation) {
            debug!(generation = request.generation, "discarding superseded listing response");
            return LoadOutcome::Superseded;
        }

        if page.objects.is_empty() {
            if !self.finish(&request, RowsRender::Empty, &page.meta) {
                return LoadOutcome::Superseded;
            }
            return LoadOutcome::Empty;
        }

        let mut slots = Slots::new(page.objects.len());
        let gateway = self.gateway.as_ref();
        let composer = self.composer.as_ref();

        let mut pending: FuturesUnordered<_> = page
            .objects
            .iter()
            .enumerate()
            .map(|(index, entity)| async move { (index, composer.compose(gateway, entity).await) })
            .collect();

        while let Some((index, result)) = pending.next().await {
            if !self.is_current(request.generation) {
                debug!(generation = request.generation, index, "discarding superseded row");
                return LoadOutcome::Superseded;
            }
            let row = match result {
                Ok(cells) => Row::Ready { cells },
                Err(err) => {
                    warn!(listing = %self.id, index, error = %err, "row enrichment failed");
                    Row::Failed {
                        message: err.to_string(),
                    }
                }
            };
            if let Err(err) = slots.fill(index, row) {
                warn!(listing = %self.id, error = %err, "ignoring slot write");
            }
        }

        let failed = slots
            .slots
            .iter()
            .filter(|slot| slot.as_ref().is_some_and(Row::is_failed))
            .count();
        let rows = match slots.into_rows() {
            Some(rows) => rows,
            None => {
                warn!(listing = %self.id, "row join finished incomplete");
                return LoadOutcome::Failed(GatewayError::Decode {
                    url: request.page_url.clone(),
                    message: "incomplete row set".to_string(),
                });
            }
        };

        let count = rows.len();
        if !self.finish(&request, RowsRender::Rows(rows), &page.meta) {
            return LoadOutcome::Superseded;
        }
        LoadOutcome::Rendered { rows: count, failed }
    }

    /// Fire-and-forget variant of `load`
    pub fn spawn_load(self: &Arc<Self>, page_url: String, scroll_to_top: bool) -> JoinHandle<LoadOutcome> {
        let loader = Arc::clone(self);
        tokio::spawn(async move { loader.load(&page_url, scroll_to_top).await })
    }

    async fn fetch_page(&self, request: &LoadRequest) -> Result<ListingPage, GatewayError> {
        let mut target = ListingUrl::parse(&request.page_url);
        if let Some(filters) = &self.filters {
            let fragment = filters.query_fragment().await?;
            target.merge_fragment(&fragment);
        }
        let target = target.to_string();

        let body = self.gateway.get_json(&target).await?;
        serde_json::from_value(body).map_err(|e| GatewayError::Decode {
            url: target,
            message: e.to_string(),
        })
    }

    fn fail(&self, request: &LoadRequest, err: GatewayError) -> LoadOutcome {
        let _render = self.render_guard();
        if !self.is_current(request.generation) {
            return LoadOutcome::Superseded;
        }
        warn!(listing = %self.id, error = %err, "listing request failed");
        self.view.show_error(format!("Could not load {}: {}", self.config.title, err));
        LoadOutcome::Failed(err)
    }

    /// Single render of rows, then scroll, then pagination.
    /// Returns false, rendering nothing, once a newer load has begun.
    fn finish(&self, request: &LoadRequest, rows: RowsRender, meta: &PaginationMeta) -> bool {
        let _render = self.render_guard();
        if !self.is_current(request.generation) {
            debug!(generation = request.generation, "discarding superseded render");
            return false;
        }

        self.view.render_rows(rows);
        self.rendered.store(true, Ordering::SeqCst);

        if request.scroll_to_top {
            self.view.scroll_to_top();
        }

        self.view
            .render_pagination(links_for(meta, &request.page_url), page_summary(meta));
        debug!(listing = %self.id, generation = request.generation, "render complete");
        true
    }
}

#[async_trait]
impl ListingModule for ListLoader {
    fn id(&self) -> &ModuleId {
        &self.id
    }

    async fn reload(&self, scroll_to_top: bool) {
        let page = self.current_page();
        self.load(&page, scroll_to_top).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;
    use crate::gateway::MockGateway;
    use crate::rows::ColumnComposer;
    use crate::store::{FilterStore, RemoteFragment};
    use crate::view::{RecordingView, ViewEvent};
    use serde_json::json;
    use std::time::Duration;

    const PAGE: &str = "/api/result/?limit=3&offset=0";
    const TARGET: &str = "/api/result/?limit=3&offset=0&order_by=-date";

    fn listing() -> ListingConfig {
        ListingConfig::new("results", "/api/result/", "-date")
            .with_page_size(3)
            .with_column(ColumnConfig::new("Value", "value"))
            .with_column(ColumnConfig::new("Machine", "machine").resolving("name"))
    }

    fn setup() -> (MockGateway, Arc<RecordingView>, Arc<ListLoader>) {
        let gateway = MockGateway::new();
        let view = Arc::new(RecordingView::new());
        let config = listing();
        let composer = Arc::new(ColumnComposer::new(config.columns.clone()));
        let loader = Arc::new(ListLoader::new(
            config,
            Arc::new(gateway.clone()),
            view.clone(),
            composer,
        ));
        (gateway, view, loader)
    }

    fn page(values: &[i64]) -> Value {
        let objects: Vec<Value> = values
            .iter()
            .map(|v| json!({"value": v, "machine": format!("/api/machine/{}/", v)}))
            .collect();
        json!({
            "objects": objects,
            "meta": {"total_count": values.len(), "limit": 3, "offset": 0, "previous": null, "next": null}
        })
    }

    fn machines(gateway: &MockGateway, values: &[i64]) {
        for v in values {
            gateway.respond_json(&format!("/api/machine/{}/", v), json!({"name": format!("m{}", v)}));
        }
    }

    fn cells(render: &RowsRender) -> Vec<Vec<String>> {
        match render {
            RowsRender::Rows(rows) => rows
                .iter()
                .map(|row| match row {
                    Row::Ready { cells } => cells.clone(),
                    Row::Failed { .. } => vec!["<failed>".to_string()],
                })
                .collect(),
            RowsRender::Empty => Vec::new(),
        }
    }

    #[test]
    fn test_slots_are_write_once_and_fixed_size() {
        let mut slots = Slots::new(2);
        slots.fill(1, Row::Failed { message: "x".into() }).unwrap();
        assert_eq!(slots.fill(1, Row::Failed { message: "y".into() }), Err(SlotError::AlreadyWritten(1)));
        assert_eq!(
            slots.fill(2, Row::Failed { message: "z".into() }),
            Err(SlotError::OutOfRange { index: 2, len: 2 })
        );
        assert!(!slots.is_complete());
        slots.fill(0, Row::Ready { cells: vec![] }).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.filled(), 2);

        let rows = slots.into_rows().unwrap();
        assert_eq!(rows[0], Row::Ready { cells: vec![] });
        assert!(rows[1].is_failed());
    }

    #[test]
    fn test_incomplete_slots_do_not_yield_rows() {
        let mut slots = Slots::new(2);
        slots.fill(0, Row::Ready { cells: vec![] }).unwrap();
        assert!(slots.into_rows().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_completion_renders_in_primary_order() {
        let (gateway, view, loader) = setup();
        gateway.respond_json(TARGET, page(&[1, 2, 3]));
        machines(&gateway, &[1, 2, 3]);
        // First row resolves last, last row first
        gateway.delay("/api/machine/1/", Duration::from_millis(300));
        gateway.delay("/api/machine/2/", Duration::from_millis(200));
        gateway.delay("/api/machine/3/", Duration::from_millis(100));

        let outcome = loader.load(PAGE, false).await;
        assert_eq!(outcome, LoadOutcome::Rendered { rows: 3, failed: 0 });

        let renders = view.renders();
        assert_eq!(renders.len(), 1);
        assert_eq!(
            cells(&renders[0]),
            vec![vec!["1", "m1"], vec!["2", "m2"], vec!["3", "m3"]]
        );
    }

    #[tokio::test]
    async fn test_empty_page_renders_empty_row_immediately() {
        let (gateway, view, loader) = setup();
        gateway.respond_json(TARGET, page(&[]));

        assert_eq!(loader.load(PAGE, true).await, LoadOutcome::Empty);
        assert_eq!(
            view.events(),
            vec![
                ViewEvent::Rows(RowsRender::Empty),
                ViewEvent::ScrolledToTop,
                ViewEvent::Pagination {
                    links: links_for(&PaginationMeta { limit: 3, ..Default::default() }, TARGET),
                    summary: "No results".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_enrichment_becomes_placeholder() {
        let (gateway, view, loader) = setup();
        gateway.respond_json(TARGET, page(&[1, 2, 3]));
        machines(&gateway, &[1, 3]);

        let outcome = loader.load(PAGE, false).await;
        assert_eq!(outcome, LoadOutcome::Rendered { rows: 3, failed: 1 });

        match view.last_render().unwrap() {
            RowsRender::Rows(rows) => {
                assert!(!rows[0].is_failed());
                assert!(rows[1].is_failed());
                assert!(!rows[2].is_failed());
            }
            RowsRender::Empty => panic!("expected rows"),
        }
    }

    #[tokio::test]
    async fn test_primary_failure_shows_error_and_keeps_loading() {
        let (gateway, view, loader) = setup();
        gateway.respond_json(TARGET, page(&[1]));
        machines(&gateway, &[1]);
        loader.load(PAGE, false).await;
        view.clear();

        gateway.fail(
            TARGET,
            GatewayError::Status {
                url: TARGET.to_string(),
                status: 500,
                body: String::new(),
            },
        );
        let outcome = loader.load(PAGE, false).await;

        assert!(matches!(outcome, LoadOutcome::Failed(GatewayError::Status { status: 500, .. })));
        let events = view.events();
        assert_eq!(events[0], ViewEvent::Loading);
        assert_eq!(events[1], ViewEvent::PaginationHidden);
        assert!(matches!(events[2], ViewEvent::Error(_)));
        assert_eq!(events.len(), 3);
        assert!(view.renders().is_empty());
    }

    #[tokio::test]
    async fn test_first_load_does_not_mark_loading() {
        let (gateway, view, loader) = setup();
        gateway.respond_json(TARGET, page(&[1]));
        machines(&gateway, &[1]);

        loader.load(PAGE, false).await;
        assert!(!view.events().contains(&ViewEvent::Loading));

        loader.load(PAGE, false).await;
        assert!(view.events().contains(&ViewEvent::Loading));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_load_is_discarded() {
        let (gateway, view, loader) = setup();
        let second = "/api/result/?limit=3&offset=3";
        let second_target = "/api/result/?limit=3&offset=3&order_by=-date";

        gateway.respond_json(TARGET, page(&[1, 2]));
        gateway.respond_json(second_target, page(&[7, 8]));
        machines(&gateway, &[1, 2, 7, 8]);
        gateway.delay("/api/machine/1/", Duration::from_secs(5));
        gateway.delay("/api/machine/2/", Duration::from_secs(5));

        let first = loader.spawn_load(PAGE.to_string(), false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let outcome = loader.load(second, false).await;

        assert_eq!(outcome, LoadOutcome::Rendered { rows: 2, failed: 0 });
        assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);

        let renders = view.renders();
        assert_eq!(renders.len(), 1);
        assert_eq!(cells(&renders[0]), vec![vec!["7", "m7"], vec!["8", "m8"]]);
    }

    #[test]
    fn test_render_after_newer_begin_is_dropped() {
        let (_gateway, view, loader) = setup();
        let stale = loader.begin(PAGE, None, false);
        let current = loader.begin(PAGE, None, false);

        let meta = PaginationMeta::default();
        assert!(!loader.finish(&stale, RowsRender::Empty, &meta));
        assert!(view.events().is_empty());

        let err = GatewayError::Transport {
            url: TARGET.to_string(),
            message: "timed out".to_string(),
        };
        assert_eq!(loader.fail(&stale, err), LoadOutcome::Superseded);
        assert!(view.errors().is_empty());

        assert!(loader.finish(&current, RowsRender::Empty, &meta));
        assert_eq!(view.renders(), vec![RowsRender::Empty]);
    }

    #[tokio::test]
    async fn test_remote_fragment_is_appended_to_target() {
        let (gateway, view, _loader) = setup();
        let shared: Arc<dyn RemoteGateway> = Arc::new(gateway.clone());
        let config = listing();
        let loader = ListLoader::new(
            config.clone(),
            shared.clone(),
            view.clone(),
            Arc::new(ColumnComposer::new(config.columns.clone())),
        )
        .with_filters(Arc::new(RemoteFragment::new(shared, "/api/filter/query/")));

        gateway.respond_text("/api/filter/query/", "value__gt=3&when__year=2024");
        gateway.respond_json(&format!("{}&value__gt=3&when__year=2024", TARGET), page(&[]));

        assert_eq!(loader.load(PAGE, false).await, LoadOutcome::Empty);
        assert_eq!(gateway.request_count(TARGET), 0);
        assert_eq!(loader.current_page(), TARGET);
    }

    #[tokio::test]
    async fn test_store_filters_are_appended_to_target() {
        let (gateway, view, _loader) = setup();
        let shared: Arc<dyn RemoteGateway> = Arc::new(gateway.clone());
        let config = listing();
        let loader = ListLoader::new(
            config.clone(),
            shared.clone(),
            view.clone(),
            Arc::new(ColumnComposer::new(config.columns.clone())),
        )
        .with_filters(Arc::new(FilterStore::new(shared, "/api/filter/")));

        gateway.respond_json(
            "/api/filter/",
            json!({"objects": [{"field": "value", "type": "integer", "operator": "range", "value": [2, 5]}]}),
        );
        gateway.respond_json(&format!("{}&value__range=2;5", TARGET), page(&[]));

        assert_eq!(loader.load(PAGE, false).await, LoadOutcome::Empty);
        assert_eq!(view.renders(), vec![RowsRender::Empty]);
    }

    #[tokio::test]
    async fn test_fragment_failure_fails_the_load() {
        let (gateway, view, _loader) = setup();
        let shared: Arc<dyn RemoteGateway> = Arc::new(gateway.clone());
        let config = listing();
        let loader = ListLoader::new(
            config.clone(),
            shared.clone(),
            view.clone(),
            Arc::new(ColumnComposer::new(config.columns.clone())),
        )
        .with_filters(Arc::new(RemoteFragment::new(shared, "/api/filter/query/")));

        gateway.respond_json(TARGET, page(&[]));
        gateway.fail(
            "/api/filter/query/",
            GatewayError::Status {
                url: "/api/filter/query/".to_string(),
                status: 503,
                body: String::new(),
            },
        );

        let outcome = loader.load(PAGE, false).await;
        assert!(matches!(outcome, LoadOutcome::Failed(GatewayError::Status { status: 503, .. })));
        assert!(matches!(view.events().as_slice(), [ViewEvent::Error(_)]));
        assert!(view.renders().is_empty());
        assert_eq!(gateway.request_count(TARGET), 0);
    }

    #[tokio::test]
    async fn test_explicit_order_replaces_existing() {
        let (gateway, _view, loader) = setup();
        let target = "/api/result/?order_by=value&limit=3&offset=0";
        gateway.respond_json(target, page(&[]));

        let outcome = loader
            .load_ordered("/api/result/?order_by=-date&limit=3&offset=0", Some("value"), false)
            .await;
        assert_eq!(outcome, LoadOutcome::Empty);
        assert_eq!(loader.current_order(), "value");
    }

    #[tokio::test]
    async fn test_toggle_sort_flips_direction_and_resets_offset() {
        let (gateway, _view, loader) = setup();
        gateway.respond_json("/api/result/?limit=3&offset=3&order_by=-date", page(&[]));
        gateway.respond_json("/api/result/?limit=3&offset=0&order_by=value", page(&[]));
        gateway.respond_json("/api/result/?limit=3&offset=0&order_by=-value", page(&[]));

        loader.load("/api/result/?limit=3&offset=3", false).await;
        assert_eq!(loader.toggle_sort("value").await, LoadOutcome::Empty);
        assert_eq!(loader.current_order(), "value");
        assert_eq!(loader.toggle_sort("value").await, LoadOutcome::Empty);
        assert_eq!(loader.current_order(), "-value");
    }

    #[tokio::test]
    async fn test_reload_uses_last_page() {
        let (gateway, _view, loader) = setup();
        gateway.respond_json("/api/result/?limit=3&offset=0&order_by=-date", page(&[]));

        loader.reload(false).await;
        assert_eq!(gateway.request_count(TARGET), 1);
        loader.reload(false).await;
        assert_eq!(gateway.request_count(TARGET), 2);
    }
}
