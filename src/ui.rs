// 🖥️ Terminal UI - one tab per configured listing, filter panel on the side
// Loads run on the tokio runtime; the draw loop only reads ScreenView snapshots

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row as TableRow, Table,
        TableState, Wrap,
    },
    Frame, Terminal,
};
use tokio::runtime::Handle;

use listing_console::pagination::{PageLink, PageLinkKind};
use listing_console::panel::{Bound, EditSession, SessionMode, ValueInput};
use listing_console::{
    EditForm, FieldType, FilterPanelController, ListLoader, ListingModule, ListingView, ModuleId,
    ModuleRegistry, PanelError, PanelSnapshot, Row, RowsRender, SessionState,
};

use crate::Listing;

// ============================================================================
// SCREEN VIEW
// ============================================================================

/// Latest render of one listing, as the loader left it
#[derive(Debug, Clone, Default)]
pub struct Screen {
    /// `None` until the first render lands
    pub rows: Option<RowsRender>,
    pub loading: bool,
    pub links: Vec<PageLink>,
    /// `None` while pagination is hidden
    pub summary: Option<String>,
    pub error: Option<String>,
    scroll_pending: bool,
}

#[derive(Debug, Default)]
pub struct ScreenView {
    screen: Mutex<Screen>,
}

impl ScreenView {
    pub fn snapshot(&self) -> Screen {
        self.lock().clone()
    }

    /// True once after the loader asked to scroll to the top
    pub fn take_scroll(&self) -> bool {
        std::mem::take(&mut self.lock().scroll_pending)
    }

    fn lock(&self) -> MutexGuard<'_, Screen> {
        self.screen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ListingView for ScreenView {
    fn mark_loading(&self) {
        self.lock().loading = true;
    }

    fn hide_pagination(&self) {
        let mut screen = self.lock();
        screen.links.clear();
        screen.summary = None;
    }

    fn render_rows(&self, rows: RowsRender) {
        let mut screen = self.lock();
        screen.rows = Some(rows);
        screen.loading = false;
        screen.error = None;
    }

    fn render_pagination(&self, links: Vec<PageLink>, summary: String) {
        let mut screen = self.lock();
        screen.links = links;
        screen.summary = Some(summary);
    }

    fn show_error(&self, message: String) {
        self.lock().error = Some(message);
    }

    fn scroll_to_top(&self) {
        self.lock().scroll_pending = true;
    }
}

/// Panel-triggered reloads must not block the draw loop
struct BackgroundReload {
    loader: Arc<ListLoader>,
}

#[async_trait]
impl ListingModule for BackgroundReload {
    fn id(&self) -> &ModuleId {
        ListingModule::id(self.loader.as_ref())
    }

    async fn reload(&self, scroll_to_top: bool) {
        let _ = self.loader.spawn_load(self.loader.current_page(), scroll_to_top);
    }
}

// ============================================================================
// APP STATE
// ============================================================================

pub struct Tab {
    listing: Listing,
    view: Arc<ScreenView>,
    panel: Option<FilterPanelController>,
    loaded: bool,
}

impl Tab {
    pub fn new(listing: Listing, view: Arc<ScreenView>) -> Self {
        let panel = listing.store.clone().map(|store| {
            FilterPanelController::new(
                store,
                Arc::new(BackgroundReload {
                    loader: listing.loader.clone(),
                }),
            )
        });
        Tab {
            listing,
            view,
            panel,
            loaded: false,
        }
    }

    fn row_count(&self) -> usize {
        match self.view.snapshot().rows {
            Some(RowsRender::Rows(rows)) => rows.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Rows,
    Filters,
    AddFilter,
}

pub struct App {
    tabs: Vec<Tab>,
    current: usize,
    registry: ModuleRegistry,
    runtime: Handle,
    focus: Focus,
    table_state: TableState,
    filter_state: ListState,
    option_state: ListState,
    bound: Bound,
    status: Option<String>,
}

impl App {
    pub fn new(tabs: Vec<Tab>, registry: ModuleRegistry, runtime: Handle, start: usize) -> Self {
        let current = start.min(tabs.len().saturating_sub(1));
        let mut app = App {
            tabs,
            current,
            registry,
            runtime,
            focus: Focus::Rows,
            table_state: TableState::default(),
            filter_state: ListState::default(),
            option_state: ListState::default(),
            bound: Bound::Low,
            status: None,
        };
        app.activate();
        app
    }

    fn tab(&self) -> &Tab {
        &self.tabs[self.current]
    }

    /// First visit of a tab fetches the panel state and the first page
    fn activate(&mut self) {
        self.focus = Focus::Rows;
        self.table_state = TableState::default();

        let Some(tab) = self.tabs.get_mut(self.current) else {
            return;
        };
        if tab.loaded {
            return;
        }
        tab.loaded = true;

        if let Some(panel) = tab.panel.as_mut() {
            if let Err(err) = self.runtime.block_on(panel.load()) {
                self.status = Some(format!("Filters unavailable: {}", err));
            }
        }
        let loader = tab.listing.loader.clone();
        let url = tab.listing.config.first_page_url();
        self.runtime.spawn(async move { loader.load(&url, true).await });
    }

    pub fn next_tab(&mut self) {
        self.current = (self.current + 1) % self.tabs.len();
        self.activate();
    }

    pub fn previous_tab(&mut self) {
        self.current = (self.current + self.tabs.len() - 1) % self.tabs.len();
        self.activate();
    }

    /// Apply pending scroll requests and keep the selection in range
    fn sync_selection(&mut self) {
        let tab = &self.tabs[self.current];
        let len = tab.row_count();
        if tab.view.take_scroll() {
            self.table_state = TableState::default();
        }
        match self.table_state.selected() {
            _ if len == 0 => self.table_state.select(None),
            Some(i) if i >= len => self.table_state.select(Some(len - 1)),
            None => self.table_state.select(Some(0)),
            Some(_) => {}
        }
    }

    pub fn next(&mut self) {
        let len = self.tab().row_count();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.tab().row_count();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.tab().row_count();
        if len == 0 {
            return;
        }
        let i = self.table_state.selected().map_or(0, |i| (i + 10).min(len - 1));
        self.table_state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.table_state.selected().map_or(0, |i| i.saturating_sub(10));
        self.table_state.select(Some(i));
    }

    /// Follow the previous/next page link, if enabled
    fn follow(&mut self, wanted: PageLinkKind) {
        let tab = self.tab();
        let loader = tab.listing.loader.clone();
        let target = tab
            .view
            .snapshot()
            .links
            .into_iter()
            .find(|link| link.kind == wanted)
            .and_then(|link| link.url);

        match target {
            Some(url) => {
                self.runtime.spawn(async move { loader.load(&url, true).await });
            }
            None => self.status = Some("No page in that direction".to_string()),
        }
    }

    fn toggle_sort(&mut self, column: usize) {
        let tab = self.tab();
        let Some(field) = tab.listing.config.columns.get(column).map(|c| c.field.clone()) else {
            return;
        };
        let loader = tab.listing.loader.clone();
        self.runtime.spawn(async move { loader.toggle_sort(&field).await });
    }

    fn reload(&mut self) {
        let id = ModuleId::new(self.tab().listing.config.id.as_str());
        match self.registry.get(&id) {
            Some(module) => {
                self.runtime.spawn(async move { module.reload(false).await });
            }
            None => self.status = Some(format!("Unknown listing {}", id)),
        }
    }

    fn panel_snapshot(&self) -> Option<PanelSnapshot> {
        self.tab().panel.as_ref().map(FilterPanelController::snapshot)
    }

    fn session_open(&self) -> bool {
        self.tab()
            .panel
            .as_ref()
            .is_some_and(|panel| panel.session().is_some())
    }

    // ------------------------------------------------------------------------
    // KEYS
    // ------------------------------------------------------------------------

    /// Returns false when the user asked to quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.session_open() {
            self.handle_session_key(key);
            return true;
        }
        match self.focus {
            Focus::Rows => return self.handle_rows_key(key),
            Focus::Filters => self.handle_filters_key(key),
            Focus::AddFilter => self.handle_add_key(key),
        }
        true
    }

    fn handle_rows_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_tab();
                } else {
                    self.next_tab();
                }
            }
            KeyCode::BackTab => self.previous_tab(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Home => self.table_state.select(Some(0)),
            KeyCode::End => {
                let len = self.tab().row_count();
                if len > 0 {
                    self.table_state.select(Some(len - 1));
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.follow(PageLinkKind::Previous),
            KeyCode::Right | KeyCode::Char('l') => self.follow(PageLinkKind::Next),
            KeyCode::Char(c @ '1'..='9') => self.toggle_sort(c as usize - '1' as usize),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('f') if self.tab().panel.is_some() => {
                self.focus = Focus::Filters;
                self.filter_state.select(Some(0));
            }
            _ => {}
        }
        true
    }

    fn handle_filters_key(&mut self, key: KeyEvent) {
        let Some(snapshot) = self.panel_snapshot() else {
            self.focus = Focus::Rows;
            return;
        };
        let selected = self
            .filter_state
            .selected()
            .and_then(|i| snapshot.filters.get(i))
            .cloned();

        match key.code {
            KeyCode::Esc | KeyCode::Char('f') => self.focus = Focus::Rows,
            KeyCode::Down | KeyCode::Char('j') => cycle(&mut self.filter_state, snapshot.filters.len(), true),
            KeyCode::Up | KeyCode::Char('k') => cycle(&mut self.filter_state, snapshot.filters.len(), false),
            KeyCode::Char('a') => {
                self.focus = Focus::AddFilter;
                self.option_state.select(Some(0));
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let (Some(filter), Some(panel)) = (selected, self.tabs[self.current].panel.as_mut()) {
                    let result = self.runtime.block_on(panel.remove(&filter.field));
                    report(&mut self.status, result, "Filter removed");
                }
            }
            KeyCode::Char(c @ ('<' | '>')) => {
                if let (Some(filter), Some(panel)) = (selected, self.tabs[self.current].panel.as_mut()) {
                    let operators = filter.field_type.operators();
                    let at = operators.iter().position(|op| *op == filter.operator).unwrap_or(0);
                    let next = if c == '>' {
                        (at + 1) % operators.len()
                    } else {
                        (at + operators.len() - 1) % operators.len()
                    };
                    let result = self
                        .runtime
                        .block_on(panel.change_operator(&filter.field, operators[next]));
                    report(&mut self.status, result, "Operator changed");
                }
            }
            KeyCode::Enter | KeyCode::Char('e') => {
                if let (Some(filter), Some(panel)) = (selected, self.tabs[self.current].panel.as_mut()) {
                    let result = panel.open_edit(&filter.field).map(|_| ());
                    self.bound = Bound::Low;
                    report(&mut self.status, result, "");
                }
            }
            _ => {}
        }
    }

    fn handle_add_key(&mut self, key: KeyEvent) {
        let Some(snapshot) = self.panel_snapshot() else {
            self.focus = Focus::Rows;
            return;
        };
        let options = snapshot.add_options;

        match key.code {
            KeyCode::Esc => self.focus = Focus::Filters,
            KeyCode::Down | KeyCode::Char('j') => cycle(&mut self.option_state, options.len(), true),
            KeyCode::Up | KeyCode::Char('k') => cycle(&mut self.option_state, options.len(), false),
            KeyCode::Enter => {
                let option = self.option_state.selected().and_then(|i| options.get(i));
                if let (Some(option), Some(panel)) = (option, self.tabs[self.current].panel.as_mut()) {
                    let result = panel.open_create(&option.name).map(|_| ());
                    if result.is_ok() {
                        self.focus = Focus::Filters;
                        self.bound = Bound::Low;
                    }
                    report(&mut self.status, result, "");
                }
            }
            _ => {}
        }
    }

    fn handle_session_key(&mut self, key: KeyEvent) {
        let Some(panel) = self.tabs[self.current].panel.as_mut() else {
            return;
        };
        let is_boolean = match panel.session() {
            Some(session) => session.form.field_type() == FieldType::Boolean,
            None => return,
        };

        // Rejections are shown inside the form, so only success is reported
        let saved = match key.code {
            KeyCode::Esc => {
                panel.cancel();
                false
            }
            KeyCode::Enter if !is_boolean => self.runtime.block_on(panel.submit()).is_ok(),
            KeyCode::Char('t') if is_boolean => self.runtime.block_on(panel.submit_boolean(true)).is_ok(),
            KeyCode::Char('f') if is_boolean => self.runtime.block_on(panel.submit_boolean(false)).is_ok(),
            KeyCode::Tab => {
                self.bound = match self.bound {
                    Bound::Low => Bound::High,
                    Bound::High => Bound::Low,
                };
                false
            }
            code => {
                if let Ok(form) = panel.form_mut() {
                    edit_form(form, code, self.bound);
                }
                false
            }
        };
        if saved {
            self.status = Some("Filter saved".to_string());
        }
    }
}

fn edit_form(form: &mut EditForm, code: KeyCode, bound: Bound) {
    match code {
        KeyCode::Left => form.cycle_operator(false),
        KeyCode::Right => form.cycle_operator(true),
        KeyCode::Up => form.cycle_choice(false),
        KeyCode::Down => form.cycle_choice(true),
        KeyCode::Backspace => {
            if let Some(text) = form.text_mut(bound) {
                text.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(text) = form.text_mut(bound) {
                text.push(c);
            }
        }
        _ => {}
    }
}

fn cycle(state: &mut ListState, len: usize, forward: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = match (state.selected(), forward) {
        (Some(i), true) => (i + 1) % len,
        (Some(i), false) => (i + len - 1) % len,
        (None, _) => 0,
    };
    state.select(Some(i));
}

fn report(status: &mut Option<String>, result: Result<(), PanelError>, success: &str) {
    match result {
        Ok(()) if !success.is_empty() => *status = Some(success.to_string()),
        Ok(()) => {}
        Err(err) => *status = Some(err.to_string()),
    }
}

// ============================================================================
// LOOP
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.sync_selection();
        terminal.draw(|f| ui(f, app))?;

        // Loads finish in the background, so redraw on a short tick
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// DRAWING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let full = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Listing tabs
            Constraint::Min(0),    // Rows + filter panel
            Constraint::Length(3), // Pagination
            Constraint::Length(3), // Status bar
        ])
        .split(full);

    let screen = app.tabs[app.current].view.snapshot();
    let snapshot = app.panel_snapshot();

    render_header(f, chunks[0], app);

    if let Some(snapshot) = &snapshot {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(chunks[1]);
        render_table(f, body[0], app, &screen);
        render_filter_panel(f, body[1], app, snapshot);
    } else {
        render_table(f, chunks[1], app, &screen);
    }

    render_pagination(f, chunks[2], &screen);
    render_status_bar(f, chunks[3], app, &screen);

    if let Some(session) = snapshot.as_ref().and_then(|s| s.session.as_ref()) {
        render_edit_popup(f, full, session, app.bound);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, tab) in app.tabs.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if i == app.current {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(tab.listing.config.title.clone(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("order_by {}", app.tab().listing.loader.current_order()),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App, screen: &Screen) {
    let tab = &app.tabs[app.current];
    let order = tab.listing.loader.current_order();
    let columns = &tab.listing.config.columns;

    let header_cells = columns.iter().enumerate().map(|(i, column)| {
        let arrow = if order == column.field {
            " ▲"
        } else if order.strip_prefix('-') == Some(column.field.as_str()) {
            " ▼"
        } else {
            ""
        };
        Cell::from(format!("{} {}{}", i + 1, column.title, arrow)).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = TableRow::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let dim = if screen.loading {
        Style::default().add_modifier(Modifier::DIM)
    } else {
        Style::default()
    };
    let rows: Vec<TableRow> = match &screen.rows {
        None => vec![TableRow::new(vec![Cell::from("Loading…")]).style(Style::default().fg(Color::DarkGray))],
        Some(RowsRender::Empty) => vec![TableRow::new(vec![Cell::from("No results")])
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))],
        Some(RowsRender::Rows(rows)) => rows
            .iter()
            .map(|row| match row {
                Row::Ready { cells } => {
                    TableRow::new(cells.iter().map(|c| Cell::from(truncate(c, 40)))).style(dim)
                }
                Row::Failed { message } => TableRow::new(vec![Cell::from(format!("⚠ {}", message))])
                    .style(Style::default().fg(Color::Red)),
            })
            .collect(),
    };

    let count = columns.len().max(1) as u32;
    let widths: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();

    let title = format!(" {} ", tab.listing.config.title);
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(if app.focus == Focus::Rows {
                    Color::White
                } else {
                    Color::DarkGray
                }))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_filter_panel(f: &mut Frame, area: Rect, app: &mut App, snapshot: &PanelSnapshot) {
    let focused = matches!(app.focus, Focus::Filters | Focus::AddFilter);
    let border = Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray });

    if app.focus == Focus::AddFilter {
        let items: Vec<ListItem> = snapshot
            .add_options
            .iter()
            .map(|option| {
                let style = if option.enabled {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                let suffix = if option.enabled { "" } else { " (active)" };
                ListItem::new(format!("{} [{}]{}", option.display_name, option.field_type, suffix)).style(style)
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).border_style(border).title(" Add filter "))
            .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
        f.render_stateful_widget(list, area, &mut app.option_state);
        return;
    }

    let items: Vec<ListItem> = if snapshot.filters.is_empty() {
        vec![ListItem::new("No active filters").style(Style::default().fg(Color::DarkGray))]
    } else {
        snapshot
            .filters
            .iter()
            .map(|filter| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} ", filter.display_name),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(filter.text.clone()),
                ]))
            })
            .collect()
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).border_style(border).title(" Filters "))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED))
        .highlight_symbol("› ");
    f.render_stateful_widget(list, area, &mut app.filter_state);
}

/// Previous, a window of pages around the active one, next
fn visible_links(links: &[PageLink]) -> Vec<Option<&PageLink>> {
    let last = links
        .iter()
        .filter_map(|l| match l.kind {
            PageLinkKind::Page(n) => Some(n),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    let active = links
        .iter()
        .find_map(|l| match l.kind {
            PageLinkKind::Page(n) if l.active => Some(n),
            _ => None,
        })
        .unwrap_or(1);

    let mut visible = Vec::new();
    let mut gap = false;
    for link in links {
        let shown = match link.kind {
            PageLinkKind::Page(n) => n == 1 || n == last || n.abs_diff(active) <= 3,
            _ => true,
        };
        if shown {
            visible.push(Some(link));
            gap = false;
        } else if !gap {
            visible.push(None);
            gap = true;
        }
    }
    visible
}

fn render_pagination(f: &mut Frame, area: Rect, screen: &Screen) {
    let mut spans = vec![];
    if let Some(summary) = &screen.summary {
        for link in visible_links(&screen.links) {
            match link {
                Some(link) => {
                    let style = if link.active {
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
                    } else if link.disabled {
                        Style::default().fg(Color::DarkGray)
                    } else {
                        Style::default().fg(Color::White)
                    };
                    spans.push(Span::styled(format!(" {} ", link.label), style));
                }
                None => spans.push(Span::raw(" … ")),
            }
        }
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(summary.clone(), Style::default().fg(Color::Cyan)));
    }

    let pagination = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));
    f.render_widget(pagination, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App, screen: &Screen) {
    let mut status_spans = vec![];

    if let Some(error) = &screen.error {
        status_spans.push(Span::styled(format!(" {} ", error), Style::default().fg(Color::Red)));
        status_spans.push(Span::raw(" | "));
    } else if let Some(status) = &app.status {
        status_spans.push(Span::styled(format!(" {} ", status), Style::default().fg(Color::Green)));
        status_spans.push(Span::raw(" | "));
    }

    let keys: &[(&str, &str)] = match app.focus {
        Focus::Rows => &[
            ("Tab", " Listing | "),
            ("←/→", " Page | "),
            ("1-9", " Sort | "),
            ("r", " Reload | "),
            ("f", " Filters | "),
        ],
        Focus::Filters => &[
            ("a", " Add | "),
            ("Enter", " Edit | "),
            ("</>", " Operator | "),
            ("d", " Remove | "),
            ("Esc", " Back | "),
        ],
        Focus::AddFilter => &[("↑/↓", " Field | "), ("Enter", " Open | "), ("Esc", " Back | ")],
    };
    for (key, label) in keys {
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(*label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_edit_popup(f: &mut Frame, screen: Rect, session: &EditSession, bound: Bound) {
    let area = centered_rect(60, 50, screen);
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let focused = Style::default().fg(Color::Yellow).add_modifier(Modifier::UNDERLINED);

    let mut content = vec![Line::from("")];

    if !session.form.operator_choices().is_empty() {
        let operator = session.form.operator();
        content.push(Line::from(vec![
            Span::styled("  Operator: ", label),
            Span::raw(format!("◀ {} ({}) ▶", operator.label(), operator.symbol())),
        ]));
        content.push(Line::from(""));
    }

    match &session.form {
        EditForm::Boolean => {
            content.push(Line::from(vec![
                Span::styled("  t", focused),
                Span::raw(" true    "),
                Span::styled("f", focused),
                Span::raw(" false"),
            ]));
        }
        EditForm::List { choices, selected } => {
            for choice in choices {
                let is_selected = selected.as_deref() == Some(choice.value.as_str());
                let marker = if is_selected { "  ● " } else { "  ○ " };
                let style = if is_selected { focused } else { Style::default() };
                content.push(Line::from(Span::styled(format!("{}{}", marker, choice.label), style)));
            }
        }
        EditForm::Integer { input, .. } | EditForm::DateTime { input, .. } => match input {
            ValueInput::Single(text) => {
                content.push(Line::from(vec![Span::styled("  Value: ", label), Span::styled(format!("{}_", text), focused)]));
            }
            ValueInput::Bounds { low, high } => {
                let (low_style, high_style) = match bound {
                    Bound::Low => (focused, Style::default()),
                    Bound::High => (Style::default(), focused),
                };
                content.push(Line::from(vec![Span::styled("  From: ", label), Span::styled(format!("{}_", low), low_style)]));
                content.push(Line::from(vec![Span::styled("  To:   ", label), Span::styled(format!("{}_", high), high_style)]));
            }
        },
        EditForm::String { operator, text } => {
            if operator.takes_value() {
                content.push(Line::from(vec![Span::styled("  Value: ", label), Span::styled(format!("{}_", text), focused)]));
            } else {
                content.push(Line::from(Span::styled("  (no value)", Style::default().fg(Color::DarkGray))));
            }
        }
    }

    content.push(Line::from(""));
    if let Some(error) = &session.error {
        let text = match &error.control {
            Some(control) => format!("  {}: {}", control, error.message),
            None => format!("  {}", error.message),
        };
        content.push(Line::from(Span::styled(text, Style::default().fg(Color::Red))));
    }
    if session.state == SessionState::Submitting {
        content.push(Line::from(Span::styled("  Saving…", Style::default().fg(Color::Green))));
    }

    let help = match session.form {
        EditForm::Boolean => "  t/f choose | Esc cancel",
        EditForm::List { .. } => "  ↑/↓ choose | Enter save | Esc cancel",
        _ => "  ←/→ operator | Tab bound | Enter save | Esc cancel",
    };
    content.push(Line::from(Span::styled(
        help,
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let title = match session.mode {
        SessionMode::Create => format!(" New filter: {} ", session.display_name),
        SessionMode::Update => format!(" Edit filter: {} ", session.display_name),
    };
    let popup = Paragraph::new(content).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
