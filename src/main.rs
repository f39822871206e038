// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use listing_console::config::ConsoleConfig;
use listing_console::pagination::{PageLink, PageLinkKind};
use listing_console::{
    logging, ColumnComposer, FilterStore, HttpGateway, ListLoader, ListingConfig, ListingView,
    LoadOutcome, RemoteFragment, RemoteGateway, Row, RowsRender,
};

/// Terminal console for paginated, filterable listings of a remote API
#[derive(Parser, Debug)]
#[command(name = "listing-console", version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "LISTING_CONSOLE_CONFIG", default_value = "listing-console.json")]
    config: PathBuf,

    /// Listing to open (defaults to the first configured one)
    #[arg(short, long)]
    listing: Option<String>,

    /// Debug-level logging for this crate
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Interactive terminal UI (default)
    Tui,
    /// Print one page of a listing and exit
    Dump {
        /// Page URL to load instead of the listing's first page
        #[arg(long)]
        page_url: Option<String>,
    },
}

// ============================================================================
// WIRING
// ============================================================================

/// One configured listing with its loader and (optional) filter store
pub struct Listing {
    pub config: ListingConfig,
    pub loader: Arc<ListLoader>,
    pub store: Option<Arc<FilterStore>>,
}

pub fn build_listing(
    config: &ListingConfig,
    gateway: Arc<dyn RemoteGateway>,
    view: Arc<dyn ListingView>,
) -> Listing {
    let composer = Arc::new(ColumnComposer::new(config.columns.clone()));

    let store = config.filters_path.as_ref().map(|path| {
        let store = FilterStore::new(gateway.clone(), path.clone());
        Arc::new(match &config.schema_path {
            Some(schema) => store.with_schema(schema.clone()),
            None => store,
        })
    });

    let mut loader = ListLoader::new(config.clone(), gateway.clone(), view, composer);
    if let Some(fragment) = &config.fragment_path {
        loader = loader.with_filters(Arc::new(RemoteFragment::new(gateway, fragment.clone())));
    } else if let Some(store) = &store {
        loader = loader.with_filters(store.clone());
    }

    Listing {
        config: config.clone(),
        loader: Arc::new(loader),
        store,
    }
}

fn load_config(cli: &Cli) -> Result<ConsoleConfig> {
    let config = ConsoleConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let config = config
        .with_overrides(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;

    if let Some(id) = &cli.listing {
        config.listing(id)?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Tui);

    let headless = matches!(command, Command::Dump { .. });
    if logging::should_install(headless, std::env::var("RUST_LOG").ok().as_deref()) {
        logging::init(cli.verbose);
    }

    let config = load_config(&cli)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let gateway: Arc<dyn RemoteGateway> = Arc::new(
        HttpGateway::new(&config.base_url, Duration::from_secs(config.request_timeout_secs))
            .context("Failed to build HTTP client")?,
    );

    tracing::info!(base_url = %config.base_url, listings = config.listings.len(), "listing console starting");

    match command {
        Command::Dump { page_url } => runtime.block_on(run_dump(&cli, &config, gateway, page_url)),
        Command::Tui => run_ui_mode(&cli, &config, gateway, runtime),
    }
}

// ============================================================================
// DUMP MODE
// ============================================================================

/// Prints every render as plain lines
struct StdoutView;

impl ListingView for StdoutView {
    fn mark_loading(&self) {}

    fn hide_pagination(&self) {}

    fn render_rows(&self, rows: RowsRender) {
        match rows {
            RowsRender::Empty => println!("(no results)"),
            RowsRender::Rows(rows) => {
                for row in rows {
                    match row {
                        Row::Ready { cells } => println!("{}", cells.join("\t")),
                        Row::Failed { message } => println!("!! {}", message),
                    }
                }
            }
        }
    }

    fn render_pagination(&self, links: Vec<PageLink>, summary: String) {
        println!("--");
        println!("{}", summary);
        for link in links {
            if let (PageLinkKind::Page(_), Some(url)) = (link.kind, &link.url) {
                let marker = if link.active { "*" } else { " " };
                println!("{} {:>3}  {}", marker, link.label, url);
            }
        }
    }

    fn show_error(&self, message: String) {
        eprintln!("❌ {}", message);
    }

    fn scroll_to_top(&self) {}
}

async fn run_dump(
    cli: &Cli,
    config: &ConsoleConfig,
    gateway: Arc<dyn RemoteGateway>,
    page_url: Option<String>,
) -> Result<()> {
    let listing_config = match &cli.listing {
        Some(id) => config.listing(id)?,
        None => config
            .listings
            .first()
            .ok_or_else(|| anyhow!("No listings configured"))?,
    };
    let listing = build_listing(listing_config, gateway, Arc::new(StdoutView));

    println!("{}", listing.config.title);
    println!("{}", listing.loader.headers().join("\t"));

    if let Some(store) = &listing.store {
        let schema = store.fetch_schema().await;
        let active = store.fetch_active().await.context("Failed to fetch active filters")?;
        for filter in active.iter() {
            println!("# {} {}", schema.display_name(filter.field()), filter.summary());
        }
    }

    let page_url = page_url.unwrap_or_else(|| listing.config.first_page_url());
    match listing.loader.load(&page_url, false).await {
        LoadOutcome::Failed(err) => Err(err).with_context(|| format!("Failed to load {}", page_url)),
        outcome => {
            tracing::debug!(?outcome, "dump finished");
            Ok(())
        }
    }
}

// ============================================================================
// TUI MODE
// ============================================================================

#[cfg(feature = "tui")]
fn run_ui_mode(
    cli: &Cli,
    config: &ConsoleConfig,
    gateway: Arc<dyn RemoteGateway>,
    runtime: tokio::runtime::Runtime,
) -> Result<()> {
    let mut registry = listing_console::ModuleRegistry::new();
    let mut tabs = Vec::new();
    for listing_config in &config.listings {
        let view = Arc::new(ui::ScreenView::default());
        let listing = build_listing(listing_config, gateway.clone(), view.clone());
        registry
            .register(listing.loader.clone())
            .map_err(|id| anyhow!("Duplicate listing id {}", id))?;
        tabs.push(ui::Tab::new(listing, view));
    }

    let start = match &cli.listing {
        Some(id) => config.listings.iter().position(|l| &l.id == id).unwrap_or(0),
        None => 0,
    };

    let mut app = ui::App::new(tabs, registry, runtime.handle().clone(), start);
    ui::run_ui(&mut app)?;

    println!("\n✅ Listing console closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(
    _cli: &Cli,
    _config: &ConsoleConfig,
    _gateway: Arc<dyn RemoteGateway>,
    _runtime: tokio::runtime::Runtime,
) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print a page with: listing-console dump");
    std::process::exit(1);
}
