// Listing Console - Core Library
// Exposes all modules for use in the TUI, the headless dump, and tests

pub mod error;
pub mod operators;      // Operator Table
pub mod filters;        // Typed filter conditions + active set
pub mod query;          // Query fragment builder, ordering
pub mod pagination;     // Page links + summary
pub mod gateway;        // Remote Gateway (HTTP + scripted)
pub mod config;
pub mod view;           // Rendering port
pub mod rows;           // Row composition (secondary requests)
pub mod loader;         // List Loader (ordered fan-in)
pub mod registry;       // Listing modules by id
pub mod schema;         // Filterable fields of a listing
pub mod store;          // Persisted filters
pub mod panel;          // Filter Panel Controller
pub mod logging;

// Re-export commonly used types
pub use error::{ConfigError, FilterError, GatewayError, PanelError};
pub use operators::{FieldType, Operator};
pub use filters::{Condition, Filter, FilterRecord, FilterSet, FilterValue};
pub use query::{build_query_fragment, toggle_order, ListingUrl};
pub use pagination::{build_page_links, page_summary, PageLink, PageLinkKind, PaginationMeta};
pub use gateway::{HttpGateway, MockGateway, Mutation, RemoteGateway};
pub use config::{ColumnConfig, ConsoleConfig, ListingConfig};
pub use view::{ListingView, RecordingView, Row, RowsRender};
pub use rows::{ColumnComposer, RowComposer};
pub use loader::{ListLoader, LoadOutcome, LoadRequest, Slots};
pub use registry::{ListingModule, ModuleId, ModuleRegistry};
pub use schema::{Choice, FieldOption, ListingSchema};
pub use store::{FilterPatch, FilterSource, FilterStore, RemoteFragment};
pub use panel::{EditForm, EditSession, FilterPanelController, PanelSnapshot, SessionState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
