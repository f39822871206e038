// ⚙️ Configuration - which listings exist and how their rows are built
// Loaded once at startup from JSON, then overridden from the environment

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_BASE_URL: &str = "LISTING_CONSOLE_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "LISTING_CONSOLE_TIMEOUT_SECS";

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u64 {
    25
}

// ============================================================================
// COLUMNS
// ============================================================================

/// One column of a listing row.
///
/// Without `resolve` the cell is read from the entity itself. With it, the
/// entity field holds a detail URL which is fetched and `resolve` is read
/// from the fetched document (dotted paths hop through further URLs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub title: String,
    pub field: String,
    #[serde(default)]
    pub resolve: Option<String>,
}

impl ColumnConfig {
    pub fn new(title: impl Into<String>, field: impl Into<String>) -> Self {
        ColumnConfig {
            title: title.into(),
            field: field.into(),
            resolve: None,
        }
    }

    /// Builder: resolve the field as a foreign reference
    pub fn resolving(mut self, path: impl Into<String>) -> Self {
        self.resolve = Some(path.into());
        self
    }
}

// ============================================================================
// LISTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingConfig {
    pub id: String,
    pub title: String,
    /// Primary listing endpoint (`{objects, meta}`)
    pub list_path: String,
    /// Ordering used when a page URL carries none
    pub default_order: String,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Schema descriptor with filterable fields
    #[serde(default)]
    pub schema_path: Option<String>,
    /// Persisted filters collection
    #[serde(default)]
    pub filters_path: Option<String>,
    /// Server-built filter fragment; wins over `filters_path` for loading
    #[serde(default)]
    pub fragment_path: Option<String>,
    pub columns: Vec<ColumnConfig>,
}

impl ListingConfig {
    pub fn new(id: impl Into<String>, list_path: impl Into<String>, default_order: impl Into<String>) -> Self {
        let id = id.into();
        ListingConfig {
            title: id.clone(),
            id,
            list_path: list_path.into(),
            default_order: default_order.into(),
            page_size: default_page_size(),
            schema_path: None,
            filters_path: None,
            fragment_path: None,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnConfig) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_filters(mut self, filters_path: impl Into<String>, schema_path: impl Into<String>) -> Self {
        self.filters_path = Some(filters_path.into());
        self.schema_path = Some(schema_path.into());
        self
    }

    pub fn with_fragment(mut self, fragment_path: impl Into<String>) -> Self {
        self.fragment_path = Some(fragment_path.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// First page URL: list path with `limit`/`offset` set
    pub fn first_page_url(&self) -> String {
        let mut url = crate::query::ListingUrl::parse(&self.list_path);
        url.set("limit", &self.page_size.to_string());
        url.set("offset", "0");
        url.to_string()
    }
}

// ============================================================================
// CONSOLE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    pub listings: Vec<ListingConfig>,
}

impl ConsoleConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ConsoleConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LISTING_CONSOLE_*` overrides from a lookup (normally `std::env::var`)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = timeout
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} must be a number of seconds", ENV_TIMEOUT_SECS)))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".to_string()));
        }
        if self.listings.is_empty() {
            return Err(ConfigError::Invalid("no listings configured".to_string()));
        }

        let mut seen = HashSet::new();
        for listing in &self.listings {
            if listing.id.trim().is_empty() {
                return Err(ConfigError::Invalid("listing id is empty".to_string()));
            }
            if !seen.insert(listing.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate listing id {}", listing.id)));
            }
            if listing.page_size == 0 {
                return Err(ConfigError::Invalid(format!("{}: page_size must be positive", listing.id)));
            }
            if listing.columns.is_empty() {
                return Err(ConfigError::Invalid(format!("{}: no columns", listing.id)));
            }
        }
        Ok(())
    }

    pub fn listing(&self, id: &str) -> Result<&ListingConfig, ConfigError> {
        self.listings
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| ConfigError::UnknownListing(id.to_string()))
    }
}
