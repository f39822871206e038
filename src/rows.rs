// 🧩 Row Composition - one entity + its foreign references → display cells
// Each row may need several chained requests before it can be shown

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::ColumnConfig;
use crate::error::GatewayError;
use crate::gateway::RemoteGateway;

/// Placeholder for absent or null values
pub const MISSING: &str = "-";

/// Builds the display content of one row.
///
/// Any error fails the whole row; the loader turns it into a placeholder.
#[async_trait]
pub trait RowComposer: Send + Sync {
    fn headers(&self) -> Vec<String>;

    async fn compose(&self, gateway: &dyn RemoteGateway, entity: &Value) -> Result<Vec<String>, GatewayError>;
}

/// Composer driven by configured columns
pub struct ColumnComposer {
    columns: Vec<ColumnConfig>,
}

impl ColumnComposer {
    pub fn new(columns: Vec<ColumnConfig>) -> Self {
        Self { columns }
    }
}

#[async_trait]
impl RowComposer for ColumnComposer {
    fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.title.clone()).collect()
    }

    async fn compose(&self, gateway: &dyn RemoteGateway, entity: &Value) -> Result<Vec<String>, GatewayError> {
        // Several columns often point at the same detail URL
        let mut fetched: HashMap<String, Value> = HashMap::new();
        let mut cells = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let value = lookup(entity, &column.field);
            let cell = match (&column.resolve, value) {
                (None, value) => display_text(value),
                (Some(path), Some(Value::String(url))) => {
                    let detail = fetch(gateway, &mut fetched, url).await?;
                    let resolved = resolve_path(gateway, &mut fetched, detail, path).await?;
                    display_text(resolved.as_ref())
                }
                (Some(_), _) => MISSING.to_string(),
            };
            cells.push(cell);
        }

        Ok(cells)
    }
}

async fn fetch(
    gateway: &dyn RemoteGateway,
    fetched: &mut HashMap<String, Value>,
    url: &str,
) -> Result<Value, GatewayError> {
    if let Some(hit) = fetched.get(url) {
        return Ok(hit.clone());
    }
    debug!(url, "resolving reference");
    let detail = gateway.get_json(url).await?;
    fetched.insert(url.to_string(), detail.clone());
    Ok(detail)
}

/// Walk a dotted path, following URL-valued intermediate segments
async fn resolve_path(
    gateway: &dyn RemoteGateway,
    fetched: &mut HashMap<String, Value>,
    mut current: Value,
    path: &str,
) -> Result<Option<Value>, GatewayError> {
    let segments: Vec<&str> = path.split('.').collect();

    for (i, segment) in segments.iter().enumerate() {
        let next = match current.get(*segment) {
            Some(value) => value.clone(),
            None => return Ok(None),
        };
        let is_last = i + 1 == segments.len();
        current = match next {
            Value::String(ref url) if !is_last && looks_like_url(url) => fetch(gateway, fetched, url).await?,
            other => other,
        };
    }

    Ok(Some(current))
}

fn looks_like_url(value: &str) -> bool {
    value.starts_with('/') || value.starts_with("http://") || value.starts_with("https://")
}

/// Field lookup on the entity; dots descend into nested objects
fn lookup<'a>(entity: &'a Value, field: &str) -> Option<&'a Value> {
    field.split('.').try_fold(entity, |value, key| value.get(key))
}

pub fn display_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "yes".to_string(),
        Some(Value::Bool(false)) => "no".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
