// 💾 Filter Store - server-persisted filters of one listing
// Every read goes back to the server; nothing is cached here

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::filters::{Filter, FilterRecord, FilterSet};
use crate::gateway::{Mutation, RemoteGateway};
use crate::operators::Operator;
use crate::query::build_query_fragment;
use crate::schema::ListingSchema;

/// Where the list loader gets its filter fragment from
#[async_trait]
pub trait FilterSource: Send + Sync {
    async fn query_fragment(&self) -> Result<String, GatewayError>;
}

/// Fragment built by the server, used as-is
pub struct RemoteFragment {
    gateway: Arc<dyn RemoteGateway>,
    url: String,
}

impl RemoteFragment {
    pub fn new(gateway: Arc<dyn RemoteGateway>, url: impl Into<String>) -> Self {
        RemoteFragment {
            gateway,
            url: url.into(),
        }
    }
}

#[async_trait]
impl FilterSource for RemoteFragment {
    async fn query_fragment(&self) -> Result<String, GatewayError> {
        self.gateway.get_text(&self.url).await
    }
}

/// Body of a partial filter update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FilterPatch {
    /// Patch carrying both operator and value of `filter`
    pub fn from_filter(filter: &Filter) -> Self {
        let record = filter.to_record();
        FilterPatch {
            operator: Some(record.operator),
            value: Some(record.value),
        }
    }
}

pub struct FilterStore {
    gateway: Arc<dyn RemoteGateway>,
    filters_url: String,
    schema_url: Option<String>,
}

impl FilterStore {
    pub fn new(gateway: Arc<dyn RemoteGateway>, filters_url: impl Into<String>) -> Self {
        FilterStore {
            gateway,
            filters_url: filters_url.into(),
            schema_url: None,
        }
    }

    pub fn with_schema(mut self, schema_url: impl Into<String>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }

    pub fn filters_url(&self) -> &str {
        &self.filters_url
    }

    /// `<filters_url>/<field>/`
    pub fn detail_url(&self, field: &str) -> String {
        format!(
            "{}/{}/",
            self.filters_url.trim_end_matches('/'),
            urlencoding::encode(field)
        )
    }

    /// Current active set. Records that break the operator table are skipped.
    pub async fn fetch_active(&self) -> Result<FilterSet, GatewayError> {
        let body = self.gateway.get_json(&self.filters_url).await?;
        let objects = match body.get("objects") {
            Some(Value::Array(objects)) => objects.clone(),
            _ => {
                return Err(GatewayError::Decode {
                    url: self.filters_url.clone(),
                    message: "missing objects array".to_string(),
                })
            }
        };

        let mut set = FilterSet::new();
        for object in objects {
            let record: FilterRecord = match serde_json::from_value(object) {
                Ok(record) => record,
                Err(e) => {
                    warn!(url = %self.filters_url, error = %e, "skipping malformed filter record");
                    continue;
                }
            };
            match Filter::from_record(&record).and_then(|filter| set.insert(filter)) {
                Ok(()) => {}
                Err(e) => warn!(field = %record.field, error = %e, "skipping filter record"),
            }
        }
        debug!(url = %self.filters_url, count = set.len(), "fetched active filters");
        Ok(set)
    }

    /// Schema descriptor; any failure degrades to an empty schema
    pub async fn fetch_schema(&self) -> ListingSchema {
        let Some(url) = &self.schema_url else {
            return ListingSchema::default();
        };
        match self.gateway.get_json(url).await {
            Ok(body) => ListingSchema::from_json(body).unwrap_or_else(|e| {
                warn!(url = %url, error = %e, "unreadable schema, offering no fields");
                ListingSchema::default()
            }),
            Err(e) => {
                warn!(url = %url, error = %e, "schema unavailable, offering no fields");
                ListingSchema::default()
            }
        }
    }

    pub async fn create(&self, filter: &Filter) -> Result<(), GatewayError> {
        let body = serde_json::to_value(filter.to_record()).map_err(|e| GatewayError::Decode {
            url: self.filters_url.clone(),
            message: e.to_string(),
        })?;
        self.gateway.send(Mutation::Post, &self.filters_url, body).await?;
        Ok(())
    }

    pub async fn update(&self, field: &str, patch: &FilterPatch) -> Result<(), GatewayError> {
        let url = self.detail_url(field);
        let body = serde_json::to_value(patch).map_err(|e| GatewayError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        self.gateway.send(Mutation::Patch, &url, body).await?;
        Ok(())
    }

    pub async fn delete(&self, field: &str) -> Result<(), GatewayError> {
        self.gateway
            .send(Mutation::Delete, &self.detail_url(field), Value::Null)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FilterSource for FilterStore {
    async fn query_fragment(&self) -> Result<String, GatewayError> {
        let active = self.fetch_active().await?;
        Ok(build_query_fragment(active.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterValue;
    use crate::gateway::MockGateway;
    use crate::operators::FieldType;
    use serde_json::json;

    const FILTERS: &str = "/api/filter/";

    fn store(gateway: &MockGateway) -> FilterStore {
        FilterStore::new(Arc::new(gateway.clone()), FILTERS).with_schema("/api/result/schema/")
    }

    #[tokio::test]
    async fn test_fetch_active_skips_invalid_records() {
        let gateway = MockGateway::new();
        gateway.respond_json(
            FILTERS,
            json!({"objects": [
                {"field": "value", "type": "integer", "operator": "range", "value": [10, 20]},
                {"field": "flag", "type": "boolean", "operator": "gt", "value": true},
                {"field": "value", "type": "integer", "operator": "gt", "value": 3},
                {"field": "name", "type": "string", "operator": "icontains", "value": "py"},
                {"nonsense": true}
            ]}),
        );

        let active = store(&gateway).fetch_active().await.unwrap();
        let fields: Vec<&str> = active.iter().map(|f| f.field()).collect();
        assert_eq!(fields, vec!["value", "name"]);
        assert_eq!(active.get("value").unwrap().operator(), Operator::Range);
    }

    #[tokio::test]
    async fn test_fragment_built_from_fresh_fetch() {
        let gateway = MockGateway::new();
        gateway.respond_json(
            FILTERS,
            json!({"objects": [
                {"field": "enabled", "type": "boolean", "operator": "exact", "value": true},
                {"field": "age", "type": "integer", "operator": "range", "value": "10;20"}
            ]}),
        );
        let store = store(&gateway);

        assert_eq!(store.query_fragment().await.unwrap(), "age__range=10;20&enabled=true");
        store.query_fragment().await.unwrap();
        assert_eq!(gateway.request_count(FILTERS), 2);
    }

    #[tokio::test]
    async fn test_remote_fragment_used_verbatim() {
        let gateway = MockGateway::new();
        gateway.respond_text("/api/filter/query/", "branch=default&value__gt=3");
        let source = RemoteFragment::new(Arc::new(gateway.clone()), "/api/filter/query/");
        assert_eq!(source.query_fragment().await.unwrap(), "branch=default&value__gt=3");
    }

    #[tokio::test]
    async fn test_schema_failure_degrades_to_empty() {
        let gateway = MockGateway::new();
        let schema = store(&gateway).fetch_schema().await;
        assert!(schema.fields.is_empty());

        gateway.respond_json("/api/result/schema/", json!({"fields": "broken"}));
        assert!(store(&gateway).fetch_schema().await.fields.is_empty());
    }

    #[tokio::test]
    async fn test_mutations_hit_expected_urls() {
        let gateway = MockGateway::new();
        gateway.respond_mutation(Mutation::Post, FILTERS, Ok(Value::Null));
        gateway.respond_mutation(Mutation::Patch, "/api/filter/value/", Ok(Value::Null));
        gateway.respond_mutation(Mutation::Delete, "/api/filter/value/", Ok(Value::Null));
        let store = store(&gateway);

        let filter = Filter::new("value", FieldType::Integer, Operator::Range, FilterValue::pair("1", "5")).unwrap();
        store.create(&filter).await.unwrap();
        store
            .update("value", &FilterPatch { operator: Some(Operator::Gt), value: None })
            .await
            .unwrap();
        store.delete("value").await.unwrap();

        let log = gateway.requests();
        assert_eq!(
            log[0].body,
            Some(json!({"field": "value", "type": "integer", "operator": "range", "value": [1, 5]}))
        );
        assert_eq!(log[1].body, Some(json!({"operator": "gt"})));
        assert_eq!(log[2].method, "DELETE");
    }
}
