// 📐 Listing Schema - which fields can be filtered, and how
// Fetched from the server; a missing schema just means nothing to offer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filters::FilterSet;
use crate::operators::FieldType;

/// Valid choice of a list-typed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Choices arrive as plain strings or as `[value, label]` pairs
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawChoice {
    Plain(String),
    Pair(Value, String),
}

impl From<RawChoice> for Choice {
    fn from(raw: RawChoice) -> Self {
        match raw {
            RawChoice::Plain(value) => Choice {
                label: value.clone(),
                value,
            },
            RawChoice::Pair(value, label) => Choice {
                value: match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
                label,
            },
        }
    }
}

fn choices<'de, D>(deserializer: D) -> Result<Vec<Choice>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<RawChoice>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().map(Choice::from).collect())
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Truthy when the server accepts filters on this field
    #[serde(default)]
    pub filtering: Option<Value>,
    #[serde(default, deserialize_with = "choices")]
    pub valid_choices: Vec<Choice>,
}

impl FieldSchema {
    pub fn field_type(&self) -> Option<FieldType> {
        FieldType::from_schema(&self.type_name)
    }

    pub fn is_filterable(&self) -> bool {
        let flagged = match &self.filtering {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::Number(_)) => true,
        };
        flagged && self.field_type().is_some()
    }
}

/// One entry of the "add filter" affordance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOption {
    pub name: String,
    pub display_name: String,
    pub field_type: FieldType,
    /// False when the field already has an active filter
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingSchema {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSchema>,
}

impl ListingSchema {
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn display_name(&self, name: &str) -> String {
        self.field(name)
            .and_then(|f| f.display_name.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// Filter type of a field, if it can be filtered at all
    pub fn filter_type(&self, name: &str) -> Option<FieldType> {
        self.field(name)
            .filter(|f| f.is_filterable())
            .and_then(FieldSchema::field_type)
    }

    pub fn choices(&self, name: &str) -> Vec<Choice> {
        self.field(name)
            .map(|f| f.valid_choices.clone())
            .unwrap_or_default()
    }

    /// Filterable fields by display name; already filtered ones are disabled
    pub fn add_filter_options(&self, active: &FilterSet) -> Vec<FieldOption> {
        let mut options: Vec<FieldOption> = self
            .fields
            .iter()
            .filter(|(_, field)| field.is_filterable())
            .filter_map(|(name, field)| {
                Some(FieldOption {
                    name: name.clone(),
                    display_name: field.display_name.clone().unwrap_or_else(|| name.clone()),
                    field_type: field.field_type()?,
                    enabled: !active.contains(name),
                })
            })
            .collect();
        options.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        options
    }
}
