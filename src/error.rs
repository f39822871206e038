// ⚠️ Error Types - one enum per boundary
// Failures are handled at the boundary closest to their cause

use std::collections::BTreeMap;

use thiserror::Error;

use crate::operators::{FieldType, Operator};

// ============================================================================
// GATEWAY ERRORS
// ============================================================================

/// Anything that can go wrong talking to the Remote Gateway.
///
/// Timeouts are reported as `Transport`: a request that never answers is
/// treated exactly like one that failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16, body: String },

    /// Structured `{field: message}` payload returned by a rejected mutation
    #[error("validation failed: {}", format_validation(.0))]
    Validation(BTreeMap<String, String>),

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Scripted gateways report unknown URLs this way
    #[error("no response registered for {0}")]
    NotFound(String),
}

impl GatewayError {
    /// First field-scoped message, used to mark the offending control
    pub fn field_message(&self) -> Option<(&str, &str)> {
        match self {
            GatewayError::Validation(fields) => fields
                .iter()
                .next()
                .map(|(field, message)| (field.as_str(), message.as_str())),
            _ => None,
        }
    }
}

fn format_validation(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// FILTER ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("operator {operator} is not valid for {field_type} fields")]
    InvalidOperator {
        field_type: FieldType,
        operator: Operator,
    },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("field {0} already has a filter")]
    DuplicateField(String),

    #[error("field {0} has no active filter")]
    UnknownField(String),

    #[error("field {0} cannot be filtered")]
    NotFilterable(String),

    #[error("filter type of {field} is {existing}; remove it to filter as {requested}")]
    TypeChange {
        field: String,
        existing: FieldType,
        requested: FieldType,
    },
}

// ============================================================================
// PANEL ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PanelError {
    #[error("no filter is being edited")]
    NoSession,

    #[error("a submission is already in flight")]
    Busy,

    #[error("{action} is not available for {field_type} filters")]
    WrongForm {
        action: &'static str,
        field_type: FieldType,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// ============================================================================
// CONFIG ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown listing: {0}")]
    UnknownListing(String),
}
