// 🧮 Operator Table - which comparisons each field type allows
// Static registry: nothing here is loaded at runtime

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// FIELD TYPES
// ============================================================================

/// Abstract field type of a filterable field.
///
/// Immutable once a filter exists: changing it means remove + recreate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Integer,
    String,
    List,
    #[serde(alias = "date")]
    DateTime,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::Boolean,
        FieldType::Integer,
        FieldType::String,
        FieldType::List,
        FieldType::DateTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::String => "string",
            FieldType::List => "list",
            FieldType::DateTime => "datetime",
        }
    }

    /// Map a schema descriptor's type name onto a filter type
    pub fn from_schema(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "boolean" => Some(FieldType::Boolean),
            "integer" => Some(FieldType::Integer),
            "string" => Some(FieldType::String),
            "list" => Some(FieldType::List),
            "datetime" | "date" => Some(FieldType::DateTime),
            _ => None,
        }
    }

    /// Operators valid for this type, in display order
    pub fn operators(&self) -> &'static [Operator] {
        match self {
            FieldType::Boolean => BOOLEAN_OPERATORS,
            FieldType::Integer => INTEGER_OPERATORS,
            FieldType::String => STRING_OPERATORS,
            FieldType::List => LIST_OPERATORS,
            FieldType::DateTime => DATETIME_OPERATORS,
        }
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    /// Operator preselected when a new filter of this type is opened
    pub fn default_operator(&self) -> Operator {
        self.operators()[0]
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OPERATORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Exact,
    Gt,
    Lt,
    Gte,
    Lte,
    Range,
    IContains,
    IStartsWith,
    IEndsWith,
    IExact,
    IsNull,
    Year,
}

const BOOLEAN_OPERATORS: &[Operator] = &[Operator::Exact];

const INTEGER_OPERATORS: &[Operator] = &[
    Operator::Exact,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::Range,
];

const STRING_OPERATORS: &[Operator] = &[
    Operator::IContains,
    Operator::IStartsWith,
    Operator::IEndsWith,
    Operator::IExact,
    Operator::IsNull,
];

const LIST_OPERATORS: &[Operator] = &[Operator::Exact];

const DATETIME_OPERATORS: &[Operator] = &[
    Operator::Gte,
    Operator::Lte,
    Operator::Range,
    Operator::Year,
];

impl Operator {
    /// Lookup name used as the query-string suffix (`field__<name>`)
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Exact => "exact",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Range => "range",
            Operator::IContains => "icontains",
            Operator::IStartsWith => "istartswith",
            Operator::IEndsWith => "iendswith",
            Operator::IExact => "iexact",
            Operator::IsNull => "isnull",
            Operator::Year => "year",
        }
    }

    /// Canonical short symbol shown in the filter panel
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Exact | Operator::IExact => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Range => "<>",
            Operator::IContains => "~",
            Operator::IStartsWith => "^",
            Operator::IEndsWith => "$",
            Operator::IsNull => "0",
            Operator::Year => "y",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operator::Exact => "equals",
            Operator::Gt => "greater than",
            Operator::Lt => "less than",
            Operator::Gte => "from",
            Operator::Lte => "until",
            Operator::Range => "between",
            Operator::IContains => "contains",
            Operator::IStartsWith => "starts with",
            Operator::IEndsWith => "ends with",
            Operator::IExact => "is",
            Operator::IsNull => "is null",
            Operator::Year => "in year",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_OPERATORS.iter().copied().find(|op| op.name() == name)
    }

    /// Symbols are ambiguous across types (`=`), so resolution needs the type
    pub fn from_symbol(field_type: FieldType, symbol: &str) -> Option<Self> {
        field_type
            .operators()
            .iter()
            .copied()
            .find(|op| op.symbol() == symbol)
    }

    /// Range operators take a `(low, high)` pair instead of a single value
    pub fn is_range(&self) -> bool {
        matches!(self, Operator::Range)
    }

    /// Whether the value control is meaningful for this operator
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::IsNull)
    }
}

const ALL_OPERATORS: &[Operator] = &[
    Operator::Exact,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::Range,
    Operator::IContains,
    Operator::IStartsWith,
    Operator::IEndsWith,
    Operator::IExact,
    Operator::IsNull,
    Operator::Year,
];

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
