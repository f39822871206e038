// 🔎 Filter Model - one typed constraint per field
// The operator/value pairing is checked at construction and at every mutation

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FilterError;
use crate::operators::{FieldType, Operator};

// ============================================================================
// RAW VALUES (as typed by a user or stored by the server)
// ============================================================================

/// Untyped filter value before it is checked against a type/operator pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Bool(bool),
    Scalar(String),
    Pair(String, String),
    Empty,
}

impl FilterValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        FilterValue::Scalar(value.into())
    }

    pub fn pair(low: impl Into<String>, high: impl Into<String>) -> Self {
        FilterValue::Pair(low.into(), high.into())
    }

    /// Read a value out of the gateway's JSON
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => FilterValue::Bool(*b),
            Value::Number(n) => FilterValue::Scalar(n.to_string()),
            Value::String(s) => FilterValue::Scalar(s.clone()),
            Value::Array(items) if items.len() == 2 => {
                FilterValue::Pair(json_text(&items[0]), json_text(&items[1]))
            }
            _ => FilterValue::Empty,
        }
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// DATE INPUT
// ============================================================================

/// A date as entered: either a bare day or a full timestamp.
///
/// Bare days are widened differently depending on which bound they form:
/// a lower bound starts at midnight, an upper bound runs through 23:59:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl DateInput {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
                return Some(DateInput::DateTime(dt));
            }
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .map(DateInput::Date)
    }

    pub fn start_of_day(&self) -> NaiveDateTime {
        match self {
            DateInput::Date(d) => d.and_time(NaiveTime::MIN),
            DateInput::DateTime(dt) => *dt,
        }
    }

    pub fn end_of_day(&self) -> NaiveDateTime {
        match self {
            DateInput::Date(d) => d.and_hms_opt(23, 59, 59).unwrap_or_else(|| d.and_time(NaiveTime::MIN)),
            DateInput::DateTime(dt) => *dt,
        }
    }

    /// A midnight lower bound reads back as the bare day
    pub fn as_lower_bound(&self) -> Self {
        match self {
            DateInput::DateTime(dt) if dt.time() == NaiveTime::MIN => DateInput::Date(dt.date()),
            other => *other,
        }
    }

    /// A 23:59:59 upper bound reads back as the bare day
    pub fn as_upper_bound(&self) -> Self {
        match self {
            DateInput::DateTime(dt) if Some(*dt) == dt.date().and_hms_opt(23, 59, 59) => {
                DateInput::Date(dt.date())
            }
            other => *other,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            DateInput::Date(d) => *d,
            DateInput::DateTime(dt) => dt.date(),
        }
    }
}

impl fmt::Display for DateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateInput::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DateInput::DateTime(dt) if dt.second() == 0 => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            DateInput::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

// ============================================================================
// TYPED CONDITIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegerCondition {
    Exact(i64),
    Gt(i64),
    Lt(i64),
    Gte(i64),
    Lte(i64),
    Range(i64, i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringCondition {
    IContains(String),
    IStartsWith(String),
    IEndsWith(String),
    IExact(String),
    IsNull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeCondition {
    Gte(DateInput),
    Lte(DateInput),
    Range(DateInput, DateInput),
    Year(i32),
}

/// Operator and value of a filter, one variant per field type.
///
/// Every variant can only hold operators its type allows, so an invalid
/// pairing cannot be represented once a `Condition` exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Boolean(bool),
    Integer(IntegerCondition),
    String(StringCondition),
    List(String),
    DateTime(DateTimeCondition),
}

impl Condition {
    /// Check a raw value against a type/operator pair
    pub fn build(
        field: &str,
        field_type: FieldType,
        operator: Operator,
        value: &FilterValue,
    ) -> Result<Self, FilterError> {
        if !field_type.allows(operator) {
            return Err(FilterError::InvalidOperator {
                field_type,
                operator,
            });
        }
        let invalid = |message: &str| FilterError::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        };

        match field_type {
            FieldType::Boolean => match value {
                FilterValue::Bool(b) => Ok(Condition::Boolean(*b)),
                FilterValue::Scalar(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(Condition::Boolean(true)),
                    "false" | "0" => Ok(Condition::Boolean(false)),
                    _ => Err(invalid("Choose true or false.")),
                },
                _ => Err(invalid("Choose true or false.")),
            },
            FieldType::List => match value {
                FilterValue::Scalar(s) if !s.trim().is_empty() => {
                    Ok(Condition::List(s.trim().to_string()))
                }
                _ => Err(invalid("Select a valid choice.")),
            },
            FieldType::Integer => {
                let parse = |s: &str| {
                    s.trim()
                        .parse::<i64>()
                        .map_err(|_| invalid("Enter a whole number."))
                };
                let condition = if operator.is_range() {
                    let (low, high) = split_pair(value).ok_or_else(|| invalid("Enter both bounds."))?;
                    let (low, high) = (parse(&low)?, parse(&high)?);
                    if low > high {
                        return Err(invalid("Lower bound must not exceed upper bound."));
                    }
                    IntegerCondition::Range(low, high)
                } else {
                    let n = parse(&single(value).ok_or_else(|| invalid("Enter a whole number."))?)?;
                    match operator {
                        Operator::Gt => IntegerCondition::Gt(n),
                        Operator::Lt => IntegerCondition::Lt(n),
                        Operator::Gte => IntegerCondition::Gte(n),
                        Operator::Lte => IntegerCondition::Lte(n),
                        _ => IntegerCondition::Exact(n),
                    }
                };
                Ok(Condition::Integer(condition))
            }
            FieldType::String => {
                if operator == Operator::IsNull {
                    return Ok(Condition::String(StringCondition::IsNull));
                }
                let text = single(value).unwrap_or_default();
                let condition = match operator {
                    Operator::IStartsWith => StringCondition::IStartsWith(text),
                    Operator::IEndsWith => StringCondition::IEndsWith(text),
                    Operator::IExact => StringCondition::IExact(text),
                    _ => StringCondition::IContains(text),
                };
                Ok(Condition::String(condition))
            }
            FieldType::DateTime => {
                let parse = |s: &str| {
                    DateInput::parse(s).ok_or_else(|| invalid("Enter a date as YYYY-MM-DD."))
                };
                let condition = match operator {
                    Operator::Range => {
                        let (start, end) =
                            split_pair(value).ok_or_else(|| invalid("Enter a start and an end date."))?;
                        let (start, end) = (parse(&start)?, parse(&end)?);
                        if start.start_of_day() > end.end_of_day() {
                            return Err(invalid("Start date must not be after end date."));
                        }
                        DateTimeCondition::Range(start, end)
                    }
                    Operator::Year => {
                        let text = single(value).unwrap_or_default();
                        let text = text.trim();
                        if text.len() != 4 || !text.chars().all(|c| c.is_ascii_digit()) {
                            return Err(invalid("Enter a four digit year."));
                        }
                        DateTimeCondition::Year(text.parse().map_err(|_| invalid("Enter a four digit year."))?)
                    }
                    Operator::Lte => DateTimeCondition::Lte(parse(
                        &single(value).ok_or_else(|| invalid("Enter a date as YYYY-MM-DD."))?,
                    )?),
                    _ => DateTimeCondition::Gte(parse(
                        &single(value).ok_or_else(|| invalid("Enter a date as YYYY-MM-DD."))?,
                    )?),
                };
                Ok(Condition::DateTime(condition))
            }
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Condition::Boolean(_) => FieldType::Boolean,
            Condition::Integer(_) => FieldType::Integer,
            Condition::String(_) => FieldType::String,
            Condition::List(_) => FieldType::List,
            Condition::DateTime(_) => FieldType::DateTime,
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            Condition::Boolean(_) | Condition::List(_) => Operator::Exact,
            Condition::Integer(c) => match c {
                IntegerCondition::Exact(_) => Operator::Exact,
                IntegerCondition::Gt(_) => Operator::Gt,
                IntegerCondition::Lt(_) => Operator::Lt,
                IntegerCondition::Gte(_) => Operator::Gte,
                IntegerCondition::Lte(_) => Operator::Lte,
                IntegerCondition::Range(_, _) => Operator::Range,
            },
            Condition::String(c) => match c {
                StringCondition::IContains(_) => Operator::IContains,
                StringCondition::IStartsWith(_) => Operator::IStartsWith,
                StringCondition::IEndsWith(_) => Operator::IEndsWith,
                StringCondition::IExact(_) => Operator::IExact,
                StringCondition::IsNull => Operator::IsNull,
            },
            Condition::DateTime(c) => match c {
                DateTimeCondition::Gte(_) => Operator::Gte,
                DateTimeCondition::Lte(_) => Operator::Lte,
                DateTimeCondition::Range(_, _) => Operator::Range,
                DateTimeCondition::Year(_) => Operator::Year,
            },
        }
    }

    /// Raw form of the value, used to prefill edit forms
    pub fn value(&self) -> FilterValue {
        match self {
            Condition::Boolean(b) => FilterValue::Bool(*b),
            Condition::List(choice) => FilterValue::Scalar(choice.clone()),
            Condition::Integer(c) => match c {
                IntegerCondition::Range(low, high) => FilterValue::pair(low.to_string(), high.to_string()),
                IntegerCondition::Exact(n)
                | IntegerCondition::Gt(n)
                | IntegerCondition::Lt(n)
                | IntegerCondition::Gte(n)
                | IntegerCondition::Lte(n) => FilterValue::Scalar(n.to_string()),
            },
            Condition::String(c) => match c {
                StringCondition::IContains(s)
                | StringCondition::IStartsWith(s)
                | StringCondition::IEndsWith(s)
                | StringCondition::IExact(s) => FilterValue::Scalar(s.clone()),
                StringCondition::IsNull => FilterValue::Empty,
            },
            Condition::DateTime(c) => match c {
                DateTimeCondition::Gte(d) => FilterValue::Scalar(d.as_lower_bound().to_string()),
                DateTimeCondition::Lte(d) => FilterValue::Scalar(d.as_upper_bound().to_string()),
                DateTimeCondition::Range(start, end) => FilterValue::pair(
                    start.as_lower_bound().to_string(),
                    end.as_upper_bound().to_string(),
                ),
                DateTimeCondition::Year(y) => FilterValue::Scalar(y.to_string()),
            },
        }
    }

    /// Value as sent in a mutation body; date bounds are already widened
    pub fn wire_value(&self) -> Value {
        match self {
            Condition::Boolean(b) => Value::Bool(*b),
            Condition::Integer(IntegerCondition::Range(low, high)) => serde_json::json!([low, high]),
            Condition::Integer(_) => match self.value() {
                FilterValue::Scalar(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::String(s)),
                _ => Value::Null,
            },
            Condition::String(StringCondition::IsNull) => Value::Bool(true),
            Condition::DateTime(c) => match c {
                DateTimeCondition::Gte(d) => Value::String(d.start_of_day().format(WIRE_DATETIME_FORMAT).to_string()),
                DateTimeCondition::Lte(d) => Value::String(d.end_of_day().format(WIRE_DATETIME_FORMAT).to_string()),
                DateTimeCondition::Range(start, end) => serde_json::json!([
                    start.start_of_day().format(WIRE_DATETIME_FORMAT).to_string(),
                    end.end_of_day().format(WIRE_DATETIME_FORMAT).to_string(),
                ]),
                DateTimeCondition::Year(y) => Value::from(*y),
            },
            _ => match self.value() {
                FilterValue::Scalar(s) => Value::String(s),
                _ => Value::Null,
            },
        }
    }

    /// Carry the current value over to another operator of the same type.
    ///
    /// Single values widen into `(v, v)` ranges, ranges narrow to their lower
    /// bound, years and dates convert into each other.
    pub fn convert(&self, operator: Operator) -> FilterValue {
        let current = self.value();
        if operator == self.operator() {
            return current;
        }
        match (self, operator) {
            (Condition::DateTime(DateTimeCondition::Year(y)), Operator::Range) => {
                FilterValue::pair(format!("{}-01-01", y), format!("{}-12-31", y))
            }
            (Condition::DateTime(DateTimeCondition::Year(y)), _) => {
                FilterValue::Scalar(format!("{}-01-01", y))
            }
            (Condition::DateTime(DateTimeCondition::Gte(d) | DateTimeCondition::Lte(d)), Operator::Year)
            | (Condition::DateTime(DateTimeCondition::Range(d, _)), Operator::Year) => {
                FilterValue::Scalar(d.date().year().to_string())
            }
            _ => match (current, operator.is_range()) {
                (FilterValue::Scalar(s), true) => FilterValue::Pair(s.clone(), s),
                (FilterValue::Pair(low, _), false) => FilterValue::Scalar(low),
                (FilterValue::Empty, _) if operator.takes_value() => FilterValue::Scalar(String::new()),
                (other, _) => other,
            },
        }
    }
}

fn single(value: &FilterValue) -> Option<String> {
    match value {
        FilterValue::Scalar(s) => Some(s.clone()),
        FilterValue::Bool(b) => Some(b.to_string()),
        FilterValue::Pair(_, _) | FilterValue::Empty => None,
    }
}

/// Range values arrive either as a pair or as the delimited wire form
fn split_pair(value: &FilterValue) -> Option<(String, String)> {
    match value {
        FilterValue::Pair(low, high) => Some((low.clone(), high.clone())),
        FilterValue::Scalar(s) => s
            .split_once(crate::query::RANGE_DELIMITER)
            .map(|(low, high)| (low.to_string(), high.to_string())),
        _ => None,
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// Wire shape of a persisted filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

/// One active filter: a field plus its typed condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    field: String,
    condition: Condition,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        field_type: FieldType,
        operator: Operator,
        value: FilterValue,
    ) -> Result<Self, FilterError> {
        let field = field.into();
        let condition = Condition::build(&field, field_type, operator, &value)?;
        Ok(Filter { field, condition })
    }

    pub fn from_condition(field: impl Into<String>, condition: Condition) -> Self {
        Filter {
            field: field.into(),
            condition,
        }
    }

    pub fn from_record(record: &FilterRecord) -> Result<Self, FilterError> {
        Filter::new(
            record.field.clone(),
            record.field_type,
            record.operator,
            FilterValue::from_json(&record.value),
        )
    }

    pub fn to_record(&self) -> FilterRecord {
        FilterRecord {
            field: self.field.clone(),
            field_type: self.field_type(),
            operator: self.operator(),
            value: self.condition.wire_value(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn field_type(&self) -> FieldType {
        self.condition.field_type()
    }

    pub fn operator(&self) -> Operator {
        self.condition.operator()
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn value(&self) -> FilterValue {
        self.condition.value()
    }

    /// Switch operator, carrying the value over where it still fits
    pub fn set_operator(&mut self, operator: Operator) -> Result<(), FilterError> {
        let value = self.condition.convert(operator);
        self.condition = Condition::build(&self.field, self.field_type(), operator, &value)?;
        Ok(())
    }

    pub fn set_value(&mut self, value: FilterValue) -> Result<(), FilterError> {
        self.condition = Condition::build(&self.field, self.field_type(), self.operator(), &value)?;
        Ok(())
    }

    /// Short form for the panel, e.g. `<> 10 – 20`
    pub fn summary(&self) -> String {
        let operator = self.operator();
        let value = match self.condition.value() {
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Scalar(s) => s,
            FilterValue::Pair(low, high) => format!("{} – {}", low, high),
            FilterValue::Empty => String::new(),
        };
        if operator.takes_value() {
            format!("{} {}", operator.symbol(), value)
        } else {
            operator.label().to_string()
        }
    }
}

// ============================================================================
// FILTER SET
// ============================================================================

/// Active filters of one listing, unique by field, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filter: Filter) -> Result<(), FilterError> {
        if self.contains(filter.field()) {
            return Err(FilterError::DuplicateField(filter.field().to_string()));
        }
        self.filters.push(filter);
        Ok(())
    }

    /// Replace the filter on an existing field; its type may not change
    pub fn replace(&mut self, filter: Filter) -> Result<Filter, FilterError> {
        let slot = self
            .filters
            .iter_mut()
            .find(|f| f.field() == filter.field())
            .ok_or_else(|| FilterError::UnknownField(filter.field().to_string()))?;
        if slot.field_type() != filter.field_type() {
            return Err(FilterError::TypeChange {
                field: filter.field().to_string(),
                existing: slot.field_type(),
                requested: filter.field_type(),
            });
        }
        Ok(std::mem::replace(slot, filter))
    }

    pub fn remove(&mut self, field: &str) -> Result<Filter, FilterError> {
        let index = self
            .filters
            .iter()
            .position(|f| f.field() == field)
            .ok_or_else(|| FilterError::UnknownField(field.to_string()))?;
        Ok(self.filters.remove(index))
    }

    pub fn get(&self, field: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.field() == field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn as_slice(&self) -> &[Filter] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl FromIterator<Filter> for FilterSet {
    /// Later duplicates of a field are dropped
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        let mut set = FilterSet::new();
        for filter in iter {
            let _ = set.insert(filter);
        }
        set
    }
}
