// 🔗 Query Builder - filter state → query-string fragment
// Pure functions only: no requests, no shared state

use crate::filters::{Condition, DateTimeCondition, Filter, IntegerCondition, StringCondition, WIRE_DATETIME_FORMAT};
use crate::operators::Operator;

/// Joins the two bounds of a range value (`age__range=10;20`)
pub const RANGE_DELIMITER: char = ';';

/// Separates field and operator in a lookup key (`name__icontains`)
pub const LOOKUP_SEPARATOR: &str = "__";

/// The single canonical ordering parameter
pub const ORDER_PARAM: &str = "order_by";

/// Keys owned by paging and ordering; filters on these fields keep their lookup
pub const RESERVED_PARAMS: &[&str] = &["limit", "offset", ORDER_PARAM];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_PARAMS.contains(&key)
}

// ============================================================================
// FILTER FRAGMENTS
// ============================================================================

/// Build the query fragment for a set of filters.
///
/// Output is sorted by key so the same filters always yield the same
/// fragment whatever order they were added in. No filters, no fragment.
pub fn build_query_fragment(filters: &[Filter]) -> String {
    let mut pairs: Vec<(String, String)> = filters.iter().map(encode_filter).collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Key and (already percent-encoded) value for one filter
pub fn encode_filter(filter: &Filter) -> (String, String) {
    let operator = filter.operator();
    let key = if operator == Operator::Exact && !is_reserved(filter.field()) {
        urlencoding::encode(filter.field()).into_owned()
    } else {
        format!(
            "{}{}{}",
            urlencoding::encode(filter.field()),
            LOOKUP_SEPARATOR,
            operator.name()
        )
    };

    let value = match filter.condition() {
        Condition::Boolean(b) => b.to_string(),
        Condition::List(choice) => encode(choice),
        Condition::Integer(c) => match c {
            IntegerCondition::Range(low, high) => range(&low.to_string(), &high.to_string()),
            IntegerCondition::Exact(n)
            | IntegerCondition::Gt(n)
            | IntegerCondition::Lt(n)
            | IntegerCondition::Gte(n)
            | IntegerCondition::Lte(n) => n.to_string(),
        },
        Condition::String(c) => match c {
            StringCondition::IContains(s)
            | StringCondition::IStartsWith(s)
            | StringCondition::IEndsWith(s)
            | StringCondition::IExact(s) => encode(s),
            StringCondition::IsNull => "true".to_string(),
        },
        Condition::DateTime(c) => match c {
            DateTimeCondition::Gte(d) => encode(&d.start_of_day().format(WIRE_DATETIME_FORMAT).to_string()),
            DateTimeCondition::Lte(d) => encode(&d.end_of_day().format(WIRE_DATETIME_FORMAT).to_string()),
            DateTimeCondition::Range(start, end) => range(
                &start.start_of_day().format(WIRE_DATETIME_FORMAT).to_string(),
                &end.end_of_day().format(WIRE_DATETIME_FORMAT).to_string(),
            ),
            DateTimeCondition::Year(y) => format!("{:04}", y),
        },
    };

    (key, value)
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn range(low: &str, high: &str) -> String {
    format!("{}{}{}", encode(low), RANGE_DELIMITER, encode(high))
}

// ============================================================================
// LISTING URLS
// ============================================================================

/// A listing URL split into path and ordered query parameters.
///
/// Parameters are kept in their original (encoded) form so that anything
/// not touched by `set`/`remove` is reproduced byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingUrl {
    path: String,
    params: Vec<(String, String)>,
}

impl ListingUrl {
    pub fn parse(url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };
        ListingUrl {
            path: path.to_string(),
            params: parse_params(query),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first occurrence in place (dropping any repeats) or append
    pub fn set(&mut self, key: &str, value: &str) {
        match self.params.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.params[index].1 = value.to_string();
                let mut seen = 0;
                self.params.retain(|(k, _)| {
                    if k == key {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.params.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.params.retain(|(k, _)| k != key);
    }

    /// Merge a prebuilt fragment; its keys win over existing ones.
    /// Reserved keys are merged as `key__exact` and never touch paging.
    pub fn merge_fragment(&mut self, fragment: &str) {
        for (key, value) in parse_params(fragment.trim_start_matches(['?', '&'])) {
            if is_reserved(&key) {
                self.set(&format!("{}{}{}", key, LOOKUP_SEPARATOR, Operator::Exact.name()), &value);
            } else {
                self.set(&key, &value);
            }
        }
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

impl std::fmt::Display for ListingUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

fn parse_params(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (part.to_string(), String::new()),
        })
        .collect()
}

/// Make sure exactly one ordering parameter is present.
///
/// An explicit request replaces whatever was there; otherwise an existing
/// ordering is kept and the listing's default fills in when absent.
pub fn normalize_ordering(url: &mut ListingUrl, requested: Option<&str>, default_order: &str) {
    match requested {
        Some(order) => url.set(ORDER_PARAM, order),
        None => {
            let current = url.get(ORDER_PARAM).map(str::to_string);
            match current {
                Some(order) if !order.is_empty() => url.set(ORDER_PARAM, &order),
                _ => url.set(ORDER_PARAM, default_order),
            }
        }
    }
}

/// Flip `field` ↔ `-field`; a different field starts ascending
pub fn toggle_order(current: Option<&str>, field: &str) -> String {
    match current {
        Some(order) if order == field => format!("-{}", field),
        _ => field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterValue;
    use crate::operators::FieldType;

    fn filter(field: &str, field_type: FieldType, operator: Operator, value: FilterValue) -> Filter {
        Filter::new(field, field_type, operator, value).unwrap()
    }

    #[test]
    fn test_integer_range_fragment() {
        let f = filter("age", FieldType::Integer, Operator::Range, FilterValue::pair("10", "20"));
        assert_eq!(build_query_fragment(&[f]), "age__range=10;20");
    }

    #[test]
    fn test_boolean_exact_omits_operator() {
        let f = filter("enabled", FieldType::Boolean, Operator::Exact, FilterValue::Bool(true));
        assert_eq!(build_query_fragment(&[f]), "enabled=true");
    }

    #[test]
    fn test_empty_set_is_empty_fragment() {
        assert_eq!(build_query_fragment(&[]), "");
    }

    #[test]
    fn test_string_operators_and_isnull() {
        let contains = filter("name", FieldType::String, Operator::IContains, FilterValue::scalar("a b&c"));
        assert_eq!(build_query_fragment(&[contains]), "name__icontains=a%20b%26c");

        let null = filter("notes", FieldType::String, Operator::IsNull, FilterValue::Empty);
        assert_eq!(build_query_fragment(&[null]), "notes__isnull=true");
    }

    #[test]
    fn test_datetime_bounds_are_widened() {
        let from = filter("created", FieldType::DateTime, Operator::Gte, FilterValue::scalar("2024-01-01"));
        let until = filter("created", FieldType::DateTime, Operator::Lte, FilterValue::scalar("2024-01-31"));

        assert_eq!(encode_filter(&from).1, "2024-01-01T00%3A00%3A00");
        assert_eq!(encode_filter(&until).1, "2024-01-31T23%3A59%3A59");
    }

    #[test]
    fn test_datetime_range_and_year() {
        let range = filter("created", FieldType::DateTime, Operator::Range, FilterValue::pair("2024-01-01", "2024-01-02"));
        assert_eq!(
            build_query_fragment(&[range]),
            "created__range=2024-01-01T00%3A00%3A00;2024-01-02T23%3A59%3A59"
        );

        let year = filter("created", FieldType::DateTime, Operator::Year, FilterValue::scalar("2019"));
        assert_eq!(build_query_fragment(&[year]), "created__year=2019");
    }

    #[test]
    fn test_fragment_is_order_independent() {
        let a = filter("age", FieldType::Integer, Operator::Gt, FilterValue::scalar("3"));
        let b = filter("kind", FieldType::List, Operator::Exact, FilterValue::scalar("fast"));

        let forward = build_query_fragment(&[a.clone(), b.clone()]);
        let backward = build_query_fragment(&[b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward, "age__gt=3&kind=fast");
    }

    #[test]
    fn test_listing_url_set_preserves_other_params() {
        let mut url = ListingUrl::parse("/api/result/?order_by=-date&limit=25&offset=0&project=3");
        url.set("offset", "50");
        assert_eq!(url.to_string(), "/api/result/?order_by=-date&limit=25&offset=50&project=3");

        url.set("format", "json");
        assert_eq!(url.get("format"), Some("json"));
        assert!(url.to_string().ends_with("&format=json"));
    }

    #[test]
    fn test_set_collapses_repeated_keys() {
        let mut url = ListingUrl::parse("/api/x/?order_by=a&order_by=b");
        url.set("order_by", "c");
        assert_eq!(url.to_string(), "/api/x/?order_by=c");
    }

    #[test]
    fn test_normalize_ordering() {
        let mut url = ListingUrl::parse("/api/result/");
        normalize_ordering(&mut url, None, "-date");
        assert_eq!(url.to_string(), "/api/result/?order_by=-date");

        normalize_ordering(&mut url, None, "name");
        assert_eq!(url.get(ORDER_PARAM), Some("-date"));

        normalize_ordering(&mut url, Some("name"), "-date");
        assert_eq!(url.to_string(), "/api/result/?order_by=name");
    }

    #[test]
    fn test_merge_fragment_replaces_same_keys() {
        let mut url = ListingUrl::parse("/api/result/?age__gt=1&limit=25");
        url.merge_fragment("age__gt=5&kind=fast");
        assert_eq!(url.to_string(), "/api/result/?age__gt=5&limit=25&kind=fast");

        url.merge_fragment("");
        assert_eq!(url.params().len(), 3);
    }

    #[test]
    fn test_reserved_field_names_keep_paging_intact() {
        let limit = filter("limit", FieldType::Integer, Operator::Exact, FilterValue::scalar("5"));
        let order = filter("order_by", FieldType::List, Operator::Exact, FilterValue::scalar("fast"));
        assert_eq!(build_query_fragment(&[limit, order]), "limit__exact=5&order_by__exact=fast");

        let mut url = ListingUrl::parse("/api/result/?order_by=-date&limit=25&offset=50");
        url.merge_fragment("offset=0&limit__gt=2");
        assert_eq!(
            url.to_string(),
            "/api/result/?order_by=-date&limit=25&offset=50&offset__exact=0&limit__gt=2"
        );
    }

    #[test]
    fn test_toggle_order() {
        assert_eq!(toggle_order(None, "date"), "date");
        assert_eq!(toggle_order(Some("date"), "date"), "-date");
        assert_eq!(toggle_order(Some("-date"), "date"), "date");
        assert_eq!(toggle_order(Some("name"), "date"), "date");
    }
}
