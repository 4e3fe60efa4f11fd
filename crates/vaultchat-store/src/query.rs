//! Collection queries with equality/range predicates.
//!
//! Both store implementations evaluate predicates here, in Rust, so they
//! rank and filter results identically. Missing fields never match a
//! filter; for ordering they sort as JSON null.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{Document, StoredDocument};

#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    Ge(String, Value),
    Le(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn filter_ge(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ge(field.into(), value.into()));
        self
    }

    pub fn filter_le(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Le(field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// True when every filter accepts the document.
pub fn matches(body: &Document, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let (field, want, accept): (&str, &Value, fn(Ordering) -> bool) = match filter {
            Filter::Eq(f, v) => (f, v, Ordering::is_eq),
            Filter::Ge(f, v) => (f, v, Ordering::is_ge),
            Filter::Le(f, v) => (f, v, Ordering::is_le),
        };
        match body.get(field) {
            Some(have) => cmp_values(have, want).map(accept).unwrap_or(false),
            None => false,
        }
    })
}

/// Apply the query's ordering and limit in place. Ties (and queries with
/// no explicit ordering) fall back to the document id so both backends
/// return a stable, identical order.
pub fn sort_and_truncate(docs: &mut Vec<StoredDocument>, query: &Query) {
    if let Some((field, direction)) = &query.order_by {
        docs.sort_by(|a, b| {
            let av = a.body.get(field).unwrap_or(&Value::Null);
            let bv = b.body.get(field).unwrap_or(&Value::Null);
            let ord = cmp_values(av, bv).unwrap_or(Ordering::Equal);
            let ord = match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
            ord.then_with(|| a.id.cmp(&b.id))
        });
    } else {
        docs.sort_by(|a, b| a.id.cmp(&b.id));
    }

    if let Some(limit) = query.limit {
        docs.truncate(limit);
    }
}

/// Total order within a JSON type; values of different types do not
/// compare (a filter on them simply rejects the document).
fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => Some(xi.cmp(&yi)),
            _ => x.as_f64().zip(y.as_f64()).and_then(|(xf, yf)| xf.partial_cmp(&yf)),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
