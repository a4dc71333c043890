use serde_json::Value;
use std::cmp::Ordering;

use crate::errors::CoreError;

// ============================================================================
// Closed Query Predicate Set
// ============================================================================
//
// List endpoints accept caller-supplied filter and sort payloads. Passing
// those through to the store verbatim is an injection surface, so the only
// constructs accepted here are the ones below: equality, range, substring
// match, and logical OR. Anything else is rejected with a Validation error,
// never silently ignored.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value. Numbers compare numerically (1 == 1.0).
    Eq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    /// Case-insensitive substring match against a string field.
    Contains(String, String),
    Or(Vec<Filter>),
    And(Vec<Filter>),
}

impl Filter {
    /// Compile a caller-supplied JSON filter into the closed predicate set.
    ///
    /// Accepted shapes:
    /// - `{"field": scalar}`                      → equality
    /// - `{"field": {"$gt"|"$gte"|"$lt"|"$lte": v}}` → range
    /// - `{"field": {"$regex": "s"}}`             → substring (case-insensitive)
    /// - `{"$or": [subfilter, ...]}`              → logical or
    ///
    /// Multiple top-level fields combine with AND.
    pub fn parse(raw: &Value) -> Result<Filter, CoreError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| CoreError::validation("filter must be a JSON object"))?;

        let mut clauses = Vec::with_capacity(obj.len());
        for (field, spec) in obj {
            if field == "$or" {
                let arms = spec.as_array().ok_or_else(|| {
                    CoreError::validation("$or expects an array of sub-filters")
                })?;
                let parsed = arms
                    .iter()
                    .map(Filter::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                clauses.push(Filter::Or(parsed));
            } else if field.starts_with('$') {
                return Err(CoreError::validation(format!(
                    "unsupported filter operator '{}'",
                    field
                )));
            } else {
                clauses.push(Self::parse_field(field, spec)?);
            }
        }

        match clauses.len() {
            0 => Ok(Filter::And(vec![])),
            1 => Ok(clauses.into_iter().next().unwrap_or(Filter::And(vec![]))),
            _ => Ok(Filter::And(clauses)),
        }
    }

    fn parse_field(field: &str, spec: &Value) -> Result<Filter, CoreError> {
        match spec {
            Value::Object(ops) => {
                let mut clauses = Vec::with_capacity(ops.len());
                for (op, v) in ops {
                    let clause = match op.as_str() {
                        "$eq" => Filter::Eq(field.to_string(), v.clone()),
                        "$gt" => Filter::Gt(field.to_string(), v.clone()),
                        "$gte" => Filter::Gte(field.to_string(), v.clone()),
                        "$lt" => Filter::Lt(field.to_string(), v.clone()),
                        "$lte" => Filter::Lte(field.to_string(), v.clone()),
                        "$regex" => {
                            let needle = v.as_str().ok_or_else(|| {
                                CoreError::validation("$regex expects a string pattern")
                            })?;
                            Filter::Contains(field.to_string(), needle.to_string())
                        }
                        other => {
                            return Err(CoreError::validation(format!(
                                "unsupported filter operator '{}' on field '{}'",
                                other, field
                            )))
                        }
                    };
                    clauses.push(clause);
                }
                match clauses.len() {
                    0 => Ok(Filter::And(vec![])),
                    1 => Ok(clauses.into_iter().next().unwrap_or(Filter::And(vec![]))),
                    _ => Ok(Filter::And(clauses)),
                }
            }
            Value::Array(_) => Err(CoreError::validation(format!(
                "array values are not a valid predicate for field '{}'",
                field
            ))),
            scalar => Ok(Filter::Eq(field.to_string(), scalar.clone())),
        }
    }

    /// Evaluate the predicate against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => match path_value(doc, field) {
                Some(actual) => values_equal(actual, expected),
                None => expected.is_null(),
            },
            Filter::Gt(field, v) => cmp_field(doc, field, v) == Some(Ordering::Greater),
            Filter::Gte(field, v) => matches!(
                cmp_field(doc, field, v),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            Filter::Lt(field, v) => cmp_field(doc, field, v) == Some(Ordering::Less),
            Filter::Lte(field, v) => matches!(
                cmp_field(doc, field, v),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            Filter::Contains(field, needle) => path_value(doc, field)
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Filter::Or(arms) => arms.iter().any(|f| f.matches(doc)),
            Filter::And(arms) => arms.iter().all(|f| f.matches(doc)),
        }
    }
}

// ============================================================================
// Sort / Pagination / Projection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Parse a `{field: 1|-1|"asc"|"desc"}` map. Anything else is rejected.
pub fn parse_sort(raw: &Value) -> Result<Vec<(String, SortDir)>, CoreError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| CoreError::validation("sort must be a JSON object"))?;

    let mut spec = Vec::with_capacity(obj.len());
    for (field, dir) in obj {
        let dir = match dir {
            Value::Number(n) if n.as_i64() == Some(1) => SortDir::Asc,
            Value::Number(n) if n.as_i64() == Some(-1) => SortDir::Desc,
            Value::String(s) if s.eq_ignore_ascii_case("asc") => SortDir::Asc,
            Value::String(s) if s.eq_ignore_ascii_case("desc") => SortDir::Desc,
            other => {
                return Err(CoreError::validation(format!(
                    "invalid sort direction {} for field '{}'",
                    other, field
                )))
            }
        };
        spec.push((field.clone(), dir));
    }
    Ok(spec)
}

/// Parse a comma-separated projection: `"name,price"` keeps those fields
/// (plus `_id`) and drops everything else.
pub fn parse_projection(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A fully compiled list query, applied by the store in this order:
/// filter → sort → skip/limit → projection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<Filter>,
    pub sort: Vec<(String, SortDir)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub projection: Option<Vec<String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Apply the query to an already-materialized document set.
    pub fn apply(&self, mut docs: Vec<Value>) -> Vec<Value> {
        if let Some(filter) = &self.filter {
            docs.retain(|doc| filter.matches(doc));
        }

        if !self.sort.is_empty() {
            docs.sort_by(|a, b| {
                for (field, dir) in &self.sort {
                    let ord = cmp_optional(path_value(a, field), path_value(b, field));
                    let ord = match dir {
                        SortDir::Asc => ord,
                        SortDir::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let skip = self.skip.unwrap_or(0) as usize;
        if skip > 0 {
            docs = docs.into_iter().skip(skip).collect();
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit as usize);
        }

        if let Some(fields) = &self.projection {
            docs = docs.into_iter().map(|doc| project(doc, fields)).collect();
        }

        docs
    }
}

fn project(doc: Value, fields: &[String]) -> Value {
    match doc {
        Value::Object(map) => {
            let kept = map
                .into_iter()
                .filter(|(k, _)| k == "_id" || fields.iter().any(|f| f == k))
                .collect();
            Value::Object(kept)
        }
        other => other,
    }
}

// ============================================================================
// Update Mutations
// ============================================================================

/// Closed mutation set the store knows how to apply.
#[derive(Debug, Clone)]
pub enum UpdateOp {
    /// Replace (or create) a top-level field.
    Set(String, Value),
    /// Add a signed delta to an integer field (missing field counts as 0).
    Inc(String, i64),
    /// Append to an array field (missing field becomes a one-element array).
    Push(String, Value),
}

impl UpdateOp {
    pub fn set(field: impl Into<String>, value: Value) -> Self {
        UpdateOp::Set(field.into(), value)
    }

    pub fn inc(field: impl Into<String>, delta: i64) -> Self {
        UpdateOp::Inc(field.into(), delta)
    }

    pub fn push(field: impl Into<String>, value: Value) -> Self {
        UpdateOp::Push(field.into(), value)
    }

    /// Apply a batch of ops to one document in place.
    pub fn apply_all(doc: &mut Value, ops: &[UpdateOp]) {
        let Some(map) = doc.as_object_mut() else {
            return;
        };
        for op in ops {
            match op {
                UpdateOp::Set(field, value) => {
                    map.insert(field.clone(), value.clone());
                }
                UpdateOp::Inc(field, delta) => {
                    let current = map.get(field).and_then(Value::as_i64).unwrap_or(0);
                    map.insert(field.clone(), Value::from(current + delta));
                }
                UpdateOp::Push(field, value) => {
                    match map.get_mut(field).and_then(Value::as_array_mut) {
                        Some(arr) => arr.push(value.clone()),
                        None => {
                            map.insert(field.clone(), Value::Array(vec![value.clone()]));
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Value Helpers
// ============================================================================

/// Resolve a dotted path (`"payment_details.method"`) inside a document.
pub fn path_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn cmp_field(doc: &Value, field: &str, against: &Value) -> Option<Ordering> {
    cmp_values(path_value(doc, field)?, against)
}

fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Missing fields sort before present ones.
fn cmp_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => cmp_values(x, y).unwrap_or(Ordering::Equal),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
