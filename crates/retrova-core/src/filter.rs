use serde_json::Value;

use crate::error::{RetrovaError, RetrovaResult};
use crate::types::Payload;

/// Comparison operator inside a [`Filter::Compare`] leaf.
///
/// The operator set is intentionally narrow: payload fields are opaque tags,
/// not typed columns, so only equality and inequality are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Structural equality against the comparison value.
    Eq,
    /// Structural inequality against the comparison value.
    Ne,
}

/// A boolean filter expression over point payloads.
///
/// Parsed once into this typed tree and then evaluated by recursive descent;
/// malformed expressions fail with
/// [`InvalidFilter`](RetrovaError::InvalidFilter) before any query work is
/// done.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// All children must match. `And([])` is vacuously true.
    And(Vec<Filter>),
    /// At least one child must match. `Or([])` is vacuously false.
    Or(Vec<Filter>),
    /// Compare the payload value at a top-level key against a string value.
    Compare {
        /// Top-level payload key. No nested path syntax.
        field: String,
        /// The comparison operator.
        op: CompareOp,
        /// The value to compare against, as a JSON string.
        value: String,
    },
}

impl Filter {
    /// Convenience constructor for an equality comparison.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// Convenience constructor for an inequality comparison.
    pub fn ne(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Compare {
            field: field.into(),
            op: CompareOp::Ne,
            value: value.into(),
        }
    }

    /// Parses the wire form of the filter DSL into a typed tree.
    ///
    /// Accepted shapes:
    /// - `{"$and": [<filter>, ...]}`
    /// - `{"$or": [<filter>, ...]}`
    /// - `{"<field>": {"$eq": "<string>"}}` / `{"<field>": {"$ne": "<string>"}}`
    ///
    /// Unsupported operators and non-string comparison values are hard
    /// errors, not ignored.
    pub fn parse(value: &Value) -> RetrovaResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| RetrovaError::InvalidFilter("filter must be an object".into()))?;
        let (key, inner) = obj
            .iter()
            .next_back()
            .ok_or_else(|| RetrovaError::InvalidFilter("empty filter object".into()))?;

        match key.as_str() {
            "$and" => Ok(Filter::And(Self::parse_children(inner)?)),
            "$or" => Ok(Filter::Or(Self::parse_children(inner)?)),
            field => {
                let cmp = inner.as_object().ok_or_else(|| {
                    RetrovaError::InvalidFilter(format!(
                        "comparison for field '{field}' must be an object"
                    ))
                })?;
                let (op_key, op_value) = cmp.iter().next_back().ok_or_else(|| {
                    RetrovaError::InvalidFilter(format!("empty comparison for field '{field}'"))
                })?;
                let op = match op_key.as_str() {
                    "$eq" => CompareOp::Eq,
                    "$ne" => CompareOp::Ne,
                    other => {
                        return Err(RetrovaError::InvalidFilter(format!(
                            "unsupported operator '{other}'"
                        )))
                    }
                };
                let value = op_value
                    .as_str()
                    .ok_or_else(|| {
                        RetrovaError::InvalidFilter("comparison value must be a string".into())
                    })?
                    .to_string();
                Ok(Filter::Compare {
                    field: field.to_string(),
                    op,
                    value,
                })
            }
        }
    }

    fn parse_children(value: &Value) -> RetrovaResult<Vec<Filter>> {
        let items = value
            .as_array()
            .ok_or_else(|| RetrovaError::InvalidFilter("$and/$or expects an array".into()))?;
        items.iter().map(Self::parse).collect()
    }

    /// Evaluates the expression against a payload.
    ///
    /// `Compare` looks up the top-level key and compares the stored JSON
    /// value structurally against the string value. A missing key makes `Eq`
    /// false and `Ne` true, keeping the two operators exact complements.
    pub fn matches(&self, payload: &Payload) -> RetrovaResult<bool> {
        match self {
            Filter::And(children) => {
                for child in children {
                    if !child.matches(payload)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(children) => {
                for child in children {
                    if child.matches(payload)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::Compare { field, op, value } => {
                let equal = match payload.get(field) {
                    Some(stored) => *stored == Value::String(value.clone()),
                    None => false,
                };
                Ok(match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                })
            }
        }
    }
}
