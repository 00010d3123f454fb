//! Query-string shapes and canonical serialization.
//!
//! Four input shapes are accepted and normalized to one canonical
//! `application/x-www-form-urlencoded` string:
//!
//! 1. an ordered mapping of key to scalar-or-sequence ([`Query::Map`]);
//! 2. an ordered sequence of (key, value) pairs, duplicates preserved
//!    ([`Query::Pairs`]);
//! 3. a pre-built [`url::Url`]'s query pairs in iteration order
//!    ([`Query::from_url`]);
//! 4. a raw string, used verbatim after stripping a leading `?`
//!    ([`Query::Raw`]).
//!
//! [`Query::try_from`] on a [`serde_json::Value`] is the validation
//! predicate: `null`, arrays of non-pair shape, and non-object/non-string
//! values are rejected with a [`ValidationError`] before any network
//! activity.

use serde_json::Value;
use url::form_urlencoded;
use url::Url;

use crate::error::ValidationError;

/// One value slot in the mapping shape: a scalar or a sequence of scalars.
///
/// Sequence values repeat the key once per element when serialized
/// (`tags=a&tags=b`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    fn append_to(&self, key: &str, serializer: &mut form_urlencoded::Serializer<'_, String>) {
        match self {
            Self::Single(v) => {
                serializer.append_pair(key, v);
            }
            Self::Many(vs) => {
                for v in vs {
                    serializer.append_pair(key, v);
                }
            }
        }
    }
}

impl QueryValue {
    /// Single scalar value.
    pub fn single(value: impl ToString) -> Self {
        Self::Single(value.to_string())
    }

    /// Sequence of scalar values, serialized as a repeated key.
    pub fn many<T: ToString>(values: impl IntoIterator<Item = T>) -> Self {
        Self::Many(values.into_iter().map(|v| v.to_string()).collect())
    }
}

/// A query in one of the accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Ordered mapping; each entry becomes one or more `key=value` pairs.
    Map(Vec<(String, QueryValue)>),
    /// Ordered pairs; duplicate keys preserved in declaration order.
    Pairs(Vec<(String, String)>),
    /// Already-serialized query string, used verbatim (leading `?` stripped).
    Raw(String),
}

impl Query {
    /// Extracts the query pairs of a pre-built URL, in iteration order.
    pub fn from_url(url: &Url) -> Self {
        Self::Pairs(
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// Serializes to the canonical query string (no leading `?`).
    ///
    /// All shapes encoding the same logical pairs in the same order yield
    /// the same output.
    pub fn serialize(&self) -> String {
        match self {
            Self::Raw(s) => s.strip_prefix('?').unwrap_or(s).to_string(),
            Self::Pairs(pairs) => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (k, v) in pairs {
                    serializer.append_pair(k, v);
                }
                serializer.finish()
            }
            Self::Map(entries) => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (k, v) in entries {
                    v.append_to(k, &mut serializer);
                }
                serializer.finish()
            }
        }
    }

    /// Returns `true` when serialization would produce an empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Raw(s) => s.strip_prefix('?').unwrap_or(s).is_empty(),
            Self::Pairs(pairs) => pairs.is_empty(),
            Self::Map(entries) => entries.is_empty(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl TryFrom<&Value> for Query {
    type Error = ValidationError;

    /// Validates and converts a JSON value into a query.
    ///
    /// Accepted: objects (mapping shape, entries in declaration order),
    /// arrays of `[key, value]` pairs, and strings (raw shape).
    /// Rejected: `null`, arrays of any other shape, and every other JSON
    /// type.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Err(ValidationError::NullQuery),
            Value::String(s) => Ok(Self::Raw(s.clone())),
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, v) in map {
                    let qv = match v {
                        Value::Array(items) => {
                            let mut scalars = Vec::with_capacity(items.len());
                            for item in items {
                                scalars.push(scalar_to_string(item).ok_or_else(|| {
                                    ValidationError::NonScalarQueryValue { key: key.clone() }
                                })?);
                            }
                            QueryValue::Many(scalars)
                        }
                        other => QueryValue::Single(scalar_to_string(other).ok_or_else(
                            || ValidationError::NonScalarQueryValue { key: key.clone() },
                        )?),
                    };
                    entries.push((key.clone(), qv));
                }
                Ok(Self::Map(entries))
            }
            Value::Array(items) => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    let Value::Array(pair) = item else {
                        return Err(ValidationError::NonPairArray);
                    };
                    if pair.len() != 2 {
                        return Err(ValidationError::NonPairArray);
                    }
                    let key =
                        scalar_to_string(&pair[0]).ok_or(ValidationError::NonPairArray)?;
                    let value =
                        scalar_to_string(&pair[1]).ok_or(ValidationError::NonPairArray)?;
                    pairs.push((key, value));
                }
                Ok(Self::Pairs(pairs))
            }
            Value::Bool(_) => Err(ValidationError::UnsupportedQueryShape("boolean")),
            Value::Number(_) => Err(ValidationError::UnsupportedQueryShape("number")),
        }
    }
}

impl TryFrom<Value> for Query {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}
