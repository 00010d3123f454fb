//! Header merging with defined precedence.
//!
//! Sources, later overriding earlier by case-insensitive key:
//! instance defaults, one-shot global extras, resolved auth header,
//! per-call headers. Key identity comes for free from `HeaderMap`.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use crate::error::ValidationError;

/// Converts a per-call string map into a `HeaderMap`, validating names and
/// values.
pub(crate) fn header_map_from_pairs(
    pairs: &HashMap<String, String>,
) -> Result<HeaderMap, ValidationError> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|_| ValidationError::InvalidHeaderName(name.clone()))?;
        let header_value = HeaderValue::try_from(value.as_str())
            .map_err(|_| ValidationError::InvalidHeaderValue { name: name.clone() })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Merges all header sources for one request.
///
/// When the body is multipart, the transport owns `Content-Type` (it carries
/// the boundary); defaults, extras, and auth must not override it, so their
/// `Content-Type` entries are dropped. An explicit per-call `Content-Type`
/// still wins.
pub(crate) fn merge_headers(
    defaults: &HeaderMap,
    extras: Option<HeaderMap>,
    auth: Option<(HeaderName, HeaderValue)>,
    per_call: &HeaderMap,
    multipart: bool,
) -> HeaderMap {
    let mut merged = defaults.clone();
    if let Some(extras) = extras {
        for (name, value) in &extras {
            merged.insert(name.clone(), value.clone());
        }
    }
    if let Some((name, value)) = auth {
        merged.insert(name, value);
    }
    if multipart {
        merged.remove(CONTENT_TYPE);
    }
    for (name, value) in per_call {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
