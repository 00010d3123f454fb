//! Uniform response shape returned to every caller.
//!
//! A completed exchange - whatever its status - normalizes into an
//! [`HttpResponse`]. `success` is computed from the status; the body lands
//! in `data` for successful responses and in `error` otherwise, so a non-2xx
//! status is never an exception path.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ValidationError;
use crate::transport::TransportResponse;

/// A decoded response body.
///
/// The content type of the wire response picks the variant: JSON content
/// types are decoded into [`Value`], textual ones into [`String`], anything
/// else is kept as raw bytes. A JSON body that fails to parse degrades to
/// text rather than failing the request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl ResponseBody {
    pub(crate) fn decode(content_type: Option<&str>, body: Bytes) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        let content_type = content_type.unwrap_or("");
        if content_type.contains("json") {
            if let Ok(value) = serde_json::from_slice(&body) {
                return Some(Self::Json(value));
            }
        }
        if content_type.contains("json") || content_type.starts_with("text/") {
            if let Ok(text) = String::from_utf8(body.to_vec()) {
                return Some(Self::Text(text));
            }
        }
        Some(Self::Bytes(body))
    }

    /// Borrows the decoded JSON value, if this body is JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Borrows the body text, if this body is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserializes a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        match self {
            Self::Json(value) => {
                serde_json::from_value(value.clone()).map_err(ValidationError::JsonDecode)
            }
            Self::Text(text) => {
                serde_json::from_str(text).map_err(ValidationError::JsonDecode)
            }
            Self::Bytes(bytes) => {
                serde_json::from_slice(bytes).map_err(ValidationError::JsonDecode)
            }
        }
    }
}

/// The uniform response contract.
///
/// Invariants, by construction: `success` ⇔ `200 <= status < 300`, and
/// `error` is `None` iff `success` is true. `headers` is a flattened,
/// lowercase-keyed mapping; duplicate wire headers are joined with `", "`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub success: bool,
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    /// Decoded body of a successful response.
    pub data: Option<ResponseBody>,
    /// Decoded body of a failed response; falls back to the status text when
    /// the wire body is empty, keeping the `error`/`success` invariant tight.
    pub error: Option<ResponseBody>,
}

pub(crate) fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat: HashMap<String, String> = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        flat.entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    flat
}

impl HttpResponse {
    /// Normalizes a raw transport response.
    pub(crate) fn from_transport(response: TransportResponse) -> Self {
        let success = (200..300).contains(&response.status);
        let status_text = response
            .status_text
            .clone()
            .or_else(|| {
                StatusCode::from_u16(response.status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        let content_type = response
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = ResponseBody::decode(content_type.as_deref(), response.body);

        let (data, error) = if success {
            (body, None)
        } else {
            let error = body.or_else(|| Some(ResponseBody::Text(status_text.clone())));
            (None, error)
        };

        Self {
            success,
            status: response.status,
            status_text,
            headers: flatten_headers(&response.headers),
            data,
            error,
        }
    }

    /// Deserializes the `data` body into `T`.
    ///
    /// ## Errors
    ///
    /// [`ValidationError::EmptyBody`] when there is no data body,
    /// [`ValidationError::JsonDecode`] when it does not deserialize.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        self.data
            .as_ref()
            .ok_or(ValidationError::EmptyBody)?
            .json()
    }
}
