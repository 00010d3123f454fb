//! Per-call request options.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::method::RestMethod;
use crate::query::Query;

/// Everything describing one logical request.
///
/// Created fresh per call, then assembled by the pipeline (URL resolution,
/// header merging) before being handed to the request interceptors, which
/// may return a modified copy. `url` starts out as a `{name}` template and
/// holds the fully-resolved URL by the time interceptors see it.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: RestMethod,
    /// URL template (`{name}` placeholders), or an absolute URL.
    pub url: String,
    /// Path parameters for template interpolation.
    pub params: HashMap<String, String>,
    /// Query in any of the accepted shapes.
    pub query: Option<Query>,
    /// Per-call headers; override every other header source.
    pub headers: HashMap<String, String>,
    /// JSON body payload, for methods that carry one.
    pub body: Option<Value>,
    /// Cooperative cancellation token, observed by the transport.
    pub cancel: Option<CancellationToken>,
    /// Per-call timeout override.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: RestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: HashMap::new(),
            query: None,
            headers: HashMap::new(),
            body: None,
            cancel: None,
            timeout: None,
        }
    }

    /// Adds one path parameter for `{name}` interpolation.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Adds one per-call header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
