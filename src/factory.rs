//! Declarative endpoint maps and bound request callables.
//!
//! A nested endpoint map flattens into dotted keys
//! (`{a: {b: "/x"}}` → `"a.b"`). A factory built over such a map produces
//! [`BoundCall`]s: one dotted key plus one HTTP method, invoked with
//! builder-style arguments. Maps come in two forms - flattened once up
//! front, or produced lazily and re-flattened on every call so registries
//! populated after factory creation stay visible.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::error::{ApiError, ConfigError};
use crate::method::RestMethod;
use crate::query::Query;
use crate::request::RequestOptions;
use crate::response::HttpResponse;
use crate::upload::{ProgressCallback, UploadFile, UploadOptions, UploadProgress};

/// A nested endpoint map: each segment names either a URL template or a
/// subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointTree {
    Template(String),
    Nested(Vec<(String, EndpointTree)>),
}

impl EndpointTree {
    /// Flattens to dotted keys.
    pub fn flatten(&self) -> HashMap<String, String> {
        let mut flat = HashMap::new();
        self.walk("", &mut flat);
        flat
    }

    fn walk(&self, prefix: &str, flat: &mut HashMap<String, String>) {
        match self {
            Self::Template(template) => {
                flat.insert(prefix.to_string(), template.clone());
            }
            Self::Nested(children) => {
                for (segment, child) in children {
                    let key = if prefix.is_empty() {
                        segment.clone()
                    } else {
                        format!("{prefix}.{segment}")
                    };
                    child.walk(&key, flat);
                }
            }
        }
    }

    fn from_value(value: &Value, key: &str) -> Result<Self, ConfigError> {
        match value {
            Value::String(template) => Ok(Self::Template(template.clone())),
            Value::Object(map) => {
                let mut children = Vec::with_capacity(map.len());
                for (segment, child) in map {
                    let child_key = if key.is_empty() {
                        segment.clone()
                    } else {
                        format!("{key}.{segment}")
                    };
                    children.push((segment.clone(), Self::from_value(child, &child_key)?));
                }
                Ok(Self::Nested(children))
            }
            _ => Err(ConfigError::InvalidEndpointMap {
                key: key.to_string(),
            }),
        }
    }
}

impl TryFrom<&Value> for EndpointTree {
    type Error = ConfigError;

    /// Converts a JSON value of nested objects and template strings.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_value(value, "")
    }
}

impl TryFrom<Value> for EndpointTree {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value, "")
    }
}

/// The endpoint registry backing a factory.
///
/// `Static` flattens once at construction; `Lazy` re-flattens the produced
/// tree on every lookup, which is the load-bearing difference - a lazy map
/// sees registrations made after the factory was created.
#[derive(Clone)]
pub enum Endpoints {
    Static(HashMap<String, String>),
    Lazy(Arc<dyn Fn() -> EndpointTree + Send + Sync>),
}

impl Endpoints {
    /// Flattens `tree` once, up front.
    pub fn fixed(tree: EndpointTree) -> Self {
        Self::Static(tree.flatten())
    }

    /// Defers to `producer`, re-flattening on every call.
    pub fn lazy(producer: impl Fn() -> EndpointTree + Send + Sync + 'static) -> Self {
        Self::Lazy(Arc::new(producer))
    }

    fn lookup(&self, key: &str) -> Result<String, ConfigError> {
        let template = match self {
            Self::Static(flat) => flat.get(key).cloned(),
            Self::Lazy(producer) => producer().flatten().get(key).cloned(),
        };
        template.ok_or_else(|| ConfigError::UnknownEndpoint(key.to_string()))
    }
}

impl fmt::Debug for Endpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(flat) => f.debug_tuple("Static").field(&flat.len()).finish(),
            Self::Lazy(_) => f.debug_tuple("Lazy").finish(),
        }
    }
}

/// Produces bound callables over an endpoint registry.
#[derive(Clone)]
pub struct ApiFactory {
    client: Arc<ApiClient>,
    endpoints: Arc<Endpoints>,
}

impl ApiFactory {
    pub fn new(client: Arc<ApiClient>, endpoints: Endpoints) -> Self {
        Self {
            client,
            endpoints: Arc::new(endpoints),
        }
    }

    /// Convenience constructor from a JSON endpoint map (static form).
    pub fn from_json(client: Arc<ApiClient>, map: &Value) -> Result<Self, ApiError> {
        let tree = EndpointTree::try_from(map)?;
        Ok(Self::new(client, Endpoints::fixed(tree)))
    }

    /// Binds a dotted key and method into a callable.
    ///
    /// The key is looked up when the call is sent, not here: lazy maps
    /// cannot be validated eagerly, so an unknown key surfaces as
    /// [`ConfigError::UnknownEndpoint`] at call time.
    pub fn bind(&self, key: impl Into<String>, method: RestMethod) -> BoundCall {
        BoundCall {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            key: key.into(),
            method,
            params: HashMap::new(),
            query: None,
            body: None,
            headers: HashMap::new(),
            cancel: None,
            timeout: None,
            files: Vec::new(),
            field_name: String::new(),
            fields: Vec::new(),
            on_progress: None,
        }
    }
}

impl fmt::Debug for ApiFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiFactory")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// One invocable endpoint: dotted key + method + call arguments.
///
/// Attach arguments builder-style, then [`send`](Self::send). Attaching
/// files routes the call through the upload coordinator instead of the
/// plain pipeline.
pub struct BoundCall {
    client: Arc<ApiClient>,
    endpoints: Arc<Endpoints>,
    key: String,
    method: RestMethod,
    params: HashMap<String, String>,
    query: Option<Query>,
    body: Option<Value>,
    headers: HashMap<String, String>,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
    files: Vec<UploadFile>,
    field_name: String,
    fields: Vec<(String, String)>,
    on_progress: Option<ProgressCallback>,
}

impl BoundCall {
    /// Adds one path parameter for `{name}` interpolation.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
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

    /// Attaches a file; the call becomes a multipart upload.
    pub fn file(mut self, file: UploadFile) -> Self {
        self.files.push(file);
        self
    }

    /// Multipart field name for attached files.
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Auxiliary scalar multipart field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn on_progress(
        mut self,
        callback: impl Fn(UploadProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Looks up the dotted key and executes the call.
    pub async fn send(self) -> Result<HttpResponse, ApiError> {
        let template = self.endpoints.lookup(&self.key)?;

        if !self.files.is_empty() {
            let options = UploadOptions {
                field_name: self.field_name,
                fields: self.fields,
                params: self.params,
                query: self.query,
                headers: self.headers,
                on_progress: self.on_progress,
                cancel: self.cancel,
                timeout: self.timeout,
            };
            return self.client.upload(template, self.files, options).await;
        }

        let mut options = RequestOptions::new(self.method, template);
        options.params = self.params;
        options.query = self.query;
        options.headers = self.headers;
        options.body = self.body;
        options.cancel = self.cancel;
        options.timeout = self.timeout;
        self.client.request(options).await
    }
}
