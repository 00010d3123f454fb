//! Request pipeline orchestration.
//!
//! [`ApiClient`] assembles per-call options into a dispatchable request
//! (URL resolution, auth lookup, header merging), threads them through the
//! registered request interceptors, dispatches via the configured transport,
//! and normalizes the outcome: completed exchanges become [`HttpResponse`]s
//! (run through response interceptors), transport failures run the error
//! interceptors, which may recover with a substitute response.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use tracing::{instrument, Span};
use url::Url;

use crate::auth::{AuthConfig, TokenStore};
use crate::error::{ApiError, ConfigError, TransportError, ValidationError};
use crate::headers::{header_map_from_pairs, merge_headers};
use crate::interceptor::{
    run_error_chain, run_request_chain, run_response_chain, InterceptorSet,
};
use crate::method::RestMethod;
use crate::query::Query;
use crate::request::RequestOptions;
use crate::response::{flatten_headers, HttpResponse};
use crate::scope::GlobalScope;
use crate::template::{interpolate, is_absolute};
use crate::transport::{
    ProgressTransport, ReqwestTransport, Transport, TransportRequest,
};
use crate::upload::{build_payload, UploadFile, UploadOptions};

/// Builder for configuring an [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    auth: AuthConfig,
    timeout: Option<Duration>,
    global: Option<GlobalScope>,
    transport: Option<Arc<dyn Transport>>,
    progress_transport: Option<Arc<dyn ProgressTransport>>,
}

impl ApiClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            auth: AuthConfig::default(),
            timeout: None,
            global: None,
            transport: None,
            progress_transport: None,
        }
    }

    /// Sets the base URL prefixed to every relative template.
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Parses and sets the base URL.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the string does not parse.
    pub fn base_url_str(self, url: &str) -> Result<Self, ApiError> {
        let parsed = Url::parse(url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(self.base_url(parsed))
    }

    /// Reads the base URL from an environment variable; an unset variable
    /// leaves the builder unchanged, a set-but-invalid one is an error.
    pub fn base_url_from_env(self, var: &str) -> Result<Self, ApiError> {
        match std::env::var(var) {
            Ok(raw) => self.base_url_str(&raw),
            Err(_) => Ok(self),
        }
    }

    /// Adds a default header sent with every request.
    ///
    /// ## Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, ApiError> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|_| ValidationError::InvalidHeaderName(name.as_ref().to_string()))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|_| ValidationError::InvalidHeaderValue {
                name: name.as_str().to_string(),
            })?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the authentication configuration.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Appends a token store to the probe order.
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.auth.stores.push(store);
        self
    }

    /// Sets the default request timeout (per-call options override it).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Shares an existing global scope (interceptors, one-shot headers)
    /// with this client. A fresh scope is created otherwise.
    pub fn global_scope(mut self, scope: GlobalScope) -> Self {
        self.global = Some(scope);
        self
    }

    /// Replaces the plain transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the progress-capable upload transport.
    pub fn progress_transport(mut self, transport: Arc<dyn ProgressTransport>) -> Self {
        self.progress_transport = Some(transport);
        self
    }

    /// Builds the [`ApiClient`].
    pub fn build(self) -> ApiClient {
        let default = Arc::new(ReqwestTransport::new());
        ApiClient {
            base_url: self.base_url,
            default_headers: self.default_headers,
            auth: self.auth,
            timeout: self.timeout,
            global: self.global.unwrap_or_default(),
            instance: InterceptorSet::new(),
            transport: self.transport.unwrap_or_else(|| default.clone()),
            progress_transport: self
                .progress_transport
                .unwrap_or_else(|| default.clone()),
        }
    }
}

/// Async HTTP client with a uniform request/response contract.
///
/// Every call resolves to an [`HttpResponse`] (any status, `success`
/// computed from it) or an [`ApiError`] (validation/transport/config) - two
/// distinct failure channels.
pub struct ApiClient {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    auth: AuthConfig,
    timeout: Option<Duration>,
    global: GlobalScope,
    instance: InterceptorSet,
    transport: Arc<dyn Transport>,
    progress_transport: Arc<dyn ProgressTransport>,
}

impl ApiClient {
    /// Creates a new builder.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Creates a client with default settings and no base URL.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// The global scope shared by this client (and any clients built with
    /// the same scope).
    pub fn global_scope(&self) -> &GlobalScope {
        &self.global
    }

    /// Instance-scope interceptors. Global-scope handlers (registered on
    /// [`GlobalScope::interceptors`]) run first, then these.
    pub fn interceptors(&self) -> &InterceptorSet {
        &self.instance
    }

    /// Executes one logical request through the full pipeline.
    #[instrument(
        name = "api_request",
        skip(self, options),
        fields(
            http.method = %options.method,
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
            otel.kind = "client",
            otel.status_code = tracing::field::Empty,
        )
    )]
    pub async fn request(&self, options: RequestOptions) -> Result<HttpResponse, ApiError> {
        let assembled = match self.assemble(options, false).await {
            Ok(assembled) => assembled,
            Err(error) => {
                Span::current().record("otel.status_code", "ERROR");
                return Err(error);
            }
        };
        let assembled =
            run_request_chain([self.global.interceptors(), &self.instance], assembled).await;
        Span::current().record("http.url", assembled.url.as_str());

        let transport_request = self.to_transport_request(&assembled)?;
        match self.transport.send(transport_request).await {
            Ok(raw) => {
                Span::current().record("http.status_code", raw.status);
                let response = HttpResponse::from_transport(raw);
                Span::current().record(
                    "otel.status_code",
                    if response.status >= 500 { "ERROR" } else { "OK" },
                );
                Ok(run_response_chain(
                    [self.global.interceptors(), &self.instance],
                    response,
                )
                .await)
            }
            Err(error) => {
                Span::current().record("otel.status_code", "ERROR");
                self.recover(error.into(), &assembled).await
            }
        }
    }

    /// Sends a multipart upload through the progress-capable transport.
    ///
    /// Follows the same interceptor and normalization contract as
    /// [`request`](Self::request); the transport invokes
    /// `options.on_progress` with non-decreasing `loaded` and one terminal
    /// `loaded == total` call on success.
    #[instrument(
        name = "api_upload",
        skip(self, url, files, options),
        fields(
            http.method = "POST",
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
            otel.kind = "client",
            otel.status_code = tracing::field::Empty,
        )
    )]
    pub async fn upload(
        &self,
        url: impl Into<String>,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> Result<HttpResponse, ApiError> {
        let payload = build_payload(files, &options);

        let mut request_options = RequestOptions::new(RestMethod::Post, url);
        request_options.params = options.params.clone();
        request_options.query = options.query.clone();
        request_options.headers = options.headers.clone();
        request_options.cancel = options.cancel.clone();
        request_options.timeout = options.timeout;

        let assembled = self.assemble(request_options, true).await?;
        let assembled =
            run_request_chain([self.global.interceptors(), &self.instance], assembled).await;
        Span::current().record("http.url", assembled.url.as_str());

        let transport_request = self.to_transport_request(&assembled)?;
        match self
            .progress_transport
            .send_multipart(transport_request, payload, options.on_progress.clone())
            .await
        {
            Ok(raw) => {
                Span::current().record("http.status_code", raw.status);
                let response = HttpResponse::from_transport(raw);
                Span::current().record(
                    "otel.status_code",
                    if response.status >= 500 { "ERROR" } else { "OK" },
                );
                Ok(run_response_chain(
                    [self.global.interceptors(), &self.instance],
                    response,
                )
                .await)
            }
            Err(error) => {
                Span::current().record("otel.status_code", "ERROR");
                self.recover(error.into(), &assembled).await
            }
        }
    }

    /// GET request; payload goes in the query slot.
    pub async fn get(
        &self,
        url: impl Into<String>,
        query: Option<Query>,
    ) -> Result<HttpResponse, ApiError> {
        let mut options = RequestOptions::new(RestMethod::Get, url);
        options.query = query;
        self.request(options).await
    }

    /// HEAD request; payload goes in the query slot.
    pub async fn head(
        &self,
        url: impl Into<String>,
        query: Option<Query>,
    ) -> Result<HttpResponse, ApiError> {
        let mut options = RequestOptions::new(RestMethod::Head, url);
        options.query = query;
        self.request(options).await
    }

    /// OPTIONS request; payload goes in the query slot.
    pub async fn options(
        &self,
        url: impl Into<String>,
        query: Option<Query>,
    ) -> Result<HttpResponse, ApiError> {
        let mut options = RequestOptions::new(RestMethod::Options, url);
        options.query = query;
        self.request(options).await
    }

    /// DELETE request; payload goes in the query slot.
    pub async fn delete(
        &self,
        url: impl Into<String>,
        query: Option<Query>,
    ) -> Result<HttpResponse, ApiError> {
        let mut options = RequestOptions::new(RestMethod::Delete, url);
        options.query = query;
        self.request(options).await
    }

    /// POST request; payload goes in the body slot.
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: Option<Value>,
    ) -> Result<HttpResponse, ApiError> {
        let mut options = RequestOptions::new(RestMethod::Post, url);
        options.body = body;
        self.request(options).await
    }

    /// PUT request; payload goes in the body slot.
    pub async fn put(
        &self,
        url: impl Into<String>,
        body: Option<Value>,
    ) -> Result<HttpResponse, ApiError> {
        let mut options = RequestOptions::new(RestMethod::Put, url);
        options.body = body;
        self.request(options).await
    }

    /// PATCH request; payload goes in the body slot.
    pub async fn patch(
        &self,
        url: impl Into<String>,
        body: Option<Value>,
    ) -> Result<HttpResponse, ApiError> {
        let mut options = RequestOptions::new(RestMethod::Patch, url);
        options.body = body;
        self.request(options).await
    }

    /// Resolves the URL, looks up auth, and merges headers. After this step
    /// `options.url` is the final URL and `options.headers` the merged set;
    /// params and query have been consumed.
    async fn assemble(
        &self,
        options: RequestOptions,
        multipart: bool,
    ) -> Result<RequestOptions, ApiError> {
        let per_call = header_map_from_pairs(&options.headers)?;
        let path = interpolate(&options.url, &options.params);
        let url = self.resolve_url(&path, options.query.as_ref())?;

        let auth = self.auth.resolve_header().await;
        let extras = self.global.take_next_request_headers();
        let merged = merge_headers(&self.default_headers, extras, auth, &per_call, multipart);

        let mut assembled = options;
        assembled.url = url.into();
        assembled.params.clear();
        assembled.query = None;
        assembled.headers = flatten_headers(&merged);
        Ok(assembled)
    }

    fn resolve_url(&self, path: &str, query: Option<&Query>) -> Result<Url, ApiError> {
        let mut url = if is_absolute(path) {
            Url::parse(path).map_err(|source| TransportError::InvalidUrl {
                url: path.to_string(),
                source,
            })?
        } else {
            let base = self
                .base_url
                .as_ref()
                .ok_or_else(|| ConfigError::MissingBaseUrl {
                    template: path.to_string(),
                })?;
            // The base URL's own path is a prefix, so plain RFC 3986 join
            // semantics (which replace it for `/`-rooted templates) do not
            // apply. Concatenate the paths and resolve against the origin.
            let combined = format!(
                "{}/{}",
                base.path().trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            base.join(&combined)
                .map_err(|source| TransportError::InvalidUrl {
                    url: path.to_string(),
                    source,
                })?
        };

        if let Some(query) = query {
            let serialized = query.serialize();
            if !serialized.is_empty() {
                match url.query() {
                    Some(existing) if !existing.is_empty() => {
                        let combined = format!("{existing}&{serialized}");
                        url.set_query(Some(&combined));
                    }
                    _ => url.set_query(Some(&serialized)),
                }
            }
        }
        Ok(url)
    }

    /// Final conversion for dispatch. Interceptors may have replaced the
    /// options wholesale, so the URL and headers are re-validated here.
    fn to_transport_request(
        &self,
        options: &RequestOptions,
    ) -> Result<TransportRequest, ApiError> {
        let url = Url::parse(&options.url).map_err(|source| TransportError::InvalidUrl {
            url: options.url.clone(),
            source,
        })?;
        let mut headers = header_map_from_pairs(&options.headers)?;
        let body = match &options.body {
            Some(value) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(Bytes::from(
                    serde_json::to_vec(value).map_err(TransportError::BodyEncode)?,
                ))
            }
            None => None,
        };
        Ok(TransportRequest {
            method: options.method,
            url,
            headers,
            body,
            timeout: options.timeout.or(self.timeout),
            cancel: options.cancel.clone(),
        })
    }

    async fn recover(
        &self,
        error: ApiError,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        match run_error_chain(
            [self.global.interceptors(), &self.instance],
            &error,
            options,
        )
        .await
        {
            Some(recovered) => Ok(recovered),
            None => Err(error),
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::interceptor::{ErrorInterceptor, RequestInterceptor, ResponseInterceptor};
    use crate::query::QueryValue;
    use crate::transport::TransportResponse;
    use crate::upload::UploadProgress;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{
        body_json, body_string_contains, header, header_exists, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::builder()
            .base_url_str(&server.uri())
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn test_get_normalizes_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response = client.get("/users/1", None).await.unwrap();
        assert!(response.success);
        assert_eq!(response.status, 200);
        assert_eq!(response.data.unwrap().as_json(), Some(&json!({"id": 1})));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_path_params_interpolated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/123/posts/456"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let options = RequestOptions::new(RestMethod::Get, "/users/{userId}/posts/{postId}")
            .param("userId", 123)
            .param("postId", 456);
        let response = client.request(options).await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_query_serialized_onto_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page", "1"))
            .and(query_param("tags", "a"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let query = Query::Map(vec![
            ("page".to_string(), QueryValue::Single("1".to_string())),
            (
                "tags".to_string(),
                QueryValue::Many(vec!["a".to_string(), "b".to_string()]),
            ),
        ]);
        let response = client.get("/search", Some(query)).await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"name": "alice"})))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response = client
            .post("/users", Some(json!({"name": "alice"})))
            .await
            .unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_404_is_failed_response_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response = client.get("/missing", None).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.status, 404);
        assert!(response.data.is_none());
        assert_eq!(
            response.error.unwrap().as_json(),
            Some(&json!({"message": "not found"}))
        );
    }

    #[tokio::test]
    async fn test_auth_token_injected_from_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        store.set_item("token", "secret").await;
        let client = ApiClient::builder()
            .base_url_str(&server.uri())
            .unwrap()
            .token_store(store)
            .build();

        let response = client.get("/private", None).await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_missing_token_sends_no_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/open"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ApiClient::builder()
            .base_url_str(&server.uri())
            .unwrap()
            .token_store(Arc::new(MemoryTokenStore::new()))
            .build();
        let response = client.get("/open", None).await.unwrap();
        assert!(response.success);

        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_one_shot_headers_apply_to_exactly_next_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let mut extras = HeaderMap::new();
        extras.insert("X-Once", HeaderValue::from_static("1"));
        client.global_scope().set_next_request_headers(extras);

        client.get("/x", None).await.unwrap();
        client.get("/x", None).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
        assert!(received[0].headers.get("x-once").is_some());
        assert!(received[1].headers.get("x-once").is_none());
    }

    #[tokio::test]
    async fn test_per_call_header_overrides_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/h"))
            .and(header("x-layer", "per-call"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ApiClient::builder()
            .base_url_str(&server.uri())
            .unwrap()
            .default_header("X-Layer", "default")
            .unwrap()
            .build();

        let options = RequestOptions::new(RestMethod::Get, "/h").header("X-Layer", "per-call");
        let response = client.request(options).await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_absolute_template_bypasses_base_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/abs"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        // deliberately bogus base; the absolute template must win
        let client = ApiClient::builder()
            .base_url_str("https://unreachable.invalid")
            .unwrap()
            .build();
        let response = client
            .get(format!("{}/abs", server.uri()), None)
            .await
            .unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_base_url_path_prefixes_every_relative_template() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ApiClient::builder()
            .base_url_str(&format!("{}/api/v1", server.uri()))
            .unwrap()
            .build();

        // a `/`-rooted template must not replace the base path
        assert!(client.get("/users", None).await.unwrap().success);
        // nor does one without the leading slash
        assert!(client.get("users", None).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_relative_template_without_base_is_config_error() {
        let client = ApiClient::new();
        let result = client.get("/nowhere", None).await;
        assert!(matches!(
            result,
            Err(ApiError::Config(ConfigError::MissingBaseUrl { .. }))
        ));
    }

    #[tokio::test]
    async fn test_invalid_per_call_header_fails_before_dispatch() {
        // no mock server mounted: validation must reject before any dispatch
        let client = ApiClient::builder()
            .base_url_str("http://localhost:9")
            .unwrap()
            .build();
        let options =
            RequestOptions::new(RestMethod::Get, "/x").header("bad header", "v");
        let result = client.request(options).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    struct RouteRewrite(String);

    #[async_trait::async_trait]
    impl RequestInterceptor for RouteRewrite {
        async fn handle(&self, mut options: RequestOptions) -> Option<RequestOptions> {
            options.url = self.0.clone();
            Some(options)
        }
    }

    #[tokio::test]
    async fn test_request_interceptor_can_replace_options() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rewritten"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .interceptors()
            .register_request(Arc::new(RouteRewrite(format!("{}/rewritten", server.uri()))));

        let response = client.get("/original", None).await.unwrap();
        assert!(response.success);
    }

    struct MarkSeen;

    #[async_trait::async_trait]
    impl ResponseInterceptor for MarkSeen {
        async fn handle(&self, mut response: HttpResponse) -> Option<HttpResponse> {
            response
                .headers
                .insert("x-seen".to_string(), "1".to_string());
            Some(response)
        }
    }

    #[tokio::test]
    async fn test_response_interceptor_transforms_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.interceptors().register_response(Arc::new(MarkSeen));

        let response = client.get("/r", None).await.unwrap();
        assert_eq!(response.headers.get("x-seen").map(String::as_str), Some("1"));
    }

    struct FailingTransport;

    #[async_trait::async_trait]
    impl Transport for FailingTransport {
        async fn send(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::Aborted)
        }
    }

    struct RecoverWithStub;

    #[async_trait::async_trait]
    impl ErrorInterceptor for RecoverWithStub {
        async fn handle(
            &self,
            _error: &ApiError,
            _options: &RequestOptions,
        ) -> Option<HttpResponse> {
            Some(HttpResponse {
                success: true,
                status: 200,
                status_text: "OK".to_string(),
                headers: Default::default(),
                data: None,
                error: None,
            })
        }
    }

    #[tokio::test]
    async fn test_error_interceptor_recovers_transport_failure() {
        let client = ApiClient::builder()
            .base_url_str("http://localhost:9")
            .unwrap()
            .transport(Arc::new(FailingTransport))
            .build();
        client.interceptors().register_error(Arc::new(RecoverWithStub));

        let response = client.get("/x", None).await.unwrap();
        assert!(response.success);
    }

    struct ObserveError(AtomicUsize);

    #[async_trait::async_trait]
    impl ErrorInterceptor for ObserveError {
        async fn handle(
            &self,
            error: &ApiError,
            _options: &RequestOptions,
        ) -> Option<HttpResponse> {
            assert!(error.is_aborted());
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    #[tokio::test]
    async fn test_abort_surfaces_distinct_error_kind_and_is_observed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let client = Arc::new(client_for(&server).await);
        let observer = Arc::new(ObserveError(AtomicUsize::new(0)));
        client.interceptors().register_error(observer.clone());

        let token = CancellationToken::new();
        let options = RequestOptions::new(RestMethod::Get, "/slow").cancel(token.clone());

        let call = {
            let client = client.clone();
            tokio::spawn(async move { client.request(options).await })
        };
        token.cancel();

        let result = call.await.unwrap();
        assert!(matches!(result, Err(ref e) if e.is_aborted()));
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_head_has_no_body_and_delete_uses_query() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/items/9"))
            .and(query_param("force", "true"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.head("/ping", None).await.unwrap().success);

        let query = Query::Pairs(vec![("force".to_string(), "true".to_string())]);
        let response = client.delete("/items/9", Some(query)).await.unwrap();
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn test_upload_two_files_share_array_field_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header_exists("content-type"))
            .and(body_string_contains("name=\"files[]\""))
            .and(body_string_contains("first.txt"))
            .and(body_string_contains("second.txt"))
            .and(body_string_contains("album"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let progress: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
        let sink = progress.clone();

        let client = client_for(&server).await;
        let files = vec![
            UploadFile::new("first.txt", "hello".as_bytes().to_vec()),
            UploadFile::new("second.txt", "world!".as_bytes().to_vec()),
        ];
        let options = UploadOptions::default()
            .field_name("files")
            .field("kind", "album")
            .on_progress(move |p| sink.lock().unwrap().push(p));

        let response = client.upload("/upload", files, options).await.unwrap();
        assert!(response.success);

        let request = &server.received_requests().await.unwrap()[0];
        let content_type = request.headers.get("content-type").unwrap();
        assert!(content_type
            .to_str()
            .unwrap()
            .starts_with("multipart/form-data"));

        let calls = progress.lock().unwrap();
        assert!(!calls.is_empty());
        for window in calls.windows(2) {
            assert!(window[0].loaded <= window[1].loaded);
        }
        let last = calls.last().unwrap();
        assert_eq!(last.loaded, last.total);
        assert_eq!(last.total, 11);
    }

    #[tokio::test]
    async fn test_upload_runs_request_interceptors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rewritten"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .interceptors()
            .register_request(Arc::new(RouteRewrite(format!("{}/rewritten", server.uri()))));

        let files = vec![UploadFile::new("a.txt", "x".as_bytes().to_vec())];
        let response = client
            .upload("/original", files, UploadOptions::default())
            .await
            .unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_existing_template_query_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mixed"))
            .and(query_param("a", "1"))
            .and(query_param("b", "2"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let query = Query::Pairs(vec![("b".to_string(), "2".to_string())]);
        let response = client.get("/mixed?a=1", Some(query)).await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = Arc::new(client_for(&server).await);
        let (a, b) = tokio::join!(client.get("/a", None), client.get("/b", None));
        assert_eq!(a.unwrap().status, 200);
        assert_eq!(b.unwrap().status, 201);
    }

    #[tokio::test]
    async fn test_shared_global_scope_across_clients() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shared"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let scope = GlobalScope::new();
        let first = ApiClient::builder()
            .base_url_str(&server.uri())
            .unwrap()
            .global_scope(scope.clone())
            .build();
        let second = ApiClient::builder()
            .base_url_str(&server.uri())
            .unwrap()
            .global_scope(scope.clone())
            .build();

        let mut extras = HeaderMap::new();
        extras.insert("X-Once", HeaderValue::from_static("1"));
        scope.set_next_request_headers(extras);

        // the first request through either client consumes the staged set
        first.get("/shared", None).await.unwrap();
        second.get("/shared", None).await.unwrap();

        let received: Vec<Request> = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("x-once").is_some());
        assert!(received[1].headers.get("x-once").is_none());
    }
}
