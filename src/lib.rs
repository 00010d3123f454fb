//! Uniform HTTP request/response layer.
//!
//! This crate wraps a transport behind one request/response contract:
//! every call resolves to an [`HttpResponse`] with `success` computed from
//! the status (non-2xx is *not* an error), or an [`ApiError`] for
//! validation and transport failures - two distinct failure channels.
//!
//! On the way out, a request is assembled from a `{name}` URL template,
//! path parameters, one of four query shapes, and headers merged with
//! defined precedence (instance defaults, one-shot global extras, an auth
//! header resolved from a pluggable [`TokenStore`], per-call headers).
//! Registered [interceptors](crate::interceptor) observe or transform the
//! request, the response, and any transport error. Multipart uploads go
//! through a progress-capable transport; an [`ApiFactory`] turns a
//! declarative endpoint map with dotted keys into bound callables.
//!
//! ## Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use api_client::{ApiClient, ApiFactory, RestMethod};
//! use serde_json::json;
//!
//! let client = Arc::new(
//!     ApiClient::builder()
//!         .base_url_str("https://api.example.com")?
//!         .build(),
//! );
//!
//! // direct call
//! let user = client.get("/users/1", None).await?;
//! assert!(user.success);
//!
//! // factory call
//! let factory = ApiFactory::from_json(
//!     client,
//!     &json!({"users": {"get": "/users/{id}"}}),
//! )?;
//! let response = factory
//!     .bind("users.get", RestMethod::Get)
//!     .param("id", 1)
//!     .send()
//!     .await?;
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod factory;
mod headers;
pub mod interceptor;
pub mod method;
pub mod query;
pub mod request;
pub mod response;
pub mod scope;
pub mod template;
pub mod transport;
pub mod upload;

pub use auth::{AuthConfig, MemoryTokenStore, TokenStore};
pub use client::{ApiClient, ApiClientBuilder};
pub use error::{ApiError, ConfigError, TransportError, ValidationError};
pub use factory::{ApiFactory, BoundCall, EndpointTree, Endpoints};
pub use interceptor::{
    ErrorInterceptor, InterceptorSet, RequestInterceptor, ResponseInterceptor,
};
pub use method::RestMethod;
pub use query::{Query, QueryValue};
pub use request::RequestOptions;
pub use response::{HttpResponse, ResponseBody};
pub use scope::GlobalScope;
pub use transport::{
    MultipartFile, MultipartPayload, ProgressTransport, ReqwestTransport, Transport,
    TransportRequest, TransportResponse,
};
pub use upload::{ProgressCallback, UploadFile, UploadOptions, UploadProgress};
