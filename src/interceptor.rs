//! Registrable request/response/error handler chains.
//!
//! Handlers are registered at two scopes - global (shared across clients via
//! [`GlobalScope`](crate::scope::GlobalScope)) and instance - and run in
//! registration order, global scope first. Request and response handlers
//! thread the in-flight value through the chain; returning `None` is the
//! "no change" sentinel that preserves the previous value. Error handlers
//! observe the failure and may recover by returning a substitute response,
//! which short-circuits the rest of the error chain.

use std::sync::{Arc, Mutex};

use crate::error::ApiError;
use crate::request::RequestOptions;
use crate::response::HttpResponse;

/// Transforms request options before dispatch.
#[async_trait::async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Receives the assembled options (URL resolved, headers merged).
    /// Return `Some` to replace them, `None` to pass through unchanged.
    async fn handle(&self, options: RequestOptions) -> Option<RequestOptions>;
}

/// Transforms the normalized response after dispatch.
#[async_trait::async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// Return `Some` to replace the response, `None` to pass through.
    async fn handle(&self, response: HttpResponse) -> Option<HttpResponse>;
}

/// Observes transport-level failures, optionally recovering.
///
/// Recovery values are full [`HttpResponse`]s - the shape is enforced by the
/// signature rather than checked at runtime.
#[async_trait::async_trait]
pub trait ErrorInterceptor: Send + Sync {
    /// Return `Some(response)` to neutralize the rejection and hand the
    /// substitute response to the caller; `None` lets the error keep
    /// propagating to the remaining handlers and then the caller.
    async fn handle(&self, error: &ApiError, options: &RequestOptions) -> Option<HttpResponse>;
}

/// Ordered handler lists for one scope.
///
/// Registration order is run order. `run` callers take a snapshot first, so
/// mutating the lists mid-flight never corrupts an in-flight chain.
#[derive(Default)]
pub struct InterceptorSet {
    request: Mutex<Vec<Arc<dyn RequestInterceptor>>>,
    response: Mutex<Vec<Arc<dyn ResponseInterceptor>>>,
    error: Mutex<Vec<Arc<dyn ErrorInterceptor>>>,
}

impl InterceptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_request(&self, handler: Arc<dyn RequestInterceptor>) {
        self.request.lock().expect("interceptor lock").push(handler);
    }

    /// Removes a previously registered handler by pointer identity.
    /// Removing a handler that is not present is a no-op.
    pub fn unregister_request(&self, handler: &Arc<dyn RequestInterceptor>) {
        self.request
            .lock()
            .expect("interceptor lock")
            .retain(|h| !Arc::ptr_eq(h, handler));
    }

    pub fn register_response(&self, handler: Arc<dyn ResponseInterceptor>) {
        self.response.lock().expect("interceptor lock").push(handler);
    }

    pub fn unregister_response(&self, handler: &Arc<dyn ResponseInterceptor>) {
        self.response
            .lock()
            .expect("interceptor lock")
            .retain(|h| !Arc::ptr_eq(h, handler));
    }

    pub fn register_error(&self, handler: Arc<dyn ErrorInterceptor>) {
        self.error.lock().expect("interceptor lock").push(handler);
    }

    pub fn unregister_error(&self, handler: &Arc<dyn ErrorInterceptor>) {
        self.error
            .lock()
            .expect("interceptor lock")
            .retain(|h| !Arc::ptr_eq(h, handler));
    }

    pub(crate) fn snapshot_request(&self) -> Vec<Arc<dyn RequestInterceptor>> {
        self.request.lock().expect("interceptor lock").clone()
    }

    pub(crate) fn snapshot_response(&self) -> Vec<Arc<dyn ResponseInterceptor>> {
        self.response.lock().expect("interceptor lock").clone()
    }

    pub(crate) fn snapshot_error(&self) -> Vec<Arc<dyn ErrorInterceptor>> {
        self.error.lock().expect("interceptor lock").clone()
    }
}

/// Threads options through request handlers: global scope, then instance
/// scope, each in registration order.
pub(crate) async fn run_request_chain(
    chains: [&InterceptorSet; 2],
    mut options: RequestOptions,
) -> RequestOptions {
    for set in chains {
        for handler in set.snapshot_request() {
            if let Some(replaced) = handler.handle(options.clone()).await {
                options = replaced;
            }
        }
    }
    options
}

/// Threads a response through response handlers, same ordering as requests.
pub(crate) async fn run_response_chain(
    chains: [&InterceptorSet; 2],
    mut response: HttpResponse,
) -> HttpResponse {
    for set in chains {
        for handler in set.snapshot_response() {
            if let Some(replaced) = handler.handle(response.clone()).await {
                response = replaced;
            }
        }
    }
    response
}

/// Lets each error handler observe the failure until one recovers.
pub(crate) async fn run_error_chain(
    chains: [&InterceptorSet; 2],
    error: &ApiError,
    options: &RequestOptions,
) -> Option<HttpResponse> {
    for set in chains {
        for handler in set.snapshot_error() {
            if let Some(recovered) = handler.handle(error, options).await {
                return Some(recovered);
            }
        }
    }
    None
}
