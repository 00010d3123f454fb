//! Explicit process-wide state shared between clients.
//!
//! Rather than ambient singletons, the global interceptor lists and the
//! one-shot extra-header slot live in a [`GlobalScope`] handle that is
//! cloned into each client. Tests construct a fresh scope per case; an
//! application that wants true process-wide behavior shares one scope
//! across its clients.

use std::sync::{Arc, Mutex};

use reqwest::header::HeaderMap;

use crate::interceptor::InterceptorSet;

/// Shared handle over the global-scope mutable state.
///
/// Cheap to clone; clones refer to the same state.
#[derive(Clone, Default)]
pub struct GlobalScope {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    extra_headers: Mutex<Option<HeaderMap>>,
    interceptors: InterceptorSet,
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global-scope interceptor lists, shared by every client holding this
    /// scope.
    pub fn interceptors(&self) -> &InterceptorSet {
        &self.inner.interceptors
    }

    /// Stages headers for exactly the next request issued through this
    /// scope, replacing any previously staged set.
    ///
    /// If two concurrent requests race for the staged set, the first reader
    /// wins and the second sees it already cleared - a documented property
    /// of the "next request only" contract, not a bug.
    pub fn set_next_request_headers(&self, headers: HeaderMap) {
        *self.inner.extra_headers.lock().expect("extra headers lock") = Some(headers);
    }

    /// Reads and clears the staged headers in one step.
    pub(crate) fn take_next_request_headers(&self) -> Option<HeaderMap> {
        self.inner.extra_headers.lock().expect("extra headers lock").take()
    }
}
