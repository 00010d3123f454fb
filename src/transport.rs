//! Transport contracts and the reqwest-backed implementation.
//!
//! The pipeline talks to the network through two narrow traits: [`Transport`]
//! for plain exchanges and [`ProgressTransport`] for multipart uploads that
//! report byte-level progress (the plain transport cannot observe upload
//! bytes). [`ReqwestTransport`] implements both; tests may substitute their
//! own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::TransportError;
use crate::method::RestMethod;
use crate::upload::{ProgressCallback, UploadProgress};

/// A fully-resolved request, ready for the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: RestMethod,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

/// The raw result of a completed exchange, whatever its status.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    /// Wire reason phrase when the transport exposes one; the normalizer
    /// falls back to the canonical reason for the status.
    pub status_text: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One file entry of a multipart payload.
#[derive(Debug, Clone)]
pub struct MultipartFile {
    /// Multipart field name (already carries the `[]` marker when needed).
    pub field_name: String,
    pub file_name: String,
    pub content: Bytes,
    /// MIME type for the part; transport default when `None`.
    pub mime: Option<String>,
}

/// A multipart payload: one or more files plus auxiliary scalar fields.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    pub files: Vec<MultipartFile>,
    pub fields: Vec<(String, String)>,
}

impl MultipartPayload {
    /// Total number of file bytes; the `total` reported to progress
    /// callbacks.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.content.len() as u64).sum()
    }
}

/// Plain exchange: send a request, get the raw response or a transport
/// failure. Non-2xx statuses are responses, not failures.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Progress-capable exchange for multipart uploads.
#[async_trait::async_trait]
pub trait ProgressTransport: Send + Sync {
    /// Sends the payload, invoking `on_progress` with non-decreasing
    /// `loaded`, and exactly one terminal call with `loaded == total` on
    /// success.
    async fn send_multipart(
        &self,
        request: TransportRequest,
        payload: MultipartPayload,
        on_progress: Option<ProgressCallback>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Default transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn builder(&self, request: &TransportRequest) -> reqwest::RequestBuilder {
        let mut rb = self
            .client
            .request(request.method.to_reqwest(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(timeout) = request.timeout {
            rb = rb.timeout(timeout);
        }
        rb
    }
}

/// Races the in-flight send against the cancellation token. Firing the
/// token aborts the exchange and surfaces the distinguished `Aborted` kind.
async fn race_cancel(
    cancel: Option<CancellationToken>,
    fut: impl std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
) -> Result<reqwest::Response, TransportError> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(TransportError::Aborted),
            result = fut => Ok(result?),
        },
        None => Ok(fut.await?),
    }
}

async fn collect_response(response: reqwest::Response) -> Result<TransportResponse, TransportError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok(TransportResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().map(str::to_string),
        headers,
        body,
    })
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut rb = self.builder(&request);
        if let Some(body) = request.body.clone() {
            rb = rb.body(body);
        }
        let response = race_cancel(request.cancel.clone(), rb.send()).await?;
        collect_response(response).await
    }
}

const UPLOAD_CHUNK: usize = 64 * 1024;

fn chunk_bytes(mut content: Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(content.len() / UPLOAD_CHUNK + 1);
    while content.len() > UPLOAD_CHUNK {
        chunks.push(content.split_to(UPLOAD_CHUNK));
    }
    if !content.is_empty() {
        chunks.push(content);
    }
    chunks
}

#[async_trait::async_trait]
impl ProgressTransport for ReqwestTransport {
    async fn send_multipart(
        &self,
        request: TransportRequest,
        payload: MultipartPayload,
        on_progress: Option<ProgressCallback>,
    ) -> Result<TransportResponse, TransportError> {
        let total = payload.total_bytes();
        let loaded = Arc::new(AtomicU64::new(0));

        let mut form = Form::new();
        for file in payload.files {
            let length = file.content.len() as u64;
            let counter = loaded.clone();
            let callback = on_progress.clone();
            // Progress is observed as the body stream hands chunks to the
            // connection. The terminal loaded == total call is reserved for
            // successful completion below.
            let stream = futures::stream::iter(
                chunk_bytes(file.content)
                    .into_iter()
                    .map(Ok::<Bytes, std::io::Error>),
            )
            .inspect(move |chunk| {
                if let (Ok(chunk), Some(callback)) = (chunk, &callback) {
                    let sent = counter.fetch_add(chunk.len() as u64, Ordering::Relaxed)
                        + chunk.len() as u64;
                    if sent < total {
                        callback(UploadProgress::new(sent, total));
                    }
                }
            });
            let mut part =
                Part::stream_with_length(reqwest::Body::wrap_stream(stream), length)
                    .file_name(file.file_name);
            if let Some(mime) = &file.mime {
                part = part.mime_str(mime)?;
            }
            form = form.part(file.field_name, part);
        }
        for (name, value) in payload.fields {
            form = form.text(name, value);
        }

        let mut rb = self.builder(&request).multipart(form);
        // `.multipart` sets the boundary Content-Type over anything applied
        // earlier; an explicit header on the request still takes precedence.
        if let Some(content_type) = request.headers.get(CONTENT_TYPE) {
            rb = rb.header(CONTENT_TYPE, content_type.clone());
        }
        let response = race_cancel(request.cancel.clone(), rb.send()).await?;
        if let Some(callback) = &on_progress {
            callback(UploadProgress::new(total, total));
        }
        collect_response(response).await
    }
}
