//! Multipart payload assembly and the upload progress contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::query::Query;
use crate::transport::{MultipartFile, MultipartPayload};

/// Byte-level progress of one upload.
///
/// `loaded` is non-decreasing over the lifetime of the upload; `total` is
/// constant once known. Exactly one terminal callback carries
/// `loaded == total` on success.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
    /// 0-100.
    pub percentage: f64,
}

impl UploadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (loaded as f64 / total as f64) * 100.0
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }
}

/// Callback invoked as upload bytes go out.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// One file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Bytes,
    /// MIME type for the multipart part; transport default when `None`.
    pub mime: Option<String>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            mime: None,
        }
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Per-upload options.
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// Multipart field name for the file part(s); `"file"` when empty.
    pub field_name: String,
    /// Auxiliary scalar fields merged into the same payload.
    pub fields: Vec<(String, String)>,
    /// Path parameters for template interpolation.
    pub params: HashMap<String, String>,
    pub query: Option<Query>,
    /// Per-call headers.
    pub headers: HashMap<String, String>,
    pub on_progress: Option<ProgressCallback>,
    pub cancel: Option<CancellationToken>,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("field_name", &self.field_name)
            .field("fields", &self.fields)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl UploadOptions {
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(UploadProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
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

/// Builds the multipart payload for a set of files.
///
/// A single file keeps the configured field name as-is. Multiple files
/// repeat one shared field name, suffixed with the `[]` array marker unless
/// the name already ends with it.
pub(crate) fn build_payload(files: Vec<UploadFile>, options: &UploadOptions) -> MultipartPayload {
    let base_name = if options.field_name.is_empty() {
        "file"
    } else {
        options.field_name.as_str()
    };
    let field_name = if files.len() > 1 && !base_name.ends_with("[]") {
        format!("{base_name}[]")
    } else {
        base_name.to_string()
    };

    MultipartPayload {
        files: files
            .into_iter()
            .map(|file| MultipartFile {
                field_name: field_name.clone(),
                file_name: file.file_name,
                content: file.content,
                mime: file.mime,
            })
            .collect(),
        fields: options.fields.clone(),
    }
}
