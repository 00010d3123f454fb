use thiserror::Error;

/// Errors raised while validating a request shape, before any network activity.
///
/// These are thrown synchronously from the pipeline entry points; a request
/// that fails validation never reaches the transport.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// `null` is not a valid query value.
    #[error("query cannot be null")]
    NullQuery,

    /// A query given as an array must contain (key, value) pairs.
    #[error("query array entries must be two-element (key, value) pairs")]
    NonPairArray,

    /// The query was not one of the four accepted shapes.
    #[error("unsupported query shape: {0}")]
    UnsupportedQueryShape(&'static str),

    /// A query value was not representable as one or more scalars.
    #[error("query value for '{key}' must be a scalar or an array of scalars")]
    NonScalarQueryValue { key: String },

    /// A header name was rejected by the HTTP layer.
    #[error("invalid header name: '{0}'")]
    InvalidHeaderName(String),

    /// A header value was rejected by the HTTP layer.
    #[error("invalid header value for '{name}'")]
    InvalidHeaderValue { name: String },

    /// A response body could not be decoded into the requested type.
    #[error("failed to decode JSON body")]
    JsonDecode(#[source] serde_json::Error),

    /// A typed accessor was used on a response without a body.
    #[error("response has no body to decode")]
    EmptyBody,
}
