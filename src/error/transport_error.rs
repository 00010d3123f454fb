use thiserror::Error;

/// Errors raised by a transport while completing an exchange.
///
/// Non-2xx statuses never appear here; they are normalized into a
/// `success: false` response instead. `Aborted` is kept distinct from
/// `Network` so callers can branch on user-initiated cancellation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport failed to complete (DNS, connection, timeout, TLS, ...).
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// The cancellation token fired before the exchange completed.
    #[error("request aborted")]
    Aborted,

    /// The resolved request URL could not be parsed.
    #[error("invalid request URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The request body could not be serialized for the wire.
    #[error("failed to encode request body")]
    BodyEncode(#[source] serde_json::Error),
}
