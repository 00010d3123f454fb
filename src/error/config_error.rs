use thiserror::Error;

/// Errors in client or endpoint-registry configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A dotted endpoint key was not found in the flattened registry.
    ///
    /// Reported at call time, not at factory-construction time: lazy endpoint
    /// maps cannot be validated eagerly.
    #[error("unknown endpoint key: '{0}'")]
    UnknownEndpoint(String),

    /// An endpoint map contained something other than template strings and
    /// nested maps.
    #[error("endpoint map values must be strings or nested maps (at '{key}')")]
    InvalidEndpointMap { key: String },

    /// The configured base URL could not be parsed.
    #[error("invalid base URL '{url}'")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A relative URL template was used without a configured base URL.
    #[error("relative template '{template}' requires a base URL")]
    MissingBaseUrl { template: String },
}
