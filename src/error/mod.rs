//! Layered error types for the request pipeline.
//!
//! The error hierarchy is structured for actionable diagnostics:
//! - [`ApiError`] - Top-level error type for all client operations
//! - [`ValidationError`] - Malformed query/body/header shapes, caught before dispatch
//! - [`TransportError`] - Network failures and cooperative cancellation
//! - [`ConfigError`] - Client and endpoint configuration errors
//!
//! Non-2xx statuses are deliberately absent from this hierarchy: a bad status
//! is a normal [`HttpResponse`](crate::HttpResponse) with `success == false`,
//! not an error. A rejected call and a `success: false` response are two
//! distinct failure channels.

mod api_error;
mod config_error;
mod transport_error;
mod validation_error;

pub use api_error::ApiError;
pub use config_error::ConfigError;
pub use transport_error::TransportError;
pub use validation_error::ValidationError;
