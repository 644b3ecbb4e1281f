//! HTTP routers, handlers, and middleware.

/// Header names, problem URIs, and stream settings.
pub(crate) mod constants;
/// Search and trending handlers.
pub(crate) mod discovery;
/// Problem responses.
pub(crate) mod errors;
/// Health and metrics endpoints.
pub(crate) mod health;
/// Router construction and listener.
pub(crate) mod router;
/// Session control handlers.
pub(crate) mod session;
/// Byte-range streaming of the selected file.
pub(crate) mod stream;
/// Server-sent event streaming.
pub(crate) mod sse;
/// Request metrics middleware.
pub(crate) mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;
