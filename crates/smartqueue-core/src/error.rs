//! Error kinds (spec.md §7), following the teacher's `thiserror`-derived
//! domain error style (e.g. `CollectError`, `ProviderError`).

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::controller::STATUS_HEADER;
use crate::options::Options;

/// Fallible outcomes that are not just "send a particular HTTP response" —
/// i.e. everything except the reject/timeout paths, which build their
/// response directly from `Options` and don't need to round-trip through
/// an error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid `Options` at construction time (spec.md §7 ConfigError).
    #[error("invalid smartqueue configuration: {0}")]
    Config(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub(crate) const TIMEOUT_BODY: &str = "Request timed out while waiting in queue";

/// Builds the "queue full" response from the configured reject status/body.
pub(crate) fn reject_response(options: &Options) -> Response {
    (options.reject_status, options.reject_body.clone()).into_response()
}

/// Builds the fixed "wait timeout" response (spec.md §6: always 503, still
/// carrying the `Queued` header the request was marked with on enqueue).
pub(crate) fn timeout_response() -> Response {
    let mut resp = (StatusCode::SERVICE_UNAVAILABLE, TIMEOUT_BODY).into_response();
    resp.headers_mut()
        .insert(STATUS_HEADER, HeaderValue::from_static("Queued"));
    resp
}
