//! Uniform `{status:"error", detail, kind}` JSON envelope for every handler.
//!
//! Mirrors the teacher's `(StatusCode, String)` handler returns, collapsed
//! into one `IntoResponse` impl on `AppError` so the kind→HTTP-status table
//! in spec.md §7 lives in one place instead of per-handler matches.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use proxypool_types::PoolError;
use serde::Serialize;

/// Thin wrapper so `PoolError` (defined in `proxypool-types`, with no axum
/// dependency) can implement `IntoResponse` here without an orphan-rule
/// violation.
pub struct AppError(pub PoolError);

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        AppError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    kind: &'static str,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { status: "error", kind: self.0.kind(), detail: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, AppError>;
