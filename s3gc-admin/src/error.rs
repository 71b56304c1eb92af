//! GcError → HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use s3gc_core::errors::{CycleError, GcError, RestoreError, VaultError};

/// JSON error envelope: `{"error": {"kind": ..., "message": ...}}` with
/// the kind drawn from the error taxonomy.
pub struct ApiError(pub GcError);

impl From<GcError> for ApiError {
    fn from(e: GcError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            GcError::Cycle(CycleError::Busy) => StatusCode::CONFLICT,
            GcError::Restore(RestoreError::UnknownOperation { .. })
            | GcError::Restore(RestoreError::NoRecord { .. })
            | GcError::Vault(VaultError::UnknownOperation { .. }) => StatusCode::NOT_FOUND,
            GcError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "error": { "kind": self.0.kind(), "message": self.0.to_string() }
        }));
        (status, body).into_response()
    }
}
