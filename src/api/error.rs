//! HTTP mapping of [`Error`].
//!
//! Every failure is answered with `{"error": "<message>"}`. Server errors are
//! logged when the response is built; [`mask_server_errors`] then replaces
//! their message with a generic one unless the router's configuration exposes
//! error details.

use crate::{api::AppState, errors::Error};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

const INTERNAL_ERROR: &str = "Internal server error";

impl Error {
    /// Status code a request failing with this error is answered with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::StepPrecondition { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } | Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Config { .. }
            | Self::Database(_)
            | Self::PasswordHash(_)
            | Self::Document(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::EnvVar(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Response mapper hiding the body of 5xx responses in production.
pub async fn mask_server_errors(State(state): State<AppState>, response: Response) -> Response {
    if response.status().is_server_error() && !state.config.app_env.exposes_error_details() {
        return (response.status(), Json(json!({ "error": INTERNAL_ERROR }))).into_response();
    }
    response
}
