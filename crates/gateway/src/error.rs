//! HTTP mapping of the session error taxonomy.

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::json,
    tracing::{error, warn},
};

use zapbridge_session::SessionError;

/// A session failure as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SessionError::Forbidden => StatusCode::FORBIDDEN,
            SessionError::NotConnected => StatusCode::CONFLICT,
            SessionError::InvalidMedia(_) => StatusCode::BAD_REQUEST,
            SessionError::Platform(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self.0, "request failed");
        } else {
            warn!(%status, error = %self.0, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
