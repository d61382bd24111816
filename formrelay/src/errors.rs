use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Required input missing or malformed; detected locally, nothing was forwarded
    #[error("{message}")]
    InvalidRequest { code: &'static str, message: String },

    /// Uploaded file is over the configured limit
    #[error("File size exceeds maximum allowed size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// A credential or setting needed by the route is absent
    #[error("{message}")]
    Configuration { setting: &'static str, message: String },

    /// The upstream answered with a non-success status
    #[error("{service} returned status {status}")]
    Upstream { service: &'static str, status: u16, body: String },

    /// The upstream could not be reached or the exchange broke off
    #[error("{service} request failed: {message}")]
    Transport { service: &'static str, message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Upstream { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Error::Configuration { .. } | Error::Transport { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable marker used in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRequest { code, .. } => code,
            Error::PayloadTooLarge { .. } => "file_too_large",
            Error::Configuration { .. } => "configuration_error",
            Error::Upstream { .. } => "upstream_error",
            Error::Transport { .. } => "proxy_error",
            Error::Internal { .. } => "internal_error",
        }
    }

    /// Detail shown to the caller. Upstream bodies and transport errors are passed through so
    /// the caller can diagnose the upstream problem; credentials never appear in either.
    pub fn detail(&self) -> String {
        match self {
            Error::Upstream { body, .. } => body.clone(),
            Error::Transport { message, .. } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn log(&self) {
        match self {
            Error::Transport { .. } | Error::Internal { .. } => {
                tracing::error!(error = %self, "Relay error");
            }
            Error::Upstream { service, status, body } => {
                tracing::warn!(service, status, body = %body, "Upstream rejected request");
            }
            Error::Configuration { setting, .. } => {
                tracing::warn!(setting, "Route called without required configuration");
            }
            Error::InvalidRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let body = match &self {
            Error::InvalidRequest { code, .. } if *code == "no_file" => json!({ "error": code }),
            _ => json!({ "error": self.code(), "detail": self.detail() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for relay operation results
pub type Result<T> = std::result::Result<T, Error>;
