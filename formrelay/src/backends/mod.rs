//! Upstream services the relay forwards to.
//!
//! Handlers only see the two traits defined here. Each has exactly one method and one
//! production implementation:
//!
//! - [`UploadBackend`]: [`pic::PicUploadBackend`] posts files to the image host
//! - [`MailBackend`]: [`maileroo::MailerooBackend`] calls the transactional mail API and
//!   [`smtp::SmtpBackend`] talks SMTP directly
//!
//! Every call is a single attempt. Nothing is retried and no state survives the request.

pub mod maileroo;
pub mod pic;
pub mod smtp;

use async_trait::async_trait;
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::de::IgnoredAny;
use std::{sync::Once, time::Duration};

use crate::errors::{Error, Result};

pub use maileroo::MailerooBackend;
pub use pic::PicUploadBackend;
pub use smtp::SmtpBackend;

/// File name used when the browser did not send one
pub const DEFAULT_FILE_NAME: &str = "upload.bin";
/// Content type used when the browser did not send one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file received from the browser, held in memory for the duration of one request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(file_name: Option<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            content_type: content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Status and body exactly as the upstream returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        // JSON bodies go out byte for byte; anything else is relayed as a JSON string
        if serde_json::from_str::<IgnoredAny>(&self.body).is_ok() {
            return (status, [(header::CONTENT_TYPE, "application/json")], self.body).into_response();
        }
        (status, Json(serde_json::Value::String(self.body))).into_response()
    }
}

/// A mail to relay. Fields are only checked for presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailRequest {
    pub to: String,
    pub subject: String,
    pub message: String,
}

/// Forwards one uploaded file to the image host.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Returns whatever the upstream answered, error statuses included. Only failures to
    /// complete the exchange are errors.
    async fn upload(&self, file: UploadFile) -> Result<UpstreamResponse>;
}

/// Delivers one mail.
#[async_trait]
pub trait MailBackend: Send + Sync {
    async fn send(&self, mail: &MailRequest) -> Result<()>;
}

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the process-wide rustls crypto provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        // Err means another provider is already installed, which is just as good
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Build the HTTP client shared by the HTTP backends.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    install_crypto_provider();
    reqwest::Client::builder().timeout(timeout).build().map_err(|e| Error::Internal {
        operation: format!("create HTTP client: {e}"),
    })
}
