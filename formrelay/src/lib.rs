//! # formrelay: browser form relay
//!
//! `formrelay` sits between a handful of static HTML forms and the third-party services that
//! actually do the work. Browsers cannot post straight to those services without exposing API
//! keys, so the forms post here and the relay attaches credentials from its own configuration.
//!
//! ## What It Does
//!
//! - **Upload relay** (`POST /api/upload`): takes one file from a multipart form, re-posts it to
//!   the image host (pic.in.th) and answers with the host's status code and JSON body unchanged.
//! - **Mail relay** (`POST /api/send-mail-maileroo`): turns `{to, subject, message}` into a
//!   Maileroo API call and answers with an HTML fragment.
//! - **Legacy mail relay** (`POST /api/send-mail`): sends the same form as a plain-text mail over
//!   an authenticated SMTP session (Gmail by default), also answering with an HTML fragment.
//! - **Pages** (`GET /`): the menu and the three forms, embedded in the binary.
//!
//! With `legacy_routes` enabled (the default) `POST /upload` and `POST /send-mail` are mounted
//! as aliases of the upload and SMTP routes.
//!
//! Every request is handled on its own: request, transform, forward, respond. Nothing is
//! persisted, cached or retried, and a missing credential only fails the route that needs it.
//!
//! ## Architecture
//!
//! Handlers live in [`api::handlers`] and depend only on the [`backends::UploadBackend`] and
//! [`backends::MailBackend`] traits held in [`AppState`], so tests substitute stubs for the real
//! upstreams. Configuration is read once at startup (see [`config`]) and never from ambient
//! environment afterwards.
//!
//! ## Quick Start
//!
//! ```no_run
//! use formrelay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!
//!     Application::new(config)?
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.ok();
//!         })
//!         .await
//! }
//! ```
pub mod api;
pub mod backends;
pub mod config;
pub mod errors;
mod static_assets;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};

use crate::api::handlers::{mail, static_assets as pages, upload};
use crate::backends::{MailBackend, MailerooBackend, PicUploadBackend, SmtpBackend, UploadBackend};

pub use config::Config;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .uploader(Arc::new(PicUploadBackend::new(&config.upload)?))
///     .maileroo(Arc::new(MailerooBackend::new(&config.maileroo)?))
///     .smtp(Arc::new(SmtpBackend::new(&config.smtp)))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    /// Image host behind `/api/upload`
    pub uploader: Arc<dyn UploadBackend>,
    /// Transactional mail API behind `/api/send-mail-maileroo`
    pub maileroo: Arc<dyn MailBackend>,
    /// SMTP relay behind `/api/send-mail`
    pub smtp: Arc<dyn MailBackend>,
}

/// Build the application router.
///
/// Routes:
/// - `GET /healthz`
/// - `POST /api/upload`, size-limited to one file plus multipart framing
/// - `POST /api/send-mail-maileroo`
/// - `POST /api/send-mail`
/// - `POST /upload` and `POST /send-mail` when `legacy_routes` is set
/// - everything else falls through to the static pages
pub fn build_router(state: &AppState) -> Router {
    let upload_limit = upload::body_limit(state.config.upload.max_file_size);

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api/upload", post(upload::upload_image).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/api/send-mail-maileroo", post(mail::send_mail_maileroo))
        .route("/api/send-mail", post(mail::send_mail_smtp));

    if state.config.legacy_routes {
        router = router
            .route("/upload", post(upload::upload_image).layer(DefaultBodyLimit::max(upload_limit)))
            .route("/send-mail", post(mail::send_mail_smtp));
    }

    let router = router.with_state(state.clone());

    let router = match &state.config.static_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Serving pages from disk");
            router.fallback_service(ServeDir::new(dir))
        }
        None => router.fallback_service(get(pages::serve_embedded_asset)),
    };

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// The relay server.
///
/// 1. **Create**: [`Application::new`] builds the upstream clients from configuration
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application with the production backends.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let state = AppState::builder()
            .uploader(Arc::new(PicUploadBackend::new(&config.upload)?))
            .maileroo(Arc::new(MailerooBackend::new(&config.maileroo)?))
            .smtp(Arc::new(SmtpBackend::new(&config.smtp)))
            .config(config)
            .build();

        Ok(Self::from_state(state))
    }

    /// Create an application around an existing state, e.g. with substituted backends.
    pub fn from_state(state: AppState) -> Self {
        let router = build_router(&state);
        Self {
            router,
            config: state.config,
        }
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Relay listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Relay stopped");
        Ok(())
    }
}
