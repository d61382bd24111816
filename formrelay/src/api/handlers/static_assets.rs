//! HTTP handlers for the embedded HTML pages.

use axum::{
    body::Body,
    http::{HeaderValue, Response, StatusCode, Uri, header},
    response::IntoResponse,
};
use tracing::{debug, instrument};

use crate::static_assets;

/// Serve a page embedded in the binary. Directory paths resolve to their `index.html`.
#[instrument]
pub async fn serve_embedded_asset(uri: Uri) -> impl IntoResponse {
    let requested = uri.path().trim_start_matches('/');
    let path = if requested.is_empty() || requested.ends_with('/') {
        format!("{requested}index.html")
    } else {
        requested.to_string()
    };

    let Some(content) = static_assets::Assets::get(&path) else {
        debug!(path, "No embedded asset");
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let mut response = Response::new(Body::from(content.data.into_owned()));
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    // Pages are small and change with the binary
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
