//! Image upload relay.

use axum::{
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use tracing::{debug, info, instrument, warn};

use crate::AppState;
use crate::backends::UploadFile;
use crate::errors::{Error, Result};

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

/// Room for multipart boundaries and part headers on top of the file itself
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Body limit for the upload routes: one file at the configured limit plus framing.
pub fn body_limit(max_file_size: u64) -> usize {
    usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX)
}

/// Relay one uploaded file to the image host and answer with the host's status and body.
///
/// A request that is not multipart at all carries no file either, so it gets the same
/// `no_file` answer as a form without a `file` field.
#[instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let limit = state.config.upload.max_file_size;

    let mut multipart = multipart.map_err(|rejection| {
        debug!(%rejection, "Upload request is not multipart");
        no_file()
    })?;

    let file = read_file_field(&mut multipart, limit).await?.ok_or_else(no_file)?;

    info!(
        file_name = %file.file_name,
        content_type = %file.content_type,
        size = file.size(),
        "Relaying upload to image host"
    );

    let upstream = state.uploader.upload(file).await?;
    Ok(upstream.into_response())
}

/// Buffer the first non-empty `file` field, enforcing the size limit chunk by chunk.
async fn read_file_field(multipart: &mut Multipart, limit: u64) -> Result<Option<UploadFile>> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            if (data.len() + chunk.len()) as u64 > limit {
                warn!(limit, file_name = ?file_name, "Upload exceeds size limit, rejecting");
                return Err(Error::PayloadTooLarge { limit });
            }
            data.extend_from_slice(&chunk);
        }

        // Browsers send an empty part with an empty file name when nothing was picked
        if data.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
            continue;
        }

        return Ok(Some(UploadFile::new(file_name, content_type, data.freeze())));
    }

    Ok(None)
}

fn no_file() -> Error {
    Error::InvalidRequest {
        code: "no_file",
        message: "No file attached".to_string(),
    }
}

fn multipart_error(error: MultipartError, limit: u64) -> Error {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit }
    } else {
        Error::InvalidRequest {
            code: "invalid_multipart",
            message: format!("Failed to parse multipart data: {}", error.body_text()),
        }
    }
}
