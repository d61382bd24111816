//! Upload backend for the pic.in.th image host.

use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use tracing::{debug, instrument};
use url::Url;

use super::{DEFAULT_CONTENT_TYPE, UploadBackend, UploadFile, UpstreamResponse, http_client};
use crate::config::UploadConfig;
use crate::errors::{Error, Result};

const SERVICE: &str = "image host";

pub struct PicUploadBackend {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl PicUploadBackend {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.request_timeout)?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
        })
    }

    /// Multipart body the image host expects: the file as `source`, `format=json`, and the
    /// API key as a plain `key` field (a custom header would trigger a CORS preflight).
    fn form(&self, file: UploadFile) -> Result<Form> {
        let content_type = match file.content_type.parse::<mime_guess::mime::Mime>() {
            Ok(_) => file.content_type,
            Err(_) => {
                debug!(content_type = %file.content_type, "Unparseable content type, sending as octet-stream");
                DEFAULT_CONTENT_TYPE.to_string()
            }
        };

        let length = file.data.len() as u64;
        let source = Part::stream_with_length(file.data, length)
            .file_name(file.file_name)
            .mime_str(&content_type)
            .map_err(|e| Error::Internal {
                operation: format!("build multipart body: {e}"),
            })?;

        let mut form = Form::new().part("source", source).text("format", "json");
        if let Some(key) = &self.api_key {
            form = form.text("key", key.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl UploadBackend for PicUploadBackend {
    #[instrument(skip_all, fields(file_name = %file.file_name, size = file.size()))]
    async fn upload(&self, file: UploadFile) -> Result<UpstreamResponse> {
        let form = self.form(file)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| Error::Transport {
            service: SERVICE,
            message: e.to_string(),
        })?;

        debug!(status, "Image host responded");
        Ok(UpstreamResponse { status, body })
    }
}
