//! Mail backend for the Maileroo transactional email API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use super::{MailBackend, MailRequest, http_client};
use crate::config::MailerooConfig;
use crate::errors::{Error, Result};

const SERVICE: &str = "Maileroo";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Sender<'a> {
    pub address: &'a str,
    pub display_name: &'a str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Recipient<'a> {
    pub address: &'a str,
}

/// Body of `POST /api/v2/emails`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SendEmailPayload<'a> {
    pub from: Sender<'a>,
    pub to: Vec<Recipient<'a>>,
    pub subject: &'a str,
    pub html: String,
    pub plain: &'a str,
    pub tracking: bool,
}

impl<'a> SendEmailPayload<'a> {
    pub fn new(from: Sender<'a>, mail: &'a MailRequest, tracking: bool) -> Self {
        Self {
            from,
            to: vec![Recipient { address: &mail.to }],
            subject: &mail.subject,
            html: html_body(&mail.message),
            plain: &mail.message,
            tracking,
        }
    }
}

/// Wrap a plain text message in a paragraph, turning line breaks into `<br>`.
pub fn html_body(message: &str) -> String {
    format!("<p>{}</p>", message.replace("\r\n", "<br>").replace('\n', "<br>"))
}

pub struct MailerooBackend {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    from_address: Option<String>,
    from_name: String,
    tracking: bool,
}

impl MailerooBackend {
    pub fn new(config: &MailerooConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.request_timeout)?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
            tracking: config.tracking,
        })
    }

    /// Both credentials are checked before anything is sent.
    fn credentials(&self) -> Result<(&str, &str)> {
        let api_key = present(&self.api_key).ok_or_else(|| Error::Configuration {
            setting: "MAILEROO_API_KEY",
            message: "MAILEROO_API_KEY is not set. Add it to .env or set maileroo.api_key in the config file.".to_string(),
        })?;
        let from_address = present(&self.from_address).ok_or_else(|| Error::Configuration {
            setting: "MAIL_FROM_ADDRESS",
            message: "MAIL_FROM_ADDRESS is not set. Add it to .env, e.g. no-reply@<your-domain>.maileroo.org".to_string(),
        })?;
        Ok((api_key, from_address))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl MailBackend for MailerooBackend {
    #[instrument(skip_all, fields(to = %mail.to))]
    async fn send(&self, mail: &MailRequest) -> Result<()> {
        let (api_key, from_address) = self.credentials()?;

        let payload = SendEmailPayload::new(
            Sender {
                address: from_address,
                display_name: &self.from_name,
            },
            mail,
            self.tracking,
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Transport {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Maileroo accepted mail");
            return Ok(());
        }

        let body = response.text().await.map_err(|e| Error::Transport {
            service: SERVICE,
            message: format!("status {status} with unreadable body: {e}"),
        })?;
        Err(Error::Upstream {
            service: SERVICE,
            status: status.as_u16(),
            body,
        })
    }
}
