//! Mail backend that talks SMTP directly (the original Gmail relay).
//!
//! A new transport is built for every mail, so each request opens and closes its own
//! authenticated session.

use async_trait::async_trait;
use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, instrument};

use super::{MailBackend, MailRequest};
use crate::config::{SmtpConfig, SmtpTls, SmtpTransportKind};
use crate::errors::{Error, Result};

const SERVICE: &str = "SMTP";

pub struct SmtpBackend {
    config: SmtpConfig,
}

impl SmtpBackend {
    pub fn new(config: &SmtpConfig) -> Self {
        if config.transport == SmtpTransportKind::Smtp && config.tls == SmtpTls::None {
            tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
        }
        Self { config: config.clone() }
    }

    fn build_message(&self, mail: &MailRequest) -> Result<Message> {
        let sender = self.config.sender_address().ok_or_else(|| Error::Configuration {
            setting: "MAIL_USER",
            message: "MAIL_USER is not set. Add the SMTP account to .env or set smtp.username in the config file.".to_string(),
        })?;
        let sender = sender.parse::<Address>().map_err(|e| Error::Configuration {
            setting: "MAIL_USER",
            message: format!("Sender address {sender:?} is invalid: {e}"),
        })?;
        let from = Mailbox::new(Some(self.config.from_name.clone()), sender);

        let to = mail.to.trim().parse::<Mailbox>().map_err(|e| Error::InvalidRequest {
            code: "invalid_recipient",
            message: format!("Recipient address {:?} is invalid: {e}", mail.to),
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.message.clone())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })
    }

    fn smtp_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials = match (self.config.username.as_deref(), self.config.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Credentials::new(username.to_string(), password.to_string())
            }
            (Some(username), _) if !username.is_empty() => {
                return Err(Error::Configuration {
                    setting: "MAIL_PASS",
                    message: "MAIL_PASS is not set. Add the SMTP password to .env or set smtp.password in the config file."
                        .to_string(),
                });
            }
            _ => {
                return Err(Error::Configuration {
                    setting: "MAIL_USER",
                    message: "MAIL_USER is not set. Add the SMTP account to .env or set smtp.username in the config file."
                        .to_string(),
                });
            }
        };

        // TLS parameters are built eagerly and need the rustls provider
        super::install_crypto_provider();
        let host = self.config.host.as_str();
        let builder = match self.config.tls {
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| Error::Internal {
            operation: format!("create SMTP transport: {e}"),
        })?;

        Ok(builder
            .port(self.config.port)
            .credentials(credentials)
            .timeout(Some(self.config.timeout))
            .build())
    }
}

#[async_trait]
impl MailBackend for SmtpBackend {
    #[instrument(skip_all, fields(to = %mail.to, transport = ?self.config.transport))]
    async fn send(&self, mail: &MailRequest) -> Result<()> {
        match self.config.transport {
            SmtpTransportKind::Smtp => {
                // Credentials are checked before the message so a misconfigured relay reports that first
                let transport = self.smtp_transport()?;
                let message = self.build_message(mail)?;
                transport.send(message).await.map_err(|e| Error::Transport {
                    service: SERVICE,
                    message: e.to_string(),
                })?;
            }
            SmtpTransportKind::File => {
                let message = self.build_message(mail)?;
                tokio::fs::create_dir_all(&self.config.file_path)
                    .await
                    .map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                let id = AsyncFileTransport::<Tokio1Executor>::new(&self.config.file_path)
                    .send(message)
                    .await
                    .map_err(|e| Error::Transport {
                        service: SERVICE,
                        message: e.to_string(),
                    })?;
                debug!(id = %id, "Mail written to file transport");
            }
        }

        Ok(())
    }
}
