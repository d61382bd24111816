//! Stub backends and server constructors shared by the handler tests.

use async_trait::async_trait;
use axum_test::TestServer;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backends::{MailBackend, MailRequest, UploadBackend, UploadFile, UpstreamResponse};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::{AppState, Application};

pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.upload.endpoint = "http://127.0.0.1:1/api/1/upload".parse().expect("valid url");
    config.upload.request_timeout = Duration::from_secs(5);
    config.maileroo.endpoint = "http://127.0.0.1:1/api/v2/emails".parse().expect("valid url");
    config.maileroo.request_timeout = Duration::from_secs(5);
    config.smtp.timeout = Duration::from_secs(5);
    config
}

/// Records every file it receives and answers with a fixed response or transport failure.
pub struct StubUploadBackend {
    reply: std::result::Result<UpstreamResponse, String>,
    received: Mutex<Vec<UploadFile>>,
}

impl StubUploadBackend {
    pub fn responding(status: u16, body: &str) -> Self {
        Self {
            reply: Ok(UpstreamResponse {
                status,
                body: body.to_string(),
            }),
            received: Mutex::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            received: Mutex::default(),
        }
    }

    pub fn received(&self) -> Vec<UploadFile> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadBackend for StubUploadBackend {
    async fn upload(&self, file: UploadFile) -> Result<UpstreamResponse> {
        self.received.lock().unwrap().push(file);
        self.reply.clone().map_err(|message| Error::Transport {
            service: "image host",
            message,
        })
    }
}

/// Records every mail it is asked to send and succeeds or fails with a transport error.
pub struct StubMailBackend {
    failure: Option<String>,
    sent: Mutex<Vec<MailRequest>>,
}

impl StubMailBackend {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            sent: Mutex::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            sent: Mutex::default(),
        }
    }

    pub fn sent(&self) -> Vec<MailRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailBackend for StubMailBackend {
    async fn send(&self, mail: &MailRequest) -> Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        match &self.failure {
            Some(message) => Err(Error::Transport {
                service: "SMTP",
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// The three backends of an [`AppState`]; unspecified ones are succeeding stubs.
pub struct TestBackends {
    pub uploader: Arc<dyn UploadBackend>,
    pub maileroo: Arc<dyn MailBackend>,
    pub smtp: Arc<dyn MailBackend>,
}

impl Default for TestBackends {
    fn default() -> Self {
        Self {
            uploader: Arc::new(StubUploadBackend::responding(200, r#"{"status_code":200}"#)),
            maileroo: Arc::new(StubMailBackend::succeeding()),
            smtp: Arc::new(StubMailBackend::succeeding()),
        }
    }
}

impl TestBackends {
    pub fn with_uploader(uploader: Arc<dyn UploadBackend>) -> Self {
        Self {
            uploader,
            ..Self::default()
        }
    }

    pub fn with_maileroo(maileroo: Arc<dyn MailBackend>) -> Self {
        Self {
            maileroo,
            ..Self::default()
        }
    }

    pub fn with_smtp(smtp: Arc<dyn MailBackend>) -> Self {
        Self { smtp, ..Self::default() }
    }
}

pub fn create_test_server(config: Config, backends: TestBackends) -> TestServer {
    let state = AppState::builder()
        .config(config)
        .uploader(backends.uploader)
        .maileroo(backends.maileroo)
        .smtp(backends.smtp)
        .build();

    Application::from_state(state).into_test_server()
}
