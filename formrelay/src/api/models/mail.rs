use serde::Deserialize;

use crate::backends::MailRequest;
use crate::errors::{Error, Result};

/// Form-encoded body posted by `mail.html` and `maileroo.html`.
///
/// Every field is optional at the extractor level so a missing field is reported as an
/// HTML fragment instead of axum's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct MailForm {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

impl MailForm {
    /// Check that all fields are present and the recipient is not blank.
    pub fn into_request(self) -> Result<MailRequest> {
        let to = self.to.filter(|to| !to.trim().is_empty()).ok_or_else(|| missing("to"))?;
        let subject = self.subject.ok_or_else(|| missing("subject"))?;
        let message = self.message.ok_or_else(|| missing("message"))?;

        Ok(MailRequest {
            to: to.trim().to_string(),
            subject,
            message,
        })
    }
}

fn missing(field: &str) -> Error {
    Error::InvalidRequest {
        code: "missing_field",
        message: format!("Missing required field: {field}"),
    }
}
