//! Mail relay handlers.
//!
//! Both routes accept the same fields, urlencoded or as JSON, and answer with an HTML
//! fragment, never JSON. The fragment's status is the error's status, so an upstream 422
//! reaches the browser as 422.

use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use mime_guess::mime;
use std::convert::Infallible;
use tracing::{debug, info, instrument};

use crate::AppState;
use crate::api::fragments::{self, MailChannel};
use crate::api::models::mail::MailForm;
use crate::backends::MailBackend;
use crate::errors::Error;

/// A failed relay, rendered as the channel's failure fragment.
#[derive(Debug)]
pub struct MailFailure {
    pub channel: MailChannel,
    pub error: Error,
}

impl IntoResponse for MailFailure {
    fn into_response(self) -> Response {
        self.error.log();
        let status = self.error.status_code();

        match fragments::mail_failed(self.channel, &self.error) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(render_error) => {
                render_error.log();
                (status, self.error.to_string()).into_response()
            }
        }
    }
}

/// Mail fields read from a urlencoded form or, with a JSON content type, a JSON object.
///
/// Never rejects: an unreadable body is kept as an error so the handler can answer it with
/// the channel's failure fragment.
pub struct MailInput(pub Result<MailForm, Error>);

impl<S> FromRequest<S> for MailInput
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let form = if is_json(&req) {
            Json::<MailForm>::from_request(req, state)
                .await
                .map(|Json(form)| form)
                .map_err(|rejection| invalid_body(rejection.body_text()))
        } else {
            Form::<MailForm>::from_request(req, state)
                .await
                .map(|Form(form)| form)
                .map_err(|rejection| invalid_body(rejection.body_text()))
        };
        Ok(Self(form))
    }
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|ct| {
            ct.type_() == mime::APPLICATION && (ct.subtype() == mime::JSON || ct.suffix() == Some(mime::JSON))
        })
}

fn invalid_body(reason: String) -> Error {
    debug!(%reason, "Unreadable mail request body");
    Error::InvalidRequest {
        code: "invalid_body",
        message: format!("Could not read the mail fields: {reason}"),
    }
}

/// Send through the Maileroo API.
#[instrument(skip_all)]
pub async fn send_mail_maileroo(
    State(state): State<AppState>,
    MailInput(form): MailInput,
) -> Result<Html<String>, MailFailure> {
    relay(state.maileroo.as_ref(), MailChannel::Maileroo, form).await
}

/// Send through the SMTP server.
#[instrument(skip_all)]
pub async fn send_mail_smtp(
    State(state): State<AppState>,
    MailInput(form): MailInput,
) -> Result<Html<String>, MailFailure> {
    relay(state.smtp.as_ref(), MailChannel::Smtp, form).await
}

async fn relay(
    backend: &dyn MailBackend,
    channel: MailChannel,
    form: Result<MailForm, Error>,
) -> Result<Html<String>, MailFailure> {
    let fail = |error| MailFailure { channel, error };

    let mail = form.and_then(MailForm::into_request).map_err(fail)?;
    backend.send(&mail).await.map_err(fail)?;
    info!(%channel, to = %mail.to, "Mail relayed");

    fragments::mail_sent(channel, &mail.to).map(Html).map_err(fail)
}
