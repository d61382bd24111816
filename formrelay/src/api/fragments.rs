//! HTML fragments returned by the mail routes.
//!
//! The mail forms post directly to the relay, so the browser renders whatever comes back.
//! Templates are auto-escaped, upstream payloads included.

use minijinja::{Environment, Value, context};
use std::{fmt, sync::LazyLock};

use crate::errors::{Error, Result};

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.add_template("mail_sent.html", include_str!("../templates/mail_sent.html"))
        .expect("mail_sent.html is a valid template");
    env.add_template("mail_failed.html", include_str!("../templates/mail_failed.html"))
        .expect("mail_failed.html is a valid template");
    env
});

/// Which relay produced the fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailChannel {
    Maileroo,
    Smtp,
}

impl fmt::Display for MailChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailChannel::Maileroo => f.write_str("Maileroo"),
            MailChannel::Smtp => f.write_str("SMTP"),
        }
    }
}

pub fn mail_sent(channel: MailChannel, to: &str) -> Result<String> {
    render("mail_sent.html", context! { channel => channel.to_string(), to => to })
}

pub fn mail_failed(channel: MailChannel, error: &Error) -> Result<String> {
    let ctx = match error {
        Error::Configuration { setting, message } => context! {
            kind => "configuration",
            channel => channel.to_string(),
            setting => setting,
            message => message,
        },
        Error::Upstream { status, body, .. } => context! {
            kind => "upstream",
            channel => channel.to_string(),
            status => status,
            detail => body,
        },
        Error::InvalidRequest { .. } | Error::PayloadTooLarge { .. } => context! {
            kind => "invalid",
            channel => channel.to_string(),
            message => error.to_string(),
        },
        _ => context! {
            kind => "failed",
            channel => channel.to_string(),
            detail => error.detail(),
        },
    };
    render("mail_failed.html", ctx)
}

fn render(name: &str, ctx: Value) -> Result<String> {
    TEMPLATES
        .get_template(name)
        .and_then(|template| template.render(ctx))
        .map_err(|e| Error::Internal {
            operation: format!("render {name}: {e}"),
        })
}
