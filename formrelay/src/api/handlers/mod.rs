//! HTTP request handlers.
//!
//! - [`upload`]: multipart upload relayed to the image host, JSON responses
//! - [`mail`]: form posts relayed to Maileroo or SMTP, HTML fragment responses
//! - [`static_assets`]: the HTML pages the forms live on
//!
//! Handlers depend only on the backend traits held in [`crate::AppState`], never on a
//! concrete upstream client.

pub mod mail;
pub mod static_assets;
pub mod upload;
