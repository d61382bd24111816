//! HTTP layer: route handlers, form models and the HTML fragments sent back to browsers.
//!
//! - **[`handlers`]**: axum handlers for the upload relay, both mail relays and static pages
//! - **[`models`]**: form bodies accepted from the browser pages
//! - **[`fragments`]**: HTML snippets returned by the mail routes

pub mod fragments;
pub mod handlers;
pub mod models;
