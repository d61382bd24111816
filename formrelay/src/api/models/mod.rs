//! Request bodies accepted by the relay.

pub mod mail;
