//! Core domain + application logic for the bulk moderation bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the
//! chat-completion backend live behind ports (traits) implemented in adapter
//! crates.

pub mod cache;
pub mod chat;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod moderation;
pub mod ports;
pub mod report;
pub mod security;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
