// Debate Forum - API Core
//
// This crate provides the backend for a moderated debate forum: posts are
// submitted as pending, analyzed in the background, and published or
// rejected automatically or by a moderator.
//
// Domains live under domains/; infrastructure traits and their
// implementations under kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
