//! Posts domain - submissions, published posts, and rejected posts.

pub mod actions;
pub mod activities;
pub mod models;

pub use models::{Post, PostState, PostStatus};
