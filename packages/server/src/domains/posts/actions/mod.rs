//! Posts domain actions - entry-point business logic
//!
//! Called directly from the HTTP routes.

pub mod core;

pub use core::{delete_post, submit_post, SubmitPostInput};
