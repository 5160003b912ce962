pub mod auth;
pub mod entity_ids;
pub mod error;
pub mod id;
pub mod pagination;

pub use entity_ids::*;
pub use error::{ForumError, ForumResult};
