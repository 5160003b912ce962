//! Topics are plain CRUD; the moderation pipeline only needs to know that a
//! topic exists and that deleting one cascades.

pub mod actions;
pub mod models;

pub use actions::{create_topic, delete_topic, CreateTopicInput};
pub use models::Topic;
