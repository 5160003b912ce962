//! Posts domain activities - state transitions and read views.

pub mod thread_builder;
pub mod transitions;
pub mod views;

pub use thread_builder::{build_thread, Provenance, ThreadBuilder, ThreadNode, ThreadStats};
pub use views::{lookup_post, profile, resolve_pending, topic_thread, PendingResolution, Profile, TopicThread};
