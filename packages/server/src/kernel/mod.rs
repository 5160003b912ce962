//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod deps;
pub mod jobs;
pub mod post_store;
pub mod test_dependencies;
pub mod traits;

pub use ai::{OpenAIModerationClient, UnconfiguredAI};
pub use deps::ServerDeps;
pub use post_store::PostgresPostStore;
pub use test_dependencies::{InMemoryPostStore, MockAI, TestDependencies};
pub use traits::*;
