pub mod pending_post;
pub mod post;
pub mod post_approval;
pub mod published_post;
pub mod rejected_post;

pub use pending_post::PendingPostRow;
pub use post::{Post, PostState, PostStatus, TransitionError};
pub use post_approval::PostApproval;
pub use published_post::PublishedPostRow;
pub use rejected_post::RejectedPostRow;
