//! Typed ids for forum entities.
//!
//! A post keeps one id while pending or rejected. Publishing gives it a
//! fresh `PostId`, linked back to the submission through a `PostApproval`.

pub use super::id::Id;

/// Authors, moderators and admins.
pub struct User;

/// A discussion topic.
pub struct Topic;

/// A post in any moderation state.
pub struct Post;

pub struct Analysis;

pub struct Approval;

pub type UserId = Id<User>;
pub type TopicId = Id<Topic>;
pub type PostId = Id<Post>;
pub type AnalysisId = Id<Analysis>;
pub type ApprovalId = Id<Approval>;
