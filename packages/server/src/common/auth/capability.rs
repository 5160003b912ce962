use serde::{Deserialize, Serialize};

/// Roles carried in the access token.
///
/// Ordered by privilege: `User < Moderator < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    /// Moderators and admins may act on other people's submissions.
    pub fn is_privileged(&self) -> bool {
        *self >= UserRole::Moderator
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Moderator => write!(f, "moderator"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

/// Capabilities that need more than a plain user role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Approve or reject pending posts, re-run analysis
    ModeratePosts,

    /// Browse the moderation queue, analyses and job history
    ViewModerationQueue,

    /// Delete posts written by someone else
    DeleteAnyPost,

    /// Delete whole topics
    ManageTopics,
}

impl Capability {
    /// Lowest role that holds this capability.
    pub fn required_role(&self) -> UserRole {
        match self {
            Capability::ModeratePosts
            | Capability::ViewModerationQueue
            | Capability::DeleteAnyPost => UserRole::Moderator,
            Capability::ManageTopics => UserRole::Admin,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Capability::ModeratePosts => "moderate posts",
            Capability::ViewModerationQueue => "view the moderation queue",
            Capability::DeleteAnyPost => "delete this post",
            Capability::ManageTopics => "manage topics",
        }
    }
}
