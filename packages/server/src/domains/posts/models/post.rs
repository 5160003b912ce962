use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::auth::CurrentUser;
use crate::common::{PostId, TopicId, UserId};
use crate::domains::moderation::models::AnalysisRecord;

/// A contribution to a topic in one of its three moderation states.
///
/// The state moves only forward: `Pending -> Published` or
/// `Pending -> Rejected`. Storage keeps each state in its own table and
/// performs the move inside a single transaction, so a contribution is never
/// visible in two states at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub topic_id: TopicId,
    pub parent_post_id: Option<PostId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: PostState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostState {
    Pending {
        #[serde(skip_serializing_if = "Option::is_none")]
        analysis: Option<AnalysisRecord>,
    },
    Published {
        /// Live count of published direct replies
        reply_count: i64,
    },
    Rejected {
        moderation_reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Pending,
    Published,
    Rejected,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostStatus::Pending => write!(f, "pending"),
            PostStatus::Published => write!(f, "published"),
            PostStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("post {id} is {status}, only pending posts can be moderated")]
    NotPending { id: PostId, status: PostStatus },

    #[error("a rejection needs a reason")]
    MissingReason,
}

impl Post {
    /// A freshly submitted post awaiting a verdict.
    pub fn submitted(
        author_id: UserId,
        topic_id: TopicId,
        parent_post_id: Option<PostId>,
        content: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PostId::new(),
            author_id,
            topic_id,
            parent_post_id,
            content,
            created_at: now,
            updated_at: now,
            state: PostState::Pending { analysis: None },
        }
    }

    pub fn status(&self) -> PostStatus {
        match self.state {
            PostState::Pending { .. } => PostStatus::Pending,
            PostState::Published { .. } => PostStatus::Published,
            PostState::Rejected { .. } => PostStatus::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PostState::Pending { .. })
    }

    pub fn is_published(&self) -> bool {
        matches!(self.state, PostState::Published { .. })
    }

    pub fn analysis(&self) -> Option<&AnalysisRecord> {
        match &self.state {
            PostState::Pending { analysis } => analysis.as_ref(),
            _ => None,
        }
    }

    pub fn reply_count(&self) -> Option<i64> {
        match self.state {
            PostState::Published { reply_count } => Some(reply_count),
            _ => None,
        }
    }

    pub fn moderation_reason(&self) -> Option<&str> {
        match &self.state {
            PostState::Rejected { moderation_reason } => Some(moderation_reason),
            _ => None,
        }
    }

    /// Published posts are public. Pending and rejected posts are visible
    /// to their author and to privileged roles.
    pub fn is_visible_to(&self, viewer: Option<&CurrentUser>) -> bool {
        match self.state {
            PostState::Published { .. } => true,
            PostState::Pending { .. } | PostState::Rejected { .. } => match viewer {
                Some(user) => user.is_privileged() || user.user_id == self.author_id,
                None => false,
            },
        }
    }

    /// Attach an analysis to a pending post. Other states are returned as is.
    pub fn with_analysis(mut self, record: Option<AnalysisRecord>) -> Self {
        if let PostState::Pending { analysis } = &mut self.state {
            *analysis = record;
        }
        self
    }

    /// Move a pending post to its published form under `new_id`.
    ///
    /// Author, topic, parent, body and creation time carry over; a published
    /// post starts with no replies.
    pub fn publish(self, new_id: PostId) -> Result<Post, TransitionError> {
        match self.state {
            PostState::Pending { .. } => Ok(Post {
                id: new_id,
                updated_at: Utc::now(),
                state: PostState::Published { reply_count: 0 },
                ..self
            }),
            PostState::Published { .. } | PostState::Rejected { .. } => {
                Err(TransitionError::NotPending {
                    id: self.id,
                    status: self.status(),
                })
            }
        }
    }

    /// Move a pending post to its rejected form. The id is kept so the author
    /// can still find the submission.
    pub fn reject(self, reason: impl Into<String>) -> Result<Post, TransitionError> {
        let reason = reason.into();
        match self.state {
            PostState::Pending { .. } => {
                if reason.trim().is_empty() {
                    return Err(TransitionError::MissingReason);
                }
                Ok(Post {
                    updated_at: Utc::now(),
                    state: PostState::Rejected {
                        moderation_reason: reason,
                    },
                    ..self
                })
            }
            PostState::Published { .. } | PostState::Rejected { .. } => {
                Err(TransitionError::NotPending {
                    id: self.id,
                    status: self.status(),
                })
            }
        }
    }
}
