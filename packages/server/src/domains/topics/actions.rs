use serde::Deserialize;
use tracing::info;

use crate::common::auth::{Capability, CurrentUser};
use crate::common::{ForumError, ForumResult, TopicId};
use crate::domains::posts::activities::transitions;
use crate::domains::topics::Topic;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTopicInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create_topic(
    input: CreateTopicInput,
    user: &CurrentUser,
    deps: &ServerDeps,
) -> ForumResult<Topic> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ForumError::validation("Topic title cannot be empty"));
    }

    let description = input
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let topic = deps
        .store
        .insert_topic(Topic::new(title, description, user.user_id))
        .await?;

    info!(topic_id = %topic.id, author_id = %user.user_id, "topic created");
    Ok(topic)
}

/// Admin only. Removes every post in the topic, whatever its state.
pub async fn delete_topic(topic_id: TopicId, user: &CurrentUser, deps: &ServerDeps) -> ForumResult<()> {
    user.actor().can(Capability::ManageTopics).check()?;
    transitions::delete_topic(topic_id, deps).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::auth::UserRole;
    use crate::common::UserId;
    use crate::kernel::TestDependencies;

    fn input(title: &str) -> CreateTopicInput {
        CreateTopicInput {
            title: title.to_string(),
            description: Some("  ".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_topic() {
        let deps = TestDependencies::new().into_deps();
        let user = CurrentUser::new(UserId::new(), UserRole::User);

        let topic = create_topic(input(" Free will "), &user, &deps).await.unwrap();
        assert_eq!(topic.title, "Free will");
        assert_eq!(topic.description, None);
        assert!(deps.store.find_topic(topic.id).await.unwrap().is_some());

        assert!(matches!(
            create_topic(input(""), &user, &deps).await,
            Err(ForumError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_only_admin_deletes_topic() {
        let deps = TestDependencies::new().into_deps();
        let user = CurrentUser::new(UserId::new(), UserRole::User);
        let topic = create_topic(input("Determinism"), &user, &deps).await.unwrap();

        let moderator = CurrentUser::new(UserId::new(), UserRole::Moderator);
        assert!(matches!(
            delete_topic(topic.id, &moderator, &deps).await,
            Err(ForumError::Forbidden(_))
        ));

        let admin = CurrentUser::new(UserId::new(), UserRole::Admin);
        delete_topic(topic.id, &admin, &deps).await.unwrap();
        assert!(deps.store.find_topic(topic.id).await.unwrap().is_none());
    }
}
