//! Read views over posts in every state.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::common::auth::CurrentUser;
use crate::common::pagination::Page;
use crate::common::{ForumError, ForumResult, PostId, TopicId, UserId};
use crate::domains::posts::activities::thread_builder::{build_thread, ThreadNode, ThreadStats};
use crate::domains::posts::models::Post;
use crate::domains::topics::Topic;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Serialize)]
pub struct TopicThread {
    pub topic: Topic,
    pub posts: Vec<ThreadNode>,
    /// Top-level published posts in the topic, across all pages
    pub count: i64,
    pub limit: i64,
    pub offset: i64,
    #[serde(skip)]
    pub stats: ThreadStats,
}

/// A user's contributions, newest first in each list. Pending and rejected
/// posts are only filled in for the user themselves.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: UserId,
    pub published: Vec<Post>,
    pub published_count: i64,
    pub limit: i64,
    pub offset: i64,
    pub pending: Vec<Post>,
    pub rejected: Vec<Post>,
}

/// Where a submission ended up.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "resolution", content = "post", rename_all = "snake_case")]
pub enum PendingResolution {
    Pending(Post),
    Published(Post),
    Rejected(Post),
}

/// One page of the topic's published posts as a tree, plus the viewer's own
/// pending posts that belong on that page.
///
/// The page counts top-level posts; each comes with its whole reply tree.
/// Top-level pending posts are shown on the first page only.
pub async fn topic_thread(
    topic_id: TopicId,
    viewer: Option<&CurrentUser>,
    page: Page,
    deps: &ServerDeps,
) -> ForumResult<TopicThread> {
    let topic = deps
        .store
        .find_topic(topic_id)
        .await?
        .ok_or_else(|| ForumError::not_found(format!("Topic {} not found", topic_id)))?;

    let count = deps.store.count_top_level_in_topic(topic_id).await?;
    let published = deps
        .store
        .list_thread_page(topic_id, page.limit, page.offset)
        .await?;

    let pending = match viewer {
        Some(user) => {
            let pending = deps
                .store
                .list_pending_in_topic_by_author(topic_id, user.user_id)
                .await?;
            on_page(pending, &published, page)
        }
        None => Vec::new(),
    };

    let (posts, stats) = build_thread(published, pending, viewer.map(|u| u.user_id));

    Ok(TopicThread {
        topic,
        posts,
        count,
        limit: page.limit,
        offset: page.offset,
        stats,
    })
}

/// Keep the pending posts whose place is on this page. Expects them oldest
/// first, so a pending parent is seen before its pending replies.
fn on_page(pending: Vec<Post>, published: &[Post], page: Page) -> Vec<Post> {
    let mut shown: HashSet<PostId> = published.iter().map(|p| p.id).collect();
    let total = pending.len();

    let kept: Vec<Post> = pending
        .into_iter()
        .filter(|post| {
            let keep = match post.parent_post_id {
                None => page.offset == 0,
                Some(parent) => shown.contains(&parent),
            };
            if keep {
                shown.insert(post.id);
            }
            keep
        })
        .collect();

    if kept.len() < total {
        debug!(skipped = total - kept.len(), "pending posts belong to other pages");
    }
    kept
}

/// A user's published posts, one page at a time. Pending and rejected posts
/// are included only when the viewer is that user.
pub async fn profile(
    user_id: UserId,
    viewer: Option<&CurrentUser>,
    page: Page,
    deps: &ServerDeps,
) -> ForumResult<Profile> {
    let published = deps
        .store
        .list_published_by_author(user_id, page.limit, page.offset)
        .await?;
    let published_count = deps.store.count_published_by_author(user_id).await?;

    let (pending, rejected) = match viewer {
        Some(viewer) if viewer.user_id == user_id => (
            deps.store.list_pending_by_author(user_id).await?,
            deps.store.list_rejected_by_author(user_id).await?,
        ),
        _ => (Vec::new(), Vec::new()),
    };

    Ok(Profile {
        user_id,
        published,
        published_count,
        limit: page.limit,
        offset: page.offset,
        pending,
        rejected,
    })
}

/// Find a post in any state. Posts the viewer may not see are reported as
/// missing.
pub async fn lookup_post(
    post_id: PostId,
    viewer: Option<&CurrentUser>,
    deps: &ServerDeps,
) -> ForumResult<Post> {
    let found = match deps.store.find_published(post_id).await? {
        Some(post) => Some(post),
        None => match deps.store.find_pending(post_id).await? {
            Some(post) => Some(post),
            None => deps.store.find_rejected(post_id).await?,
        },
    };

    found
        .filter(|post| post.is_visible_to(viewer))
        .ok_or_else(|| ForumError::not_found(format!("Post {} not found", post_id)))
}

/// Follow a pending id to its current form.
pub async fn resolve_pending(
    pending_post_id: PostId,
    viewer: Option<&CurrentUser>,
    deps: &ServerDeps,
) -> ForumResult<PendingResolution> {
    let not_found = || ForumError::not_found(format!("Post {} not found", pending_post_id));

    if let Some(post) = deps.store.find_pending(pending_post_id).await? {
        return if post.is_visible_to(viewer) {
            Ok(PendingResolution::Pending(post))
        } else {
            Err(not_found())
        };
    }

    if let Some(approval) = deps.store.find_approval(pending_post_id).await? {
        return deps
            .store
            .find_published(approval.post_id)
            .await?
            .map(PendingResolution::Published)
            .ok_or_else(not_found);
    }

    deps.store
        .find_rejected(pending_post_id)
        .await?
        .filter(|post| post.is_visible_to(viewer))
        .map(PendingResolution::Rejected)
        .ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::auth::UserRole;
    use crate::domains::posts::activities::thread_builder::Provenance;
    use crate::domains::posts::activities::transitions;
    use crate::kernel::TestDependencies;
    use std::sync::Arc;

    struct Fixture {
        deps: Arc<ServerDeps>,
        topic_id: TopicId,
        alice: CurrentUser,
        bob: CurrentUser,
    }

    async fn fixture() -> Fixture {
        let deps = TestDependencies::new().into_deps();
        let alice = CurrentUser::new(UserId::new(), UserRole::User);
        let topic = deps
            .store
            .insert_topic(Topic::new("Debate", None, alice.user_id))
            .await
            .unwrap();
        Fixture {
            deps,
            topic_id: topic.id,
            alice,
            bob: CurrentUser::new(UserId::new(), UserRole::User),
        }
    }

    impl Fixture {
        async fn submit(&self, author: &CurrentUser, parent: Option<PostId>, text: &str) -> Post {
            self.deps
                .store
                .insert_pending(Post::submitted(author.user_id, self.topic_id, parent, text.into()))
                .await
                .unwrap()
        }

        async fn publish(&self, author: &CurrentUser, parent: Option<PostId>, text: &str) -> Post {
            let pending = self.submit(author, parent, text).await;
            transitions::approve(pending.id, &self.deps).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_thread_shows_only_viewers_pending() {
        let f = fixture().await;
        let root = f.publish(&f.bob, None, "root").await;
        f.submit(&f.alice, Some(root.id), "alice pending").await;
        f.submit(&f.bob, Some(root.id), "bob pending").await;

        let thread = topic_thread(f.topic_id, Some(&f.alice), Page::default(), &f.deps).await.unwrap();
        assert_eq!(thread.posts.len(), 1);
        assert_eq!(thread.posts[0].reply_count, Some(0));
        let replies = &thread.posts[0].children;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, "alice pending");
        assert_eq!(replies[0].provenance, Provenance::OwnPending);

        let anonymous = topic_thread(f.topic_id, None, Page::default(), &f.deps).await.unwrap();
        assert!(anonymous.posts[0].children.is_empty());
    }

    #[tokio::test]
    async fn test_thread_for_missing_topic() {
        let f = fixture().await;
        let err = topic_thread(TopicId::new(), None, Page::default(), &f.deps).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_thread_pages_count_top_level_posts() {
        let f = fixture().await;
        let first = f.publish(&f.bob, None, "first").await;
        f.publish(&f.alice, Some(first.id), "reply to first").await;
        let second = f.publish(&f.bob, None, "second").await;
        let reply = f.publish(&f.alice, Some(second.id), "reply to second").await;
        f.publish(&f.bob, Some(reply.id), "nested under second").await;
        f.submit(&f.alice, Some(second.id), "pending under second").await;
        f.submit(&f.alice, None, "pending top level").await;

        let page = Page { limit: 1, offset: 0 };
        let thread = topic_thread(f.topic_id, Some(&f.alice), page, &f.deps).await.unwrap();
        assert_eq!(thread.count, 2);
        let roots: Vec<_> = thread.posts.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(roots, vec!["first", "pending top level"]);
        assert_eq!(thread.posts[0].children.len(), 1);
        assert_eq!(thread.stats.orphans_dropped, 0);

        let page = Page { limit: 1, offset: 1 };
        let thread = topic_thread(f.topic_id, Some(&f.alice), page, &f.deps).await.unwrap();
        assert_eq!(thread.count, 2);
        assert_eq!(thread.posts.len(), 1);
        assert_eq!(thread.posts[0].id, second.id);
        let replies = &thread.posts[0].children;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].children[0].content, "nested under second");
        assert_eq!(replies[1].provenance, Provenance::OwnPending);
        assert_eq!(thread.stats.orphans_dropped, 0);
    }

    #[tokio::test]
    async fn test_profile_keeps_replies_to_others() {
        let f = fixture().await;
        let root = f.publish(&f.bob, None, "bob's root").await;
        f.publish(&f.alice, Some(root.id), "alice reply").await;
        f.submit(&f.alice, Some(root.id), "alice pending").await;
        let rejected = f.submit(&f.alice, None, "alice rejected").await;
        transitions::reject(rejected.id, "off topic", &f.deps).await.unwrap();

        let own = profile(f.alice.user_id, Some(&f.alice), Page::default(), &f.deps)
            .await
            .unwrap();
        assert_eq!(own.published.len(), 1);
        assert_eq!(own.published_count, 1);
        assert_eq!(own.pending.len(), 1);
        assert_eq!(own.rejected.len(), 1);
    }

    #[tokio::test]
    async fn test_profile_hides_pending_and_rejected_from_others() {
        let f = fixture().await;
        f.publish(&f.alice, None, "public").await;
        f.submit(&f.alice, None, "draft").await;
        let rejected = f.submit(&f.alice, None, "spam").await;
        transitions::reject(rejected.id, "spam", &f.deps).await.unwrap();

        let moderator = CurrentUser::new(UserId::new(), UserRole::Moderator);
        for viewer in [Some(&f.bob), Some(&moderator), None] {
            let seen = profile(f.alice.user_id, viewer, Page::default(), &f.deps)
                .await
                .unwrap();
            assert_eq!(seen.published.len(), 1);
            assert!(seen.pending.is_empty());
            assert!(seen.rejected.is_empty());
        }
    }

    #[tokio::test]
    async fn test_profile_pages_published_posts() {
        let f = fixture().await;
        for text in ["one", "two", "three"] {
            f.publish(&f.alice, None, text).await;
        }

        let page = Page { limit: 2, offset: 2 };
        let seen = profile(f.alice.user_id, None, page, &f.deps).await.unwrap();
        assert_eq!(seen.published_count, 3);
        assert_eq!(seen.published.len(), 1);
        assert_eq!(seen.published[0].content, "one");
    }

    #[tokio::test]
    async fn test_lookup_respects_visibility() {
        let f = fixture().await;
        let pending = f.submit(&f.alice, None, "draft").await;

        assert!(lookup_post(pending.id, Some(&f.alice), &f.deps).await.is_ok());
        assert!(lookup_post(pending.id, Some(&f.bob), &f.deps)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(lookup_post(pending.id, None, &f.deps).await.is_err());

        let moderator = CurrentUser::new(UserId::new(), UserRole::Moderator);
        assert!(lookup_post(pending.id, Some(&moderator), &f.deps).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_follows_approval() {
        let f = fixture().await;
        let pending = f.submit(&f.alice, None, "claim").await;

        assert!(matches!(
            resolve_pending(pending.id, Some(&f.alice), &f.deps).await.unwrap(),
            PendingResolution::Pending(_)
        ));

        let published = transitions::approve(pending.id, &f.deps).await.unwrap();
        match resolve_pending(pending.id, None, &f.deps).await.unwrap() {
            PendingResolution::Published(post) => assert_eq!(post.id, published.id),
            other => panic!("expected published, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_rejected_only_for_author() {
        let f = fixture().await;
        let pending = f.submit(&f.alice, None, "claim").await;
        transitions::reject(pending.id, "no sources", &f.deps).await.unwrap();

        assert!(matches!(
            resolve_pending(pending.id, Some(&f.alice), &f.deps).await.unwrap(),
            PendingResolution::Rejected(_)
        ));
        assert!(resolve_pending(pending.id, Some(&f.bob), &f.deps)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
