//! Builds the reply tree shown for a topic.
//!
//! Nodes live in one arena and link to their children by index. Published
//! posts go in first, in query order, then the viewer's own pending posts.
//! A reply whose parent is not in the view is dropped, together with anything
//! below it, and only counted. Replies nested past [`MAX_THREAD_DEPTH`] are
//! listed flat under their ancestor at that depth, so the output stays
//! shallow however long a reply chain grows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::common::{PostId, UserId};
use crate::domains::posts::models::Post;

/// Deepest nesting level kept in the built tree. Roots sit at depth 0.
pub const MAX_THREAD_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Published,
    /// The viewer's own submission, still waiting for a verdict
    OwnPending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadNode {
    pub id: PostId,
    pub content: String,
    pub author_id: UserId,
    pub parent_post_id: Option<PostId>,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
    /// Published posts only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<i64>,
    pub children: Vec<ThreadNode>,
}

/// Diagnostics from one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThreadStats {
    pub published: usize,
    pub own_pending: usize,
    pub duplicates_skipped: usize,
    pub foreign_pending_skipped: usize,
    pub orphans_dropped: usize,
    /// Replies moved up to the depth limit
    pub flattened: usize,
}

#[derive(Debug)]
struct Entry {
    post: Post,
    provenance: Provenance,
    children: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct ThreadBuilder {
    arena: Vec<Entry>,
    index: HashMap<PostId, usize>,
    roots: Vec<usize>,
    /// (parent id, child slot) in insertion order
    replies: Vec<(PostId, usize)>,
    stats: ThreadStats,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add published posts in the order they should appear.
    pub fn published(mut self, posts: impl IntoIterator<Item = Post>) -> Self {
        for post in posts {
            if self.insert(post, Provenance::Published) {
                self.stats.published += 1;
            }
        }
        self
    }

    /// Add pending posts. Only those authored by `viewer` are kept.
    pub fn own_pending(mut self, posts: impl IntoIterator<Item = Post>, viewer: Option<UserId>) -> Self {
        for post in posts {
            if Some(post.author_id) != viewer {
                self.stats.foreign_pending_skipped += 1;
                continue;
            }
            if self.insert(post, Provenance::OwnPending) {
                self.stats.own_pending += 1;
            }
        }
        self
    }

    fn insert(&mut self, post: Post, provenance: Provenance) -> bool {
        if self.index.contains_key(&post.id) {
            self.stats.duplicates_skipped += 1;
            return false;
        }

        let slot = self.arena.len();
        self.index.insert(post.id, slot);
        match post.parent_post_id {
            None => self.roots.push(slot),
            Some(parent) => self.replies.push((parent, slot)),
        }
        self.arena.push(Entry {
            post,
            provenance,
            children: Vec::new(),
        });
        true
    }

    /// Link replies to their parents and return the top-level trees.
    pub fn build(mut self) -> (Vec<ThreadNode>, ThreadStats) {
        for (parent, child) in std::mem::take(&mut self.replies) {
            match self.index.get(&parent) {
                Some(&slot) => self.arena[slot].children.push(child),
                None => self.stats.orphans_dropped += 1,
            }
        }

        let nodes = self.materialize();

        debug!(
            published = self.stats.published,
            own_pending = self.stats.own_pending,
            duplicates_skipped = self.stats.duplicates_skipped,
            foreign_pending_skipped = self.stats.foreign_pending_skipped,
            orphans_dropped = self.stats.orphans_dropped,
            flattened = self.stats.flattened,
            "thread built"
        );

        (nodes, self.stats)
    }

    /// Turn the linked arena into owned nodes without recursing.
    ///
    /// A pre-order walk decides where every reachable slot ends up. Slots
    /// deeper than [`MAX_THREAD_DEPTH`] are hung under their ancestor at that
    /// depth, in walk order. Walking the pre-order backwards then builds every
    /// node after all of its children.
    fn materialize(&mut self) -> Vec<ThreadNode> {
        let len = self.arena.len();
        let mut kids: Vec<Vec<usize>> = vec![Vec::new(); len];
        let mut order = Vec::with_capacity(len);

        // (slot, depth, output parent, ancestor at the depth limit)
        let mut stack: Vec<(usize, usize, Option<usize>, Option<usize>)> = self
            .roots
            .iter()
            .rev()
            .map(|&slot| (slot, 0, None, None))
            .collect();

        while let Some((slot, depth, attach, anchor)) = stack.pop() {
            order.push(slot);
            if let Some(parent) = attach {
                kids[parent].push(slot);
            }

            let (child_attach, child_anchor) = if depth < MAX_THREAD_DEPTH {
                (slot, None)
            } else {
                let anchor = anchor.unwrap_or(slot);
                (anchor, Some(anchor))
            };
            if depth > MAX_THREAD_DEPTH {
                self.stats.flattened += self.arena[slot].children.len();
            }
            for &child in self.arena[slot].children.iter().rev() {
                stack.push((child, depth + 1, Some(child_attach), child_anchor));
            }
        }

        let mut entries: Vec<Option<Entry>> = std::mem::take(&mut self.arena)
            .into_iter()
            .map(Some)
            .collect();
        let mut built: Vec<Option<ThreadNode>> = (0..len).map(|_| None).collect();

        for &slot in order.iter().rev() {
            let Some(entry) = entries[slot].take() else {
                continue;
            };
            let children = kids[slot]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[slot] = Some(into_node(entry, children));
        }

        self.roots
            .iter()
            .filter_map(|&slot| built[slot].take())
            .collect()
    }
}

fn into_node(entry: Entry, children: Vec<ThreadNode>) -> ThreadNode {
    let post = entry.post;
    ThreadNode {
        reply_count: post.reply_count(),
        id: post.id,
        content: post.content,
        author_id: post.author_id,
        parent_post_id: post.parent_post_id,
        created_at: post.created_at,
        provenance: entry.provenance,
        children,
    }
}

/// Build the tree for one topic from its published posts and the viewer's
/// pending posts in that topic.
pub fn build_thread(
    published: Vec<Post>,
    pending: Vec<Post>,
    viewer: Option<UserId>,
) -> (Vec<ThreadNode>, ThreadStats) {
    ThreadBuilder::new()
        .published(published)
        .own_pending(pending, viewer)
        .build()
}
