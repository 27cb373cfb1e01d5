//! Feed aggregator: an ordered, id-unique collection of posts.
//!
//! Every operation borrows the current value and returns a new `Feed`;
//! nothing is mutated in place. Callers swap the whole value (see
//! `AppState::update_feed`), so readers only ever observe a complete feed.

use std::collections::HashSet;

use crate::model::{Post, PostId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    posts: Vec<Post>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a feed from posts, keeping the first copy of any repeated id.
    pub fn from_posts(posts: Vec<Post>) -> Self {
        let mut seen = HashSet::new();
        let posts = posts
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();
        Self { posts }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<PostId> {
        self.posts.iter().map(|p| p.id.clone()).collect()
    }

    // ====================================================================
    // Operations
    // ====================================================================

    /// Insert at the front. An existing entry with the same id is dropped
    /// first, so the feed never holds a stale copy.
    pub fn prepend(&self, post: Post) -> Feed {
        let mut posts = Vec::with_capacity(self.posts.len() + 1);
        posts.extend(self.posts.iter().filter(|p| p.id != post.id).cloned());
        posts.insert(0, post);
        Feed { posts }
    }

    /// Add a page at the end, in the given order. A post whose id is
    /// already present replaces that entry where it stands.
    pub fn append(&self, batch: Vec<Post>) -> Feed {
        let mut posts = self.posts.clone();
        for post in batch {
            match posts.iter().position(|p| p.id == post.id) {
                Some(i) => posts[i] = post,
                None => posts.push(post),
            }
        }
        Feed { posts }
    }

    /// Discard everything and install `posts`.
    pub fn replace(&self, posts: Vec<Post>) -> Feed {
        Feed::from_posts(posts)
    }

    /// Replace the post `id` with `updater(post)`. A missing id leaves the
    /// feed as it was; background completions routinely land after their
    /// post scrolled out or the feed was refreshed.
    pub fn patch<F>(&self, id: &PostId, updater: F) -> Feed
    where
        F: FnOnce(&Post) -> Post,
    {
        let Some(i) = self.posts.iter().position(|p| &p.id == id) else {
            return self.clone();
        };
        let mut posts = self.posts.clone();
        posts[i] = updater(&self.posts[i]);
        // The updater may have changed the id; keep ids unique.
        let new_id = posts[i].id.clone();
        if &new_id != id {
            let mut j = 0;
            posts.retain(|p| {
                let keep = p.id != new_id || j == i;
                j += 1;
                keep
            });
        }
        Feed { posts }
    }

    /// Drop the post `id` if present.
    pub fn remove(&self, id: &PostId) -> Feed {
        Feed {
            posts: self.posts.iter().filter(|p| &p.id != id).cloned().collect(),
        }
    }

    /// Swap a provisional post for its server-confirmed version.
    ///
    /// The canonical record takes the provisional entry's position and
    /// keeps its viewer-local engagement flags. Any other copy of the
    /// canonical id (e.g. one a refresh already pulled in) is dropped.
    /// When the provisional entry is gone, the canonical post is prepended.
    pub fn reconcile(&self, provisional: &PostId, canonical: Post) -> Feed {
        let Some(i) = self.posts.iter().position(|p| &p.id == provisional) else {
            return self.prepend(canonical);
        };
        let mut canonical = canonical;
        canonical.engagement = self.posts[i].engagement;

        let mut posts = Vec::with_capacity(self.posts.len());
        for (j, p) in self.posts.iter().enumerate() {
            if j == i {
                posts.push(canonical.clone());
            } else if p.id != canonical.id {
                posts.push(p.clone());
            }
        }
        Feed { posts }
    }
}
