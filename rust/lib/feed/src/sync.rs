//! Optimistic sync client.
//!
//! Every mutation is applied to the local feed first, synchronously, and
//! only then sent to the server. The local half never waits on the
//! network, so the viewer sees their action immediately and mutations on
//! the same post are issued in the order they were made.
//!
//! Every mutation on a post takes a sequence number. A remote result only
//! settles the post's [`MutationState`], or rolls it back, while it is
//! still the latest mutation issued on that post.
//!
//! Posts still under a provisional id are not known to the server. Likes
//! and shares on them stay local until the create is confirmed, then go
//! out against the canonical id.
//!
//! When the remote call fails, the client logs it and follows its
//! [`FailurePolicy`]. Remote failures never reach the caller; the only
//! error returned is [`SyncError::EmptyPost`] for a draft the server
//! would refuse anyway.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::client::{CreatePost, PostApi};
use crate::engagement::{self, Action};
use crate::error::SyncError;
use crate::model::{Author, Media, MediaKind, Post, PostId};
use crate::state::AppState;

pub const DEFAULT_PER_PAGE: u32 = 10;

/// Platform tag sent with every created post.
pub const PLATFORM: &str = "hub";

/// What to do with optimistic state when the server rejects a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep what the viewer sees. The feed may disagree with the server
    /// until the next refresh.
    #[default]
    Retain,
    /// Undo the local change: remove the provisional post, or put back
    /// the flag and counter as they were before the toggle.
    Rollback,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Retain => f.write_str("retain"),
            FailurePolicy::Rollback => f.write_str("rollback"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "retain" => Ok(FailurePolicy::Retain),
            "rollback" => Ok(FailurePolicy::Rollback),
            other => Err(format!("unknown failure policy '{}' (expected retain|rollback)", other)),
        }
    }
}

/// Lifecycle of one mutation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Applied locally, remote call in flight.
    Pending,
    /// The server accepted it (or no remote call was needed).
    Confirmed,
    /// The remote call failed; local state follows the failure policy.
    Degraded,
}

/// A post being composed.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub content: String,
    pub media: Option<Media>,
    pub author: Author,
}

impl Draft {
    pub fn text(author: Author, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            media: None,
            author,
        }
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }
}

/// Result of `create_post`: the id the post now lives under (canonical on
/// success, provisional otherwise) and how the attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub id: PostId,
    pub state: MutationState,
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    seq: u64,
    state: MutationState,
}

#[derive(Debug, Clone, Copy)]
struct Paging {
    page: u32,
    has_more: bool,
}

pub struct SyncClient {
    api: Arc<dyn PostApi>,
    state: Arc<AppState>,
    policy: FailurePolicy,
    per_page: u32,
    next_local: AtomicU64,
    next_seq: AtomicU64,
    paging: Mutex<Paging>,
    mutations: Mutex<HashMap<PostId, Tracked>>,
}

impl SyncClient {
    pub fn new(api: Arc<dyn PostApi>, state: Arc<AppState>) -> Self {
        Self {
            api,
            state,
            policy: FailurePolicy::default(),
            per_page: DEFAULT_PER_PAGE,
            next_local: AtomicU64::new(1),
            next_seq: AtomicU64::new(1),
            paging: Mutex::new(Paging { page: 0, has_more: true }),
            mutations: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Last page loaded; 0 before the first load.
    pub fn page(&self) -> u32 {
        self.paging.lock().unwrap().page
    }

    pub fn has_more(&self) -> bool {
        self.paging.lock().unwrap().has_more
    }

    /// State of the most recent mutation on `id`, if any.
    pub fn mutation_state(&self, id: &PostId) -> Option<MutationState> {
        self.mutations.lock().unwrap().get(id).map(|t| t.state)
    }

    /// Record a new mutation on `id` as the latest one; returns its number.
    fn issue(&self, id: &PostId, state: MutationState) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.mutations
            .lock()
            .unwrap()
            .insert(id.clone(), Tracked { seq, state });
        seq
    }

    /// Set the state of mutation `seq` on `id` if nothing newer has been
    /// issued there. Returns whether it was still the latest.
    fn settle(&self, id: &PostId, seq: u64, state: MutationState) -> bool {
        match self.mutations.lock().unwrap().get_mut(id) {
            Some(t) if t.seq == seq => {
                t.state = state;
                true
            }
            _ => false,
        }
    }

    /// Save the feed, minus provisional posts, for the next start.
    fn save_snapshot(&self) {
        let posts: Vec<Post> = self
            .state
            .feed()
            .posts()
            .iter()
            .filter(|p| !p.id.is_provisional())
            .cloned()
            .collect();
        self.state.prefs().save_feed_snapshot(&posts);
    }

    /// Show the feed saved by an earlier session, with current bookmarks.
    /// Returns false, leaving the feed alone, when nothing readable was
    /// saved.
    pub fn restore_snapshot(&self) -> bool {
        let Some(posts) = self.state.prefs().feed_snapshot() else {
            return false;
        };
        debug!("sync: restored {} posts from snapshot", posts.len());
        self.state.replace(self.with_bookmarks(posts));
        true
    }

    // ====================================================================
    // Compose
    // ====================================================================

    /// Prepend a provisional post and send it to the server.
    pub async fn create_post(&self, draft: Draft) -> Result<Outcome, SyncError> {
        let content = draft.content.trim().to_string();
        if content.is_empty() && draft.media.is_none() {
            return Err(SyncError::EmptyPost);
        }
        let mut post = Post::new(
            PostId::provisional(self.next_local.fetch_add(1, Ordering::Relaxed)),
            draft.author,
            content.clone(),
        );
        post.media = draft.media;

        let provisional = post.id.clone();
        let image_url = post
            .media
            .as_ref()
            .filter(|m| m.kind == MediaKind::Image)
            .map(|m| m.url.clone());
        self.state.prepend(post.clone());
        let seq = self.issue(&provisional, MutationState::Pending);
        debug!("sync: created provisional post {}", provisional);

        let req = CreatePost {
            content,
            image_url,
            platform: PLATFORM.to_string(),
        };
        match self.api.create_post(&req).await {
            Ok(created) => {
                let id = created.id.clone();
                let mut confirmed = None;
                self.state.update_feed(|feed| {
                    // Likes, shares and comments made while the create was
                    // in flight live on the feed entry, not on `post`.
                    let current = feed.get(&provisional).unwrap_or(&post);
                    let mut canonical = current.clone();
                    canonical.id = created.id;
                    if let Some(at) = created.created_at {
                        canonical.created_at = at;
                    }
                    // The provisional entry started from zero, so its counts
                    // are all local.
                    canonical.counts = match created.counts {
                        Some(server) => server.plus(current.counts),
                        None => current.counts,
                    };
                    confirmed = Some(canonical.clone());
                    feed.reconcile(&provisional, canonical)
                });
                self.mutations.lock().unwrap().remove(&provisional);
                self.issue(&id, MutationState::Confirmed);
                info!("sync: post {} confirmed as {}", provisional, id);
                self.save_snapshot();

                if let Some(canonical) = confirmed {
                    self.send_held(&canonical).await;
                }
                Ok(Outcome { id, state: MutationState::Confirmed })
            }
            Err(e) => {
                warn!("sync: create of {} failed ({}): {}", provisional, self.policy, e);
                if self.policy == FailurePolicy::Rollback {
                    self.state.update_feed(|feed| feed.remove(&provisional));
                }
                self.settle(&provisional, seq, MutationState::Degraded);
                Ok(Outcome { id: provisional, state: MutationState::Degraded })
            }
        }
    }

    // ====================================================================
    // Engagement
    // ====================================================================

    /// Toggle like/share/bookmark on `id`. Unknown ids are ignored.
    ///
    /// On a provisional post the toggle is applied locally and reported as
    /// `Pending`; it is sent once the create is confirmed.
    pub async fn toggle(&self, id: &PostId, action: Action) -> MutationState {
        let mut before = None;
        let feed = self.state.patch(id, |p| {
            before = Some(p.clone());
            engagement::toggle(p, action)
        });
        let Some(before) = before else {
            debug!("sync: {:?} on unknown post {}, ignored", action, id);
            return MutationState::Confirmed;
        };
        self.save_snapshot();

        let Some(interaction) = action.interaction() else {
            // Bookmarks never leave the device.
            let bookmarked = feed.get(id).is_some_and(|p| p.engagement.bookmarked);
            self.state.prefs().set_bookmarked(id, bookmarked);
            self.issue(id, MutationState::Confirmed);
            return MutationState::Confirmed;
        };
        if id.is_provisional() {
            debug!("sync: holding {} on {} until it is confirmed", interaction.as_str(), id);
            return MutationState::Pending;
        }
        self.send(id, action, &before).await
    }

    /// Send the interaction for `action`, which has already been applied
    /// locally on top of `before`.
    async fn send(&self, id: &PostId, action: Action, before: &Post) -> MutationState {
        let Some(interaction) = action.interaction() else {
            return MutationState::Confirmed;
        };
        let seq = self.issue(id, MutationState::Pending);
        match self.api.interact(id, interaction).await {
            Ok(()) => {
                self.settle(id, seq, MutationState::Confirmed);
                MutationState::Confirmed
            }
            Err(e) => {
                let latest = self.settle(id, seq, MutationState::Degraded);
                warn!(
                    "sync: {} on {} failed ({}{}): {}",
                    interaction.as_str(),
                    id,
                    self.policy,
                    if latest { "" } else { ", superseded" },
                    e
                );
                if latest && self.policy == FailurePolicy::Rollback {
                    self.state
                        .patch(id, |p| engagement::restore(p, before, action));
                    self.save_snapshot();
                }
                MutationState::Degraded
            }
        }
    }

    /// Send likes and shares made on a post before the server knew it.
    async fn send_held(&self, post: &Post) {
        let held = [
            (Action::Like, post.engagement.liked),
            (Action::Share, post.engagement.shared),
        ];
        for (action, on) in held {
            if on {
                let before = engagement::toggle(post, action);
                self.send(&post.id, action, &before).await;
            }
        }
    }

    /// Count a comment locally.
    pub fn comment(&self, id: &PostId) -> MutationState {
        self.state.patch(id, engagement::record_comment);
        self.save_snapshot();
        MutationState::Confirmed
    }

    // ====================================================================
    // Pagination
    // ====================================================================

    /// Load page 1 and replace the feed.
    pub async fn refresh(&self) -> MutationState {
        match self.fetch(1).await {
            Some(posts) => {
                let feed = self.state.replace(posts);
                // Settled entries for posts that left the feed are dropped.
                self.mutations
                    .lock()
                    .unwrap()
                    .retain(|id, t| t.state == MutationState::Pending || feed.contains(id));
                self.save_snapshot();
                MutationState::Confirmed
            }
            None => MutationState::Degraded,
        }
    }

    /// Load the next page and append it. A no-op once the server has
    /// reported the end.
    pub async fn load_more(&self) -> MutationState {
        let next = {
            let paging = self.paging.lock().unwrap();
            if !paging.has_more {
                return MutationState::Confirmed;
            }
            paging.page + 1
        };
        match self.fetch(next).await {
            Some(posts) => {
                self.state.append(posts);
                self.save_snapshot();
                MutationState::Confirmed
            }
            None => MutationState::Degraded,
        }
    }

    async fn fetch(&self, page: u32) -> Option<Vec<Post>> {
        let result = match self.api.list_posts(page, self.per_page).await {
            Ok(result) => result,
            Err(e) => {
                warn!("sync: loading page {} failed: {}", page, e);
                return None;
            }
        };
        let has_more = result
            .has_more
            .unwrap_or(result.posts.len() as u32 == self.per_page);
        *self.paging.lock().unwrap() = Paging { page, has_more };
        debug!("sync: page {} has {} posts, more={}", page, result.posts.len(), has_more);

        Some(self.with_bookmarks(result.posts))
    }

    fn with_bookmarks(&self, posts: Vec<Post>) -> Vec<Post> {
        let marks = self.state.prefs().bookmarks();
        posts
            .into_iter()
            .map(|mut p| {
                p.engagement.bookmarked = marks.contains(&p.id);
                p
            })
            .collect()
    }
}
