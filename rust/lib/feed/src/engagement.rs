//! Engagement toggles: pure transitions over a borrowed post.

use serde::{Deserialize, Serialize};

use crate::model::Post;

/// A viewer gesture on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Like,
    Share,
    Bookmark,
}

impl Action {
    /// The remote interaction this gesture syncs as. Bookmarks stay local.
    pub fn interaction(self) -> Option<Interaction> {
        match self {
            Action::Like => Some(Interaction::Like),
            Action::Share => Some(Interaction::Share),
            Action::Bookmark => None,
        }
    }
}

/// `type` field of `POST /posts/{id}/interact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Like,
    Share,
}

impl Interaction {
    pub fn as_str(self) -> &'static str {
        match self {
            Interaction::Like => "like",
            Interaction::Share => "share",
        }
    }
}

/// Flip the flag for `action` and move its counter by one.
///
/// The counter never goes below zero, even on a record that claims
/// `liked` with `likes == 0`. Applying the same action twice returns the
/// original flags and, away from that floor, the original counts.
pub fn toggle(post: &Post, action: Action) -> Post {
    let mut next = post.clone();
    match action {
        Action::Like => {
            next.engagement.liked = !post.engagement.liked;
            next.counts.likes = step(post.counts.likes, next.engagement.liked);
        }
        Action::Share => {
            next.engagement.shared = !post.engagement.shared;
            next.counts.shares = step(post.counts.shares, next.engagement.shared);
        }
        Action::Bookmark => {
            next.engagement.bookmarked = !post.engagement.bookmarked;
        }
    }
    next
}

/// Put back the flag and counter `action` controls, as they were in
/// `before`. Everything else on `current` is kept.
pub fn restore(current: &Post, before: &Post, action: Action) -> Post {
    let mut next = current.clone();
    match action {
        Action::Like => {
            next.engagement.liked = before.engagement.liked;
            next.counts.likes = before.counts.likes;
        }
        Action::Share => {
            next.engagement.shared = before.engagement.shared;
            next.counts.shares = before.counts.shares;
        }
        Action::Bookmark => {
            next.engagement.bookmarked = before.engagement.bookmarked;
        }
    }
    next
}

/// One more comment. Comments have no flag, so this is not a toggle.
pub fn record_comment(post: &Post) -> Post {
    let mut next = post.clone();
    next.counts.comments = post.counts.comments.saturating_add(1);
    next
}

fn step(count: u32, now_on: bool) -> u32 {
    if now_on {
        count.saturating_add(1)
    } else {
        count.saturating_sub(1)
    }
}
