//! Post records as the client holds them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque post identifier. Provisional ids minted by the client look like
/// `local-1`; server ids are whatever the API hands back.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Provisional id for the `n`-th locally composed post.
    pub fn provisional(n: u64) -> Self {
        Self(format!("local-{}", n))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with("local-")
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Embedded copy of the author at the time the post was built. Later
/// profile edits do not flow back into posts already in a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub display_name: String,
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn new(display_name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            handle: handle.into(),
            avatar_url: None,
        }
    }

    /// Placeholder used when the server omits author details.
    pub fn unknown() -> Self {
        Self::new("Unknown", "unknown")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub kind: MediaKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
}

impl Media {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
            duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
}

impl Counts {
    /// Field-wise sum, saturating.
    pub fn plus(self, other: Counts) -> Counts {
        Counts {
            likes: self.likes.saturating_add(other.likes),
            comments: self.comments.saturating_add(other.comments),
            shares: self.shares.saturating_add(other.shares),
        }
    }
}

/// Viewer-local flags. Never part of the canonical remote record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub liked: bool,
    pub shared: bool,
    pub bookmarked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub author: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    pub counts: Counts,
    pub engagement: Engagement,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// A fresh post with zero counts and no engagement.
    pub fn new(id: impl Into<PostId>, author: Author, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            author,
            media: None,
            counts: Counts::default(),
            engagement: Engagement::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_counts(mut self, counts: Counts) -> Self {
        self.counts = counts;
        self
    }

    /// Content may be blank only when media carries the post.
    pub fn has_body(&self) -> bool {
        !self.content.trim().is_empty() || self.media.is_some()
    }
}
