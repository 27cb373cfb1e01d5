//! Local preference store: typed, best-effort persistence of UI choices.
//!
//! Each preference is its own key holding a JSON value. Reads fall back to
//! a default when the key is missing, the bytes don't decode, or the store
//! itself errors; writes that fail are logged and dropped. Nothing in here
//! ever fails the caller.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use socialhub_kv::KVStore;
use tracing::{debug, warn};

use crate::model::{Post, PostId};

pub const THEME_KEY: &str = "theme";
pub const FOLLOWED_HASHTAGS_KEY: &str = "followedHashtags";
pub const RECENT_SEARCHES_KEY: &str = "recentSearches";
pub const BOOKMARKS_KEY: &str = "bookmarks";
pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";
pub const POSTS_KEY: &str = "posts";

/// Most recent searches kept, newest first.
pub const RECENT_SEARCH_LIMIT: usize = 10;

// ── Theme ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
    Cyberpunk,
    Neon,
    Sunset,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Light,
        Theme::Dark,
        Theme::System,
        Theme::Cyberpunk,
        Theme::Neon,
        Theme::Sunset,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
            Theme::Cyberpunk => "cyberpunk",
            Theme::Neon => "neon",
            Theme::Sunset => "sunset",
        }
    }

    /// The theme actually applied: `System` follows the platform setting.
    pub fn effective(self, system_prefers_dark: bool) -> Theme {
        match self {
            Theme::System if system_prefers_dark => Theme::Dark,
            Theme::System => Theme::Light,
            other => other,
        }
    }

    /// Dark-background themes. Call on an effective theme.
    pub fn is_dark(self) -> bool {
        matches!(self, Theme::Dark | Theme::Cyberpunk | Theme::Neon)
    }

    /// Quick light/dark switch from whatever is currently shown.
    pub fn toggled(currently_dark: bool) -> Theme {
        if currently_dark { Theme::Light } else { Theme::Dark }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.name() == s.trim())
            .ok_or_else(|| format!("unknown theme '{}'", s))
    }
}

// ── Preferences ─────────────────────────────────────────────────────

/// Typed preference access over any `KVStore`.
pub struct Preferences<S: KVStore> {
    store: S,
}

impl<S: KVStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read and decode `key`, or return `default`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.raw(key) {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    debug!("prefs: discarding malformed value for {}: {}", key, e);
                    default
                }
            },
            None => default,
        }
    }

    /// Encode and write `value` under `key`. Failures are logged only.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(b) => b,
            Err(e) => {
                warn!("prefs: cannot encode {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(key, &bytes) {
            warn!("prefs: write to {} dropped: {}", key, e);
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.store.delete(key) {
            warn!("prefs: delete of {} dropped: {}", key, e);
        }
    }

    fn raw(&self, key: &str) -> Option<Vec<u8>> {
        match self.store.get(key) {
            Ok(v) => v,
            Err(e) => {
                warn!("prefs: read of {} failed, using default: {}", key, e);
                None
            }
        }
    }

    // ====================================================================
    // Theme
    // ====================================================================

    /// Stored theme. Accepts both JSON (`"dark"`) and a bare name (`dark`).
    pub fn theme(&self) -> Theme {
        let Some(bytes) = self.raw(THEME_KEY) else {
            return Theme::default();
        };
        if let Ok(theme) = serde_json::from_slice::<Theme>(&bytes) {
            return theme;
        }
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                debug!("prefs: unreadable theme, falling back to system");
                Theme::default()
            })
    }

    pub fn set_theme(&self, theme: Theme) {
        self.set(THEME_KEY, &theme);
    }

    // ====================================================================
    // Followed hashtags
    // ====================================================================

    pub fn followed_hashtags(&self) -> BTreeSet<String> {
        self.get(FOLLOWED_HASHTAGS_KEY, BTreeSet::new())
    }

    /// Follow or unfollow `id`. Returns true when now following.
    pub fn toggle_hashtag(&self, id: &str) -> bool {
        let mut followed = self.followed_hashtags();
        let following = if followed.remove(id) {
            false
        } else {
            followed.insert(id.to_string());
            true
        };
        self.set(FOLLOWED_HASHTAGS_KEY, &followed);
        following
    }

    // ====================================================================
    // Recent searches
    // ====================================================================

    /// Newest first, at most `RECENT_SEARCH_LIMIT`, no repeats.
    pub fn recent_searches(&self) -> Vec<String> {
        normalize_recent(self.get(RECENT_SEARCHES_KEY, Vec::new()))
    }

    /// Record a search. A repeated query moves to the front. Blank
    /// queries are ignored. Returns the updated list.
    pub fn push_recent_search(&self, query: &str) -> Vec<String> {
        let query = query.trim();
        let mut recent = self.recent_searches();
        if query.is_empty() {
            return recent;
        }
        recent.retain(|s| s != query);
        recent.insert(0, query.to_string());
        recent.truncate(RECENT_SEARCH_LIMIT);
        self.set(RECENT_SEARCHES_KEY, &recent);
        recent
    }

    pub fn clear_recent_searches(&self) {
        self.remove(RECENT_SEARCHES_KEY);
    }

    // ====================================================================
    // Bookmarks
    // ====================================================================

    pub fn bookmarks(&self) -> BTreeSet<PostId> {
        self.get(BOOKMARKS_KEY, BTreeSet::new())
    }

    pub fn is_bookmarked(&self, id: &PostId) -> bool {
        self.bookmarks().contains(id)
    }

    pub fn set_bookmarked(&self, id: &PostId, bookmarked: bool) {
        let mut marks = self.bookmarks();
        let changed = if bookmarked {
            marks.insert(id.clone())
        } else {
            marks.remove(id)
        };
        if changed {
            self.set(BOOKMARKS_KEY, &marks);
        }
    }

    // ====================================================================
    // Feed snapshot
    // ====================================================================

    /// Posts saved by the last `save_feed_snapshot`. `None` when nothing
    /// was saved or the stored list does not decode.
    pub fn feed_snapshot(&self) -> Option<Vec<Post>> {
        self.get(POSTS_KEY, None)
    }

    pub fn save_feed_snapshot(&self, posts: &[Post]) {
        self.set(POSTS_KEY, posts);
    }

    // ====================================================================
    // Session
    // ====================================================================

    pub fn auth_token(&self) -> Option<String> {
        self.get(AUTH_TOKEN_KEY, None)
    }

    pub fn set_auth_token(&self, token: &str) {
        self.set(AUTH_TOKEN_KEY, token);
    }

    /// Forget the signed-in session (token and cached user).
    pub fn clear_session(&self) {
        self.remove(AUTH_TOKEN_KEY);
        self.remove(USER_KEY);
    }
}

fn normalize_recent(list: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(RECENT_SEARCH_LIMIT);
    for s in list {
        if out.len() == RECENT_SEARCH_LIMIT {
            break;
        }
        if !s.trim().is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}
