//! Application state context.
//!
//! `AppState` is the single owner of the current feed and the preference
//! store. It is created once and passed around by `Arc`; there are no
//! globals. The feed is held as an `Arc<Feed>` that is swapped whole under
//! a short write lock, so a reader sees either the old or the new feed,
//! never a half-applied one.
//!
//! - `feed()` returns the current value (Arc clone, cheap).
//! - `prepend` / `append` / `replace` / `patch` are the only writers.
//! - `subscribe(handler)` registers a callback run after every swap.
//!
//! Swaps and their notifications are serialized, so every handler sees the
//! feeds in the order they were installed. Handlers may read the state but
//! must not write the feed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use socialhub_kv::{KVStore, MemoryKV};

use crate::feed::Feed;
use crate::model::{Post, PostId};
use crate::prefs::Preferences;

/// Preference store over any boxed KV backend.
pub type SharedPrefs = Preferences<Arc<dyn KVStore>>;

/// Callback type for feed change notifications.
pub type FeedHandler = Arc<dyn Fn(&Feed) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub struct AppState {
    feed: RwLock<Arc<Feed>>,
    prefs: Arc<SharedPrefs>,
    handlers: RwLock<Vec<(SubscriptionId, FeedHandler)>>,
    next_id: AtomicU64,
    /// Held from swap through notification.
    order: Mutex<()>,
}

impl AppState {
    pub fn new(prefs: Arc<SharedPrefs>) -> Self {
        Self {
            feed: RwLock::new(Arc::new(Feed::new())),
            prefs,
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            order: Mutex::new(()),
        }
    }

    /// State backed by an in-memory store. Preferences do not survive the
    /// process.
    pub fn in_memory() -> Self {
        let store: Arc<dyn KVStore> = Arc::new(MemoryKV::new());
        Self::new(Arc::new(Preferences::new(store)))
    }

    pub fn prefs(&self) -> &Arc<SharedPrefs> {
        &self.prefs
    }

    /// Current feed snapshot.
    pub fn feed(&self) -> Arc<Feed> {
        self.feed.read().unwrap().clone()
    }

    /// Compute the next feed from the current one and swap it in, then
    /// notify subscribers. `f` runs under the write lock and must not call
    /// back into this `AppState`. A concurrent update waits until this
    /// one's handlers have returned.
    pub fn update_feed<F>(&self, f: F) -> Arc<Feed>
    where
        F: FnOnce(&Feed) -> Feed,
    {
        let _order = self.order.lock().unwrap();
        let next = {
            let mut slot = self.feed.write().unwrap();
            let next = Arc::new(f(&slot));
            *slot = next.clone();
            next
        };
        let handlers: Vec<FeedHandler> = self
            .handlers
            .read()
            .unwrap()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(&next);
        }
        next
    }

    pub fn prepend(&self, post: Post) -> Arc<Feed> {
        self.update_feed(|feed| feed.prepend(post))
    }

    pub fn append(&self, posts: Vec<Post>) -> Arc<Feed> {
        self.update_feed(|feed| feed.append(posts))
    }

    pub fn replace(&self, posts: Vec<Post>) -> Arc<Feed> {
        self.update_feed(|feed| feed.replace(posts))
    }

    pub fn patch<F>(&self, id: &PostId, updater: F) -> Arc<Feed>
    where
        F: FnOnce(&Post) -> Post,
    {
        self.update_feed(|feed| feed.patch(id, updater))
    }

    /// Register a handler called with the new feed after every swap.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Feed) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().unwrap().push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.write().unwrap().retain(|(sid, _)| *sid != id);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}
