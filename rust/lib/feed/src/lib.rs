//! SocialHub client state core.
//!
//! Holds the feed the viewer sees, applies their actions to it
//! immediately, and keeps it in step with the server.
//!
//! # Pieces
//!
//! - [`engagement`]: pure like/share/bookmark transitions on a post
//! - [`feed`]: ordered, id-unique post collection (`prepend`, `append`,
//!   `replace`, `patch`)
//! - [`state`]: `AppState`, the one owner of the current feed and the
//!   preferences, passed around by `Arc`
//! - [`sync`]: `SyncClient`, optimistic mutations plus pagination against
//!   a [`client::PostApi`]
//! - [`prefs`]: typed, best-effort preferences over a `KVStore`
//! - [`capability`]: notifications, microphone, wallet
//!
//! # Example
//!
//! ```ignore
//! let state = Arc::new(AppState::in_memory());
//! let api = Arc::new(HttpPostApi::new(DEFAULT_BASE_URL, Arc::new(NoAuth)));
//! let sync = SyncClient::new(api, state.clone());
//!
//! sync.refresh().await;
//! sync.toggle(&PostId::new("7"), Action::Like).await;
//! let liked = state.feed().get(&PostId::new("7")).map(|p| p.engagement.liked);
//! ```

pub mod capability;
pub mod client;
pub mod config;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod model;
pub mod prefs;
pub mod state;
pub mod sync;

pub use client::{HttpPostApi, PostApi, TokenSource};
pub use config::ClientConfig;
pub use engagement::{Action, Interaction, toggle};
pub use error::{ApiError, DeviceError, SyncError};
pub use feed::Feed;
pub use model::{Author, Counts, Engagement, Media, MediaKind, Post, PostId};
pub use prefs::{Preferences, Theme};
pub use state::{AppState, SharedPrefs, SubscriptionId};
pub use sync::{Draft, FailurePolicy, MutationState, Outcome, SyncClient};
