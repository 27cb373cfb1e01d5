//! Sync client scenarios against a scripted, in-process posts API.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use socialhub_feed::client::{CreatePost, CreatedPost, PostApi, PostPage};
use socialhub_feed::{
    Action, ApiError, AppState, Author, Counts, Draft, FailurePolicy, Interaction, Media,
    MutationState, Post, PostId, SyncClient, SyncError,
};

// ============================================================================
// Scripted API
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    List(u32, u32),
    Create(CreatePost),
    Interact(PostId, Interaction),
}

#[derive(Default)]
struct ScriptedApi {
    calls: Mutex<Vec<Call>>,
    pages: Mutex<VecDeque<Result<PostPage, ApiError>>>,
    created: Mutex<VecDeque<Result<CreatedPost, ApiError>>>,
    interactions: Mutex<VecDeque<Result<(), ApiError>>>,
    /// When set, `create_post` waits on this before answering.
    gate: Option<Arc<Notify>>,
    /// Taken by the next `interact`, which waits on it before answering.
    held_interact: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedApi {
    fn page(self, posts: Vec<Post>, has_more: Option<bool>) -> Self {
        self.pages.lock().unwrap().push_back(Ok(PostPage { posts, has_more }));
        self
    }

    fn page_fails(self) -> Self {
        self.pages.lock().unwrap().push_back(Err(server_down()));
        self
    }

    fn creates(self, id: &str) -> Self {
        self.created.lock().unwrap().push_back(Ok(CreatedPost {
            id: PostId::new(id),
            created_at: None,
            counts: None,
        }));
        self
    }

    fn create_fails(self) -> Self {
        self.created.lock().unwrap().push_back(Err(server_down()));
        self
    }

    fn interact_ok(self) -> Self {
        self.interactions.lock().unwrap().push_back(Ok(()));
        self
    }

    fn interact_fails(self) -> Self {
        self.interactions.lock().unwrap().push_back(Err(server_down()));
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn hold_next_interact(self, gate: Arc<Notify>) -> Self {
        *self.held_interact.lock().unwrap() = Some(gate);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

fn server_down() -> ApiError {
    ApiError::Server {
        status: 503,
        message: "unavailable".into(),
    }
}

#[async_trait]
impl PostApi for ScriptedApi {
    async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostPage, ApiError> {
        self.calls.lock().unwrap().push(Call::List(page, per_page));
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PostPage { posts: vec![], has_more: Some(false) }))
    }

    async fn create_post(&self, req: &CreatePost) -> Result<CreatedPost, ApiError> {
        self.calls.lock().unwrap().push(Call::Create(req.clone()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.created.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(server_down()))
    }

    async fn interact(&self, id: &PostId, interaction: Interaction) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Interact(id.clone(), interaction));
        let next = self.interactions.lock().unwrap().pop_front();
        let held = self.held_interact.lock().unwrap().take();
        if let Some(gate) = held {
            gate.notified().await;
        }
        next.unwrap_or(Ok(()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn remote_post(id: &str, likes: u32) -> Post {
    Post::new(id, Author::new("Alex", "alexj"), format!("post {}", id)).with_counts(Counts {
        likes,
        comments: 0,
        shares: 0,
    })
}

fn client(api: ScriptedApi) -> (Arc<ScriptedApi>, Arc<AppState>, SyncClient) {
    let api = Arc::new(api);
    let state = Arc::new(AppState::in_memory());
    let sync = SyncClient::new(api.clone(), state.clone());
    (api, state, sync)
}

fn ids(state: &AppState) -> Vec<String> {
    state.feed().ids().into_iter().map(|id| id.to_string()).collect()
}

fn me() -> Author {
    Author::new("Me", "me")
}

// ============================================================================
// Compose
// ============================================================================

#[tokio::test]
async fn created_post_is_reconciled_to_server_id() {
    let (api, state, sync) = client(ScriptedApi::default().creates("srv-42"));
    state.replace(vec![remote_post("1", 0)]);

    let outcome = sync.create_post(Draft::text(me(), "  gm  ")).await.unwrap();

    assert_eq!(outcome.id, PostId::new("srv-42"));
    assert_eq!(outcome.state, MutationState::Confirmed);
    assert_eq!(ids(&state), vec!["srv-42", "1"]);
    assert_eq!(state.feed().get(&PostId::new("srv-42")).unwrap().content, "gm");
    assert_eq!(sync.mutation_state(&PostId::new("local-1")), None);
    assert_eq!(
        sync.mutation_state(&PostId::new("srv-42")),
        Some(MutationState::Confirmed)
    );
    assert_eq!(
        api.calls(),
        vec![Call::Create(CreatePost {
            content: "gm".into(),
            image_url: None,
            platform: "hub".into(),
        })]
    );
}

#[tokio::test]
async fn provisional_post_visible_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let (_api, state, sync) = client(ScriptedApi::default().creates("srv-42").gated(gate.clone()));
    let sync = Arc::new(sync);

    let task = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.create_post(Draft::text(me(), "gm")).await })
    };
    while state.feed().is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(ids(&state), vec!["local-1"]);
    assert_eq!(
        sync.mutation_state(&PostId::new("local-1")),
        Some(MutationState::Pending)
    );

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert_eq!(ids(&state), vec!["srv-42"]);
}

#[tokio::test]
async fn feed_replaced_while_create_in_flight() {
    let gate = Arc::new(Notify::new());
    let (_api, state, sync) = client(ScriptedApi::default().creates("srv-42").gated(gate.clone()));
    let sync = Arc::new(sync);

    let task = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.create_post(Draft::text(me(), "gm")).await })
    };
    while state.feed().is_empty() {
        tokio::task::yield_now().await;
    }
    // A refresh lands first and already carries the confirmed post.
    state.replace(vec![remote_post("srv-42", 0), remote_post("9", 3)]);

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert_eq!(ids(&state), vec!["srv-42", "9"]);
}

#[tokio::test]
async fn like_on_provisional_post_survives_confirmation() {
    let gate = Arc::new(Notify::new());
    let (api, state, sync) = client(ScriptedApi::default().creates("srv-42").gated(gate.clone()));
    let sync = Arc::new(sync);

    let task = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.create_post(Draft::text(me(), "gm")).await })
    };
    while state.feed().is_empty() {
        tokio::task::yield_now().await;
    }
    let local = PostId::new("local-1");
    assert_eq!(sync.toggle(&local, Action::Like).await, MutationState::Pending);
    assert_eq!(state.feed().get(&local).unwrap().counts.likes, 1);
    assert_eq!(api.calls().len(), 1);

    gate.notify_one();
    task.await.unwrap().unwrap();

    let id = PostId::new("srv-42");
    let post = state.feed().get(&id).cloned().unwrap();
    assert!(post.engagement.liked);
    assert_eq!(post.counts.likes, 1);
    let calls = api.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], Call::Interact(id.clone(), Interaction::Like));
    assert_eq!(sync.mutation_state(&id), Some(MutationState::Confirmed));

    // Back to the original state, without hitting the zero floor.
    sync.toggle(&id, Action::Like).await;
    let post = state.feed().get(&id).cloned().unwrap();
    assert!(!post.engagement.liked);
    assert_eq!(post.counts.likes, 0);
}

#[tokio::test]
async fn server_counts_add_to_local_engagement() {
    let gate = Arc::new(Notify::new());
    let api = ScriptedApi::default().gated(gate.clone());
    api.created.lock().unwrap().push_back(Ok(CreatedPost {
        id: PostId::new("srv-42"),
        created_at: None,
        counts: Some(Counts { likes: 2, comments: 0, shares: 0 }),
    }));
    let (_api, state, sync) = client(api);
    let sync = Arc::new(sync);

    let task = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.create_post(Draft::text(me(), "gm")).await })
    };
    while state.feed().is_empty() {
        tokio::task::yield_now().await;
    }
    sync.toggle(&PostId::new("local-1"), Action::Share).await;
    sync.comment(&PostId::new("local-1"));
    gate.notify_one();
    task.await.unwrap().unwrap();

    let post = state.feed().get(&PostId::new("srv-42")).cloned().unwrap();
    assert_eq!(post.counts, Counts { likes: 2, comments: 1, shares: 1 });
    assert!(post.engagement.shared);
}

#[tokio::test]
async fn image_draft_sends_image_url() {
    let (api, _state, sync) = client(ScriptedApi::default().creates("5"));
    let draft = Draft::text(me(), "").with_media(Media::image("https://img/cat.png"));
    sync.create_post(draft).await.unwrap();
    let calls = api.calls();
    let Call::Create(req) = &calls[0] else {
        panic!("expected a create call");
    };
    assert_eq!(req.image_url.as_deref(), Some("https://img/cat.png"));
}

#[tokio::test]
async fn empty_draft_is_rejected_without_side_effects() {
    let (api, state, sync) = client(ScriptedApi::default());
    let err = sync.create_post(Draft::text(me(), "   ")).await.unwrap_err();
    assert_eq!(err, SyncError::EmptyPost);
    assert!(state.feed().is_empty());
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn failed_create_retains_provisional_post() {
    let (_api, state, sync) = client(ScriptedApi::default().create_fails());
    let outcome = sync.create_post(Draft::text(me(), "gm")).await.unwrap();
    assert_eq!(outcome.id, PostId::new("local-1"));
    assert_eq!(outcome.state, MutationState::Degraded);
    assert_eq!(ids(&state), vec!["local-1"]);
}

#[tokio::test]
async fn failed_create_rolls_back_when_asked() {
    let api = Arc::new(ScriptedApi::default().create_fails().creates("srv-2"));
    let state = Arc::new(AppState::in_memory());
    let sync = SyncClient::new(api, state.clone()).with_policy(FailurePolicy::Rollback);

    let outcome = sync.create_post(Draft::text(me(), "gm")).await.unwrap();
    assert_eq!(outcome.state, MutationState::Degraded);
    assert!(state.feed().is_empty());

    // Provisional ids keep counting.
    let outcome = sync.create_post(Draft::text(me(), "again")).await.unwrap();
    assert_eq!(outcome.id, PostId::new("srv-2"));
    assert_eq!(ids(&state), vec!["srv-2"]);
}

// ============================================================================
// Engagement
// ============================================================================

#[tokio::test]
async fn like_confirmed() {
    let (api, state, sync) = client(ScriptedApi::default().interact_ok());
    state.replace(vec![remote_post("7", 10)]);
    let id = PostId::new("7");

    assert_eq!(sync.toggle(&id, Action::Like).await, MutationState::Confirmed);
    let post = state.feed().get(&id).cloned().unwrap();
    assert!(post.engagement.liked);
    assert_eq!(post.counts.likes, 11);
    assert_eq!(api.calls(), vec![Call::Interact(id, Interaction::Like)]);
}

#[tokio::test]
async fn failed_like_keeps_optimistic_state() {
    let (_api, state, sync) = client(ScriptedApi::default().interact_fails());
    state.replace(vec![remote_post("7", 10)]);
    let id = PostId::new("7");

    assert_eq!(sync.toggle(&id, Action::Like).await, MutationState::Degraded);
    let post = state.feed().get(&id).cloned().unwrap();
    assert!(post.engagement.liked);
    assert_eq!(post.counts.likes, 11);
    assert_eq!(sync.mutation_state(&id), Some(MutationState::Degraded));
}

#[tokio::test]
async fn failed_like_rolls_back_when_asked() {
    let api = Arc::new(ScriptedApi::default().interact_fails());
    let state = Arc::new(AppState::in_memory());
    let sync = SyncClient::new(api, state.clone()).with_policy(FailurePolicy::Rollback);
    state.replace(vec![remote_post("7", 10)]);
    let id = PostId::new("7");

    assert_eq!(sync.toggle(&id, Action::Like).await, MutationState::Degraded);
    let post = state.feed().get(&id).cloned().unwrap();
    assert!(!post.engagement.liked);
    assert_eq!(post.counts.likes, 10);
}

#[tokio::test]
async fn rollback_restores_exact_counts() {
    let api = Arc::new(ScriptedApi::default().interact_fails());
    let state = Arc::new(AppState::in_memory());
    let sync = SyncClient::new(api, state.clone()).with_policy(FailurePolicy::Rollback);
    // Inconsistent record: liked, but the counter says zero.
    let mut post = remote_post("7", 0);
    post.engagement.liked = true;
    state.replace(vec![post]);
    let id = PostId::new("7");

    assert_eq!(sync.toggle(&id, Action::Like).await, MutationState::Degraded);
    let post = state.feed().get(&id).cloned().unwrap();
    assert!(post.engagement.liked);
    assert_eq!(post.counts.likes, 0);
}

#[tokio::test]
async fn older_failure_does_not_undo_newer_toggle() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(
        ScriptedApi::default()
            .interact_fails()
            .interact_ok()
            .hold_next_interact(gate.clone()),
    );
    let state = Arc::new(AppState::in_memory());
    let sync = Arc::new(
        SyncClient::new(api.clone(), state.clone()).with_policy(FailurePolicy::Rollback),
    );
    state.replace(vec![remote_post("7", 10)]);
    let id = PostId::new("7");

    let like = {
        let (sync, id) = (sync.clone(), id.clone());
        tokio::spawn(async move { sync.toggle(&id, Action::Like).await })
    };
    while api.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(state.feed().get(&id).unwrap().counts.likes, 11);

    // Unlike goes through while the like is still out.
    assert_eq!(sync.toggle(&id, Action::Like).await, MutationState::Confirmed);
    gate.notify_one();
    assert_eq!(like.await.unwrap(), MutationState::Degraded);

    let post = state.feed().get(&id).cloned().unwrap();
    assert!(!post.engagement.liked);
    assert_eq!(post.counts.likes, 10);
    assert_eq!(sync.mutation_state(&id), Some(MutationState::Confirmed));
}

#[tokio::test]
async fn share_syncs_as_share() {
    let (api, state, sync) = client(ScriptedApi::default());
    state.replace(vec![remote_post("3", 0)]);
    let id = PostId::new("3");
    sync.toggle(&id, Action::Share).await;
    assert_eq!(state.feed().get(&id).unwrap().counts.shares, 1);
    assert_eq!(api.calls(), vec![Call::Interact(id, Interaction::Share)]);
}

#[tokio::test]
async fn bookmark_is_local_and_persisted() {
    let (api, state, sync) = client(ScriptedApi::default());
    state.replace(vec![remote_post("4", 0)]);
    let id = PostId::new("4");

    assert_eq!(sync.toggle(&id, Action::Bookmark).await, MutationState::Confirmed);
    assert!(state.feed().get(&id).unwrap().engagement.bookmarked);
    assert!(state.prefs().is_bookmarked(&id));
    assert!(api.calls().is_empty());

    sync.toggle(&id, Action::Bookmark).await;
    assert!(!state.prefs().is_bookmarked(&id));
}

#[tokio::test]
async fn unknown_post_is_ignored() {
    let (api, state, sync) = client(ScriptedApi::default());
    state.replace(vec![remote_post("1", 0)]);
    let before = state.feed();

    assert_eq!(
        sync.toggle(&PostId::new("404"), Action::Like).await,
        MutationState::Confirmed
    );
    assert_eq!(*state.feed(), *before);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn comment_counts_locally() {
    let (api, state, sync) = client(ScriptedApi::default());
    state.replace(vec![remote_post("1", 0)]);
    sync.comment(&PostId::new("1"));
    assert_eq!(state.feed().get(&PostId::new("1")).unwrap().counts.comments, 1);
    assert!(api.calls().is_empty());
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn refresh_then_load_more_until_end() {
    let api = ScriptedApi::default()
        .page(vec![remote_post("1", 0), remote_post("2", 0)], None)
        .page(vec![remote_post("2", 5), remote_post("3", 0)], Some(false));
    let api = Arc::new(api);
    let state = Arc::new(AppState::in_memory());
    let sync = SyncClient::new(api.clone(), state.clone()).with_per_page(2);

    assert_eq!(sync.refresh().await, MutationState::Confirmed);
    assert_eq!(sync.page(), 1);
    assert!(sync.has_more());

    assert_eq!(sync.load_more().await, MutationState::Confirmed);
    assert_eq!(ids(&state), vec!["1", "2", "3"]);
    assert_eq!(state.feed().get(&PostId::new("2")).unwrap().counts.likes, 5);
    assert!(!sync.has_more());

    // Server said no more; nothing is fetched.
    sync.load_more().await;
    assert_eq!(api.calls(), vec![Call::List(1, 2), Call::List(2, 2)]);
}

#[tokio::test]
async fn short_page_means_no_more() {
    let (_api, _state, sync) = client(ScriptedApi::default().page(vec![remote_post("1", 0)], None));
    sync.refresh().await;
    assert!(!sync.has_more());
}

#[tokio::test]
async fn failed_refresh_leaves_feed_alone() {
    let (_api, state, sync) = client(ScriptedApi::default().page_fails());
    state.replace(vec![remote_post("1", 0)]);
    assert_eq!(sync.refresh().await, MutationState::Degraded);
    assert_eq!(ids(&state), vec!["1"]);
    assert_eq!(sync.page(), 0);
}

#[tokio::test]
async fn refresh_forgets_settled_mutations_for_departed_posts() {
    let (_api, state, sync) = client(
        ScriptedApi::default().page(vec![remote_post("8", 0)], Some(false)),
    );
    state.replace(vec![remote_post("7", 0), remote_post("8", 0)]);
    let (gone, kept) = (PostId::new("7"), PostId::new("8"));
    sync.toggle(&gone, Action::Like).await;
    sync.toggle(&kept, Action::Like).await;

    sync.refresh().await;
    assert_eq!(sync.mutation_state(&gone), None);
    assert_eq!(sync.mutation_state(&kept), Some(MutationState::Confirmed));
}

#[tokio::test]
async fn fetched_posts_carry_saved_bookmarks() {
    let (_api, state, sync) = client(
        ScriptedApi::default().page(vec![remote_post("1", 0), remote_post("2", 0)], Some(false)),
    );
    state.prefs().set_bookmarked(&PostId::new("2"), true);
    sync.refresh().await;
    let feed = state.feed();
    assert!(!feed.get(&PostId::new("1")).unwrap().engagement.bookmarked);
    assert!(feed.get(&PostId::new("2")).unwrap().engagement.bookmarked);
}

// ============================================================================
// Snapshot
// ============================================================================

#[tokio::test]
async fn refreshed_feed_is_restored_on_next_start() {
    let (_api, state, sync) = client(
        ScriptedApi::default().page(vec![remote_post("1", 0), remote_post("2", 4)], Some(false)),
    );
    sync.refresh().await;
    sync.toggle(&PostId::new("2"), Action::Bookmark).await;

    let restarted = Arc::new(AppState::new(state.prefs().clone()));
    let offline = SyncClient::new(Arc::new(ScriptedApi::default()), restarted.clone());
    assert!(offline.restore_snapshot());
    assert_eq!(ids(&restarted), vec!["1", "2"]);
    let post = restarted.feed().get(&PostId::new("2")).cloned().unwrap();
    assert_eq!(post.counts.likes, 4);
    assert!(post.engagement.bookmarked);
}

#[tokio::test]
async fn snapshot_leaves_out_provisional_posts() {
    let (_api, state, sync) = client(
        ScriptedApi::default()
            .page(vec![remote_post("1", 0)], Some(false))
            .create_fails(),
    );
    sync.refresh().await;
    sync.create_post(Draft::text(me(), "gm")).await.unwrap();
    sync.comment(&PostId::new("1"));

    assert_eq!(ids(&state), vec!["local-1", "1"]);
    let saved = state.prefs().feed_snapshot().unwrap();
    let saved: Vec<_> = saved.iter().map(|p| p.id.to_string()).collect();
    assert_eq!(saved, vec!["1"]);
}

#[tokio::test]
async fn nothing_to_restore_on_first_start() {
    let (_api, state, sync) = client(ScriptedApi::default());
    state.replace(vec![remote_post("1", 0)]);
    assert!(!sync.restore_snapshot());
    assert_eq!(ids(&state), vec!["1"]);
}
