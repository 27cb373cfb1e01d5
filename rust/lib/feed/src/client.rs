//! Remote posts API.
//!
//! [`PostApi`] is the seam the sync client depends on; [`HttpPostApi`]
//! is the REST implementation. Authentication is handled by pluggable
//! [`TokenSource`] implementations, called before every request.
//!
//! # Usage
//!
//! ```ignore
//! use socialhub_feed::client::{HttpPostApi, StaticToken};
//!
//! let api = HttpPostApi::new("http://localhost:5000/api", Arc::new(StaticToken::new("jwt")));
//! let page = api.list_posts(1, 10).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use socialhub_kv::KVStore;
use tracing::{debug, warn};

use crate::engagement::Interaction;
use crate::error::ApiError;
use crate::model::{Author, Counts, Media, Post, PostId};
use crate::prefs::Preferences;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

// ── Request / response types ────────────────────────────────────────

/// Body of `POST /posts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePost {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub platform: String,
}

/// One page of `GET /posts`.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// The server's own verdict, when it sends one.
    pub has_more: Option<bool>,
}

/// Server-assigned fields for a newly created post.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPost {
    pub id: PostId,
    pub created_at: Option<DateTime<Utc>>,
    pub counts: Option<Counts>,
}

// ── PostApi ─────────────────────────────────────────────────────────

#[async_trait]
pub trait PostApi: Send + Sync + 'static {
    async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostPage, ApiError>;

    async fn create_post(&self, req: &CreatePost) -> Result<CreatedPost, ApiError>;

    async fn interact(&self, id: &PostId, interaction: Interaction) -> Result<(), ApiError>;
}

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every API request.
/// Returns `Ok(None)` to skip the Authorization header (anonymous).
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;

    /// The server rejected the token (HTTP 401). Drop whatever is cached.
    fn invalidate(&self) {}
}

/// No authentication, anonymous requests.
pub struct NoAuth;

#[async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Static bearer token (already obtained externally).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.0.clone()))
    }
}

/// Token kept in the preference store under `authToken`. A 401 clears
/// the stored session so the next launch starts signed out.
pub struct StoredToken<S: KVStore> {
    prefs: Arc<Preferences<S>>,
}

impl<S: KVStore> StoredToken<S> {
    pub fn new(prefs: Arc<Preferences<S>>) -> Self {
        Self { prefs }
    }
}

#[async_trait]
impl<S: KVStore + 'static> TokenSource for StoredToken<S> {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(self.prefs.auth_token())
    }

    fn invalidate(&self) {
        self.prefs.clear_session();
    }
}

// ── HttpPostApi ─────────────────────────────────────────────────────

pub struct HttpPostApi {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl HttpPostApi {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }

    fn interact_url(&self, id: &PostId) -> String {
        format!("{}/posts/{}/interact", self.base_url, id)
    }

    /// Build a request with auth header.
    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ApiError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }

    /// Send, then map HTTP failures to `ApiError`. A 401 also invalidates
    /// the token source.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = self.authed(builder).await?.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        if code == 401 {
            warn!("posts api: token rejected, clearing session");
            self.token_source.invalidate();
        }
        Err(ApiError::Server { status: code, message: body })
    }

    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ApiError> {
        resp.json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
    }
}

#[async_trait]
impl PostApi for HttpPostApi {
    async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostPage, ApiError> {
        let req = self
            .http
            .get(self.posts_url())
            .query(&[("page", page), ("per_page", per_page)]);
        let body: WirePage = Self::parse(self.send(req).await?).await?;
        debug!("posts api: page {} returned {} posts", page, body.posts.len());
        Ok(body.into())
    }

    async fn create_post(&self, req: &CreatePost) -> Result<CreatedPost, ApiError> {
        let builder = self.http.post(self.posts_url()).json(req);
        let body: WireCreated = Self::parse(self.send(builder).await?).await?;
        body.try_into()
    }

    async fn interact(&self, id: &PostId, interaction: Interaction) -> Result<(), ApiError> {
        let builder = self
            .http
            .post(self.interact_url(id))
            .json(&serde_json::json!({ "type": interaction }));
        self.send(builder).await?;
        Ok(())
    }
}

// ── Wire format ─────────────────────────────────────────────────────
//
// The server has shipped several post shapes: nested `author` objects or
// flat `username`/`avatar_url`, `likes` or `likes_count`, numeric or
// string ids, RFC 3339 or SQLite timestamps. Decode all of them.

#[derive(Deserialize)]
struct WirePage {
    #[serde(default)]
    posts: Vec<WirePost>,
    #[serde(default)]
    has_more: Option<bool>,
}

impl From<WirePage> for PostPage {
    fn from(page: WirePage) -> Self {
        PostPage {
            posts: page.posts.into_iter().map(Post::from).collect(),
            has_more: page.has_more,
        }
    }
}

#[derive(Deserialize)]
struct WireCreated {
    #[serde(default)]
    post: Option<WirePost>,
    #[serde(default, deserialize_with = "opt_lenient_id")]
    post_id: Option<String>,
}

impl TryFrom<WireCreated> for CreatedPost {
    type Error = ApiError;

    fn try_from(body: WireCreated) -> Result<Self, ApiError> {
        if let Some(post) = body.post {
            let created_at = post.created_at.as_deref().and_then(parse_timestamp);
            let counts = post.counts();
            return Ok(CreatedPost {
                id: PostId::new(post.id),
                created_at,
                counts: Some(counts),
            });
        }
        match body.post_id {
            Some(id) => Ok(CreatedPost {
                id: PostId::new(id),
                created_at: None,
                counts: None,
            }),
            None => Err(ApiError::Decode("create response carries no post id".into())),
        }
    }
}

#[derive(Deserialize)]
struct WireAuthor {
    #[serde(default, alias = "name")]
    display_name: Option<String>,
    #[serde(default, alias = "handle")]
    username: Option<String>,
    #[serde(default, alias = "avatar_url")]
    avatar: Option<String>,
}

#[derive(Deserialize)]
struct WirePost {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    author: Option<WireAuthor>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default, alias = "image")]
    image_url: Option<String>,
    #[serde(default)]
    media_urls: Vec<String>,
    #[serde(default, alias = "likes_count")]
    likes: u32,
    #[serde(default, alias = "comments_count")]
    comments: u32,
    #[serde(default, alias = "shares_count")]
    shares: u32,
    #[serde(default, alias = "timestamp")]
    created_at: Option<String>,
}

impl WirePost {
    fn counts(&self) -> Counts {
        Counts {
            likes: self.likes,
            comments: self.comments,
            shares: self.shares,
        }
    }
}

impl From<WirePost> for Post {
    fn from(w: WirePost) -> Self {
        let counts = w.counts();
        let author = match w.author {
            Some(a) => {
                let handle = a.username.unwrap_or_else(|| "unknown".into());
                Author {
                    display_name: a.display_name.unwrap_or_else(|| handle.clone()),
                    handle,
                    avatar_url: a.avatar,
                }
            }
            None => match w.username {
                Some(name) => Author {
                    display_name: name.clone(),
                    handle: name,
                    avatar_url: w.avatar_url,
                },
                None => Author::unknown(),
            },
        };
        let media = w
            .image_url
            .or_else(|| w.media_urls.into_iter().next())
            .map(Media::image);
        let created_at = w
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let mut post = Post::new(w.id, author, w.content).with_counts(counts);
        post.media = media;
        post.created_at = created_at;
        post
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|t| t.and_utc())
}

fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected post id: {}", other))),
    }
}

fn opt_lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    lenient_id(d).map(Some)
}
