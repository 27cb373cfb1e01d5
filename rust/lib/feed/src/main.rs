//! `socialhub`: command-line client for the SocialHub feed.
//!
//! Preferences live in a local redb file; posts come from the REST API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use socialhub_feed::client::{HttpPostApi, StaticToken, StoredToken, TokenSource};
use socialhub_feed::prefs::USER_KEY;
use socialhub_feed::{
    Action, AppState, Author, ClientConfig, Draft, FailurePolicy, Feed, Media, MutationState,
    Post, PostId, Preferences, SharedPrefs, SyncClient, Theme,
};
use socialhub_kv::{KVStore, RedbStore, ScopedKV};

/// SocialHub CLI tool.
#[derive(Parser, Debug)]
#[command(name = "socialhub", about = "SocialHub feed client")]
struct Cli {
    /// API base URL (default: http://localhost:5000/api).
    #[arg(long = "api", global = true)]
    api: Option<String>,

    /// Directory for the preference database.
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Preference database file (default: {data-dir}/prefs.redb).
    #[arg(long = "db", global = true)]
    db: Option<PathBuf>,

    /// Key namespace inside the database.
    #[arg(long, global = true)]
    origin: Option<String>,

    /// Posts per page.
    #[arg(long = "per-page", global = true, value_parser = clap::value_parser!(u32).range(1..))]
    per_page: Option<u32>,

    /// What to do when the server rejects a change: retain or rollback.
    #[arg(long = "on-failure", global = true)]
    on_failure: Option<FailurePolicy>,

    /// Bearer token (overrides the stored one).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the timeline.
    Feed {
        /// Load pages up to this one.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Publish a post.
    Post {
        /// Post text.
        #[arg(required = true)]
        text: Vec<String>,
        /// Attach an image by URL.
        #[arg(long)]
        image: Option<String>,
    },

    /// Toggle like on a post.
    Like { id: String },

    /// Toggle share on a post.
    Share { id: String },

    /// Toggle bookmark on a post.
    Bookmark { id: String },

    /// Show or set the theme.
    Theme { name: Option<String> },

    /// Record a search and list recent ones.
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// List recent searches.
    Recent {
        /// Forget them instead.
        #[arg(long)]
        clear: bool,
    },

    /// Follow or unfollow a hashtag.
    Hashtag { id: String },

    /// Store a bearer token for later runs.
    Login { token: String },

    /// Forget the stored token and user.
    Logout,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            api_url: self
                .api
                .as_deref()
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            data_dir: self.data_dir.clone(),
            db_path: self.db.clone(),
            origin: self.origin.clone().unwrap_or(defaults.origin),
            per_page: self.per_page.unwrap_or(defaults.per_page),
            on_failure: self.on_failure.unwrap_or(defaults.on_failure),
            token: self.token.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let json_output = cli.output == "json";

    let db_path = config.resolve_db_path();
    info!("Preferences: {}", db_path.display());
    let store = RedbStore::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;
    let kv: Arc<dyn KVStore> = Arc::new(ScopedKV::new(&config.origin, store));
    let prefs: Arc<SharedPrefs> = Arc::new(Preferences::new(kv));

    let tokens: Arc<dyn TokenSource> = match &config.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(StoredToken::new(prefs.clone())),
    };
    let api = Arc::new(HttpPostApi::new(config.api_url.clone(), tokens));
    let state = Arc::new(AppState::new(prefs.clone()));
    let sync = SyncClient::new(api, state.clone())
        .with_policy(config.on_failure)
        .with_per_page(config.per_page);

    match cli.command {
        Commands::Feed { page } => {
            // Shown as-is if the server cannot be reached.
            sync.restore_snapshot();
            sync.refresh().await;
            while sync.page() < page && sync.has_more() {
                if sync.load_more().await != MutationState::Confirmed {
                    break;
                }
            }
            print_feed(&state.feed(), json_output)?;
        }

        Commands::Post { text, image } => {
            let mut draft = Draft::text(viewer(&prefs), text.join(" "));
            if let Some(url) = image {
                draft = draft.with_media(Media::image(url));
            }
            let outcome = sync.create_post(draft).await?;
            println!("{} {:?}", outcome.id, outcome.state);
        }

        Commands::Like { id } => engage(&sync, &id, Action::Like, json_output).await?,
        Commands::Share { id } => engage(&sync, &id, Action::Share, json_output).await?,
        Commands::Bookmark { id } => engage(&sync, &id, Action::Bookmark, json_output).await?,

        Commands::Theme { name: None } => println!("{}", prefs.theme()),
        Commands::Theme { name: Some(name) } => {
            let theme: Theme = name.parse().map_err(anyhow::Error::msg)?;
            prefs.set_theme(theme);
            println!("{}", theme);
        }

        Commands::Search { query } => {
            for q in prefs.push_recent_search(&query.join(" ")) {
                println!("{}", q);
            }
        }

        Commands::Recent { clear: true } => prefs.clear_recent_searches(),
        Commands::Recent { clear: false } => {
            for q in prefs.recent_searches() {
                println!("{}", q);
            }
        }

        Commands::Hashtag { id } => {
            let following = prefs.toggle_hashtag(&id);
            println!("#{} {}", id, if following { "followed" } else { "unfollowed" });
        }

        Commands::Login { token } => {
            prefs.set_auth_token(&token);
            println!("Token saved.");
        }

        Commands::Logout => {
            prefs.clear_session();
            println!("Logged out.");
        }
    }

    Ok(())
}

/// Load the first page, then toggle `action` on `id` and show the result.
async fn engage(sync: &SyncClient, id: &str, action: Action, json_output: bool) -> anyhow::Result<()> {
    let id = PostId::new(id);
    sync.refresh().await;
    if !sync.state().feed().contains(&id) {
        anyhow::bail!("post {} is not on the first page of the feed", id);
    }
    let result = sync.toggle(&id, action).await;
    if let Some(post) = sync.state().feed().get(&id) {
        print_posts(std::slice::from_ref(post), json_output)?;
    }
    println!("{:?}", result);
    Ok(())
}

#[derive(Deserialize)]
struct StoredUser {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

/// Author for locally composed posts, from the cached signed-in user.
fn viewer(prefs: &SharedPrefs) -> Author {
    let user: Option<StoredUser> = prefs.get(USER_KEY, None);
    match user {
        Some(StoredUser { username: Some(handle), display_name, avatar_url }) => Author {
            display_name: display_name.unwrap_or_else(|| handle.clone()),
            handle,
            avatar_url,
        },
        _ => Author::new("You", "you"),
    }
}

fn print_feed(feed: &Feed, json_output: bool) -> anyhow::Result<()> {
    if feed.is_empty() && !json_output {
        println!("(no posts)");
        return Ok(());
    }
    print_posts(feed.posts(), json_output)
}

fn print_posts(posts: &[Post], json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(posts)?);
        return Ok(());
    }
    for post in posts {
        let flags: Vec<&str> = [
            (post.engagement.liked, "liked"),
            (post.engagement.shared, "shared"),
            (post.engagement.bookmarked, "bookmarked"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        println!(
            "{:<10} @{:<16} likes={:<4} shares={:<4} comments={:<4} {}",
            post.id,
            post.author.handle,
            post.counts.likes,
            post.counts.shares,
            post.counts.comments,
            flags.join(",")
        );
        println!("           {}", post.content);
    }
    Ok(())
}
