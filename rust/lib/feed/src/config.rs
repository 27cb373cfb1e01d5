use std::path::PathBuf;

use crate::client::DEFAULT_BASE_URL;
use crate::sync::{DEFAULT_PER_PAGE, FailurePolicy};

/// Client configuration shared by every entry point.
///
/// The `socialhub` binary fills this in from its global flags; embedders
/// build it directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the posts API.
    pub api_url: String,

    /// Directory holding the preference database.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb preference file.
    /// Defaults to `{data_dir}/prefs.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Namespace for stored keys, so several apps can share one file.
    pub origin: String,

    pub per_page: u32,

    pub on_failure: FailurePolicy,

    /// Bearer token to use instead of the stored one.
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            data_dir: None,
            db_path: None,
            origin: "socialhub".to_string(),
            per_page: DEFAULT_PER_PAGE,
            on_failure: FailurePolicy::default(),
            token: None,
        }
    }
}

impl ClientConfig {
    /// Resolve the redb path, falling back to `{data_dir}/prefs.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("prefs.redb"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
