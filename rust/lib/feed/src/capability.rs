//! Narrow device and platform capabilities.
//!
//! The feed logic never talks to a browser, microphone or wallet
//! extension directly. Each is a trait injected where it is needed, so
//! everything else runs (and is tested) with no device present.
//!
//! Device and permission failures are the one category the user must
//! hear about: the helpers here turn them into a [`Notice`] and degrade
//! instead of returning an error.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::DeviceError;
use crate::model::{Media, MediaKind};

// ── Notifications ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Where user-facing notices go (a toast, a system notification, stderr).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that writes notices to the log. Used by the CLI.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}: {}", notice.title, notice.body),
            NoticeLevel::Error => warn!("{}: {}", notice.title, notice.body),
        }
    }
}

// ── Audio ───────────────────────────────────────────────────────────

/// A finished voice recording, already uploaded or otherwise addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub url: String,
    pub duration_secs: u32,
}

#[async_trait]
pub trait AudioRecorder: Send + Sync + 'static {
    /// Acquire the microphone and begin recording.
    async fn start(&self) -> Result<(), DeviceError>;

    /// Stop and hand back the recording.
    async fn stop(&self) -> Result<Recording, DeviceError>;
}

/// Voice-post capture on top of an [`AudioRecorder`].
pub struct VoiceCapture {
    recorder: Arc<dyn AudioRecorder>,
    sink: Arc<dyn NotificationSink>,
}

impl VoiceCapture {
    pub fn new(recorder: Arc<dyn AudioRecorder>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { recorder, sink }
    }

    /// Start recording. Returns false (after telling the user) when the
    /// microphone can't be acquired.
    pub async fn begin(&self) -> bool {
        match self.recorder.start().await {
            Ok(()) => true,
            Err(e) => {
                self.sink.notify(Notice::error(
                    "Microphone unavailable",
                    format!("Unable to access microphone: {}", e),
                ));
                false
            }
        }
    }

    /// Stop recording and turn the result into attachable media.
    pub async fn finish(&self) -> Option<Media> {
        match self.recorder.stop().await {
            Ok(rec) => Some(Media {
                kind: MediaKind::Audio,
                url: rec.url,
                duration_secs: Some(rec.duration_secs),
            }),
            Err(e) => {
                self.sink.notify(Notice::error("Recording failed", e.to_string()));
                None
            }
        }
    }
}

// ── Wallet ──────────────────────────────────────────────────────────

#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Ask the wallet for the viewer's accounts (prompting if needed).
    async fn request_accounts(&self) -> Result<Vec<String>, DeviceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletStatus {
    NotConnected,
    Connected { address: String },
}

impl WalletStatus {
    pub fn address(&self) -> Option<&str> {
        match self {
            WalletStatus::Connected { address } => Some(address),
            WalletStatus::NotConnected => None,
        }
    }
}

/// Gate for monetization and NFT features.
///
/// No provider, no accounts, or a refused request all land in
/// `NotConnected`; only a provider error is reported to the user.
pub struct WalletGate {
    provider: Option<Arc<dyn WalletProvider>>,
    sink: Arc<dyn NotificationSink>,
    status: RwLock<WalletStatus>,
}

impl WalletGate {
    pub fn new(provider: Option<Arc<dyn WalletProvider>>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            provider,
            sink,
            status: RwLock::new(WalletStatus::NotConnected),
        }
    }

    pub fn status(&self) -> WalletStatus {
        self.status.read().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status().address().is_some()
    }

    pub async fn connect(&self) -> WalletStatus {
        let Some(provider) = &self.provider else {
            return self.set_status(WalletStatus::NotConnected);
        };
        let status = match provider.request_accounts().await {
            Ok(accounts) => match accounts.into_iter().next() {
                Some(address) => WalletStatus::Connected { address },
                None => WalletStatus::NotConnected,
            },
            Err(e) => {
                self.sink.notify(Notice::error("Wallet connection failed", e.to_string()));
                WalletStatus::NotConnected
            }
        };
        self.set_status(status)
    }

    pub fn disconnect(&self) {
        self.set_status(WalletStatus::NotConnected);
    }

    fn set_status(&self, status: WalletStatus) -> WalletStatus {
        *self.status.write().unwrap() = status.clone();
        status
    }
}
