use std::num::NonZeroUsize;
use std::time::Duration;

use tracing::{debug, info};

use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.afosto.io";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_UPLOAD_QUEUE: usize = 25;
pub const DEFAULT_DOWNLOAD_QUEUE: usize = 10;
pub const DEFAULT_SIGNATURE_TTL: Duration = Duration::from_secs(5 * 60);

/// Extensions accepted for upload unless configured otherwise.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "svg", "css", "csv", "js", "txt", "doc", "eot", "json", "xls", "xlsx",
    "pdf", "xml", "mp4", "mov", "zip", "md",
];

/// Connection settings for [`crate::client::ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Tunables of the transfer engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub client: ClientConfig,
    /// Number of concurrent transfer workers.
    pub workers: usize,
    pub upload_queue: usize,
    pub download_queue: usize,
    pub extensions: Vec<String>,
    pub signature_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            workers: default_workers(),
            upload_queue: DEFAULT_UPLOAD_QUEUE,
            download_queue: DEFAULT_DOWNLOAD_QUEUE,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            signature_ttl: DEFAULT_SIGNATURE_TTL,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineSettings {
    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.client.base_url,
            timeout_secs = self.client.timeout.as_secs(),
            workers = self.workers,
            "Loaded engine settings"
        );
        debug!(?self, "Engine settings (full debug)");
    }
}

/// One worker per available CPU.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
