/// `load_config` module: turns an optional YAML file plus environment overrides into
/// the engine's typed [`EngineSettings`].
///
/// This module is the only place where user-supplied YAML is parsed.
///
/// # Layering
/// 1. Built-in defaults ([`EngineSettings::default`])
/// 2. The YAML file given with `--config`, if any; every key is optional
/// 3. Environment: `BUCKET_SYNC_API_URL` overrides `api.base_url`
///
/// # Accepted schema
/// ```yaml
/// api:
///   base_url: https://api.example.com
///   timeout_secs: 30
/// transfer:
///   workers: 8
///   upload_queue: 25
///   download_queue: 10
///   extensions: [png, jpg, pdf]
///   signature_ttl_secs: 300
/// retry:
///   initial_interval_ms: 500
///   multiplier: 1.5
///   max_interval_ms: 10000
///   max_elapsed_ms: 60000
///   max_retries: 5
/// ```
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{bail, Context, Result};
use bucket_sync_core::config::EngineSettings;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

pub const API_URL_ENV: &str = "BUCKET_SYNC_API_URL";
const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api: ApiSection,
    pub transfer: TransferSection,
    pub retry: RetrySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferSection {
    pub workers: Option<usize>,
    pub upload_queue: Option<usize>,
    pub download_queue: Option<usize>,
    pub extensions: Option<Vec<String>>,
    pub signature_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub initial_interval_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub max_interval_ms: Option<u64>,
    pub max_elapsed_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Read and parse a YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let config: FileConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    Ok(config)
}

/// Defaults, then the optional file, then environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    let file = match path {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let mut settings = apply(EngineSettings::default(), file)?;

    if let Ok(url) = env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            info!(base_url = %url, "Base URL overridden from environment");
            settings.client.base_url = url.trim().to_string();
        }
    }

    settings.trace_loaded();
    Ok(settings)
}

/// Layer a parsed file over `settings`, validating the result.
pub fn apply(mut settings: EngineSettings, file: FileConfig) -> Result<EngineSettings> {
    let FileConfig {
        api,
        transfer,
        retry,
    } = file;

    if let Some(url) = api.base_url {
        settings.client.base_url = url;
    }
    if let Some(secs) = api.timeout_secs {
        settings.client.timeout = Duration::from_secs(secs);
    }

    if let Some(workers) = transfer.workers {
        settings.workers = workers;
    }
    if let Some(n) = transfer.upload_queue {
        settings.upload_queue = n;
    }
    if let Some(n) = transfer.download_queue {
        settings.download_queue = n;
    }
    if let Some(extensions) = transfer.extensions {
        settings.extensions = extensions;
    }
    if let Some(secs) = transfer.signature_ttl_secs {
        settings.signature_ttl = Duration::from_secs(secs);
    }

    let policy = &mut settings.retry;
    if let Some(ms) = retry.initial_interval_ms {
        policy.initial_interval = Duration::from_millis(ms);
    }
    if let Some(m) = retry.multiplier {
        policy.multiplier = m;
    }
    if let Some(ms) = retry.max_interval_ms {
        policy.max_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = retry.max_elapsed_ms {
        policy.max_elapsed = Duration::from_millis(ms);
    }
    if let Some(n) = retry.max_retries {
        policy.max_retries = n;
    }

    validate(&settings).context("invalid configuration")?;
    Ok(settings)
}

fn validate(settings: &EngineSettings) -> Result<()> {
    if settings.client.base_url.trim().is_empty() {
        bail!("api.base_url must not be empty");
    }
    let timeout = settings.client.timeout.as_secs();
    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout) {
        bail!("api.timeout_secs must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS}");
    }
    if settings.workers == 0 {
        bail!("transfer.workers must be at least 1");
    }
    if settings.upload_queue == 0 || settings.download_queue == 0 {
        bail!("transfer queue capacities must be at least 1");
    }
    if settings.signature_ttl.is_zero() {
        bail!("transfer.signature_ttl_secs must be positive");
    }
    if !(settings.retry.multiplier.is_finite() && settings.retry.multiplier >= 1.0) {
        bail!("retry.multiplier must be a finite number >= 1.0");
    }
    Ok(())
}
