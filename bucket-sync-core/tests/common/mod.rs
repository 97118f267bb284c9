#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use bucket_sync_core::config::EngineSettings;
use bucket_sync_core::contract::{RemoteFile, Signature};
use bucket_sync_core::retry::RetryPolicy;
use chrono::Utc;

pub fn remote_file(id: &str, dir: &str, filename: &str) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        filename: filename.to_string(),
        label: filename.to_string(),
        dir: dir.to_string(),
        kind: "file".to_string(),
        mime: "text/plain".to_string(),
        url: format!("https://cdn.example.test/{id}"),
        is_public: true,
        is_listed: true,
        metadata: HashMap::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn signature(value: &str) -> Signature {
    Signature {
        signature: value.to_string(),
        expires_at: Utc::now() + chrono::Duration::hours(1),
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Duration::from_millis(1),
        multiplier: 1.5,
        max_interval: Duration::from_millis(5),
        max_elapsed: Duration::from_secs(5),
        max_retries: 2,
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        workers: 4,
        upload_queue: 5,
        download_queue: 3,
        retry: fast_retry(),
        ..EngineSettings::default()
    }
}
