//! Remote directory enumeration.
//!
//! Directory listings are paginated with an opaque cursor. A page holding
//! fewer than [`PAGE_SIZE`] files is the last one; there is no explicit
//! "has more" flag. Listing calls are wrapped in the retry controller since
//! they are the calls most exposed to cold caches and rate limiting.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::contract::{DirectoryPage, FileService, RemoteFile};
use crate::error::{SyncError, TransportError};
use crate::paths::{is_under, normalize_remote_dir};
use crate::retry::{retry, RetryPolicy};

/// Number of files the service returns per listing page.
pub const PAGE_SIZE: usize = 25;

pub struct RemoteLister {
    service: Arc<dyn FileService>,
    policy: RetryPolicy,
}

impl RemoteLister {
    pub fn new(service: Arc<dyn FileService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// All remote directories at or below `prefix`, sorted.
    ///
    /// The service has no server-side prefix filter, so the full set is
    /// fetched and filtered here.
    pub async fn list_directories(&self, prefix: &str) -> Result<Vec<String>, SyncError> {
        let all = retry(
            &self.policy,
            || self.service.list_directories(),
            |err: &TransportError, backoff| {
                warn!(error = %err, ?backoff, "Listing directories failed, retrying");
            },
        )
        .await
        .map_err(|source| SyncError::Listing {
            dir: prefix.to_string(),
            source,
        })?;

        let prefix = normalize_remote_dir(prefix);
        let mut dirs: Vec<String> = all
            .iter()
            .map(|d| normalize_remote_dir(d))
            .filter(|d| is_under(&prefix, d))
            .collect();
        dirs.sort();
        dirs.dedup();
        debug!(%prefix, count = dirs.len(), "Listed remote directories");
        Ok(dirs)
    }

    pub async fn list_directory_page(
        &self,
        dir: &str,
        cursor: Option<String>,
    ) -> Result<DirectoryPage, SyncError> {
        retry(
            &self.policy,
            || self.service.list_directory_page(dir, cursor.clone()),
            |err: &TransportError, backoff| {
                warn!(dir, error = %err, ?backoff, "Listing page failed, retrying");
            },
        )
        .await
        .map_err(|source| SyncError::Listing {
            dir: dir.to_string(),
            source,
        })
    }

    /// Feed every file of `dir` to `visit`, page by page. Returns the file count.
    ///
    /// `visit` returns `false` to stop early (the queue it feeds was closed).
    pub async fn for_each_file<F, Fut>(&self, dir: &str, mut visit: F) -> Result<usize, SyncError>
    where
        F: FnMut(RemoteFile) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut cursor: Option<String> = None;
        let mut total = 0usize;
        loop {
            let page = self.list_directory_page(dir, cursor.clone()).await?;
            let count = page.files.len();
            total += count;
            for file in page.files {
                if !visit(file).await {
                    warn!(dir, "Consumer stopped, abandoning enumeration");
                    return Ok(total);
                }
            }

            if count < PAGE_SIZE {
                break;
            }
            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => {
                    warn!(dir, "Full page without a new cursor, stopping enumeration");
                    break;
                }
            }
        }
        info!(dir, files = total, "Enumerated remote directory");
        Ok(total)
    }

    pub async fn collect_files(&self, dir: &str) -> Result<Vec<RemoteFile>, SyncError> {
        let mut files = Vec::new();
        self.for_each_file(dir, |file| {
            files.push(file);
            async { true }
        })
        .await?;
        Ok(files)
    }
}
