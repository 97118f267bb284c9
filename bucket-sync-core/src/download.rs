//! # download: remote prefix → local tree
//!
//! [`download`] lists every remote directory below a prefix, paginates each
//! one into the transfer pool and lets the workers fetch and write the files.
//!
//! Files are written to a uniquely named temporary sibling first and persisted
//! under the final name, so a failed transfer never leaves a truncated file
//! there and two writers never share a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::contract::RemoteFile;
use crate::error::SyncError;
use crate::lister::RemoteLister;
use crate::paths::{download_destination, normalize_remote_dir};
use crate::pool::{run_pool, PoolConfig, TransferHandler, TransferReport, TransferSuccess};
use crate::synchronise::SyncContext;

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Remote prefix, e.g. `/uploads`.
    pub source: String,
    pub destination: PathBuf,
}

struct DownloadHandler {
    ctx: SyncContext,
    prefix: String,
    local_root: PathBuf,
}

impl DownloadHandler {
    async fn resolve_url(&self, file: &RemoteFile) -> Result<String, SyncError> {
        if file.is_public && !file.url.is_empty() {
            return Ok(file.url.clone());
        }
        debug!(id = %file.id, "Resolving signed url for private file");
        Ok(self.ctx.service.signed_url(&file.id).await?)
    }
}

#[async_trait]
impl TransferHandler<RemoteFile> for DownloadHandler {
    fn describe(&self, file: &RemoteFile) -> String {
        format!("{}/{}", file.dir.trim_end_matches('/'), file.filename)
    }

    async fn transfer(&self, file: &RemoteFile) -> Result<TransferSuccess, SyncError> {
        let target = download_destination(&self.prefix, &self.local_root, file)?;
        let url = self.resolve_url(file).await?;
        let content = self.ctx.service.download(&url).await?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SyncError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        write_atomically(&target, content).await?;

        info!(filename = %file.filename, path = %target.display(), "✔ Downloaded");
        Ok(TransferSuccess {
            source: self.describe(file),
            destination: target.display().to_string(),
            url: Some(url),
        })
    }
}

/// Write `content` to a uniquely named temporary sibling of `target` and persist
/// it under the final name. Blocking; runs on the blocking pool.
async fn write_atomically(target: &Path, content: Bytes) -> Result<(), SyncError> {
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), SyncError> {
        let write_error = |source| SyncError::Write {
            path: target.clone(),
            source,
        };
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let mut partial = tempfile::Builder::new()
            .prefix(".bucket-sync-")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(write_error)?;
        partial.write_all(&content).map_err(write_error)?;
        partial
            .persist(&target)
            .map_err(|e| write_error(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| SyncError::Worker(e.to_string()))?
}

/// Download every file at or below `request.source` into `request.destination`.
///
/// Failing to create the destination or to list the remote side is fatal;
/// a single file that fails to download or write is only recorded.
pub async fn download(
    ctx: &SyncContext,
    request: DownloadRequest,
) -> Result<TransferReport, SyncError> {
    let prefix = normalize_remote_dir(&request.source);
    let local_root = request.destination;
    tokio::fs::create_dir_all(&local_root)
        .await
        .map_err(|source| SyncError::Destination {
            path: local_root.clone(),
            source,
        })?;

    let lister = RemoteLister::new(ctx.service.clone(), ctx.settings.retry.clone());
    let mut dirs = lister.list_directories(&prefix).await?;
    if !dirs.contains(&prefix) {
        dirs.insert(0, prefix.clone());
    }
    info!(
        %prefix,
        destination = %local_root.display(),
        directories = dirs.len(),
        "Starting download"
    );

    let handler = Arc::new(DownloadHandler {
        ctx: ctx.clone(),
        prefix,
        local_root,
    });
    let config = PoolConfig {
        workers: ctx.settings.workers,
        capacity: ctx.settings.download_queue,
    };
    let report = run_pool(config, handler, |queue| async move {
        for dir in &dirs {
            lister
                .for_each_file(dir, |file| {
                    let queue = queue.clone();
                    async move { queue.push(file).await }
                })
                .await?;
            if queue.is_closed() {
                break;
            }
        }
        Ok(())
    })
    .await?;

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Download finished"
    );
    Ok(report)
}
