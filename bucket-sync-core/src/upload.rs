//! # upload: local tree → remote prefix
//!
//! [`upload`] walks a local source on a blocking thread, feeds every accepted
//! file into the transfer pool and lets the workers sign and upload them.
//!
//! Each file is signed for its *parent* remote directory, so all files of one
//! directory share a single cached signature.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::contract::{SignMethod, SignatureScope, Visibility};
use crate::error::SyncError;
use crate::paths::{normalize_remote_dir, remote_parent, upload_destination};
use crate::pool::{run_pool, PoolConfig, TransferHandler, TransferReport, TransferSuccess};
use crate::synchronise::SyncContext;
use crate::walker::{ExtensionFilter, LocalWalker};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: PathBuf,
    /// Remote prefix, e.g. `/uploads/`.
    pub destination: String,
    pub visibility: Visibility,
}

/// One local file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub path: PathBuf,
}

struct UploadHandler {
    ctx: SyncContext,
    source_root: PathBuf,
    destination: String,
    visibility: Visibility,
}

#[async_trait]
impl TransferHandler<UploadItem> for UploadHandler {
    fn describe(&self, item: &UploadItem) -> String {
        item.path.display().to_string()
    }

    async fn transfer(&self, item: &UploadItem) -> Result<TransferSuccess, SyncError> {
        let remote_path = upload_destination(&self.source_root, &self.destination, &item.path)?;
        let dir = remote_parent(&remote_path);
        let filename = file_name(&item.path)?;

        let scope = SignatureScope::new(dir, SignMethod::Upsert, self.visibility);
        let signature = self.ctx.signature(&scope).await?;

        let file = self
            .ctx
            .service
            .upload(&signature.signature, &item.path, &filename)
            .await?;

        info!(filename = %file.filename, url = %file.url, "✔ Uploaded");
        Ok(TransferSuccess {
            source: item.path.display().to_string(),
            destination: remote_path,
            url: Some(file.url),
        })
    }
}

fn file_name(path: &Path) -> Result<String, SyncError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| SyncError::PathMapping {
            path: path.display().to_string(),
            reason: "file name is not valid UTF-8".to_string(),
        })
}

/// Directory relative paths are computed against. For a single-file source
/// that is the file's parent.
fn source_root(source: &Path, is_file: bool) -> PathBuf {
    match source.parent() {
        Some(parent) if is_file => parent.to_path_buf(),
        _ => source.to_path_buf(),
    }
}

/// Upload every accepted file below `request.source` to `request.destination`.
///
/// A missing source or a failing walk is fatal; a single file that fails to
/// sign or upload is only recorded in the report.
pub async fn upload(ctx: &SyncContext, request: UploadRequest) -> Result<TransferReport, SyncError> {
    let destination = normalize_remote_dir(&request.destination);
    let source = request.source;
    let metadata = match tokio::fs::metadata(&source).await {
        Ok(metadata) => metadata,
        Err(e) => {
            return Err(SyncError::InvalidSource {
                path: source,
                reason: e.to_string(),
            })
        }
    };
    let source_root = source_root(&source, metadata.is_file());

    let filter = ExtensionFilter::new(ctx.settings.extensions.as_slice())?;
    let walker = LocalWalker::new(source.clone(), filter);
    let handler = Arc::new(UploadHandler {
        ctx: ctx.clone(),
        source_root,
        destination: destination.clone(),
        visibility: request.visibility,
    });

    info!(
        source = %source.display(),
        %destination,
        public = request.visibility.is_public(),
        "Starting upload"
    );

    let config = PoolConfig {
        workers: ctx.settings.workers,
        capacity: ctx.settings.upload_queue,
    };
    let report = run_pool(config, handler, |queue| async move {
        let summary = tokio::task::spawn_blocking(move || {
            walker.walk(|path| queue.blocking_push(UploadItem { path }))
        })
        .await
        .map_err(|e| SyncError::Worker(e.to_string()))??;
        debug!(accepted = summary.accepted, skipped = summary.skipped, "Walk finished");
        Ok(())
    })
    .await?;

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Upload finished"
    );
    Ok(report)
}
