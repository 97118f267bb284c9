//! Lexical mapping between local paths and remote directories.
//!
//! Nothing here touches the filesystem or the network.

use std::path::{Component, Path, PathBuf};

use crate::contract::RemoteFile;
use crate::error::SyncError;

/// Path-aware prefix test: `/a` covers `/a` and `/a/b`, not `/ab`.
pub fn is_under(prefix: &str, dir: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    let dir = dir.trim_end_matches('/');
    dir == prefix || dir.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

/// Normalise a remote directory: leading `/`, no trailing `/`, `/` for the root.
pub fn normalize_remote_dir(dir: &str) -> String {
    let trimmed = dir.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Parent directory of a remote path (`/uploads/c/d.png` -> `/uploads/c`).
pub fn remote_parent(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

/// Remote path a local `file` is uploaded to: its path relative to
/// `source_root`, re-rooted under `destination_root`.
pub fn upload_destination(
    source_root: &Path,
    destination_root: &str,
    file: &Path,
) -> Result<String, SyncError> {
    let relative = file.strip_prefix(source_root).map_err(|_| SyncError::PathMapping {
        path: file.display().to_string(),
        reason: format!("not inside {}", source_root.display()),
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| SyncError::PathMapping {
                    path: file.display().to_string(),
                    reason: "path is not valid UTF-8".to_string(),
                })?;
                segments.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(SyncError::PathMapping {
                    path: file.display().to_string(),
                    reason: "relative path escapes the source root".to_string(),
                })
            }
        }
    }
    if segments.is_empty() {
        return Err(SyncError::PathMapping {
            path: file.display().to_string(),
            reason: "file is the source root itself".to_string(),
        });
    }

    let root = normalize_remote_dir(destination_root);
    let joined = segments.join("/");
    Ok(if root == "/" {
        format!("/{joined}")
    } else {
        format!("{root}/{joined}")
    })
}

/// Local path a remote `file` is written to: its directory relative to
/// `remote_prefix`, re-rooted under `local_root`, plus the filename.
pub fn download_destination(
    remote_prefix: &str,
    local_root: &Path,
    file: &RemoteFile,
) -> Result<PathBuf, SyncError> {
    let mapping_error = |reason: &str| SyncError::PathMapping {
        path: format!("{}/{}", file.dir.trim_end_matches('/'), file.filename),
        reason: reason.to_string(),
    };

    let prefix = normalize_remote_dir(remote_prefix);
    let dir = normalize_remote_dir(&file.dir);
    if !is_under(&prefix, &dir) {
        return Err(mapping_error(&format!("directory is outside `{prefix}`")));
    }

    let mut target = local_root.to_path_buf();
    let relative = if prefix == "/" { dir.as_str() } else { &dir[prefix.len()..] };
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        if !is_plain_segment(segment) {
            return Err(mapping_error("directory contains an unsafe segment"));
        }
        target.push(segment);
    }

    if !is_plain_segment(&file.filename) {
        return Err(mapping_error("unsafe filename"));
    }
    target.push(&file.filename);
    Ok(target)
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
        && !segment.contains('\0')
}
