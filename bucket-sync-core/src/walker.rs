//! Local directory traversal feeding the upload queue.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::DEFAULT_EXTENSIONS;
use crate::error::SyncError;

/// Allow-list of file extensions, matched case-insensitively on the file name.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    matcher: Option<Regex>,
}

impl ExtensionFilter {
    /// An empty list accepts every file.
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<Self, SyncError> {
        let alternatives: Vec<String> = extensions
            .iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.'))
            .filter(|e| !e.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { matcher: None });
        }
        let matcher = Regex::new(&format!(r"(?i)\.({})$", alternatives.join("|")))?;
        Ok(Self {
            matcher: Some(matcher),
        })
    }

    pub fn accept_all() -> Self {
        Self { matcher: None }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| matcher.is_match(name))
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS).unwrap_or_else(|_| Self::accept_all())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub accepted: usize,
    pub skipped: usize,
}

pub struct LocalWalker {
    root: PathBuf,
    filter: ExtensionFilter,
}

impl LocalWalker {
    pub fn new(root: impl Into<PathBuf>, filter: ExtensionFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    /// Walk the tree, handing each accepted file to `visit`.
    ///
    /// `visit` returns `false` when the consumer side has gone away, which
    /// stops the walk early. Blocking; run it off the async executor.
    pub fn walk<F>(&self, mut visit: F) -> Result<WalkSummary, SyncError>
    where
        F: FnMut(PathBuf) -> bool,
    {
        let mut summary = WalkSummary::default();
        for entry in WalkDir::new(&self.root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|source| SyncError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            if !self.filter.matches(&path) {
                warn!(path = %path.display(), "✗ invalid suffix, skipping");
                summary.skipped += 1;
                continue;
            }

            debug!(path = %path.display(), "Added to queue");
            summary.accepted += 1;
            if !visit(path) {
                warn!(root = %self.root.display(), "Queue closed, stopping walk");
                break;
            }
        }
        Ok(summary)
    }
}
