//! # contract: data model and the file service seam
//!
//! This module defines the plain data exchanged with the remote file service
//! ([`RemoteFile`], [`Signature`], [`DirectoryPage`]), the caller [`Identity`],
//! and the [`FileService`] trait that every transfer goes through.
//!
//! ## Interface & Extensibility
//! - [`crate::client::ApiClient`] is the production implementation over HTTP.
//! - The trait is annotated for `mockall` so tests can script the remote side
//!   without a network (`MockFileService`).
//! - All methods are async and return [`TransportError`]; callers decide
//!   whether a failure is fatal, retried, or recorded against a single item.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mockall::{automock, predicate::*};

use crate::error::TransportError;

/// A file as reported by the remote listing and upload endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub label: String,
    /// Logical directory the file lives in, e.g. `/uploads/c`.
    pub dir: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub mime: String,
    pub url: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_listed: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authorisation token issued by the signing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signature: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// Operation a signature authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignMethod {
    Upsert,
    Read,
}

impl SignMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SignMethod::Upsert => "upsert",
            SignMethod::Read => "read",
        }
    }
}

/// What a signature is scoped to: one destination directory, one method, one visibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureScope {
    pub path: String,
    pub method: SignMethod,
    pub visibility: Visibility,
}

impl SignatureScope {
    pub fn new(path: impl Into<String>, method: SignMethod, visibility: Visibility) -> Self {
        Self {
            path: path.into(),
            method,
            visibility,
        }
    }
}

/// One page of a directory listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryPage {
    pub files: Vec<RemoteFile>,
    /// Cursor to echo back for the next page, if the service sent one.
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Tenant scope and bearer credential for one process.
///
/// Obtained once at start-up and shared read-only by every worker.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub tenant_id: String,
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
}

impl Identity {
    pub fn new(tenant_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            access_token: access_token.into(),
            user_id: None,
            name: None,
            email: None,
            tenant_name: None,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("tenant_name", &self.tenant_name)
            .finish()
    }
}

/// Trait for talking to the remote file service.
///
/// The trait is `Send` + `Sync` so one instance can be shared by every worker
/// of a transfer pool behind an `Arc`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileService: Send + Sync {
    /// Request a fresh signature for the given scope.
    async fn sign(&self, scope: &SignatureScope) -> Result<Signature, TransportError>;

    /// Upload one local file under a previously obtained signature.
    async fn upload(
        &self,
        signature: &str,
        local_path: &Path,
        filename: &str,
    ) -> Result<RemoteFile, TransportError>;

    /// Fetch the raw bytes behind a (public or signed) file URL.
    async fn download(&self, url: &str) -> Result<Bytes, TransportError>;

    /// Resolve a short-lived signed URL for a private file.
    async fn signed_url(&self, file_id: &str) -> Result<String, TransportError>;

    /// Fetch one page of a directory listing.
    async fn list_directory_page(
        &self,
        dir: &str,
        cursor: Option<String>,
    ) -> Result<DirectoryPage, TransportError>;

    /// Fetch every directory name known to the service (unfiltered).
    async fn list_directories(&self) -> Result<Vec<String>, TransportError>;
}
