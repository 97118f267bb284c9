//! HTTP client for the remote file service.
//!
//! Every request goes through [`ApiClient::send_with`]. The bearer credential
//! is attached only to requests under the configured base URL; absolute URLs
//! on other hosts (CDN links, signed URLs) are fetched without it. The
//! response body is always read to the end (success or not), and any non-2xx
//! status becomes a [`TransportError::Status`].

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::contract::{DirectoryPage, FileService, Identity, RemoteFile, Signature, SignatureScope, Tenant};
use crate::error::TransportError;
use crate::lister::PAGE_SIZE;

/// Header carrying the pagination cursor, both on requests and responses.
pub const CURSOR_HEADER: &str = "x-page-cursor";
pub const PAGE_SIZE_HEADER: &str = "x-page-size";

const ERROR_BODY_EXCERPT: usize = 512;

/// Request payloads the client knows how to encode.
pub enum RequestBody {
    Empty,
    Raw { bytes: Bytes, content_type: String },
    Json(serde_json::Value),
    Multipart(Form),
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub body: Bytes,
    pub headers: HeaderMap,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer: HeaderValue,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, identity: &Identity) -> Result<Self, TransportError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", identity.access_token))
            .map_err(|_| TransportError::InvalidToken)?;
        bearer.set_sensitive(true);

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        debug!(base_url = %config.base_url, timeout = ?config.timeout, "Constructed API client");
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer,
        })
    }

    /// Whether `url` points at the service itself and may carry the credential.
    fn is_service_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
    }

    /// Resolve a service path against the base URL; absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<ApiResponse, TransportError> {
        self.send_with(method, path, &[], HeaderMap::new(), body).await
    }

    pub async fn send_with(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        headers: HeaderMap,
        body: RequestBody,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url).headers(headers);
        if self.is_service_url(&url) {
            request = request.header(AUTHORIZATION, self.bearer.clone());
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Raw {
                bytes,
                content_type,
            } => request.header(CONTENT_TYPE, content_type).body(bytes),
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        trace!(%method, %url, "Sending request");
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if !status.is_success() {
            let excerpt = String::from_utf8_lossy(&body[..body.len().min(ERROR_BODY_EXCERPT)]).into_owned();
            debug!(%method, %url, %status, "Request failed");
            return Err(TransportError::Status {
                status,
                url,
                body: excerpt,
            });
        }

        Ok(ApiResponse { body, headers })
    }

    /// Look up the tenant an identity belongs to.
    pub async fn tenant(&self, tenant_id: &str) -> Result<Tenant, TransportError> {
        self.send(Method::GET, &format!("iam/tenants/{tenant_id}"), RequestBody::Empty)
            .await?
            .json()
    }
}

#[derive(Deserialize)]
struct SignedUrl {
    url: String,
}

#[async_trait]
impl FileService for ApiClient {
    async fn sign(&self, scope: &SignatureScope) -> Result<Signature, TransportError> {
        let payload = json!({
            "is_public": scope.visibility.is_public(),
            "is_listed": true,
            "path": scope.path,
            "method": scope.method.as_str(),
            "metadata": {},
        });
        self.send(Method::POST, "cnt/files/signature", RequestBody::Json(payload))
            .await?
            .json()
    }

    async fn upload(
        &self,
        signature: &str,
        local_path: &Path,
        filename: &str,
    ) -> Result<RemoteFile, TransportError> {
        let content = tokio::fs::read(local_path).await?;
        let part = Part::bytes(content).file_name(filename.to_string());
        let form = Form::new().part("file", part);

        let files: Vec<RemoteFile> = self
            .send(
                Method::POST,
                &format!("cnt/files/upload/{signature}"),
                RequestBody::Multipart(form),
            )
            .await?
            .json()?;
        files
            .into_iter()
            .next()
            .ok_or(TransportError::EmptyResponse("upload"))
    }

    async fn download(&self, url: &str) -> Result<Bytes, TransportError> {
        if url.is_empty() {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }
        Ok(self.send(Method::GET, url, RequestBody::Empty).await?.body)
    }

    async fn signed_url(&self, file_id: &str) -> Result<String, TransportError> {
        let signed: SignedUrl = self
            .send(Method::GET, &format!("cnt/files/{file_id}/url"), RequestBody::Empty)
            .await?
            .json()?;
        Ok(signed.url)
    }

    async fn list_directory_page(
        &self,
        dir: &str,
        cursor: Option<String>,
    ) -> Result<DirectoryPage, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(PAGE_SIZE_HEADER),
            HeaderValue::from(PAGE_SIZE as u64),
        );
        if let Some(cursor) = cursor.as_deref().filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cursor)
                .map_err(|_| TransportError::InvalidUrl(format!("cursor {cursor}")))?;
            headers.insert(HeaderName::from_static(CURSOR_HEADER), value);
        }

        let response = self
            .send_with(
                Method::GET,
                "cnt/files",
                &[("dir", dir)],
                headers,
                RequestBody::Empty,
            )
            .await?;
        let files: Vec<RemoteFile> = response.json()?;
        let next_cursor = response
            .header(CURSOR_HEADER)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(DirectoryPage { files, next_cursor })
    }

    async fn list_directories(&self) -> Result<Vec<String>, TransportError> {
        self.send(Method::GET, "cnt/files/directories", RequestBody::Empty)
            .await?
            .json()
    }
}
