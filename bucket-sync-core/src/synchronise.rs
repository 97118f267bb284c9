//! # synchronise: shared state of one transfer run
//!
//! [`SyncContext`] bundles everything an upload or download run needs: the
//! file service, the caller identity, the signature cache and the engine
//! settings. The caller builds it once and hands it to [`crate::upload::upload`]
//! or [`crate::download::download`]; nothing here is a process-wide global.
//!
//! # Callable From
//! - The CLI crate, after resolving credentials and loading settings
//! - Integration tests, with a `MockFileService` in place of the HTTP client

use std::sync::Arc;

use tracing::debug;

use crate::client::ApiClient;
use crate::config::EngineSettings;
use crate::contract::{FileService, Identity, Signature, SignatureScope};
use crate::error::SyncError;
use crate::signature::SignatureCache;

#[derive(Clone)]
pub struct SyncContext {
    pub service: Arc<dyn FileService>,
    pub identity: Arc<Identity>,
    pub signatures: Arc<SignatureCache>,
    pub settings: EngineSettings,
}

impl SyncContext {
    pub fn new(service: Arc<dyn FileService>, identity: Identity, settings: EngineSettings) -> Self {
        let signatures = Arc::new(SignatureCache::new(settings.signature_ttl));
        debug!(
            tenant = %identity.tenant_id,
            ttl_secs = settings.signature_ttl.as_secs(),
            "Created sync context"
        );
        Self {
            service,
            identity: Arc::new(identity),
            signatures,
            settings,
        }
    }

    /// Context backed by the HTTP client described in `settings.client`.
    pub fn connect(identity: Identity, settings: EngineSettings) -> Result<Self, SyncError> {
        let client = ApiClient::new(&settings.client, &identity)?;
        Ok(Self::new(Arc::new(client), identity, settings))
    }

    /// Signature for `scope`, served from the cache when possible.
    pub async fn signature(&self, scope: &SignatureScope) -> Result<Signature, SyncError> {
        self.signatures
            .get(self.service.as_ref(), &self.identity.tenant_id, scope)
            .await
    }
}
