//! Memoised upload/download signatures.
//!
//! A signature is reused for every transfer into the same destination
//! directory until its time-to-live runs out. Concurrent misses on one key
//! are coalesced into a single signing request; failures are never cached.

use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use tracing::debug;

use crate::contract::{FileService, Signature, SignatureScope};
use crate::error::SyncError;

const MAX_ENTRIES: u64 = 10_000;

pub struct SignatureCache {
    cache: Cache<String, Signature>,
}

impl SignatureCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub fn cache_key(tenant: &str, scope: &SignatureScope) -> String {
        format!(
            "{tenant}-{}|{}|{}",
            scope.path,
            scope.method.as_str(),
            if scope.visibility.is_public() { "public" } else { "private" }
        )
    }

    /// Return the signature for `scope`, asking `service` only on a miss.
    pub async fn get(
        &self,
        service: &dyn FileService,
        tenant: &str,
        scope: &SignatureScope,
    ) -> Result<Signature, SyncError> {
        let key = Self::cache_key(tenant, scope);
        let signature = self.fetch(service, key.clone(), scope).await?;

        // The service may hand out tokens shorter-lived than our TTL.
        if signature.expires_at <= Utc::now() {
            debug!(path = %scope.path, "Cached signature already expired, re-signing");
            self.cache.invalidate(&key).await;
            return self.fetch(service, key, scope).await;
        }
        Ok(signature)
    }

    async fn fetch(
        &self,
        service: &dyn FileService,
        key: String,
        scope: &SignatureScope,
    ) -> Result<Signature, SyncError> {
        self.cache
            .try_get_with(key, async {
                debug!(path = %scope.path, method = scope.method.as_str(), "Requesting signature");
                service.sign(scope).await
            })
            .await
            .map_err(|source| SyncError::Signature {
                path: scope.path.clone(),
                source,
            })
    }

    /// Number of live entries. Approximate until pending maintenance has run.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{SignMethod, Visibility};

    #[test]
    fn cache_key_separates_tenants_and_scopes() {
        let scope = SignatureScope::new("/uploads/c", SignMethod::Upsert, Visibility::Public);
        let private = SignatureScope::new("/uploads/c", SignMethod::Upsert, Visibility::Private);
        let read = SignatureScope::new("/uploads/c", SignMethod::Read, Visibility::Public);

        assert_ne!(
            SignatureCache::cache_key("t1", &scope),
            SignatureCache::cache_key("t2", &scope)
        );
        assert_ne!(
            SignatureCache::cache_key("t1", &scope),
            SignatureCache::cache_key("t1", &private)
        );
        assert_ne!(
            SignatureCache::cache_key("t1", &scope),
            SignatureCache::cache_key("t1", &read)
        );
        assert!(SignatureCache::cache_key("t1", &read).contains("|read|"));
        assert!(SignatureCache::cache_key("t1", &scope).starts_with("t1-/uploads/c"));
    }
}
