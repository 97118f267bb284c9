//! Identity resolution and the local credential store.
//!
//! The access token is a JWT issued by the identity provider. Its signature
//! is never checked here (the remote service does that); the claims are only
//! decoded to find the tenant and to drop tokens that are already expired.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use bucket_sync_core::contract::Identity;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const TOKEN_ENV: &str = "BUCKET_SYNC_TOKEN";
const STORE_DIR: &str = "bucket-sync";
const STORE_FILE: &str = "user.json";

#[derive(Debug, Deserialize)]
struct Claims {
    tenant: Option<String>,
    sub: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

/// Decode `token` (unverified) into an [`Identity`].
///
/// Fails when the token is malformed, expired, not yet valid or has no
/// `tenant` claim.
pub fn identity_from_token(token: &str) -> Result<Identity> {
    let token = token.trim();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .context("access token is not a valid, unexpired JWT")?
        .claims;

    let tenant = claims
        .tenant
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("access token has no `tenant` claim"))?;

    let mut identity = Identity::new(tenant, token);
    identity.user_id = claims.sub;
    identity.name = claims.name;
    identity.email = claims.email;
    Ok(identity)
}

/// JSON file holding the identity of the last `auth` run.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/bucket-sync/user.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(STORE_DIR).join(STORE_FILE))
    }

    /// Store at `path`, or at [`CredentialStore::default_path`].
    pub fn at(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self::new(path)),
            None => Self::default_path()
                .map(Self::new)
                .ok_or_else(|| anyhow!("no config directory found; pass --credentials")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored identity, or `None` when absent, unreadable or expired.
    pub fn load(&self) -> Result<Option<Identity>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No stored credentials");
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading credentials {}", self.path.display()))?;

        let stored: Identity = match serde_json::from_str(&content) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable credentials");
                return Ok(None);
            }
        };
        match identity_from_token(&stored.access_token) {
            Ok(_) => Ok(Some(stored)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring stored credentials");
                Ok(None)
            }
        }
    }

    pub fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(identity)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing credentials {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        info!(path = %self.path.display(), tenant = %identity.tenant_id, "Stored credentials");
        Ok(())
    }

    /// Delete the stored identity. Returns whether there was one.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed stored credentials");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restricting permissions of {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Explicit token, then `BUCKET_SYNC_TOKEN`, then the credential store.
pub fn resolve_identity(explicit: Option<&str>, store: &CredentialStore) -> Result<Identity> {
    let from_env = env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
    if let Some(token) = explicit.map(str::to_string).or(from_env) {
        debug!("Using access token from command line or environment");
        return identity_from_token(&token);
    }
    match store.load()? {
        Some(identity) => Ok(identity),
        None => bail!("not authenticated; run `bucket-sync auth --token <jwt>` first"),
    }
}
