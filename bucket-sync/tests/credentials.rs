mod common;

use bucket_sync::credentials::{identity_from_token, resolve_identity, CredentialStore, TOKEN_ENV};
use common::token;
use serial_test::serial;
use std::env;
use tempfile::tempdir;

#[test]
fn token_claims_become_identity() {
    let jwt = token("tenant-7", 3600);
    let identity = identity_from_token(&jwt).expect("valid token");

    assert_eq!(identity.tenant_id, "tenant-7");
    assert_eq!(identity.access_token, jwt);
    assert_eq!(identity.user_id.as_deref(), Some("user-42"));
    assert_eq!(identity.email.as_deref(), Some("dev@example.test"));
}

#[test]
fn expired_or_malformed_tokens_are_rejected() {
    assert!(identity_from_token(&token("tenant-7", -3600)).is_err());
    assert!(identity_from_token("not-a-jwt").is_err());
    assert!(identity_from_token(&token("", 3600)).is_err());
}

#[test]
fn store_round_trip_and_removal() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("nested/user.json"));
    assert!(store.load().unwrap().is_none());

    let mut identity = identity_from_token(&token("tenant-7", 3600)).unwrap();
    identity.tenant_name = Some("Acme".to_string());
    store.save(&identity).unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(json.get("token").is_some());

    assert_eq!(store.load().unwrap(), Some(identity));
    assert!(store.remove().unwrap());
    assert!(!store.remove().unwrap());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn expired_stored_token_counts_as_absent() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("user.json"));
    let mut identity = identity_from_token(&token("tenant-7", 3600)).unwrap();
    identity.access_token = token("tenant-7", -3600);
    store.save(&identity).unwrap();

    assert!(store.load().unwrap().is_none());

    std::fs::write(store.path(), "{ not json").unwrap();
    assert!(store.load().unwrap().is_none());
}

#[test]
#[serial]
fn explicit_token_wins_over_environment_and_store() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("user.json"));
    store
        .save(&identity_from_token(&token("stored", 3600)).unwrap())
        .unwrap();

    env::set_var(TOKEN_ENV, token("from-env", 3600));
    let explicit = resolve_identity(Some(&token("explicit", 3600)), &store).unwrap();
    let from_env = resolve_identity(None, &store).unwrap();
    env::remove_var(TOKEN_ENV);
    let from_store = resolve_identity(None, &store).unwrap();

    assert_eq!(explicit.tenant_id, "explicit");
    assert_eq!(from_env.tenant_id, "from-env");
    assert_eq!(from_store.tenant_id, "stored");
}

#[test]
#[serial]
fn missing_credentials_are_reported() {
    env::remove_var(TOKEN_ENV);
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("user.json"));

    let err = resolve_identity(None, &store).unwrap_err();
    assert!(err.to_string().contains("not authenticated"));
}
