#![allow(dead_code)]

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

/// HS256 token with the given tenant, expiring `expires_in_secs` from now.
pub fn token(tenant: &str, expires_in_secs: i64) -> String {
    let claims = json!({
        "tenant": tenant,
        "sub": "user-42",
        "email": "dev@example.test",
        "exp": Utc::now().timestamp() + expires_in_secs,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
}
