//! Acting principal and the API tokens that identify it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The user an admin request acts as.
///
/// Supplied by the host's user table; only identity and the superuser flag
/// matter to access control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Principal {
    #[sqlx(rename = "id")]
    pub user_id: Uuid,
    pub name: String,
    pub is_superuser: bool,
}

impl Principal {
    pub fn superuser(name: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::now_v7(),
            name: name.into(),
            is_superuser: true,
        }
    }

    pub fn editor(name: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::now_v7(),
            name: name.into(),
            is_superuser: false,
        }
    }
}

/// API token record (never contains the raw token).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub token_hash: String,
    pub created: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// Generate a 32-byte random hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_hashing() {
        let hash1 = hash_token("test_api_token_12345");
        assert_eq!(hash1, hash_token("test_api_token_12345"));
        assert_ne!(hash1, hash_token("different_token"));
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn token_generation() {
        let t1 = generate_token();
        assert_ne!(t1, generate_token());
        assert_eq!(t1.len(), 64);
    }

    #[test]
    fn expiry() {
        let now = Utc::now();
        let mut token = ApiToken {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            name: "ci".into(),
            token_hash: hash_token("x"),
            created: now,
            expires_at: None,
        };
        assert!(!token.is_expired_at(now));
        token.expires_at = Some(now - Duration::minutes(1));
        assert!(token.is_expired_at(now));
    }
}
