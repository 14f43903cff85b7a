//! Bearer-token sessions.
//!
//! Tokens are random 32-byte values handed out by `/auth/register`; only
//! their BLAKE3 hash is stored. The configured `ADMIN_TOKEN` is accepted as
//! well and resolves to the admin role with a stable user id, so the admin's
//! own scans survive restarts.

use axum::http::HeaderMap;
use chrono::Utc;
use herbsight_shared::{Role, SessionUser, UserId};
use herbsight_store::{SessionRecord, StoreError};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ServerError;

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn is_admin_token(config: &ServerConfig, token: &str) -> bool {
    let Some(ref expected) = config.admin_token else {
        return false;
    };
    let token = token.as_bytes();
    let expected = expected.as_bytes();
    token.len() == expected.len() && token.ct_eq(expected).unwrap_u8() == 1
}

fn admin_user(token: &str) -> SessionUser {
    let key = blake3::derive_key("herbsight admin user id", token.as_bytes());
    let mut id = [0u8; 16];
    id.copy_from_slice(&key[..16]);
    SessionUser {
        id: UserId(Uuid::from_bytes(id)),
        role: Role::Admin,
    }
}

/// Resolve the caller, or fail with 401.
pub async fn require_session(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<SessionUser, ServerError> {
    let token = bearer_token(headers).ok_or(ServerError::Unauthorized)?;

    if is_admin_token(&state.config, token) {
        return Ok(admin_user(token));
    }

    let db = state.db.lock().await;
    match db.find_session(&hash_token(token)) {
        Ok(record) => Ok(record.user),
        Err(StoreError::NotFound) => {
            debug!("Unknown session token");
            Err(ServerError::Unauthorized)
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolve the caller and require the admin role (401 / 403).
pub async fn require_admin(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<SessionUser, ServerError> {
    let user = require_session(headers, state).await?;
    if !user.is_admin() {
        return Err(ServerError::Forbidden("Admin role required".into()));
    }
    Ok(user)
}

/// Issue a fresh user session. Returns the plain token, which is never
/// stored.
pub async fn register(state: &AppState) -> Result<(String, SessionUser), ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("Registration is closed".into()));
    }

    let token = generate_token();
    let user = SessionUser {
        id: UserId::new(),
        role: Role::User,
    };

    state.db.lock().await.insert_session(&SessionRecord {
        token_hash: hash_token(&token),
        user: user.clone(),
        created_at: Utc::now(),
    })?;

    info!(user = %user.id, "Registered new session");
    Ok((token, user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(hex::decode(&a).is_ok());
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), hash_token(&b));
    }

    #[test]
    fn test_bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_admin_token_match() {
        let mut config = ServerConfig::default();
        assert!(!is_admin_token(&config, "anything"));

        config.admin_token = Some("admin-secret".into());
        assert!(is_admin_token(&config, "admin-secret"));
        assert!(!is_admin_token(&config, "admin-secreT"));
        assert!(!is_admin_token(&config, "admin"));
    }

    #[test]
    fn test_admin_id_is_stable() {
        let a = admin_user("admin-secret");
        assert_eq!(a, admin_user("admin-secret"));
        assert!(a.is_admin());
        assert_ne!(a.id, admin_user("other").id);
    }
}
