use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use common::now_secs;
use rand::Rng;
use redb::{Database, ReadableTable, StorageError, TableDefinition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

const SESSION_COOKIE: &str = "melodeon_session";
const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub user_id: String,
    pub expires_at: u64,
}

#[derive(Debug)]
pub enum AuthError {
    UserExists,
    InvalidUsername,
    InvalidPassword,
    DbError(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::UserExists => write!(f, "username already taken"),
            AuthError::InvalidUsername => write!(f, "username must not be empty"),
            AuthError::InvalidPassword => {
                write!(f, "password must be at least {} characters", MIN_PASSWORD_LEN)
            }
            AuthError::DbError(message) => write!(f, "auth db error: {}", message),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Clone)]
pub struct AuthStore {
    db: Arc<Database>,
    session_ttl: Duration,
}

impl AuthStore {
    pub fn new(db: Arc<Database>, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    pub fn init_tables(&self) -> Result<(), AuthError> {
        let write_txn = self.db.begin_write().map_err(|e| AuthError::DbError(e.to_string()))?;
        {
            let _users = write_txn
                .open_table(USERS_TABLE)
                .map_err(|e| AuthError::DbError(e.to_string()))?;
            let _sessions = write_txn
                .open_table(SESSIONS_TABLE)
                .map_err(|e| AuthError::DbError(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| AuthError::DbError(e.to_string()))?;
        Ok(())
    }

    pub fn has_any_user(&self) -> Result<bool, AuthError> {
        let read_txn = self.db.begin_read().map_err(|e| AuthError::DbError(e.to_string()))?;
        let table = read_txn
            .open_table(USERS_TABLE)
            .map_err(|e| AuthError::DbError(e.to_string()))?;
        let count = table.len().map_err(|e| AuthError::DbError(e.to_string()))?;
        Ok(count > 0)
    }

    pub fn create_user(&self, username: &str, password: &str) -> Result<AuthUser, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidUsername);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidPassword);
        }

        let user = AuthUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password(password),
            created_at: now_secs(),
        };

        let txn = self.db.begin_write().map_err(|e| AuthError::DbError(e.to_string()))?;
        {
            let mut table = txn
                .open_table(USERS_TABLE)
                .map_err(|e| AuthError::DbError(e.to_string()))?;

            for item in table.iter().map_err(|e: StorageError| AuthError::DbError(e.to_string()))? {
                let item = item.map_err(|e: StorageError| AuthError::DbError(e.to_string()))?;
                let existing: AuthUser = bincode::deserialize(item.1.value())
                    .map_err(|e| AuthError::DbError(e.to_string()))?;
                if existing.username.eq_ignore_ascii_case(username) {
                    return Err(AuthError::UserExists);
                }
            }

            let bytes = bincode::serialize(&user).map_err(|e| AuthError::DbError(e.to_string()))?;
            table
                .insert(user.id.as_str(), bytes.as_slice())
                .map_err(|e| AuthError::DbError(e.to_string()))?;
        }
        txn.commit().map_err(|e| AuthError::DbError(e.to_string()))?;

        Ok(user)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<AuthUser>, AuthError> {
        let user = match self.get_user_by_username(username)? {
            Some(user) => user,
            None => return Ok(None),
        };

        if verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub fn create_session(&self, user_id: &str) -> Result<SessionToken, AuthError> {
        let session = SessionToken {
            token: generate_token(),
            user_id: user_id.to_string(),
            expires_at: now_secs() + self.session_ttl.as_secs(),
        };

        let txn = self.db.begin_write().map_err(|e| AuthError::DbError(e.to_string()))?;
        {
            let mut table = txn
                .open_table(SESSIONS_TABLE)
                .map_err(|e| AuthError::DbError(e.to_string()))?;
            let bytes = bincode::serialize(&session).map_err(|e| AuthError::DbError(e.to_string()))?;
            table
                .insert(session.token.as_str(), bytes.as_slice())
                .map_err(|e| AuthError::DbError(e.to_string()))?;
        }
        txn.commit().map_err(|e| AuthError::DbError(e.to_string()))?;

        Ok(session)
    }

    pub fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
        let txn = self.db.begin_write().map_err(|e| AuthError::DbError(e.to_string()))?;
        {
            let mut table = txn
                .open_table(SESSIONS_TABLE)
                .map_err(|e| AuthError::DbError(e.to_string()))?;
            table.remove(token).map_err(|e| AuthError::DbError(e.to_string()))?;
        }
        txn.commit().map_err(|e| AuthError::DbError(e.to_string()))?;
        Ok(())
    }

    pub fn user_from_token(&self, token: &str) -> Result<Option<AuthUser>, AuthError> {
        let read_txn = self.db.begin_read().map_err(|e| AuthError::DbError(e.to_string()))?;
        let sessions = read_txn
            .open_table(SESSIONS_TABLE)
            .map_err(|e| AuthError::DbError(e.to_string()))?;

        let session = match sessions
            .get(token)
            .map_err(|e: StorageError| AuthError::DbError(e.to_string()))?
        {
            Some(value) => {
                let session: SessionToken = bincode::deserialize(value.value())
                    .map_err(|e| AuthError::DbError(e.to_string()))?;
                session
            }
            None => return Ok(None),
        };

        if session.expires_at <= now_secs() {
            return Ok(None);
        }

        let users = read_txn
            .open_table(USERS_TABLE)
            .map_err(|e| AuthError::DbError(e.to_string()))?;
        let user = match users
            .get(session.user_id.as_str())
            .map_err(|e: StorageError| AuthError::DbError(e.to_string()))?
        {
            Some(value) => Some(
                bincode::deserialize(value.value()).map_err(|e| AuthError::DbError(e.to_string()))?,
            ),
            None => None,
        };
        Ok(user)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<AuthUser>, AuthError> {
        let read_txn = self.db.begin_read().map_err(|e| AuthError::DbError(e.to_string()))?;
        let table = read_txn
            .open_table(USERS_TABLE)
            .map_err(|e| AuthError::DbError(e.to_string()))?;
        for item in table.iter().map_err(|e: StorageError| AuthError::DbError(e.to_string()))? {
            let item = item.map_err(|e: StorageError| AuthError::DbError(e.to_string()))?;
            let user: AuthUser = bincode::deserialize(item.1.value())
                .map_err(|e| AuthError::DbError(e.to_string()))?;
            if user.username.eq_ignore_ascii_case(username) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }
}

/// Bearer header first, session cookie second.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookies.split(';') {
        let part = part.trim();
        if let Some(token) = part.strip_prefix(SESSION_COOKIE) {
            if let Some(token) = token.strip_prefix('=') {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password);
    format!("{:x}", hasher.finalize())
}

fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..32)
        .map(|_| {
            let idx = rng.random_range(0..62);
            let chars = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
            chars[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{extract_token, AuthError, AuthStore};
    use axum::http::{header, HeaderMap, HeaderValue};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_auth(ttl: Duration) -> (AuthStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = store::MusicStore::open_db(&dir.path().join("auth.redb")).unwrap();
        let auth = AuthStore::new(Arc::clone(&db), ttl);
        auth.init_tables().unwrap();
        (auth, dir)
    }

    #[test]
    fn register_login_session_roundtrip() {
        let (auth, _dir) = test_auth(Duration::from_secs(3600));
        assert!(!auth.has_any_user().unwrap());

        let user = auth.create_user("alice", "secret").unwrap();
        assert!(auth.has_any_user().unwrap());

        assert!(auth.authenticate("alice", "wrong").unwrap().is_none());
        let authed = auth.authenticate("ALICE", "secret").unwrap().unwrap();
        assert_eq!(authed.id, user.id);

        let session = auth.create_session(&user.id).unwrap();
        let resolved = auth.user_from_token(&session.token).unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        auth.revoke_session(&session.token).unwrap();
        assert!(auth.user_from_token(&session.token).unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (auth, _dir) = test_auth(Duration::from_secs(3600));
        auth.create_user("alice", "secret").unwrap();
        let err = auth.create_user("Alice", "secret").unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
    }

    #[test]
    fn expired_session_is_invalid() {
        let (auth, _dir) = test_auth(Duration::ZERO);
        let user = auth.create_user("alice", "secret").unwrap();
        let session = auth.create_session(&user.id).unwrap();
        assert!(auth.user_from_token(&session.token).unwrap().is_none());
    }

    #[test]
    fn token_extracted_from_header_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(extract_token(&headers), Some("abc123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; melodeon_session=tok456"),
        );
        assert_eq!(extract_token(&headers), Some("tok456".to_string()));

        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
