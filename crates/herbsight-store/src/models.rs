//! Records persisted only by the store. The scan and knowledge models live in
//! `herbsight-shared`.

use chrono::{DateTime, Utc};
use herbsight_shared::SessionUser;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Uploaded file
// ---------------------------------------------------------------------------

/// Metadata for an uploaded image. The bytes are kept on disk under `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    /// `<uuid>.<ext>`, also the last path segment of the public URL.
    pub name: String,
    pub mime_type: String,
    pub file_size: i64,
    /// BLAKE3 content hash (hex string).
    pub blake3_hash: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An issued bearer session. Only the hash of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_hash: String,
    pub user: SessionUser,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

pub(crate) fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    s: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(s).map_err(|e| conversion_error(idx, e))
}
