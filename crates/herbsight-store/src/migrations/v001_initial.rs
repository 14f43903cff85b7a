//! v001 -- Initial schema creation.
//!
//! Creates the client-side `local_storage` table and the hosted tables:
//! `sessions`, `files`, `scans` and `plant_knowledge`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Local key/value storage (anonymous fallback)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS local_storage (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL                       -- whole JSON document
);

-- ----------------------------------------------------------------
-- Sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY NOT NULL,     -- hex BLAKE3 of the bearer token
    user_id    TEXT NOT NULL,                 -- UUID v4
    role       TEXT NOT NULL,                 -- 'user' | 'admin'
    created_at TEXT NOT NULL                  -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Uploaded files (metadata; bytes live on disk)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS files (
    name        TEXT PRIMARY KEY NOT NULL,    -- '<uuid>.<ext>'
    mime_type   TEXT NOT NULL,
    file_size   INTEGER NOT NULL,
    blake3_hash TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Scans (hosted collection, one owner per row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS scans (
    id             TEXT PRIMARY KEY NOT NULL, -- UUID v4
    owner_id       TEXT NOT NULL,
    image_url      TEXT NOT NULL,
    identification TEXT NOT NULL,             -- JSON
    uses           TEXT NOT NULL,             -- JSON
    warnings       TEXT NOT NULL,             -- JSON
    is_favorite    INTEGER NOT NULL DEFAULT 0,
    notes          TEXT NOT NULL DEFAULT '',
    created_date   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scans_owner_created
    ON scans(owner_id, created_date DESC);

-- ----------------------------------------------------------------
-- Plant knowledge base
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS plant_knowledge (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    category     TEXT NOT NULL,
    data         TEXT NOT NULL,               -- JSON draft
    created_date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_plant_knowledge_category
    ON plant_knowledge(category);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
