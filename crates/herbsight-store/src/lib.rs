//! # herbsight-store
//!
//! SQLite persistence for HerbSight, shared by both sides of the system.
//!
//! The client uses the `local_storage` key/value table as its anonymous
//! fallback store. The server keeps the hosted collections (scans, knowledge
//! entries, uploaded file metadata, sessions) in the same schema. All access
//! goes through the synchronous [`Database`] handle.

pub mod database;
pub mod files;
pub mod knowledge;
pub mod kv;
pub mod migrations;
pub mod models;
pub mod scans;
pub mod sessions;

mod error;

pub use database::{default_data_dir, Database};
pub use error::StoreError;
pub use models::*;
