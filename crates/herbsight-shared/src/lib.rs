//! # herbsight-shared
//!
//! Domain types shared by every HerbSight crate: the scan and knowledge-base
//! models, the identification wire contract (prompt + JSON schema) and the
//! Result Normalizer that turns a raw service response into a strict shape.

pub mod constants;
pub mod error;
pub mod knowledge;
pub mod normalize;
pub mod scan;
pub mod schema;
pub mod types;

pub use error::{IdError, SchemaError};
pub use knowledge::{KnowledgeDraft, KnowledgeFilter, PlantCategory, PlantKnowledgeEntry};
pub use normalize::{normalize, Normalized};
pub use scan::{
    ConfidenceTier, Identification, NewScan, Recipe, Scan, ScanFilter, ScanPatch, Severity,
    UsesBundle, Warning,
};
pub use types::{CapturedImage, Role, ScanId, SessionUser, UserId};
