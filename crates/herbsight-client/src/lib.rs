//! # herbsight-client
//!
//! Client side of HerbSight: turns a captured or picked image into a saved
//! scan and manages the scan collection and the admin knowledge base.
//!
//! [`app::HerbSight`] wires the pieces together. Each piece is usable on its
//! own: [`pipeline::IntakePipeline`] (upload, identify, normalize, persist),
//! [`scan_store::ScanRepository`] (hosted collection or local fallback) and
//! [`knowledge::KnowledgeBase`] (admin CRUD).

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod knowledge;
pub mod pipeline;
pub mod scan_store;
pub mod session;
pub mod settings;

pub use app::HerbSight;
pub use config::ClientConfig;
pub use error::{ClientError, Disposition};
pub use session::SessionContext;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the tracing subscriber for an application embedding the client.
/// Respects `RUST_LOG`; does nothing if a subscriber is already set.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("herbsight_client=debug,herbsight_store=info,herbsight_media=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
