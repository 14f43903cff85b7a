/// Application name
pub const APP_NAME: &str = "HerbSight";

/// Key under which the local fallback store keeps the whole scan list
pub const LOCAL_SCANS_KEY: &str = "herbsight_scans";

/// Prefix that marks a scan id as owned by the local fallback store
pub const LOCAL_ID_PREFIX: &str = "temp-";

/// Below this confidence the low-confidence advisory is injected
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Confidence assumed when the identification service omits it
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Confidence tier boundaries shown to the user
pub const HIGH_CONFIDENCE_FLOOR: f64 = 0.8;
pub const MODERATE_CONFIDENCE_FLOOR: f64 = 0.6;

/// Placeholders for missing names
pub const UNKNOWN_COMMON_NAME: &str = "Unknown Plant";
pub const UNKNOWN_SCIENTIFIC_NAME: &str = "Classification pending";

/// Synthetic warning prepended to low-confidence results
pub const LOW_CONFIDENCE_ADVISORY: &str = "Low confidence identification. DO NOT consume without expert verification. This plant may be misidentified and could be toxic.";

/// Maximum accepted image size in bytes (10 MiB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// JPEG quality used for camera captures
pub const CAPTURE_JPEG_QUALITY: u8 = 90;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
