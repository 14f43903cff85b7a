//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development. Without `LLM_API_URL` the
//! identification route answers 502.

use std::net::SocketAddr;
use std::path::PathBuf;

use herbsight_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, MAX_IMAGE_SIZE};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database holding scans, knowledge entries, sessions and file
    /// metadata.
    /// Env: `DATABASE_PATH`
    /// Default: `./herbsight.db`
    pub database_path: PathBuf,

    /// Directory where uploaded images are written.
    /// Env: `FILE_STORAGE_PATH`
    /// Default: `./uploads`
    pub file_storage_path: PathBuf,

    /// Base URL under which `/files/<name>` is reachable from outside.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Maximum upload size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 10 MiB
    pub max_upload_size: usize,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"HerbSight"`
    pub instance_name: String,

    /// Bearer token that authenticates as the admin role.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (no admin access).
    pub admin_token: Option<String>,

    /// Whether `/auth/register` issues new sessions.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// OpenAI-compatible chat completions endpoint.
    /// Env: `LLM_API_URL`
    pub llm_api_url: Option<String>,

    /// Env: `LLM_API_KEY`
    pub llm_api_key: Option<String>,

    /// Env: `LLM_MODEL`
    /// Default: `gpt-4o-mini`
    pub llm_model: String,

    /// Sustained requests per second per IP on upload and identify routes.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `2`
    pub rate_limit_per_sec: f64,

    /// Env: `RATE_LIMIT_BURST`
    /// Default: `10`
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./herbsight.db"),
            file_storage_path: PathBuf::from("./uploads"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            max_upload_size: MAX_IMAGE_SIZE,
            instance_name: APP_NAME.to_string(),
            admin_token: None,
            registration_open: true,
            llm_api_url: None,
            llm_api_key: None,
            llm_model: "gpt-4o-mini".to_string(),
            rate_limit_per_sec: 2.0,
            rate_limit_burst: 10.0,
        }
    }
}

// Secrets stay out of the startup log.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("file_storage_path", &self.file_storage_path)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_size", &self.max_upload_size)
            .field("instance_name", &self.instance_name)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<set>"))
            .field("registration_open", &self.registration_open)
            .field("llm_api_url", &self.llm_api_url)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<set>"))
            .field("llm_model", &self.llm_model)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = var("FILE_STORAGE_PATH") {
            config.file_storage_path = PathBuf::from(path);
        }

        if let Some(url) = var("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = var("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(name) = var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        config.admin_token = var("ADMIN_TOKEN").filter(|t| !t.is_empty());

        if let Some(val) = var("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        config.llm_api_url = var("LLM_API_URL").filter(|v| !v.is_empty());
        config.llm_api_key = var("LLM_API_KEY").filter(|v| !v.is_empty());

        if let Some(model) = var("LLM_MODEL") {
            config.llm_model = model;
        }

        if let Some(val) = var("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(n) if n > 0.0 => config.rate_limit_per_sec = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Some(val) = var("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n >= 1.0 => config.rate_limit_burst = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    /// Public URL of an uploaded file.
    pub fn file_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.public_base_url, name)
    }
}
