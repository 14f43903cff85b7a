use std::path::PathBuf;

use herbsight_shared::constants::DEFAULT_HTTP_PORT;

/// Where the client talks to and where it keeps its local database.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the HerbSight server, without a trailing slash.
    pub server_url: String,
    /// Bearer token of an existing session. `None` means anonymous use
    /// unless a token was saved by an earlier sign-up.
    pub session_token: Option<String>,
    /// Directory holding `herbsight.db`.
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let data_dir = herbsight_store::default_data_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self {
            server_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            session_token: None,
            data_dir,
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("herbsight.db")
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("session_token", &self.session_token.as_ref().map(|_| "<set>"))
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("https://herbs.example.org/")
            .with_session_token("tok")
            .with_data_dir("/tmp/herbsight");

        assert_eq!(config.server_url, "https://herbs.example.org");
        assert_eq!(config.session_token.as_deref(), Some("tok"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/herbsight/herbsight.db")
        );
        assert!(format!("{config:?}").contains("<set>"));
    }

    #[test]
    fn test_default_uses_store_data_dir() {
        let config = ClientConfig::default();
        let expected = herbsight_store::default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
        assert_eq!(config.data_dir, expected);
        assert!(config.database_path().ends_with("herbsight.db"));
        assert_eq!(config.session_token, None);
    }
}
