//! Client settings persisted in the local database, so a session survives
//! restarts.

use herbsight_store::{Database, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const SETTINGS_KEY: &str = "herbsight_settings";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl ClientSettings {
    /// Missing or unreadable settings fall back to defaults.
    pub fn load(db: &Database) -> Result<Self, StoreError> {
        let Some(json) = db.get_item(SETTINGS_KEY)? else {
            return Ok(Self::default());
        };

        match serde_json::from_str(&json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(error = %e, "Corrupt settings JSON, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, db: &Database) -> Result<(), StoreError> {
        db.set_item(SETTINGS_KEY, &serde_json::to_string(self)?)?;
        info!("Settings updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("client.db")).unwrap();
        (db, dir)
    }

    #[test]
    fn test_defaults_then_round_trip() {
        let (db, _dir) = db();
        assert_eq!(ClientSettings::load(&db).unwrap(), ClientSettings::default());

        let settings = ClientSettings {
            server_url: Some("https://herbs.example.org".into()),
            session_token: Some("abc".into()),
        };
        settings.save(&db).unwrap();
        assert_eq!(ClientSettings::load(&db).unwrap(), settings);
    }

    #[test]
    fn test_corrupt_settings_fall_back() {
        let (db, _dir) = db();
        db.set_item(SETTINGS_KEY, "not json").unwrap();
        assert_eq!(ClientSettings::load(&db).unwrap(), ClientSettings::default());
    }
}
