//! Bearer sessions, looked up by the hash of the presented token.

use herbsight_shared::{Role, SessionUser, UserId};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{conversion_error, parse_timestamp, SessionRecord};

impl Database {
    pub fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (token_hash, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token_hash,
                session.user.id.to_string(),
                session.user.role.as_str(),
                session.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_session(&self, token_hash: &str) -> Result<SessionRecord> {
        self.conn()
            .query_row(
                "SELECT token_hash, user_id, role, created_at
                 FROM sessions
                 WHERE token_hash = ?1",
                params![token_hash],
                row_to_session,
            )
            .map_err(not_found)
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let user_str: String = row.get(1)?;
    let role_str: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    let id = Uuid::parse_str(&user_str).map_err(|e| conversion_error(1, e))?;
    // unknown roles never gain privileges
    let role = Role::parse(&role_str).unwrap_or_default();

    Ok(SessionRecord {
        token_hash: row.get(0)?,
        user: SessionUser {
            id: UserId(id),
            role,
        },
        created_at: parse_timestamp(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;
    use crate::StoreError;
    use chrono::Utc;

    #[test]
    fn insert_find_delete() {
        let (db, _dir) = test_db();
        let record = SessionRecord {
            token_hash: "cd".repeat(32),
            user: SessionUser {
                id: UserId::new(),
                role: Role::User,
            },
            created_at: Utc::now(),
        };

        db.insert_session(&record).unwrap();
        let found = db.find_session(&record.token_hash).unwrap();
        assert_eq!(found.user, record.user);

        assert!(db.delete_session(&record.token_hash).unwrap());
        assert!(matches!(
            db.find_session(&record.token_hash),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn unknown_role_reads_as_user() {
        let (db, _dir) = test_db();
        db.conn()
            .execute(
                "INSERT INTO sessions (token_hash, user_id, role, created_at)
                 VALUES ('t', ?1, 'root', ?2)",
                params![Uuid::new_v4().to_string(), Utc::now().to_rfc3339()],
            )
            .unwrap();

        let found = db.find_session("t").unwrap();
        assert_eq!(found.user.role, Role::User);
    }
}
