use rusqlite::params;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{parse_timestamp, StoredFile};

impl Database {
    pub fn insert_file(&self, file: &StoredFile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO files (name, mime_type, file_size, blake3_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                file.name,
                file.mime_type,
                file.file_size,
                file.blake3_hash,
                file.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_file(&self, name: &str) -> Result<StoredFile> {
        self.conn()
            .query_row(
                "SELECT name, mime_type, file_size, blake3_hash, created_at
                 FROM files
                 WHERE name = ?1",
                params![name],
                row_to_file,
            )
            .map_err(not_found)
    }

    pub fn list_files(&self) -> Result<Vec<StoredFile>> {
        let mut stmt = self.conn().prepare(
            "SELECT name, mime_type, file_size, blake3_hash, created_at
             FROM files
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], row_to_file)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    // only removes the db record, not the file on disk
    pub fn delete_file(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM files WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredFile> {
    let created_str: String = row.get(4)?;

    Ok(StoredFile {
        name: row.get(0)?,
        mime_type: row.get(1)?,
        file_size: row.get(2)?,
        blake3_hash: row.get(3)?,
        created_at: parse_timestamp(4, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;
    use crate::StoreError;
    use chrono::Utc;

    fn file(name: &str) -> StoredFile {
        StoredFile {
            name: name.to_string(),
            mime_type: "image/jpeg".into(),
            file_size: 1234,
            blake3_hash: "ab".repeat(32),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_get_delete() {
        let (db, _dir) = test_db();
        let f = file("0b0f.jpg");

        db.insert_file(&f).unwrap();
        let got = db.get_file("0b0f.jpg").unwrap();
        assert_eq!(got.mime_type, "image/jpeg");
        assert_eq!(got.file_size, 1234);

        assert_eq!(db.list_files().unwrap().len(), 1);
        assert!(db.delete_file("0b0f.jpg").unwrap());
        assert!(matches!(db.get_file("0b0f.jpg"), Err(StoreError::NotFound)));
    }
}
