//! Hosted scan collection. Every row belongs to exactly one owner and every
//! query is scoped to that owner; a row owned by someone else reads as
//! [`StoreError::NotFound`](crate::StoreError::NotFound).

use herbsight_shared::{Scan, ScanId, UserId};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{conversion_error, parse_json, parse_timestamp};

const SCAN_COLUMNS: &str =
    "id, image_url, identification, uses, warnings, is_favorite, notes, created_date";

impl Database {
    pub fn insert_scan(&self, owner: UserId, scan: &Scan) -> Result<()> {
        self.conn().execute(
            "INSERT INTO scans (id, owner_id, image_url, identification, uses, warnings,
                                is_favorite, notes, created_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                scan.id.uuid().to_string(),
                owner.to_string(),
                scan.image_url,
                serde_json::to_string(&scan.identification)?,
                serde_json::to_string(&scan.uses)?,
                serde_json::to_string(&scan.warnings)?,
                scan.is_favorite as i32,
                scan.notes,
                scan.created_date.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_scan(&self, owner: UserId, id: Uuid) -> Result<Scan> {
        self.conn()
            .query_row(
                &format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = ?1 AND owner_id = ?2"),
                params![id.to_string(), owner.to_string()],
                row_to_scan,
            )
            .map_err(not_found)
    }

    /// All scans of one owner, newest first.
    pub fn list_scans(&self, owner: UserId) -> Result<Vec<Scan>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans
             WHERE owner_id = ?1
             ORDER BY created_date DESC"
        ))?;

        let rows = stmt.query_map(params![owner.to_string()], row_to_scan)?;

        let mut scans = Vec::new();
        for row in rows {
            scans.push(row?);
        }
        Ok(scans)
    }

    /// Persist the user-mutable fields of a scan. Returns `false` when the
    /// owner has no such scan.
    pub fn update_scan(&self, owner: UserId, scan: &Scan) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE scans SET is_favorite = ?1, notes = ?2
             WHERE id = ?3 AND owner_id = ?4",
            params![
                scan.is_favorite as i32,
                scan.notes,
                scan.id.uuid().to_string(),
                owner.to_string(),
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_scan(&self, owner: UserId, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM scans WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_scan(row: &rusqlite::Row<'_>) -> rusqlite::Result<Scan> {
    let id_str: String = row.get(0)?;
    let identification: String = row.get(2)?;
    let uses: String = row.get(3)?;
    let warnings: String = row.get(4)?;
    let is_favorite_int: i32 = row.get(5)?;
    let created_str: String = row.get(7)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;

    Ok(Scan {
        id: ScanId::Remote(id),
        image_url: row.get(1)?,
        identification: parse_json(2, &identification)?,
        uses: parse_json(3, &uses)?,
        warnings: parse_json(4, &warnings)?,
        is_favorite: is_favorite_int != 0,
        notes: row.get(6)?,
        created_date: parse_timestamp(7, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;
    use crate::StoreError;
    use chrono::{Duration, Utc};
    use herbsight_shared::{Identification, NewScan, UsesBundle, Warning};

    fn scan(name: &str, age_minutes: i64) -> Scan {
        NewScan {
            image_url: format!("http://localhost:8080/files/{name}.jpg"),
            identification: Identification {
                common_name: name.to_string(),
                scientific_name: "Ocimum basilicum".into(),
                confidence: 0.42,
                alternative_names: vec!["Sweet basil".into()],
            },
            uses: UsesBundle {
                edible: vec!["Pesto".into()],
                ..Default::default()
            },
            warnings: vec![Warning::low_confidence_advisory()],
            is_favorite: false,
            notes: String::new(),
            created_date: Utc::now() - Duration::minutes(age_minutes),
        }
        .with_id(ScanId::new_remote())
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (db, _dir) = test_db();
        let owner = UserId::new();
        let s = scan("Basil", 0);

        db.insert_scan(owner, &s).unwrap();
        assert_eq!(db.get_scan(owner, s.id.uuid()).unwrap(), s);
    }

    #[test]
    fn scans_are_scoped_to_owner() {
        let (db, _dir) = test_db();
        let owner = UserId::new();
        let stranger = UserId::new();
        let s = scan("Basil", 0);
        db.insert_scan(owner, &s).unwrap();

        assert!(matches!(
            db.get_scan(stranger, s.id.uuid()),
            Err(StoreError::NotFound)
        ));
        assert!(db.list_scans(stranger).unwrap().is_empty());
        assert!(!db.delete_scan(stranger, s.id.uuid()).unwrap());
        assert!(!db.update_scan(stranger, &s).unwrap());
    }

    #[test]
    fn list_newest_first() {
        let (db, _dir) = test_db();
        let owner = UserId::new();
        let old = scan("Mint", 30);
        let new = scan("Basil", 1);
        db.insert_scan(owner, &old).unwrap();
        db.insert_scan(owner, &new).unwrap();

        let listed = db.list_scans(owner).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, new.id);
        assert_eq!(listed[1].id, old.id);
    }

    #[test]
    fn update_only_touches_mutable_fields() {
        let (db, _dir) = test_db();
        let owner = UserId::new();
        let mut s = scan("Basil", 0);
        db.insert_scan(owner, &s).unwrap();

        s.is_favorite = true;
        s.notes = "from the market".into();
        s.image_url = "ignored".into();
        assert!(db.update_scan(owner, &s).unwrap());

        let got = db.get_scan(owner, s.id.uuid()).unwrap();
        assert!(got.is_favorite);
        assert_eq!(got.notes, "from the market");
        assert_ne!(got.image_url, "ignored");
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let (db, _dir) = test_db();
        let owner = UserId::new();
        let s = scan("Basil", 0);
        db.insert_scan(owner, &s).unwrap();

        assert!(db.delete_scan(owner, s.id.uuid()).unwrap());
        assert!(matches!(
            db.get_scan(owner, s.id.uuid()),
            Err(StoreError::NotFound)
        ));
    }
}
