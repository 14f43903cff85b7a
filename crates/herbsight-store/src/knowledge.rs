//! Plant knowledge base. The editable fields are stored as one JSON document;
//! the category is duplicated into its own column for filtering.

use chrono::{DateTime, Utc};
use herbsight_shared::{KnowledgeDraft, KnowledgeFilter, PlantKnowledgeEntry};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::{conversion_error, parse_json, parse_timestamp};

impl Database {
    pub fn insert_plant(&self, entry: &PlantKnowledgeEntry) -> Result<()> {
        self.conn().execute(
            "INSERT INTO plant_knowledge (id, category, data, created_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.id.to_string(),
                entry.draft.category.as_str(),
                serde_json::to_string(&entry.draft)?,
                entry.created_date.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_plant(&self, id: Uuid) -> Result<PlantKnowledgeEntry> {
        self.conn()
            .query_row(
                "SELECT id, data, created_date FROM plant_knowledge WHERE id = ?1",
                params![id.to_string()],
                row_to_plant,
            )
            .map_err(not_found)
    }

    /// Entries matching `filter`, newest first. The category narrows the
    /// query in SQL; the text query is matched on the decoded names.
    pub fn list_plants(&self, filter: &KnowledgeFilter) -> Result<Vec<PlantKnowledgeEntry>> {
        let mut plants = Vec::new();

        match filter.category {
            Some(category) => {
                let mut stmt = self.conn().prepare(
                    "SELECT id, data, created_date FROM plant_knowledge
                     WHERE category = ?1
                     ORDER BY created_date DESC",
                )?;
                let rows = stmt.query_map(params![category.as_str()], row_to_plant)?;
                for row in rows {
                    plants.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn().prepare(
                    "SELECT id, data, created_date FROM plant_knowledge
                     ORDER BY created_date DESC",
                )?;
                let rows = stmt.query_map([], row_to_plant)?;
                for row in rows {
                    plants.push(row?);
                }
            }
        }

        plants.retain(|p| p.matches(filter));
        Ok(plants)
    }

    /// Replace the editable fields of an entry. Returns `false` if it does
    /// not exist.
    pub fn update_plant(&self, id: Uuid, draft: &KnowledgeDraft) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE plant_knowledge SET category = ?1, data = ?2 WHERE id = ?3",
            params![
                draft.category.as_str(),
                serde_json::to_string(draft)?,
                id.to_string(),
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_plant(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM plant_knowledge WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_plant(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlantKnowledgeEntry> {
    let id_str: String = row.get(0)?;
    let data: String = row.get(1)?;
    let created_str: String = row.get(2)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;
    let draft: KnowledgeDraft = parse_json(1, &data)?;
    let created_date: DateTime<Utc> = parse_timestamp(2, &created_str)?;

    Ok(draft.into_entry(id, created_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;
    use crate::StoreError;
    use chrono::Duration;
    use herbsight_shared::PlantCategory;

    fn entry(common: &str, scientific: &str, category: PlantCategory, age: i64) -> PlantKnowledgeEntry {
        KnowledgeDraft {
            common_name: common.into(),
            scientific_name: scientific.into(),
            category,
            edible_uses: vec!["Tea".into()],
            ..Default::default()
        }
        .into_entry(Uuid::new_v4(), Utc::now() - Duration::minutes(age))
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (db, _dir) = test_db();
        let e = entry("Yarrow", "Achillea millefolium", PlantCategory::MedicinalPlant, 0);

        db.insert_plant(&e).unwrap();
        assert_eq!(db.get_plant(e.id).unwrap(), e);
    }

    #[test]
    fn list_filters_by_category_and_query() {
        let (db, _dir) = test_db();
        let yarrow = entry("Yarrow", "Achillea millefolium", PlantCategory::MedicinalPlant, 5);
        let basil = entry("Basil", "Ocimum basilicum", PlantCategory::Herb, 1);
        let thyme = entry("Thyme", "Thymus vulgaris", PlantCategory::Herb, 3);
        for e in [&yarrow, &basil, &thyme] {
            db.insert_plant(e).unwrap();
        }

        let all = db.list_plants(&KnowledgeFilter::default()).unwrap();
        let names: Vec<_> = all.iter().map(|p| p.draft.common_name.as_str()).collect();
        assert_eq!(names, ["Basil", "Thyme", "Yarrow"]);

        let herbs = db
            .list_plants(&KnowledgeFilter {
                category: Some(PlantCategory::Herb),
                query: None,
            })
            .unwrap();
        assert_eq!(herbs.len(), 2);

        let thymus = db
            .list_plants(&KnowledgeFilter {
                category: Some(PlantCategory::Herb),
                query: Some("THYMUS".into()),
            })
            .unwrap();
        assert_eq!(thymus.len(), 1);
        assert_eq!(thymus[0].id, thyme.id);
    }

    #[test]
    fn update_moves_category() {
        let (db, _dir) = test_db();
        let e = entry("Saffron", "Crocus sativus", PlantCategory::Flower, 0);
        db.insert_plant(&e).unwrap();

        let mut draft = e.draft.clone();
        draft.category = PlantCategory::Spice;
        draft.is_verified = true;
        assert!(db.update_plant(e.id, &draft).unwrap());

        let got = db.get_plant(e.id).unwrap();
        assert_eq!(got.draft.category, PlantCategory::Spice);
        assert!(got.draft.is_verified);
        assert_eq!(got.created_date, e.created_date);

        let spices = db
            .list_plants(&KnowledgeFilter {
                category: Some(PlantCategory::Spice),
                query: None,
            })
            .unwrap();
        assert_eq!(spices.len(), 1);
    }

    #[test]
    fn update_or_delete_missing_reports_false() {
        let (db, _dir) = test_db();
        let missing = Uuid::new_v4();

        assert!(!db.update_plant(missing, &KnowledgeDraft::default()).unwrap());
        assert!(!db.delete_plant(missing).unwrap());
        assert!(matches!(db.get_plant(missing), Err(StoreError::NotFound)));
    }
}
