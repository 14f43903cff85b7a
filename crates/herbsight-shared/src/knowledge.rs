//! Curated plant reference records, maintained by admins and independent of
//! scans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scan::Severity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantCategory {
    #[default]
    Herb,
    Spice,
    Vegetable,
    Fruit,
    MedicinalPlant,
    Flower,
    Other,
}

impl PlantCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Herb => "herb",
            Self::Spice => "spice",
            Self::Vegetable => "vegetable",
            Self::Fruit => "fruit",
            Self::MedicinalPlant => "medicinal_plant",
            Self::Flower => "flower",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "herb" => Some(Self::Herb),
            "spice" => Some(Self::Spice),
            "vegetable" => Some(Self::Vegetable),
            "fruit" => Some(Self::Fruit),
            "medicinal_plant" => Some(Self::MedicinalPlant),
            "flower" => Some(Self::Flower),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeRecipe {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafetyNote {
    pub severity: Severity,
    pub warning: String,
}

/// Editable fields of a knowledge entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KnowledgeDraft {
    pub common_name: String,
    pub scientific_name: String,
    pub alternative_names: Vec<String>,
    pub description: String,
    pub image_url: String,
    pub category: PlantCategory,
    pub edible_uses: Vec<String>,
    pub medicinal_properties: Vec<String>,
    pub recipes: Vec<KnowledgeRecipe>,
    pub safety_warnings: Vec<SafetyNote>,
    pub toxic_lookalikes: Vec<String>,
    pub nutritional_info: String,
    pub growing_info: String,
    pub is_verified: bool,
}

impl KnowledgeDraft {
    /// Field presence check. Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.common_name.trim().is_empty() {
            return Err("common_name");
        }
        if self.scientific_name.trim().is_empty() {
            return Err("scientific_name");
        }
        Ok(())
    }

    pub fn into_entry(self, id: Uuid, created_date: DateTime<Utc>) -> PlantKnowledgeEntry {
        PlantKnowledgeEntry {
            id,
            created_date,
            draft: self,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlantKnowledgeEntry {
    pub id: Uuid,
    pub created_date: DateTime<Utc>,
    #[serde(flatten)]
    pub draft: KnowledgeDraft,
}

impl PlantKnowledgeEntry {
    pub fn matches(&self, filter: &KnowledgeFilter) -> bool {
        if let Some(category) = filter.category {
            if self.draft.category != category {
                return false;
            }
        }
        match filter.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                self.draft.common_name.to_lowercase().contains(&q)
                    || self.draft.scientific_name.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<PlantCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> KnowledgeDraft {
        KnowledgeDraft {
            common_name: "Yarrow".into(),
            scientific_name: "Achillea millefolium".into(),
            category: PlantCategory::MedicinalPlant,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_names() {
        assert!(draft().validate().is_ok());

        let mut d = draft();
        d.common_name = "   ".into();
        assert_eq!(d.validate(), Err("common_name"));

        let mut d = draft();
        d.scientific_name.clear();
        assert_eq!(d.validate(), Err("scientific_name"));
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = draft().into_entry(Uuid::new_v4(), Utc::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["common_name"], "Yarrow");
        assert_eq!(json["category"], "medicinal_plant");
        assert!(json.get("draft").is_none());
    }

    #[test]
    fn test_filter_by_category_and_query() {
        let entry = draft().into_entry(Uuid::new_v4(), Utc::now());

        assert!(entry.matches(&KnowledgeFilter::default()));
        assert!(entry.matches(&KnowledgeFilter {
            category: Some(PlantCategory::MedicinalPlant),
            query: Some("achillea".into()),
        }));
        assert!(!entry.matches(&KnowledgeFilter {
            category: Some(PlantCategory::Spice),
            query: None,
        }));
        assert!(!entry.matches(&KnowledgeFilter {
            category: None,
            query: Some("basil".into()),
        }));
    }
}
