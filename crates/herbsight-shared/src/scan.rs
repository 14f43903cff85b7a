//! Scan model: one identification result plus the user's annotations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    HIGH_CONFIDENCE_FLOOR, LOW_CONFIDENCE_ADVISORY, MODERATE_CONFIDENCE_FLOOR,
};
use crate::types::ScanId;

// ---------------------------------------------------------------------------
// Identification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identification {
    pub common_name: String,
    pub scientific_name: String,
    /// Always within `[0, 1]` once normalized.
    pub confidence: f64,
    #[serde(default)]
    pub alternative_names: Vec<String>,
}

impl Identification {
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }

    /// Confidence as a whole percentage, the way it is displayed.
    pub fn percentage(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Moderate,
    Low,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE_FLOOR {
            Self::High
        } else if confidence >= MODERATE_CONFIDENCE_FLOOR {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High Confidence",
            Self::Moderate => "Moderate Confidence",
            Self::Low => "Low Confidence",
        }
    }
}

// ---------------------------------------------------------------------------
// Uses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipe {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsesBundle {
    #[serde(default)]
    pub edible: Vec<String>,
    #[serde(default)]
    pub medicinal: Vec<String>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Caution,
    Danger,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Info, Severity::Caution, Severity::Danger];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Caution => "caution",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warning {
    pub severity: Severity,
    pub message: String,
}

impl Warning {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    /// The synthetic warning attached to low-confidence identifications.
    pub fn low_confidence_advisory() -> Self {
        Self::new(Severity::Danger, LOW_CONFIDENCE_ADVISORY)
    }

    pub fn is_low_confidence_advisory(&self) -> bool {
        self.severity == Severity::Danger && self.message == LOW_CONFIDENCE_ADVISORY
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// A scan before a store has assigned it an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewScan {
    pub image_url: String,
    pub identification: Identification,
    #[serde(default)]
    pub uses: UsesBundle,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub notes: String,
    pub created_date: DateTime<Utc>,
}

impl NewScan {
    pub fn with_id(self, id: ScanId) -> Scan {
        Scan {
            id,
            image_url: self.image_url,
            identification: self.identification,
            uses: self.uses,
            warnings: self.warnings,
            is_favorite: self.is_favorite,
            notes: self.notes,
            created_date: self.created_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scan {
    pub id: ScanId,
    pub image_url: String,
    pub identification: Identification,
    #[serde(default)]
    pub uses: UsesBundle,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub notes: String,
    pub created_date: DateTime<Utc>,
}

impl Scan {
    /// Apply the user-mutable fields of a patch. Everything else is fixed at
    /// creation time.
    pub fn apply(&mut self, patch: &ScanPatch) {
        if let Some(is_favorite) = patch.is_favorite {
            self.is_favorite = is_favorite;
        }
        if let Some(ref notes) = patch.notes {
            self.notes = notes.clone();
        }
    }

    pub fn matches(&self, filter: &ScanFilter) -> bool {
        if filter.favorites_only && !self.is_favorite {
            return false;
        }
        match filter.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                self.identification.common_name.to_lowercase().contains(&q)
                    || self.identification.scientific_name.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }
}

/// Partial update of a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ScanPatch {
    pub fn favorite(is_favorite: bool) -> Self {
        Self {
            is_favorite: Some(is_favorite),
            notes: None,
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            is_favorite: None,
            notes: Some(notes.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanFilter {
    #[serde(default)]
    pub favorites_only: bool,
    #[serde(default)]
    pub query: Option<String>,
}

/// Newest `created_date` first.
pub fn sort_newest_first(scans: &mut [Scan]) {
    scans.sort_by(|a, b| b.created_date.cmp(&a.created_date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scan(name: &str, scientific: &str) -> Scan {
        NewScan {
            image_url: "http://localhost/files/a.jpg".into(),
            identification: Identification {
                common_name: name.into(),
                scientific_name: scientific.into(),
                confidence: 0.9,
                alternative_names: vec![],
            },
            uses: UsesBundle::default(),
            warnings: vec![],
            is_favorite: false,
            notes: String::new(),
            created_date: Utc::now(),
        }
        .with_id(ScanId::new_local())
    }

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(ConfidenceTier::from_confidence(0.95), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_confidence(0.8), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_confidence(0.65), ConfidenceTier::Moderate);
        assert_eq!(ConfidenceTier::from_confidence(0.42), ConfidenceTier::Low);
    }

    #[test]
    fn test_percentage_rounds() {
        let s = scan("Basil", "Ocimum basilicum");
        let mut ident = s.identification;
        ident.confidence = 0.426;
        assert_eq!(ident.percentage(), 43);
    }

    #[test]
    fn test_apply_patch_only_touches_mutable_fields() {
        let mut s = scan("Basil", "Ocimum basilicum");
        let before = s.clone();

        s.apply(&ScanPatch::notes("grows on the balcony"));
        assert_eq!(s.notes, "grows on the balcony");
        assert_eq!(s.is_favorite, before.is_favorite);
        assert_eq!(s.identification, before.identification);

        s.apply(&ScanPatch::favorite(true));
        assert!(s.is_favorite);
        assert_eq!(s.notes, "grows on the balcony");
    }

    #[test]
    fn test_filter_matches_names_case_insensitively() {
        let s = scan("Basil", "Ocimum basilicum");

        let by_common = ScanFilter {
            favorites_only: false,
            query: Some("bAs".into()),
        };
        let by_scientific = ScanFilter {
            favorites_only: false,
            query: Some("ocimum".into()),
        };
        let miss = ScanFilter {
            favorites_only: false,
            query: Some("mint".into()),
        };
        let favorites = ScanFilter {
            favorites_only: true,
            query: None,
        };

        assert!(s.matches(&by_common));
        assert!(s.matches(&by_scientific));
        assert!(!s.matches(&miss));
        assert!(!s.matches(&favorites));
        assert!(s.matches(&ScanFilter::default()));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut older = scan("Mint", "Mentha");
        older.created_date = Utc::now() - Duration::hours(1);
        let newer = scan("Basil", "Ocimum basilicum");

        let mut scans = vec![older.clone(), newer.clone()];
        sort_newest_first(&mut scans);
        assert_eq!(scans[0].id, newer.id);
        assert_eq!(scans[1].id, older.id);
    }
}
