//! Result Normalizer.
//!
//! Turns the raw JSON returned by the identification service into the strict
//! internal shape. Missing names fall back to placeholders, missing or
//! non-array list fields become empty lists and a missing confidence becomes
//! [`DEFAULT_CONFIDENCE`]. Values that are present but of the wrong shape are
//! rejected with a [`SchemaError`] naming the offending path.
//!
//! When the final confidence is below [`LOW_CONFIDENCE_THRESHOLD`] the
//! low-confidence advisory is placed first in the warning list. An advisory
//! already present in the input is moved rather than duplicated, so feeding
//! the output back in yields the same result.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    DEFAULT_CONFIDENCE, LOW_CONFIDENCE_THRESHOLD, UNKNOWN_COMMON_NAME, UNKNOWN_SCIENTIFIC_NAME,
};
use crate::error::SchemaError;
use crate::scan::{Identification, Recipe, UsesBundle, Warning};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalized {
    pub identification: Identification,
    pub uses: UsesBundle,
    pub warnings: Vec<Warning>,
}

impl Normalized {
    /// Re-express the normalized result in the raw response shape.
    pub fn to_raw(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub fn normalize(raw: &Value) -> Result<Normalized, SchemaError> {
    let root = raw
        .as_object()
        .ok_or_else(|| SchemaError::new("$", "expected an object"))?;

    let ident = optional_object(root, "identification")?;
    let uses = optional_object(root, "uses")?;

    let identification = Identification {
        common_name: name_or(
            ident,
            "identification.common_name",
            "common_name",
            UNKNOWN_COMMON_NAME,
        )?,
        scientific_name: name_or(
            ident,
            "identification.scientific_name",
            "scientific_name",
            UNKNOWN_SCIENTIFIC_NAME,
        )?,
        confidence: confidence(ident)?,
        alternative_names: list(ident, "identification.alternative_names", "alternative_names")?,
    };

    let uses = UsesBundle {
        edible: list(uses, "uses.edible", "edible")?,
        medicinal: list(uses, "uses.medicinal", "medicinal")?,
        recipes: list::<Recipe>(uses, "uses.recipes", "recipes")?,
    };

    let mut warnings: Vec<Warning> = list(Some(root), "warnings", "warnings")?;
    if identification.confidence < LOW_CONFIDENCE_THRESHOLD {
        warnings.retain(|w| !w.is_low_confidence_advisory());
        warnings.insert(0, Warning::low_confidence_advisory());
    }

    Ok(Normalized {
        identification,
        uses,
        warnings,
    })
}

fn optional_object<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, SchemaError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(SchemaError::new(key, "expected an object")),
    }
}

fn name_or(
    parent: Option<&Map<String, Value>>,
    path: &str,
    key: &str,
    placeholder: &str,
) -> Result<String, SchemaError> {
    match parent.and_then(|p| p.get(key)) {
        None | Some(Value::Null) => Ok(placeholder.to_string()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(placeholder.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::new(path, "expected a string")),
    }
}

fn confidence(parent: Option<&Map<String, Value>>) -> Result<f64, SchemaError> {
    const PATH: &str = "identification.confidence";
    match parent.and_then(|p| p.get("confidence")) {
        None | Some(Value::Null) => Ok(DEFAULT_CONFIDENCE),
        Some(Value::Number(n)) => {
            let c = n
                .as_f64()
                .ok_or_else(|| SchemaError::new(PATH, "not representable as a float"))?;
            if (0.0..=1.0).contains(&c) {
                Ok(c)
            } else {
                Err(SchemaError::new(PATH, format!("{c} is outside [0, 1]")))
            }
        }
        Some(_) => Err(SchemaError::new(PATH, "expected a number")),
    }
}

/// A missing or non-array field is an empty list; array items must match `T`.
fn list<T: DeserializeOwned>(
    parent: Option<&Map<String, Value>>,
    path: &str,
    key: &str,
) -> Result<Vec<T>, SchemaError> {
    let Some(Value::Array(items)) = parent.and_then(|p| p.get(key)) else {
        return Ok(Vec::new());
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item.clone())
                .map_err(|e| SchemaError::new(format!("{path}[{i}]"), e.to_string()))
        })
        .collect()
}
