//! Wire contract with the identification service.
//!
//! The prompt and the response schema are fixed; the service is asked to
//! answer with a JSON object matching [`identification_schema`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const IDENTIFY_PROMPT: &str = "You are an expert botanist and herbalist. Analyze this plant/herb/ingredient image and provide detailed information.

IMPORTANT: Return a valid JSON object with the exact structure specified. All arrays must be arrays, even if empty.

Provide:
1. Identification with common name, scientific name, confidence (0.0-1.0), and alternative names
2. Edible uses as an array of strings
3. Medicinal uses as an array of strings
4. 2-3 simple recipes with name, description, and instructions
5. Safety warnings as an array of objects with severity and message

If confidence is below 70%, emphasize the need for expert verification in the warnings.";

/// Body of an identification request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeRequest {
    pub prompt: String,
    pub file_urls: Vec<String>,
    pub response_json_schema: Value,
}

impl InvokeRequest {
    /// The fixed identification request for one uploaded image.
    pub fn identify(file_url: impl Into<String>) -> Self {
        Self {
            prompt: IDENTIFY_PROMPT.to_string(),
            file_urls: vec![file_url.into()],
            response_json_schema: identification_schema(),
        }
    }
}

pub fn identification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "identification": {
                "type": "object",
                "properties": {
                    "common_name": { "type": "string" },
                    "scientific_name": { "type": "string" },
                    "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                    "alternative_names": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["common_name", "scientific_name", "confidence"]
            },
            "uses": {
                "type": "object",
                "properties": {
                    "edible": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "medicinal": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "recipes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "description": { "type": "string" },
                                "instructions": { "type": "string" }
                            },
                            "required": ["name", "description"]
                        }
                    }
                },
                "required": ["edible", "medicinal", "recipes"]
            },
            "warnings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "severity": {
                            "type": "string",
                            "enum": ["info", "caution", "danger"]
                        },
                        "message": { "type": "string" }
                    },
                    "required": ["severity", "message"]
                }
            }
        },
        "required": ["identification", "uses", "warnings"]
    })
}
