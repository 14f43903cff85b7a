use thiserror::Error;

/// A raw identification response that does not fit the wire schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Schema violation at `{path}`: {reason}")]
pub struct SchemaError {
    pub path: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A string that is neither a remote nor a local scan id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid scan id: {0}")]
pub struct IdError(pub String);
