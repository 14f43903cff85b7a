use herbsight_media::CaptureError;
use herbsight_shared::SchemaError;
use herbsight_store::StoreError;
use thiserror::Error;

/// Errors surfaced by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Identification failed: {0}")]
    IdentificationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The session lacks the role the operation needs.
    #[error("Access denied")]
    AccessDenied,

    /// No session, or the server rejected the token.
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Another submission holds the gate.
    #[error("A submission is already in progress")]
    Busy,

    #[error("Server error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not an image: {0}")]
    Image(String),

    #[error("Camera error: {0}")]
    Capture(#[from] CaptureError),
}

impl From<SchemaError> for ClientError {
    fn from(e: SchemaError) -> Self {
        ClientError::IdentificationFailed(e.to_string())
    }
}

/// How a front end should react to an error. Nothing is retried
/// automatically and nothing is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the current view and show the message next to it.
    ShowInline(String),
    /// Abandon the running action and tell the user.
    Abort(String),
    /// The record is gone; return to the list.
    BackToList(String),
    /// Leave the restricted area.
    RedirectHome,
}

impl ClientError {
    pub fn disposition(&self) -> Disposition {
        match self {
            ClientError::Capture(e) => Disposition::ShowInline(e.user_message().to_string()),
            ClientError::Image(_) | ClientError::Invalid(_) | ClientError::Busy => {
                Disposition::ShowInline(self.to_string())
            }
            ClientError::UploadFailed(_)
            | ClientError::IdentificationFailed(_)
            | ClientError::Remote { .. }
            | ClientError::Network(_)
            | ClientError::Store(_) => {
                Disposition::Abort("Failed to process image. Please try again.".to_string())
            }
            ClientError::NotFound(_) => Disposition::BackToList(self.to_string()),
            ClientError::AccessDenied | ClientError::Unauthenticated => Disposition::RedirectHome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispositions() {
        assert_eq!(
            ClientError::Capture(CaptureError::PermissionDenied).disposition(),
            Disposition::ShowInline(CaptureError::PermissionDenied.user_message().to_string())
        );
        assert!(matches!(
            ClientError::UploadFailed("timeout".into()).disposition(),
            Disposition::Abort(_)
        ));
        assert!(matches!(
            ClientError::from(SchemaError::new("identification.confidence", "out of range"))
                .disposition(),
            Disposition::Abort(_)
        ));
        assert!(matches!(
            ClientError::NotFound("temp-x".into()).disposition(),
            Disposition::BackToList(_)
        ));
        assert_eq!(ClientError::AccessDenied.disposition(), Disposition::RedirectHome);
    }

    #[test]
    fn test_schema_error_becomes_identification_failure() {
        let err = ClientError::from(SchemaError::new("warnings[0].severity", "unknown variant"));
        match err {
            ClientError::IdentificationFailed(msg) => assert!(msg.contains("warnings[0].severity")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
