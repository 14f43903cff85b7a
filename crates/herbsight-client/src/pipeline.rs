//! Image intake: upload, identify, normalize, persist.
//!
//! Each step awaits the one before it. A failure aborts the run with
//! [`ClientError::UploadFailed`] or [`ClientError::IdentificationFailed`];
//! an already uploaded file is left in place.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use herbsight_shared::schema::InvokeRequest;
use herbsight_shared::{normalize, CapturedImage, NewScan, Scan};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ClientError;
use crate::http::HttpBackend;
use crate::scan_store::ScanStore;

pub trait Uploader: Send + Sync {
    /// Store the image and return a URL the identifier can fetch.
    fn upload(
        &self,
        image: &CapturedImage,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;
}

pub trait Identifier: Send + Sync {
    fn identify(
        &self,
        request: &InvokeRequest,
    ) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

impl Uploader for HttpBackend {
    async fn upload(&self, image: &CapturedImage) -> Result<String, ClientError> {
        HttpBackend::upload(self, image).await
    }
}

impl Identifier for HttpBackend {
    async fn identify(&self, request: &InvokeRequest) -> Result<Value, ClientError> {
        self.invoke(request).await
    }
}

pub struct IntakePipeline<U, I> {
    uploader: Arc<U>,
    identifier: Arc<I>,
}

impl<U: Uploader, I: Identifier> IntakePipeline<U, I> {
    pub fn new(uploader: Arc<U>, identifier: Arc<I>) -> Self {
        Self {
            uploader,
            identifier,
        }
    }

    /// Turn one image into a saved scan. Store errors are returned as is.
    pub async fn process<S: ScanStore>(
        &self,
        image: CapturedImage,
        store: &S,
    ) -> Result<Scan, ClientError> {
        let file_url = self
            .uploader
            .upload(&image)
            .await
            .map_err(|e| match e {
                ClientError::UploadFailed(_) => e,
                other => ClientError::UploadFailed(other.to_string()),
            })?;
        debug!(file_url = %file_url, "Image uploaded");

        let raw = self
            .identifier
            .identify(&InvokeRequest::identify(file_url.clone()))
            .await
            .map_err(|e| match e {
                ClientError::IdentificationFailed(_) => e,
                other => ClientError::IdentificationFailed(other.to_string()),
            })?;

        let normalized = normalize(&raw)?;

        let new_scan = NewScan {
            image_url: file_url,
            identification: normalized.identification,
            uses: normalized.uses,
            warnings: normalized.warnings,
            is_favorite: false,
            notes: String::new(),
            created_date: Utc::now(),
        };

        let id = store.create(new_scan.clone()).await?;
        info!(
            scan = %id,
            plant = %new_scan.identification.common_name,
            confidence = new_scan.identification.confidence,
            "Scan saved"
        );

        Ok(new_scan.with_id(id))
    }
}

/// Call-site guard allowing one submission at a time. There is no queue:
/// a second attempt while a permit is alive is simply refused.
#[derive(Clone, Default)]
pub struct SubmitGate {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a submission; dropping it re-opens the gate.
pub struct SubmitPermit {
    busy: Arc<AtomicBool>,
}

impl SubmitGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<SubmitPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitPermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SubmitPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
