//! Scan persistence.
//!
//! Two backends share the [`ScanStore`] trait: [`RemoteScanStore`] (the
//! hosted collection, requires a session) and [`LocalScanStore`] (one JSON
//! list in the local key/value table). [`ScanRepository`] picks the backend
//! for new scans from the session and routes every other call by the id's
//! namespace.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use herbsight_shared::constants::LOCAL_SCANS_KEY;
use herbsight_shared::scan::sort_newest_first;
use herbsight_shared::{NewScan, Scan, ScanFilter, ScanId, ScanPatch};
use herbsight_store::{Database, StoreError};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::http::HttpBackend;

pub trait ScanStore: Send + Sync {
    fn create(&self, new: NewScan) -> impl Future<Output = Result<ScanId, ClientError>> + Send;

    fn get(&self, id: &ScanId) -> impl Future<Output = Result<Scan, ClientError>> + Send;

    /// Read-modify-write of the mutable fields; last writer wins.
    fn update(
        &self,
        id: &ScanId,
        patch: &ScanPatch,
    ) -> impl Future<Output = Result<Scan, ClientError>> + Send;

    fn delete(&self, id: &ScanId) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Newest `created_date` first.
    fn list(&self) -> impl Future<Output = Result<Vec<Scan>, ClientError>> + Send;

    fn search(
        &self,
        filter: &ScanFilter,
    ) -> impl Future<Output = Result<Vec<Scan>, ClientError>> + Send {
        async move {
            let mut scans = self.list().await?;
            scans.retain(|s| s.matches(filter));
            Ok(scans)
        }
    }

    fn toggle_favorite(
        &self,
        id: &ScanId,
    ) -> impl Future<Output = Result<Scan, ClientError>> + Send {
        async move {
            let current = self.get(id).await?;
            self.update(id, &ScanPatch::favorite(!current.is_favorite))
                .await
        }
    }
}

fn not_found(id: &ScanId) -> ClientError {
    ClientError::NotFound(format!("scan {id}"))
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Anonymous fallback. Every mutation rewrites the whole list.
#[derive(Clone)]
pub struct LocalScanStore {
    db: Arc<Mutex<Database>>,
}

impl LocalScanStore {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// An unreadable list counts as empty; the next write replaces it.
    fn read(db: &Database) -> Result<Vec<Scan>, ClientError> {
        let Some(json) = db.get_item(LOCAL_SCANS_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&json) {
            Ok(scans) => Ok(scans),
            Err(e) => {
                warn!(error = %e, stored = %json, "Corrupt local scan list, starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn write(db: &Database, scans: &[Scan]) -> Result<(), ClientError> {
        let json = serde_json::to_string(scans).map_err(StoreError::from)?;
        db.set_item(LOCAL_SCANS_KEY, &json)?;
        Ok(())
    }

    /// Read, edit and write back under one lock.
    fn modify<T>(
        &self,
        edit: impl FnOnce(&mut Vec<Scan>) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let db = self.lock();
        let mut scans = Self::read(&db)?;
        let out = edit(&mut scans)?;
        Self::write(&db, &scans)?;
        Ok(out)
    }
}

impl ScanStore for LocalScanStore {
    async fn create(&self, new: NewScan) -> Result<ScanId, ClientError> {
        let id = ScanId::new_local();
        self.modify(|scans| {
            scans.insert(0, new.with_id(id));
            Ok(())
        })?;
        debug!(scan = %id, "Scan saved locally");
        Ok(id)
    }

    async fn get(&self, id: &ScanId) -> Result<Scan, ClientError> {
        let db = self.lock();
        Self::read(&db)?
            .into_iter()
            .find(|s| s.id == *id)
            .ok_or_else(|| not_found(id))
    }

    async fn update(&self, id: &ScanId, patch: &ScanPatch) -> Result<Scan, ClientError> {
        self.modify(|scans| {
            let scan = scans
                .iter_mut()
                .find(|s| s.id == *id)
                .ok_or_else(|| not_found(id))?;
            scan.apply(patch);
            Ok(scan.clone())
        })
    }

    async fn delete(&self, id: &ScanId) -> Result<(), ClientError> {
        self.modify(|scans| {
            let before = scans.len();
            scans.retain(|s| s.id != *id);
            if scans.len() == before {
                return Err(not_found(id));
            }
            Ok(())
        })
    }

    async fn list(&self) -> Result<Vec<Scan>, ClientError> {
        let db = self.lock();
        let mut scans = Self::read(&db)?;
        sort_newest_first(&mut scans);
        Ok(scans)
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// The hosted collection, scoped to the session's user.
pub struct RemoteScanStore {
    api: Arc<HttpBackend>,
    token: String,
}

impl RemoteScanStore {
    pub fn new(api: Arc<HttpBackend>, token: impl Into<String>) -> Self {
        Self {
            api,
            token: token.into(),
        }
    }
}

impl ScanStore for RemoteScanStore {
    async fn create(&self, new: NewScan) -> Result<ScanId, ClientError> {
        let scan = self.api.create_scan(&self.token, &new).await?;
        Ok(scan.id)
    }

    async fn get(&self, id: &ScanId) -> Result<Scan, ClientError> {
        if id.is_local() {
            return Err(not_found(id));
        }
        self.api.get_scan(&self.token, id.uuid()).await
    }

    async fn update(&self, id: &ScanId, patch: &ScanPatch) -> Result<Scan, ClientError> {
        if id.is_local() {
            return Err(not_found(id));
        }
        self.api.patch_scan(&self.token, id.uuid(), patch).await
    }

    async fn delete(&self, id: &ScanId) -> Result<(), ClientError> {
        if id.is_local() {
            return Err(not_found(id));
        }
        self.api.delete_scan(&self.token, id.uuid()).await
    }

    async fn list(&self) -> Result<Vec<Scan>, ClientError> {
        let mut scans = self.api.list_scans(&self.token).await?;
        sort_newest_first(&mut scans);
        Ok(scans)
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// `remote` is present exactly when the caller has a session. Remote
/// failures are returned to the caller, never retried against the local
/// store.
pub struct ScanRepository<R = RemoteScanStore, L = LocalScanStore> {
    local: L,
    remote: Option<R>,
}

impl<R: ScanStore, L: ScanStore> ScanRepository<R, L> {
    pub fn new(local: L, remote: Option<R>) -> Self {
        Self { local, remote }
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn remote_for(&self, id: &ScanId) -> Result<&R, ClientError> {
        match self.remote {
            Some(ref remote) => Ok(remote),
            None => {
                debug!(scan = %id, "Remote scan requested without a session");
                Err(ClientError::Unauthenticated)
            }
        }
    }
}

impl<R: ScanStore, L: ScanStore> ScanStore for ScanRepository<R, L> {
    async fn create(&self, new: NewScan) -> Result<ScanId, ClientError> {
        match self.remote {
            Some(ref remote) => remote.create(new).await,
            None => {
                info!("No session, saving scan locally");
                self.local.create(new).await
            }
        }
    }

    async fn get(&self, id: &ScanId) -> Result<Scan, ClientError> {
        if id.is_local() {
            self.local.get(id).await
        } else {
            self.remote_for(id)?.get(id).await
        }
    }

    async fn update(&self, id: &ScanId, patch: &ScanPatch) -> Result<Scan, ClientError> {
        if id.is_local() {
            self.local.update(id, patch).await
        } else {
            self.remote_for(id)?.update(id, patch).await
        }
    }

    async fn delete(&self, id: &ScanId) -> Result<(), ClientError> {
        if id.is_local() {
            self.local.delete(id).await
        } else {
            self.remote_for(id)?.delete(id).await
        }
    }

    /// Local scans merged with the session's remote scans.
    async fn list(&self) -> Result<Vec<Scan>, ClientError> {
        let mut scans = self.local.list().await?;
        if let Some(ref remote) = self.remote {
            scans.extend(remote.list().await?);
        }
        sort_newest_first(&mut scans);
        Ok(scans)
    }
}
