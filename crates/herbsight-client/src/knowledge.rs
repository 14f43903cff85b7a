//! Admin CRUD over the curated plant knowledge base.
//!
//! The role check happens here before any request is made; the server
//! repeats it on every route.

use std::future::Future;
use std::sync::Arc;

use herbsight_shared::{KnowledgeDraft, KnowledgeFilter, PlantKnowledgeEntry};
use tracing::info;
use uuid::Uuid;

use crate::error::ClientError;
use crate::http::HttpBackend;
use crate::session::SessionContext;

pub trait KnowledgeBackend: Send + Sync {
    fn list(
        &self,
        token: &str,
        filter: &KnowledgeFilter,
    ) -> impl Future<Output = Result<Vec<PlantKnowledgeEntry>, ClientError>> + Send;

    fn get(
        &self,
        token: &str,
        id: Uuid,
    ) -> impl Future<Output = Result<PlantKnowledgeEntry, ClientError>> + Send;

    fn create(
        &self,
        token: &str,
        draft: &KnowledgeDraft,
    ) -> impl Future<Output = Result<PlantKnowledgeEntry, ClientError>> + Send;

    fn update(
        &self,
        token: &str,
        id: Uuid,
        draft: &KnowledgeDraft,
    ) -> impl Future<Output = Result<PlantKnowledgeEntry, ClientError>> + Send;

    fn delete(&self, token: &str, id: Uuid) -> impl Future<Output = Result<(), ClientError>> + Send;
}

impl KnowledgeBackend for HttpBackend {
    async fn list(
        &self,
        token: &str,
        filter: &KnowledgeFilter,
    ) -> Result<Vec<PlantKnowledgeEntry>, ClientError> {
        self.list_plants(token, filter).await
    }

    async fn get(&self, token: &str, id: Uuid) -> Result<PlantKnowledgeEntry, ClientError> {
        self.get_plant(token, id).await
    }

    async fn create(
        &self,
        token: &str,
        draft: &KnowledgeDraft,
    ) -> Result<PlantKnowledgeEntry, ClientError> {
        self.create_plant(token, draft).await
    }

    async fn update(
        &self,
        token: &str,
        id: Uuid,
        draft: &KnowledgeDraft,
    ) -> Result<PlantKnowledgeEntry, ClientError> {
        self.update_plant(token, id, draft).await
    }

    async fn delete(&self, token: &str, id: Uuid) -> Result<(), ClientError> {
        self.delete_plant(token, id).await
    }
}

pub struct KnowledgeBase<B = HttpBackend> {
    backend: Arc<B>,
    session: SessionContext,
}

impl<B: KnowledgeBackend> KnowledgeBase<B> {
    pub fn new(backend: Arc<B>, session: SessionContext) -> Self {
        Self { backend, session }
    }

    fn admin_token(&self) -> Result<&str, ClientError> {
        match self.session.token() {
            Some(token) if self.session.is_admin() => Ok(token),
            _ => Err(ClientError::AccessDenied),
        }
    }

    fn validate(draft: &KnowledgeDraft) -> Result<(), ClientError> {
        draft
            .validate()
            .map_err(|field| ClientError::Invalid(format!("{field} is required")))
    }

    /// Entries newest first, narrowed by `filter`.
    pub async fn list(
        &self,
        filter: &KnowledgeFilter,
    ) -> Result<Vec<PlantKnowledgeEntry>, ClientError> {
        let token = self.admin_token()?;
        self.backend.list(token, filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<PlantKnowledgeEntry, ClientError> {
        let token = self.admin_token()?;
        self.backend.get(token, id).await
    }

    pub async fn create(&self, draft: &KnowledgeDraft) -> Result<PlantKnowledgeEntry, ClientError> {
        let token = self.admin_token()?;
        Self::validate(draft)?;
        let entry = self.backend.create(token, draft).await?;
        info!(plant = %entry.id, name = %entry.draft.common_name, "Knowledge entry created");
        Ok(entry)
    }

    pub async fn update(
        &self,
        id: Uuid,
        draft: &KnowledgeDraft,
    ) -> Result<PlantKnowledgeEntry, ClientError> {
        let token = self.admin_token()?;
        Self::validate(draft)?;
        self.backend.update(token, id, draft).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let token = self.admin_token()?;
        self.backend.delete(token, id).await?;
        info!(plant = %id, "Knowledge entry deleted");
        Ok(())
    }
}
