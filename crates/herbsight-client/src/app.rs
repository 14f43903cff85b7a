//! Top-level client handle.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use herbsight_media::{CameraDevice, CaptureProvider};
use herbsight_shared::{CapturedImage, Scan, SessionUser};
use herbsight_store::Database;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::HttpBackend;
use crate::knowledge::KnowledgeBase;
use crate::pipeline::{IntakePipeline, SubmitGate};
use crate::scan_store::{LocalScanStore, RemoteScanStore, ScanRepository};
use crate::session::SessionContext;
use crate::settings::ClientSettings;

/// Owns the local database, the server connection and the resolved
/// session. Components handed out by this type see the session as it was
/// when they were created.
pub struct HerbSight {
    config: ClientConfig,
    http: Arc<HttpBackend>,
    db: Arc<Mutex<Database>>,
    session: SessionContext,
    gate: SubmitGate,
}

impl HerbSight {
    /// Open the local database and resolve the session against the server.
    ///
    /// A token the server rejects is dropped and the client continues
    /// anonymously. An unreachable server is an error when a token is
    /// configured, since the session cannot be confirmed.
    pub async fn open(config: ClientConfig) -> Result<Self, ClientError> {
        let db = Database::open_at(&config.database_path())?;
        let settings = ClientSettings::load(&db)?;

        let mut config = config;
        // a saved token only belongs to the server that issued it
        if config.session_token.is_none()
            && settings.server_url.as_deref() == Some(config.server_url.as_str())
        {
            config.session_token = settings.session_token.clone();
        }

        let http = Arc::new(HttpBackend::new(&config.server_url)?);

        let session = match config.session_token.as_deref() {
            None => SessionContext::anonymous(),
            Some(token) => match http.me(token).await {
                Ok(user) => {
                    info!(user = %user.id, role = user.role.as_str(), "Session resolved");
                    SessionContext::authenticated(token, user)
                }
                Err(ClientError::Unauthenticated) => {
                    warn!("Session token rejected, continuing anonymously");
                    if settings.session_token.as_deref() == Some(token) {
                        ClientSettings {
                            session_token: None,
                            ..settings
                        }
                        .save(&db)?;
                    }
                    SessionContext::anonymous()
                }
                Err(e) => return Err(e),
            },
        };

        Ok(Self {
            config,
            http,
            db: Arc::new(Mutex::new(db)),
            session,
            gate: SubmitGate::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn http(&self) -> &Arc<HttpBackend> {
        &self.http
    }

    fn save_settings(&self, session_token: Option<String>) -> Result<(), ClientError> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        ClientSettings {
            server_url: Some(self.config.server_url.clone()),
            session_token,
        }
        .save(&db)?;
        Ok(())
    }

    /// Register a new account on the server and keep its token.
    pub async fn sign_up(&mut self) -> Result<SessionUser, ClientError> {
        let registration = self.http.register().await?;
        self.save_settings(Some(registration.token.clone()))?;
        self.config.session_token = Some(registration.token.clone());
        self.session = SessionContext::authenticated(registration.token, registration.user.clone());
        info!(user = %registration.user.id, "Signed up");
        Ok(registration.user)
    }

    pub fn sign_out(&mut self) -> Result<(), ClientError> {
        self.save_settings(None)?;
        self.config.session_token = None;
        self.session = SessionContext::anonymous();
        info!("Signed out");
        Ok(())
    }

    /// The scan collection: hosted when signed in, local otherwise. Local
    /// scans stay listed after signing in.
    pub fn scans(&self) -> ScanRepository {
        let local = LocalScanStore::new(self.db.clone());
        let remote = self
            .session
            .token()
            .map(|token| RemoteScanStore::new(self.http.clone(), token));
        ScanRepository::new(local, remote)
    }

    pub fn knowledge(&self) -> KnowledgeBase {
        KnowledgeBase::new(self.http.clone(), self.session.clone())
    }

    pub fn pipeline(&self) -> IntakePipeline<HttpBackend, HttpBackend> {
        IntakePipeline::new(self.http.clone(), self.http.clone())
    }

    pub fn submit_gate(&self) -> &SubmitGate {
        &self.gate
    }

    /// Identify one image and save the result. Refused with
    /// [`ClientError::Busy`] while another submission is running.
    pub async fn submit(&self, image: CapturedImage) -> Result<Scan, ClientError> {
        let _permit = self.gate.try_acquire().ok_or(ClientError::Busy)?;
        self.pipeline().process(image, &self.scans()).await
    }

    /// Submit a picked file. The type comes from the extension.
    pub async fn submit_file(&self, path: &Path) -> Result<Scan, ClientError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Image(path.display().to_string()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Image(format!("{}: {e}", path.display())))?;

        let image = CapturedImage::from_file(file_name, bytes)
            .ok_or_else(|| ClientError::Image(file_name.to_string()))?;

        self.submit(image).await
    }

    /// Take a still from an active camera and submit it.
    pub async fn capture_and_submit<D: CameraDevice>(
        &self,
        camera: &mut CaptureProvider<D>,
    ) -> Result<Scan, ClientError> {
        let image = camera.capture()?;
        self.submit(image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Multipart,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use herbsight_media::{CaptureConfig, UnsupportedCamera};
    use herbsight_shared::constants::LOW_CONFIDENCE_ADVISORY;
    use herbsight_shared::{Role, UserId};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use crate::scan_store::ScanStore;

    async fn files(mut multipart: Multipart) -> Json<Value> {
        let field = multipart.next_field().await.unwrap().unwrap();
        let name = field.file_name().unwrap_or("x").to_string();
        Json(json!({ "file_url": format!("http://srv/files/{name}") }))
    }

    async fn identify() -> Json<Value> {
        Json(json!({
            "identification": {
                "common_name": "Basil",
                "scientific_name": "Ocimum basilicum",
                "confidence": 0.42
            },
            "uses": { "edible": ["Pesto"], "medicinal": [], "recipes": [] },
            "warnings": []
        }))
    }

    async fn me() -> (StatusCode, Json<Value>) {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication required" })),
        )
    }

    async fn fake_server() -> String {
        let app = Router::new()
            .route("/files", post(files))
            .route("/integrations/invoke-llm", post(identify))
            .route("/auth/me", get(me));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn open(server: &str, dir: &TempDir) -> HerbSight {
        HerbSight::open(ClientConfig::new(server).with_data_dir(dir.path()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_submit_saves_locally() {
        let server = fake_server().await;
        let dir = TempDir::new().unwrap();
        let app = open(&server, &dir).await;
        assert!(!app.session().is_authenticated());

        let image = CapturedImage::new(&b"jpeg"[..], "image/jpeg", "plant-7.jpg");
        let scan = app.submit(image).await.unwrap();

        assert!(scan.id.is_local());
        assert_eq!(scan.image_url, "http://srv/files/plant-7.jpg");
        assert_eq!(scan.warnings[0].message, LOW_CONFIDENCE_ADVISORY);
        assert!(!app.submit_gate().is_busy());

        let listed = app.scans().list().await.unwrap();
        assert_eq!(listed, vec![scan]);
    }

    #[tokio::test]
    async fn test_submit_refused_while_busy() {
        let server = fake_server().await;
        let dir = TempDir::new().unwrap();
        let app = open(&server, &dir).await;

        let _permit = app.submit_gate().try_acquire().unwrap();
        let image = CapturedImage::new(&b"jpeg"[..], "image/jpeg", "plant-7.jpg");
        assert!(matches!(app.submit(image).await, Err(ClientError::Busy)));
        assert!(app.scans().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_file_checks_extension() {
        let server = fake_server().await;
        let dir = TempDir::new().unwrap();
        let app = open(&server, &dir).await;

        let notes = dir.path().join("notes.txt");
        tokio::fs::write(&notes, b"hello").await.unwrap();
        assert!(matches!(
            app.submit_file(&notes).await,
            Err(ClientError::Image(_))
        ));

        let photo = dir.path().join("leaf.PNG");
        tokio::fs::write(&photo, b"png").await.unwrap();
        let scan = app.submit_file(&photo).await.unwrap();
        assert_eq!(scan.image_url, "http://srv/files/leaf.PNG");
    }

    #[tokio::test]
    async fn test_rejected_token_falls_back_to_anonymous() {
        let server = fake_server().await;
        let dir = TempDir::new().unwrap();

        {
            let db = Database::open_at(&dir.path().join("herbsight.db")).unwrap();
            ClientSettings {
                server_url: Some(server.clone()),
                session_token: Some("expired".into()),
            }
            .save(&db)
            .unwrap();
        }

        let app = open(&server, &dir).await;
        assert!(!app.session().is_authenticated());
        assert!(!app.scans().is_remote());

        let db = app.db.lock().unwrap();
        assert_eq!(ClientSettings::load(&db).unwrap().session_token, None);
    }

    #[tokio::test]
    async fn test_knowledge_requires_admin_session() {
        let server = fake_server().await;
        let dir = TempDir::new().unwrap();
        let mut app = open(&server, &dir).await;

        assert!(matches!(
            app.knowledge().list(&Default::default()).await,
            Err(ClientError::AccessDenied)
        ));

        app.session = SessionContext::authenticated(
            "t",
            SessionUser {
                id: UserId::new(),
                role: Role::User,
            },
        );
        assert!(app.scans().is_remote());
        assert!(matches!(
            app.knowledge().list(&Default::default()).await,
            Err(ClientError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn test_capture_error_surfaces() {
        let server = fake_server().await;
        let dir = TempDir::new().unwrap();
        let app = open(&server, &dir).await;

        let mut camera = CaptureProvider::new(UnsupportedCamera, CaptureConfig::default());
        let err = app.capture_and_submit(&mut camera).await.unwrap_err();
        assert!(matches!(err, ClientError::Capture(_)));
        assert!(matches!(err.disposition(), crate::Disposition::ShowInline(_)));
    }
}
