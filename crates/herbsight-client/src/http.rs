//! HTTP client for the HerbSight server.
//!
//! Every endpoint the client uses goes through [`HttpBackend`]. Non-success
//! answers are mapped to [`ClientError`] from the status code and the
//! server's `{"error": ...}` body.

use std::time::Duration;

use herbsight_shared::schema::InvokeRequest;
use herbsight_shared::{
    CapturedImage, KnowledgeDraft, KnowledgeFilter, NewScan, PlantKnowledgeEntry, Scan, ScanPatch,
    SessionUser,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ClientError;

const USER_AGENT: &str = concat!("herbsight-client/", env!("CARGO_PKG_VERSION"));
// identification waits on a vision model
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub registration_open: bool,
    pub identification_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Deserialize)]
struct UploadResponse {
    file_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("invalid response body: {e}")))
    }

    // ─── Instance & session ───

    pub async fn info(&self) -> Result<ServerInfo, ClientError> {
        self.send_json(self.request(Method::GET, "/info", None)).await
    }

    pub async fn register(&self) -> Result<Registration, ClientError> {
        self.send_json(self.request(Method::POST, "/auth/register", None))
            .await
    }

    pub async fn me(&self, token: &str) -> Result<SessionUser, ClientError> {
        self.send_json(self.request(Method::GET, "/auth/me", Some(token)))
            .await
    }

    // ─── Intake ───

    /// Upload an image, returning its public URL.
    pub async fn upload(&self, image: &CapturedImage) -> Result<String, ClientError> {
        let part = reqwest::multipart::Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.mime_type())
            .map_err(|e| ClientError::Image(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        debug!(file = %image.file_name(), size = image.len(), "Uploading image");

        let body: UploadResponse = self
            .send_json(self.request(Method::POST, "/files", None).multipart(form))
            .await
            .map_err(|e| match e {
                ClientError::Image(_) => e,
                other => ClientError::UploadFailed(other.to_string()),
            })?;
        Ok(body.file_url)
    }

    /// Run the identification model. The answer is returned raw.
    pub async fn invoke(&self, request: &InvokeRequest) -> Result<Value, ClientError> {
        self.send_json(
            self.request(Method::POST, "/integrations/invoke-llm", None)
                .json(request),
        )
        .await
        .map_err(|e| ClientError::IdentificationFailed(e.to_string()))
    }

    // ─── Scans ───

    pub async fn create_scan(&self, token: &str, scan: &NewScan) -> Result<Scan, ClientError> {
        self.send_json(
            self.request(Method::POST, "/entities/scans", Some(token))
                .json(scan),
        )
        .await
    }

    pub async fn list_scans(&self, token: &str) -> Result<Vec<Scan>, ClientError> {
        self.send_json(self.request(Method::GET, "/entities/scans", Some(token)))
            .await
    }

    pub async fn get_scan(&self, token: &str, id: Uuid) -> Result<Scan, ClientError> {
        self.send_json(self.request(Method::GET, &format!("/entities/scans/{id}"), Some(token)))
            .await
    }

    pub async fn patch_scan(
        &self,
        token: &str,
        id: Uuid,
        patch: &ScanPatch,
    ) -> Result<Scan, ClientError> {
        self.send_json(
            self.request(Method::PATCH, &format!("/entities/scans/{id}"), Some(token))
                .json(patch),
        )
        .await
    }

    pub async fn delete_scan(&self, token: &str, id: Uuid) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, &format!("/entities/scans/{id}"), Some(token)))
            .await?;
        Ok(())
    }

    // ─── Knowledge base ───

    pub async fn list_plants(
        &self,
        token: &str,
        filter: &KnowledgeFilter,
    ) -> Result<Vec<PlantKnowledgeEntry>, ClientError> {
        self.send_json(
            self.request(Method::GET, "/entities/plants", Some(token))
                .query(filter),
        )
        .await
    }

    pub async fn get_plant(
        &self,
        token: &str,
        id: Uuid,
    ) -> Result<PlantKnowledgeEntry, ClientError> {
        let path = format!("/entities/plants/{id}");
        self.send_json(self.request(Method::GET, &path, Some(token)))
            .await
    }

    pub async fn create_plant(
        &self,
        token: &str,
        draft: &KnowledgeDraft,
    ) -> Result<PlantKnowledgeEntry, ClientError> {
        self.send_json(
            self.request(Method::POST, "/entities/plants", Some(token))
                .json(draft),
        )
        .await
    }

    pub async fn update_plant(
        &self,
        token: &str,
        id: Uuid,
        draft: &KnowledgeDraft,
    ) -> Result<PlantKnowledgeEntry, ClientError> {
        self.send_json(
            self.request(Method::PUT, &format!("/entities/plants/{id}"), Some(token))
                .json(draft),
        )
        .await
    }

    pub async fn delete_plant(&self, token: &str, id: Uuid) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, &format!("/entities/plants/{id}"), Some(token)))
            .await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.text().await {
        Ok(text) => serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text),
        Err(e) => e.to_string(),
    };

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthenticated,
        StatusCode::FORBIDDEN => ClientError::AccessDenied,
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            ClientError::Invalid(message)
        }
        _ => {
            warn!(status = %status, message = %message, "Server returned an error");
            ClientError::Remote {
                status: status.as_u16(),
                message,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Multipart,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use herbsight_shared::{Role, UserId};
    use serde_json::json;

    async fn spawn(app: Router) -> HttpBackend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        HttpBackend::new(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file() {
        async fn files(mut multipart: Multipart) -> Json<Value> {
            let field = multipart.next_field().await.unwrap().unwrap();
            assert_eq!(field.name(), Some("file"));
            assert_eq!(field.file_name(), Some("plant-1.jpg"));
            assert_eq!(field.content_type(), Some("image/jpeg"));
            let data = field.bytes().await.unwrap();
            assert_eq!(&data[..], b"jpeg");
            Json(json!({ "file_url": "http://srv/files/abc.jpg" }))
        }

        let backend = spawn(Router::new().route("/files", post(files))).await;
        let image = CapturedImage::new(&b"jpeg"[..], "image/jpeg", "plant-1.jpg");

        let url = backend.upload(&image).await.unwrap();
        assert_eq!(url, "http://srv/files/abc.jpg");
    }

    #[tokio::test]
    async fn test_upload_failure_is_upload_failed() {
        async fn files() -> (AxumStatus, Json<Value>) {
            (
                AxumStatus::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "File storage error" })),
            )
        }

        let backend = spawn(Router::new().route("/files", post(files))).await;
        let image = CapturedImage::new(&b"jpeg"[..], "image/jpeg", "plant-1.jpg");

        match backend.upload(&image).await {
            Err(ClientError::UploadFailed(msg)) => assert!(msg.contains("File storage error")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_mapping() {
        async fn me(headers: HeaderMap) -> Result<Json<SessionUser>, (AxumStatus, Json<Value>)> {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer good") => Ok(Json(SessionUser {
                    id: UserId::new(),
                    role: Role::Admin,
                })),
                _ => Err((
                    AxumStatus::UNAUTHORIZED,
                    Json(json!({ "error": "Authentication required" })),
                )),
            }
        }
        async fn missing() -> (AxumStatus, Json<Value>) {
            (AxumStatus::NOT_FOUND, Json(json!({ "error": "Not found: scan" })))
        }
        async fn forbidden() -> (AxumStatus, Json<Value>) {
            (AxumStatus::FORBIDDEN, Json(json!({ "error": "Admin role required" })))
        }

        let app = Router::new()
            .route("/auth/me", get(me))
            .route("/entities/scans/:id", get(missing))
            .route("/entities/plants", get(forbidden));
        let backend = spawn(app).await;

        assert!(backend.me("good").await.unwrap().is_admin());
        assert!(matches!(
            backend.me("bad").await,
            Err(ClientError::Unauthenticated)
        ));
        match backend.get_scan("good", Uuid::new_v4()).await {
            Err(ClientError::NotFound(msg)) => assert_eq!(msg, "Not found: scan"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            backend.list_plants("good", &KnowledgeFilter::default()).await,
            Err(ClientError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(&format!("http://{addr}")).unwrap();
        assert!(matches!(backend.info().await, Err(ClientError::Network(_))));
    }
}
