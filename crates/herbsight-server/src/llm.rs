//! Identification gateway.
//!
//! Forwards an [`InvokeRequest`] to an OpenAI-compatible chat completions
//! endpoint, asking for a `json_schema` formatted answer, and returns the
//! model's JSON verbatim. Normalization happens on the client.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use herbsight_shared::schema::InvokeRequest;
use herbsight_shared::types::mime_for_file_name;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::file_store::FileStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct LlmGateway {
    http: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
    model: String,
}

impl LlmGateway {
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("herbsight-server/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServerError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: config.llm_api_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }

    /// `image_urls` are the request's file URLs after [`inline_image_url`].
    pub async fn invoke(
        &self,
        request: &InvokeRequest,
        image_urls: &[String],
    ) -> Result<Value, ServerError> {
        let url = self
            .api_url
            .as_deref()
            .ok_or_else(|| {
                ServerError::Upstream("identification service is not configured".into())
            })?;

        let body = chat_request_body(&self.model, request, image_urls);

        let mut builder = self.http.post(url).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(model = %self.model, images = image_urls.len(), "Invoking identification model");

        let response = builder
            .send()
            .await
            .map_err(|e| ServerError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Identification model returned an error");
            return Err(ServerError::Upstream(format!("HTTP {status}: {text}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ServerError::Upstream(format!("invalid response body: {e}")))?;

        let result = extract_content(&payload)?;
        info!(model = %self.model, "Identification model answered");
        Ok(result)
    }
}

pub fn chat_request_body(model: &str, request: &InvokeRequest, image_urls: &[String]) -> Value {
    let mut content = vec![json!({ "type": "text", "text": request.prompt })];
    content.extend(
        image_urls
            .iter()
            .map(|url| json!({ "type": "image_url", "image_url": { "url": url } })),
    );

    json!({
        "model": model,
        "messages": [{ "role": "user", "content": content }],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "plant_identification",
                "schema": request.response_json_schema,
            }
        }
    })
}

/// Pull `choices[0].message.content` out of a completion and parse it.
pub fn extract_content(payload: &Value) -> Result<Value, ServerError> {
    let content = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::Upstream("completion has no message content".into()))?;

    let trimmed = strip_code_fence(content.trim());
    serde_json::from_str(trimmed)
        .map_err(|e| ServerError::Upstream(format!("model answer is not JSON: {e}")))
}

// some models wrap JSON answers in ```json fences despite the response format
fn strip_code_fence(s: &str) -> &str {
    s.strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(s)
}

/// The upstream model cannot reach this instance's private URLs, so files
/// served by us are sent inline as `data:` URLs. Other URLs pass through.
pub async fn inline_image_url(
    files: &FileStore,
    config: &ServerConfig,
    url: &str,
) -> Result<String, ServerError> {
    let prefix = format!("{}/files/", config.public_base_url);
    let Some(name) = url.strip_prefix(&prefix) else {
        return Ok(url.to_string());
    };

    let bytes = files.read_file(name).await?;
    let mime = mime_for_file_name(name).unwrap_or("application/octet-stream");
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, routing::post, Json, Router};
    use herbsight_shared::schema::identification_schema;

    #[test]
    fn test_request_body_shape() {
        let req = InvokeRequest::identify("http://x/files/a.jpg");
        let body = chat_request_body("m", &req, &["data:image/jpeg;base64,AAAA".to_string()]);

        assert_eq!(body["model"], "m");
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], req.prompt);
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"],
            identification_schema()
        );
    }

    #[test]
    fn test_extract_content() {
        let payload = json!({
            "choices": [{ "message": { "content": "{\"identification\": {\"confidence\": 0.9}}" } }]
        });
        let value = extract_content(&payload).unwrap();
        assert_eq!(value["identification"]["confidence"], 0.9);

        let fenced = json!({
            "choices": [{ "message": { "content": "```json\n{\"warnings\": []}\n```" } }]
        });
        assert_eq!(extract_content(&fenced).unwrap()["warnings"], json!([]));

        let prose = json!({ "choices": [{ "message": { "content": "It is basil." } }] });
        assert!(matches!(extract_content(&prose), Err(ServerError::Upstream(_))));

        assert!(extract_content(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_inline_own_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::new(dir.path().to_path_buf(), 1024).await.unwrap();
        let config = ServerConfig::default();

        let stored = files.store_file(b"abc", "image/png").await.unwrap();
        let own = config.file_url(&stored.name);

        let inlined = inline_image_url(&files, &config, &own).await.unwrap();
        assert_eq!(inlined, "data:image/png;base64,YWJj");

        let foreign = "https://cdn.example.org/leaf.jpg";
        assert_eq!(inline_image_url(&files, &config, foreign).await.unwrap(), foreign);
    }

    #[tokio::test]
    async fn test_unconfigured_gateway() {
        let gateway = LlmGateway::new(&ServerConfig::default()).unwrap();
        assert!(!gateway.is_configured());

        let req = InvokeRequest::identify("http://x/files/a.jpg");
        assert!(matches!(
            gateway.invoke(&req, &[]).await,
            Err(ServerError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_invoke_against_fake_upstream() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));

        async fn complete(
            State(seen): State<Arc<Mutex<Option<Value>>>>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            *seen.lock().unwrap() = Some(body);
            Json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"identification\":{\"common_name\":\"Basil\",\"scientific_name\":\"Ocimum basilicum\",\"confidence\":0.42}}"
                    }
                }]
            }))
        }

        let app = Router::new()
            .route("/v1/chat/completions", post(complete))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = ServerConfig {
            llm_api_url: Some(format!("http://{addr}/v1/chat/completions")),
            llm_api_key: Some("sk-test".into()),
            llm_model: "vision-model".into(),
            ..Default::default()
        };
        let gateway = LlmGateway::new(&config).unwrap();

        let req = InvokeRequest::identify("https://cdn.example.org/leaf.jpg");
        let result = gateway
            .invoke(&req, &req.file_urls)
            .await
            .unwrap();

        assert_eq!(result["identification"]["common_name"], "Basil");
        assert_eq!(result["identification"]["confidence"], 0.42);

        let sent = seen.lock().unwrap().clone().unwrap();
        assert_eq!(sent["model"], "vision-model");
        assert_eq!(
            sent["messages"][0]["content"][1]["image_url"]["url"],
            "https://cdn.example.org/leaf.jpg"
        );
    }
}
