use std::future::Future;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::SummaryError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A text-generation service: one prompt in, one piece of text out.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, SummaryError>> + Send;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// `generateContent` over the Generative Language REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, SummaryError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        // No response at all is the only case that counts as unavailable.
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                warn!("Generation request to {} failed: {}", self.config.model, e);
                SummaryError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Generation service answered {}", status);
            return Err(SummaryError::Generation(format!(
                "generation service answered {}",
                status
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            let e = e.without_url();
            warn!("Unreadable generation response: {}", e);
            SummaryError::Generation(format!("unreadable response body: {}", e))
        })?;

        let text = extract_text(&payload).ok_or_else(|| {
            warn!("Generation response carried no summary text");
            SummaryError::Generation("response carried no summary text".into())
        })?;

        debug!("Generated {} bytes of summary", text.len());
        Ok(text)
    }
}

/// `candidates[0].content.parts[0].text`, trimmed. Missing or blank is `None`.
pub fn extract_text(payload: &Value) -> Option<String> {
    let text = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?
        .trim();

    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, RawQuery};
    use axum::{Json, Router, http::StatusCode, routing::post};

    fn reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }], "role": "model" },
                "finishReason": "STOP"
            }]
        })
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: String) -> GeminiClient {
        let mut config = GeminiConfig::new("test-key");
        config.base_url = base_url;
        config.model = "gemini-test".into();
        config.timeout = Duration::from_secs(5);
        GeminiClient::new(config).unwrap()
    }

    #[test]
    fn extract_text_follows_the_candidate_path() {
        assert_eq!(extract_text(&reply("  all good \n")).as_deref(), Some("all good"));
        assert_eq!(extract_text(&reply("   ")), None);
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
        assert_eq!(extract_text(&json!({ "promptFeedback": { "blockReason": "SAFETY" } })), None);
        assert_eq!(
            extract_text(&json!({ "candidates": [{ "content": { "parts": [{ "text": 7 }] } }] })),
            None
        );
    }

    #[tokio::test]
    async fn sends_prompt_and_returns_text() {
        let app = Router::new().route(
            "/v1/models/{call}",
            post(|Path(call): Path<String>, RawQuery(query): RawQuery, Json(body): Json<Value>| async move {
                assert_eq!(call, "gemini-test:generateContent");
                assert_eq!(query.as_deref(), Some("key=test-key"));
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
                Json(reply(&format!("echo: {prompt}")))
            }),
        );
        let gemini = client(serve(app).await);

        assert_eq!(gemini.generate("hello").await.unwrap(), "echo: hello");
    }

    #[tokio::test]
    async fn error_status_is_generation_failure() {
        let app = Router::new().route(
            "/v1/models/{call}",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let gemini = client(serve(app).await);

        assert!(matches!(gemini.generate("hi").await, Err(SummaryError::Generation(_))));
    }

    #[tokio::test]
    async fn malformed_body_is_generation_failure() {
        let app = Router::new()
            .route("/v1/models/{call}", post(|| async { "not json" }));
        let gemini = client(serve(app).await);
        assert!(matches!(gemini.generate("hi").await, Err(SummaryError::Generation(_))));

        let app = Router::new().route(
            "/v1/models/{call}",
            post(|| async { Json(json!({ "candidates": [{ "content": { "parts": [] } }] })) }),
        );
        let gemini = client(serve(app).await);
        assert!(matches!(gemini.generate("hi").await, Err(SummaryError::Generation(_))));
    }

    #[tokio::test]
    async fn empty_summary_is_generation_failure() {
        let app = Router::new()
            .route("/v1/models/{call}", post(|| async { Json(reply("")) }));
        let gemini = client(serve(app).await);

        assert!(matches!(gemini.generate("hi").await, Err(SummaryError::Generation(_))));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gemini = client(format!("http://{addr}"));
        assert!(matches!(gemini.generate("hi").await, Err(SummaryError::Unavailable(_))));
    }
}
