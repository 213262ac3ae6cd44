//! Minimal client for the story generation backend.
//!
//! This crate provides a focused client for the three backend endpoints:
//! - Story generation from a structured child/story description
//! - Narration audio for a finished story
//! - Illustrations for a finished story

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_AUDIO_TYPE: &str = "audio/mpeg";

const GENERATE_PATH: &str = "/story/generate";
const NARRATION_PATH: &str = "/narration/stream";
const ILLUSTRATION_PATH: &str = "/generate-illustrations";

/// The backend endpoint a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Generate,
    Narrate,
    Illustrate,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::Generate => GENERATE_PATH,
            Endpoint::Narrate => NARRATION_PATH,
            Endpoint::Illustrate => ILLUSTRATION_PATH,
        }
    }

    /// Message for a rejection that carried no `{"error": ...}` body.
    pub fn failure_message(self) -> &'static str {
        match self {
            Endpoint::Generate => "Failed to generate story",
            Endpoint::Narrate => "Failed to generate audio",
            Endpoint::Illustrate => "Failed to fetch illustrations",
        }
    }

    /// Message shown when the request never produced a usable response.
    pub fn unexpected_message(self) -> &'static str {
        match self {
            Endpoint::Generate => "Unexpected error generating story",
            Endpoint::Narrate => "Unexpected error generating audio",
            Endpoint::Illustrate => "Unexpected error generating illustrations",
        }
    }
}

/// Errors that can occur when talking to the story backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {message}")]
    Network { endpoint: Endpoint, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {message}")]
    Parse { endpoint: Endpoint, message: String },

    #[error("No audio data received")]
    EmptyAudio,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    fn network(endpoint: Endpoint, err: reqwest::Error) -> Self {
        warn!(path = endpoint.path(), error = %err, "request failed");
        Error::Network {
            endpoint,
            message: err.to_string(),
        }
    }

    fn parse(endpoint: Endpoint, err: reqwest::Error) -> Self {
        warn!(path = endpoint.path(), error = %err, "unreadable response");
        Error::Parse {
            endpoint,
            message: err.to_string(),
        }
    }

    /// The message shown to a user when a request fails.
    ///
    /// Backend rejections carry their own message. Transport and decoding
    /// failures get a fixed per-endpoint message; the detail only goes to
    /// the log.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { message, .. } => message.clone(),
            Error::Network { endpoint, .. } | Error::Parse { endpoint, .. } => {
                endpoint.unexpected_message().to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Connection settings for [`StoryApi`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,

    /// Overall request timeout.
    pub timeout: Duration,

    /// Connection establishment timeout.
    pub connect_timeout: Duration,
}

impl ApiConfig {
    /// Create a config pointing at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Build a config from `STORY_API_URL` and `STORY_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, Error> {
        let base_url =
            std::env::var("STORY_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url);

        if let Ok(raw) = std::env::var("STORY_API_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid STORY_API_TIMEOUT_SECS: {raw}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Story backend client.
#[derive(Clone)]
pub struct StoryApi {
    client: reqwest::Client,
    base_url: String,
}

impl StoryApi {
    /// Create a client for the backend at `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Self::with_config(ApiConfig::new(base_url))
    }

    /// Create a client from an explicit config.
    pub fn with_config(config: ApiConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Create a client from the environment (see [`ApiConfig::from_env`]).
    pub fn from_env() -> Result<Self, Error> {
        Self::with_config(ApiConfig::from_env()?)
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a story request and return the generated title and text.
    pub async fn generate_story(&self, request: &StoryRequestBody) -> Result<BackendStory, Error> {
        debug!(child = %request.child_information.name, "submitting story request");

        let response = self
            .client
            .post(self.url(GENERATE_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| Error::network(Endpoint::Generate, e))?;

        let response = check_status(response, Endpoint::Generate).await?;

        response
            .json::<BackendStory>()
            .await
            .map_err(|e| Error::parse(Endpoint::Generate, e))
    }

    /// Request narration audio for a story.
    pub async fn narrate(&self, title: &str, text: &str) -> Result<NarrationAudio, Error> {
        let response = self
            .client
            .get(self.url(NARRATION_PATH))
            .query(&[("title", title), ("text", text)])
            .send()
            .await
            .map_err(|e| Error::network(Endpoint::Narrate, e))?;

        let response = check_status(response, Endpoint::Narrate).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_AUDIO_TYPE)
            .to_string();

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::network(Endpoint::Narrate, e))?;

        if data.is_empty() {
            return Err(Error::EmptyAudio);
        }

        Ok(NarrationAudio {
            content_type,
            data: data.to_vec(),
        })
    }

    /// Request illustrations for a story.
    pub async fn illustrate(&self, title: &str, text: &str) -> Result<Vec<String>, Error> {
        let body = IllustrationRequest { title, text };

        let response = self
            .client
            .post(self.url(ILLUSTRATION_PATH))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::network(Endpoint::Illustrate, e))?;

        let response = check_status(response, Endpoint::Illustrate).await?;

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::parse(Endpoint::Illustrate, e))?;

        Ok(parse_images(value))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Turn a non-2xx response into an [`Error::Api`], preferring the backend's
/// own `{"error": ...}` message over the endpoint's fallback.
async fn check_status(
    response: reqwest::Response,
    endpoint: Endpoint,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!(status, path = endpoint.path(), "backend rejected request");

    Err(Error::Api {
        status,
        message: error_message(&body).unwrap_or_else(|| endpoint.failure_message().to_string()),
    })
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.error.filter(|m| !m.is_empty())
}

fn parse_images(value: serde_json::Value) -> Vec<String> {
    match value.get("images") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Public types
// ============================================================================

/// Request body for the story generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRequestBody {
    pub child_information: ChildInformation,
    pub story_goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub story_length: String,
    pub story_theme: String,
    pub include_islamic_teaching: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
}

/// The child the story is written for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildInformation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_pet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friends_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A story as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStory {
    pub title: String,
    pub text: String,
}

/// Narration audio returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationAudio {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl NarrationAudio {
    /// Encode the audio as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.data))
    }
}

/// Decode a base64 `data:` URL back into its content type and bytes.
///
/// Returns `None` when `url` is not a base64 data URL.
pub fn decode_data_url(url: &str) -> Option<NarrationAudio> {
    let rest = url.strip_prefix("data:")?;
    let (content_type, payload) = rest.split_once(";base64,")?;
    let data = STANDARD.decode(payload).ok()?;
    Some(NarrationAudio {
        content_type: content_type.to_string(),
        data,
    })
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct IllustrationRequest<'a> {
    title: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn sample_request() -> StoryRequestBody {
        StoryRequestBody {
            child_information: ChildInformation {
                name: "Amina".to_string(),
                age: Some(6),
                ..Default::default()
            },
            story_goal: "Learn to share".to_string(),
            tags: Some(vec!["kindness".to_string()]),
            story_length: "short".to_string(),
            story_theme: "home".to_string(),
            include_islamic_teaching: true,
            additional_instructions: None,
        }
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = ApiConfig::new("http://example.test/");
        assert_eq!(config.base_url, "http://example.test");
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_request_omits_absent_fields() {
        let value = serde_json::to_value(sample_request()).unwrap();
        let child = &value["child_information"];

        assert_eq!(child["name"], "Amina");
        assert_eq!(child["age"], 6);
        assert!(child.get("favorite_pet_name").is_none());
        assert!(child.get("friends_names").is_none());
        assert!(value.get("additional_instructions").is_none());
        assert_eq!(value["include_islamic_teaching"], true);
    }

    #[test]
    fn test_user_message_prefers_backend_message() {
        let err = Error::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.user_message(), "boom");
        assert_eq!(Error::EmptyAudio.user_message(), "No audio data received");
    }

    #[test]
    fn test_data_url_round_trip() {
        let audio = NarrationAudio {
            content_type: "audio/wav".to_string(),
            data: vec![1, 2, 3, 250],
        };
        let url = audio.data_url();
        assert!(url.starts_with("data:audio/wav;base64,"));
        assert_eq!(decode_data_url(&url), Some(audio));
        assert_eq!(decode_data_url("https://example.test/a.mp3"), None);
    }

    #[test]
    fn test_parse_images_tolerates_missing_field() {
        assert!(parse_images(serde_json::json!({})).is_empty());
        assert!(parse_images(serde_json::json!({"images": "nope"})).is_empty());
        assert_eq!(
            parse_images(serde_json::json!({"images": ["a", "b"]})),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_generate_story_success() {
        let router = Router::new().route(
            GENERATE_PATH,
            post(|Json(body): Json<StoryRequestBody>| async move {
                Json(serde_json::json!({
                    "title": format!("{}'s Day", body.child_information.name),
                    "text": "Once upon a time.\n\nThe end.",
                }))
            }),
        );
        let api = StoryApi::new(serve(router).await).unwrap();

        let story = api.generate_story(&sample_request()).await.unwrap();
        assert_eq!(story.title, "Amina's Day");
        assert_eq!(story.text, "Once upon a time.\n\nThe end.");
    }

    #[tokio::test]
    async fn test_generate_story_backend_error() {
        let router = Router::new().route(
            GENERATE_PATH,
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "boom"})),
                )
            }),
        );
        let api = StoryApi::new(serve(router).await).unwrap();

        let err = api.generate_story(&sample_request()).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 500, ref message } if message == "boom"));
    }

    #[tokio::test]
    async fn test_generate_story_error_without_body_uses_fallback() {
        let router = Router::new().route(
            GENERATE_PATH,
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let api = StoryApi::new(serve(router).await).unwrap();

        let err = api.generate_story(&sample_request()).await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to generate story");
    }

    #[tokio::test]
    async fn test_generate_story_malformed_json() {
        let router = Router::new().route(GENERATE_PATH, post(|| async { "not json" }));
        let api = StoryApi::new(serve(router).await).unwrap();

        let err = api.generate_story(&sample_request()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                endpoint: Endpoint::Generate,
                ..
            }
        ));
        assert_eq!(err.user_message(), "Unexpected error generating story");
    }

    #[tokio::test]
    async fn test_narrate_wraps_bytes() {
        let router = Router::new().route(
            NARRATION_PATH,
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("title").map(String::as_str), Some("T"));
                assert_eq!(params.get("text").map(String::as_str), Some("a & b"));
                ([(header::CONTENT_TYPE, "audio/ogg")], vec![9u8, 8, 7]).into_response()
            }),
        );
        let api = StoryApi::new(serve(router).await).unwrap();

        let audio = api.narrate("T", "a & b").await.unwrap();
        assert_eq!(audio.content_type, "audio/ogg");
        assert_eq!(audio.data, vec![9, 8, 7]);
    }

    #[tokio::test]
    async fn test_narrate_empty_body() {
        let router = Router::new().route(NARRATION_PATH, get(|| async { Vec::<u8>::new() }));
        let api = StoryApi::new(serve(router).await).unwrap();

        let err = api.narrate("T", "text").await.unwrap_err();
        assert!(matches!(err, Error::EmptyAudio));
    }

    #[tokio::test]
    async fn test_narrate_error_prefers_body_message() {
        let router = Router::new()
            .route(
                NARRATION_PATH,
                get(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({"error": "tts down"})),
                    )
                }),
            )
            .route(
                "/bare/narration/stream",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            );
        let base = serve(router).await;

        let api = StoryApi::new(base.clone()).unwrap();
        let err = api.narrate("T", "text").await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 500, .. }));
        assert_eq!(err.user_message(), "tts down");

        let bare = StoryApi::new(format!("{base}/bare")).unwrap();
        let err = bare.narrate("T", "text").await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to generate audio");
    }

    #[tokio::test]
    async fn test_illustrate() {
        let router = Router::new().route(
            ILLUSTRATION_PATH,
            post(|| async { Json(serde_json::json!({"images": ["data:image/png;base64,AA=="]})) }),
        );
        let api = StoryApi::new(serve(router).await).unwrap();

        let images = api.illustrate("T", "text").await.unwrap();
        assert_eq!(images, vec!["data:image/png;base64,AA==".to_string()]);
    }

    #[tokio::test]
    async fn test_network_failure() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = StoryApi::new(format!("http://{addr}")).unwrap();
        let err = api.generate_story(&sample_request()).await.unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
        assert_eq!(err.user_message(), "Unexpected error generating story");
        assert!(err.to_string().contains(&addr.to_string()));

        let err = api.narrate("T", "text").await.unwrap_err();
        assert_eq!(err.user_message(), "Unexpected error generating audio");
        let err = api.illustrate("T", "text").await.unwrap_err();
        assert_eq!(err.user_message(), "Unexpected error generating illustrations");
    }
}
