//! Generation gateway: the seam between session state and the backend.

use crate::error::SessionError;
use crate::model::GeneratedStory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use story_api::{BackendStory, StoryApi, StoryRequestBody};
use tracing::{info, warn};

/// Anything that can generate stories, narration and illustrations.
#[async_trait]
pub trait StoryBackend: Send + Sync {
    /// Generate a story for the given request.
    async fn generate_story(&self, request: &StoryRequestBody)
        -> Result<BackendStory, story_api::Error>;

    /// Narrate a story, returning a playable audio URL.
    async fn narrate(&self, title: &str, text: &str) -> Result<String, story_api::Error>;

    /// Illustrate a story, returning image URLs.
    async fn illustrate(&self, title: &str, text: &str) -> Result<Vec<String>, story_api::Error>;
}

#[async_trait]
impl StoryBackend for StoryApi {
    async fn generate_story(
        &self,
        request: &StoryRequestBody,
    ) -> Result<BackendStory, story_api::Error> {
        StoryApi::generate_story(self, request).await
    }

    async fn narrate(&self, title: &str, text: &str) -> Result<String, story_api::Error> {
        let audio = StoryApi::narrate(self, title, text).await?;
        Ok(audio.data_url())
    }

    async fn illustrate(&self, title: &str, text: &str) -> Result<Vec<String>, story_api::Error> {
        StoryApi::illustrate(self, title, text).await
    }
}

/// Generate narration for a story. Both title and content are required.
pub async fn generate_audio(
    backend: &dyn StoryBackend,
    title: &str,
    content: &str,
) -> Result<String, SessionError> {
    if title.is_empty() || content.is_empty() {
        return Err(SessionError::MissingStoryData(
            "Missing story data for audio generation",
        ));
    }

    info!(title, "requesting narration");
    backend.narrate(title, content).await.map_err(|e| {
        warn!(title, error = %e, "narration failed");
        SessionError::from(e)
    })
}

/// Generate illustrations for a story. Both title and content are required.
pub async fn generate_illustrations(
    backend: &dyn StoryBackend,
    title: &str,
    content: &str,
) -> Result<Vec<String>, SessionError> {
    if title.is_empty() || content.is_empty() {
        return Err(SessionError::MissingStoryData(
            "Missing story data for illustrations",
        ));
    }

    info!(title, "requesting illustrations");
    backend.illustrate(title, content).await.map_err(|e| {
        warn!(title, error = %e, "illustration failed");
        SessionError::from(e)
    })
}

// ============================================================================
// Result shapes
// ============================================================================

/// Outcome of a story generation in `{success, story?, error?}` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<GeneratedStory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<GeneratedStory, SessionError>> for GenerationResult {
    fn from(result: Result<GeneratedStory, SessionError>) -> Self {
        match result {
            Ok(story) => Self {
                success: true,
                story: Some(story),
                error: None,
            },
            Err(e) => Self {
                success: false,
                story: None,
                error: Some(e.user_message()),
            },
        }
    }
}

/// Outcome of a narration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<String, SessionError>> for AudioResult {
    fn from(result: Result<String, SessionError>) -> Self {
        match result {
            Ok(url) => Self {
                success: true,
                audio_url: Some(url),
                error: None,
            },
            Err(e) => Self {
                success: false,
                audio_url: None,
                error: Some(e.user_message()),
            },
        }
    }
}

/// Outcome of an illustration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IllustrationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Vec<String>, SessionError>> for IllustrationResult {
    fn from(result: Result<Vec<String>, SessionError>) -> Self {
        match result {
            Ok(images) => Self {
                success: true,
                images: Some(images),
                error: None,
            },
            Err(e) => Self {
                success: false,
                images: None,
                error: Some(e.user_message()),
            },
        }
    }
}
