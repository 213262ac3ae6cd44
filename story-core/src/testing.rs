//! Testing utilities for the story wizard.
//!
//! This module provides tools for integration testing:
//! - `MockBackend` for deterministic testing without network calls
//! - `TestHarness` for scripted wizard scenarios over in-memory stores
//! - Assertion helpers for verifying session state

use crate::error::SessionError;
use crate::gateway::StoryBackend;
use crate::model::GeneratedStory;
use crate::persist::{KeyValueStore, MemoryStore};
use crate::session::StorySession;
use async_trait::async_trait;
use std::collections::VecDeque;
use story_api::{BackendStory, Endpoint, StoryRequestBody};
use tokio::sync::Mutex;

/// Audio URL returned by a [`MockBackend`] with no scripted narration.
pub const MOCK_AUDIO_URL: &str = "data:audio/mpeg;base64,AAAA";

/// A scripted answer to a story generation request.
#[derive(Debug, Clone)]
pub enum MockStory {
    Story(BackendStory),
    Failure { status: u16, message: String },
    NetworkError(String),
}

impl MockStory {
    pub fn story(title: impl Into<String>, text: impl Into<String>) -> Self {
        MockStory::Story(BackendStory {
            title: title.into(),
            text: text.into(),
        })
    }

    fn into_result(self) -> Result<BackendStory, story_api::Error> {
        match self {
            MockStory::Story(story) => Ok(story),
            MockStory::Failure { status, message } => {
                Err(story_api::Error::Api { status, message })
            }
            MockStory::NetworkError(message) => Err(story_api::Error::Network {
                endpoint: Endpoint::Generate,
                message,
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum Scripted<T> {
    Ok(T),
    Failure { status: u16, message: String },
}

impl<T: Clone> Scripted<T> {
    fn to_result(&self) -> Result<T, story_api::Error> {
        match self {
            Scripted::Ok(value) => Ok(value.clone()),
            Scripted::Failure { status, message } => Err(story_api::Error::Api {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

/// A backend that returns scripted responses.
///
/// Stories are returned in the order they were queued; once the queue is
/// exhausted a default story is returned. Narration and illustration answers
/// are fixed for the lifetime of the mock.
pub struct MockBackend {
    stories: Mutex<VecDeque<MockStory>>,
    audio: Scripted<String>,
    images: Scripted<Vec<String>>,
    requests: Mutex<Vec<StoryRequestBody>>,
    narrations: Mutex<Vec<(String, String)>>,
    illustrations: Mutex<usize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            stories: Mutex::new(VecDeque::new()),
            audio: Scripted::Ok(MOCK_AUDIO_URL.to_string()),
            images: Scripted::Ok(Vec::new()),
            requests: Mutex::new(Vec::new()),
            narrations: Mutex::new(Vec::new()),
            illustrations: Mutex::new(0),
        }
    }

    /// Queue a successful story.
    pub fn with_story(mut self, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.queue(MockStory::story(title, text));
        self
    }

    /// Queue a backend rejection.
    pub fn with_failure(mut self, status: u16, message: impl Into<String>) -> Self {
        self.queue(MockStory::Failure {
            status,
            message: message.into(),
        });
        self
    }

    /// Queue a transport failure.
    pub fn with_network_error(mut self, message: impl Into<String>) -> Self {
        self.queue(MockStory::NetworkError(message.into()));
        self
    }

    pub fn with_audio(mut self, url: impl Into<String>) -> Self {
        self.audio = Scripted::Ok(url.into());
        self
    }

    pub fn with_audio_failure(mut self, status: u16, message: impl Into<String>) -> Self {
        self.audio = Scripted::Failure {
            status,
            message: message.into(),
        };
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = Scripted::Ok(images);
        self
    }

    pub fn with_illustration_failure(mut self, status: u16, message: impl Into<String>) -> Self {
        self.images = Scripted::Failure {
            status,
            message: message.into(),
        };
        self
    }

    /// Add a scripted story answer to the queue.
    pub fn queue(&mut self, story: MockStory) {
        self.stories.get_mut().push_back(story);
    }

    /// Every generation request received, oldest first.
    pub async fn requests(&self) -> Vec<StoryRequestBody> {
        self.requests.lock().await.clone()
    }

    /// The most recent generation request, if any.
    pub async fn last_request(&self) -> Option<StoryRequestBody> {
        self.requests.lock().await.last().cloned()
    }

    /// Number of narration requests received.
    pub async fn narration_calls(&self) -> usize {
        self.narrations.lock().await.len()
    }

    /// The `(title, text)` of every narration request received.
    pub async fn narrations(&self) -> Vec<(String, String)> {
        self.narrations.lock().await.clone()
    }

    pub async fn illustration_calls(&self) -> usize {
        *self.illustrations.lock().await
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoryBackend for MockBackend {
    async fn generate_story(
        &self,
        request: &StoryRequestBody,
    ) -> Result<BackendStory, story_api::Error> {
        self.requests.lock().await.push(request.clone());

        let next = self.stories.lock().await.pop_front();
        next.unwrap_or_else(|| {
            MockStory::story("Untitled Story", "There are no more scripted stories.")
        })
        .into_result()
    }

    async fn narrate(&self, title: &str, text: &str) -> Result<String, story_api::Error> {
        self.narrations
            .lock()
            .await
            .push((title.to_string(), text.to_string()));
        self.audio.to_result()
    }

    async fn illustrate(&self, _title: &str, _text: &str) -> Result<Vec<String>, story_api::Error> {
        *self.illustrations.lock().await += 1;
        self.images.to_result()
    }
}

/// Test harness for running wizard scenarios.
///
/// The session is backed by two [`MemoryStore`]s that outlive it, so a
/// scenario can save, [`reload`](TestHarness::reload) and inspect what was
/// written.
pub struct TestHarness {
    pub session: StorySession,
    pub backend: MockBackend,
    durable: MemoryStore,
    ephemeral: MemoryStore,
}

impl TestHarness {
    pub fn new() -> Self {
        let durable = MemoryStore::new();
        let ephemeral = MemoryStore::new();
        let session = StorySession::new(Box::new(durable.clone()), Box::new(ephemeral.clone()));

        Self {
            session,
            backend: MockBackend::new(),
            durable,
            ephemeral,
        }
    }

    /// Queue a successful story.
    pub fn expect_story(&mut self, title: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.backend.queue(MockStory::story(title, text));
        self
    }

    /// Queue a backend rejection.
    pub fn expect_failure(&mut self, status: u16, message: impl Into<String>) -> &mut Self {
        self.backend.queue(MockStory::Failure {
            status,
            message: message.into(),
        });
        self
    }

    /// Generate from the current draft using the mock backend.
    pub async fn generate(&mut self) -> Result<GeneratedStory, SessionError> {
        self.session.generate_story(&self.backend).await
    }

    pub async fn save(&mut self) {
        self.session.save().await;
    }

    /// Replace the session with one loaded from the stores, as a restart
    /// would. Unsaved changes are lost.
    pub async fn reload(&mut self) {
        self.session = StorySession::load(
            Box::new(self.durable.clone()),
            Box::new(self.ephemeral.clone()),
        )
        .await;
    }

    pub fn durable(&self) -> &MemoryStore {
        &self.durable
    }

    pub fn ephemeral(&self) -> &MemoryStore {
        &self.ephemeral
    }

    /// The raw value stored under `key` in either store.
    pub async fn stored(&self, key: &str) -> Option<String> {
        if let Ok(Some(value)) = self.durable.read(key).await {
            return Some(value);
        }
        self.ephemeral.read(key).await.ok().flatten()
    }

    pub fn current_title(&self) -> Option<&str> {
        self.session.current_story().map(|s| s.title.as_str())
    }

    /// Titles of the recent stories, most recent first.
    pub fn recent_titles(&self) -> Vec<&str> {
        self.session
            .recent_stories()
            .iter()
            .map(|s| s.title())
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the story on display has the given title.
#[track_caller]
pub fn assert_current_title(harness: &TestHarness, title: &str) {
    assert_eq!(
        harness.current_title(),
        Some(title),
        "Expected current story '{title}'"
    );
}

/// Assert there is no story on display.
#[track_caller]
pub fn assert_no_current_story(harness: &TestHarness) {
    assert!(
        harness.current_title().is_none(),
        "Expected no current story, got {:?}",
        harness.current_title()
    );
}

/// Assert the recent stories have exactly these titles, most recent first.
#[track_caller]
pub fn assert_recent_titles(harness: &TestHarness, titles: &[&str]) {
    assert_eq!(
        harness.recent_titles(),
        titles,
        "Recent stories did not match"
    );
}

/// Assert the session has nothing left to save.
#[track_caller]
pub fn assert_saved(harness: &TestHarness) {
    assert!(
        !harness.session.has_unsaved_changes(),
        "Expected all changes to be saved"
    );
}
