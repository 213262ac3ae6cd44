//! StorySession - the single source of truth for a wizard session.
//!
//! A session owns the draft request, the story on display, the recent
//! stories and the narration cache. Mutations only change memory and mark
//! storage keys as pending; [`StorySession::save`] is the persistence
//! boundary that flushes them to the injected stores.

use crate::error::SessionError;
use crate::gateway::{self, StoryBackend};
use crate::model::{
    content_signature, AudioCacheEntry, ChildInfoPatch, CustomDescriptionPatch, GeneratedStory,
    OutputFormat, OutputFormats, RecentStories, RecentStory, StoryRequest, StoryStylePatch,
    StoryValuesPatch,
};
use crate::persist::{
    KeyValueStore, AUDIO_CACHE_KEY, CURRENT_STORY_KEY, RECENT_STORIES_KEY, STORY_REQUEST_KEY,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use story_api::{BackendStory, StoryRequestBody};
use tracing::{debug, info, warn};

/// Where a generation request currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating { seq: u64 },
}

/// An issued generation request.
///
/// Only the most recently issued ticket may apply its result to the
/// session; older tickets are discarded when they finish.
#[derive(Debug)]
pub struct GenerationTicket {
    seq: u64,
    body: StoryRequestBody,
    format: OutputFormats,
}

impl GenerationTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The request body to send to the backend.
    pub fn body(&self) -> &StoryRequestBody {
        &self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Write,
    Remove,
}

/// A story wizard session.
pub struct StorySession {
    request: StoryRequest,
    current_story: Option<GeneratedStory>,
    recent: RecentStories,
    audio_cache: BTreeMap<String, AudioCacheEntry>,

    durable: Box<dyn KeyValueStore>,
    ephemeral: Box<dyn KeyValueStore>,
    pending: BTreeMap<&'static str, Pending>,

    state: GenerationState,
    latest_seq: u64,
    last_error: Option<String>,
}

impl StorySession {
    /// Create a session with default state, ignoring anything stored.
    pub fn new(durable: Box<dyn KeyValueStore>, ephemeral: Box<dyn KeyValueStore>) -> Self {
        Self {
            request: StoryRequest::default(),
            current_story: None,
            recent: RecentStories::default(),
            audio_cache: BTreeMap::new(),
            durable,
            ephemeral,
            pending: BTreeMap::new(),
            state: GenerationState::Idle,
            latest_seq: 0,
            last_error: None,
        }
    }

    /// Create a session, restoring whatever the stores hold.
    ///
    /// Missing, unreadable or malformed entries are logged and replaced by
    /// defaults.
    pub async fn load(durable: Box<dyn KeyValueStore>, ephemeral: Box<dyn KeyValueStore>) -> Self {
        let request = read_json(durable.as_ref(), STORY_REQUEST_KEY)
            .await
            .unwrap_or_default();
        let recent = read_json(durable.as_ref(), RECENT_STORIES_KEY)
            .await
            .unwrap_or_default();
        let current_story = read_json(ephemeral.as_ref(), CURRENT_STORY_KEY).await;
        let audio_cache = read_json(ephemeral.as_ref(), AUDIO_CACHE_KEY)
            .await
            .unwrap_or_default();

        let mut session = Self::new(durable, ephemeral);
        session.request = request;
        session.recent = recent;
        session.current_story = current_story;
        session.audio_cache = audio_cache;

        debug!(
            recent = session.recent.len(),
            has_current = session.current_story.is_some(),
            "session loaded"
        );
        session
    }

    // ------------------------------------------------------------------------
    // Draft request
    // ------------------------------------------------------------------------

    pub fn request(&self) -> &StoryRequest {
        &self.request
    }

    pub fn update_child_info(&mut self, patch: ChildInfoPatch) {
        patch.apply(&mut self.request.child_info);
        self.mark(STORY_REQUEST_KEY, Pending::Write);
    }

    pub fn update_story_values(&mut self, patch: StoryValuesPatch) {
        patch.apply(&mut self.request.story_values);
        self.mark(STORY_REQUEST_KEY, Pending::Write);
    }

    pub fn update_story_style(&mut self, patch: StoryStylePatch) {
        patch.apply(&mut self.request.story_style);
        self.mark(STORY_REQUEST_KEY, Pending::Write);
    }

    pub fn update_custom_description(&mut self, patch: CustomDescriptionPatch) {
        patch.apply(&mut self.request.custom_description);
        self.mark(STORY_REQUEST_KEY, Pending::Write);
    }

    /// Add a tag, ignoring blanks and duplicates. Returns whether it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let added = self.request.story_values.add_tag(tag);
        if added {
            self.mark(STORY_REQUEST_KEY, Pending::Write);
        }
        added
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let removed = self.request.story_values.remove_tag(tag);
        if removed {
            self.mark(STORY_REQUEST_KEY, Pending::Write);
        }
        removed
    }

    /// Replace the output format selection.
    ///
    /// Accepts a single format (`Some(f)`, `[f]`) or any list; an empty
    /// selection becomes the default.
    pub fn update_output_format(&mut self, selection: impl IntoIterator<Item = OutputFormat>) {
        self.request.output_format = OutputFormats::new(selection);
        self.mark(STORY_REQUEST_KEY, Pending::Write);
    }

    /// Start a new story: the draft, the current story and the audio cache
    /// are cleared along with their storage keys. Recent stories are kept.
    pub fn reset_story_data(&mut self) {
        self.request = StoryRequest::default();
        self.current_story = None;
        self.audio_cache.clear();
        self.last_error = None;

        self.mark(STORY_REQUEST_KEY, Pending::Remove);
        self.mark(CURRENT_STORY_KEY, Pending::Remove);
        self.mark(AUDIO_CACHE_KEY, Pending::Remove);
        info!("story data reset");
    }

    // ------------------------------------------------------------------------
    // Current and recent stories
    // ------------------------------------------------------------------------

    pub fn current_story(&self) -> Option<&GeneratedStory> {
        self.current_story.as_ref()
    }

    /// Pages of the current story, or nothing if there is none.
    pub fn current_pages(&self) -> Vec<String> {
        self.current_story
            .as_ref()
            .map(GeneratedStory::pages)
            .unwrap_or_default()
    }

    pub fn recent_stories(&self) -> &[RecentStory] {
        self.recent.as_slice()
    }

    /// Replace the content of the current story.
    ///
    /// The matching recent-story entry picks up the new content and any
    /// cached narration for the title is dropped. Returns `false` (and
    /// changes nothing) when there is no current story.
    pub fn update_current_story_content(&mut self, content: impl Into<String>) -> bool {
        let Some(story) = self.current_story.as_mut() else {
            return false;
        };

        story.content = content.into();
        let title = story.title.clone();
        let content = story.content.clone();
        self.mark(CURRENT_STORY_KEY, Pending::Write);

        if self.recent.update_content(&title, &content) {
            self.mark(RECENT_STORIES_KEY, Pending::Write);
        }

        if self.audio_cache.remove(&title).is_some() {
            debug!(title = %title, "audio cache invalidated by edit");
            self.mark(AUDIO_CACHE_KEY, Pending::Write);
        }

        true
    }

    /// Show a recent story without regenerating it.
    pub fn select_recent_story(&mut self, story: &RecentStory) {
        self.current_story = Some(story.story.clone());
        self.mark(CURRENT_STORY_KEY, Pending::Write);
    }

    /// Show the recent story at `index` (0 is the newest).
    pub fn select_recent(&mut self, index: usize) -> Option<&GeneratedStory> {
        let entry = self.recent.get(index)?.clone();
        self.select_recent_story(&entry);
        self.current_story.as_ref()
    }

    // ------------------------------------------------------------------------
    // Audio cache
    // ------------------------------------------------------------------------

    /// The cached narration URL for `title`, if it was generated from exactly
    /// this `content`.
    pub fn cached_audio_url(&self, title: &str, content: &str) -> Option<&str> {
        let entry = self.audio_cache.get(title)?;
        if entry.content_signature == content_signature(content) {
            Some(entry.url.as_str())
        } else {
            None
        }
    }

    /// Cache `url` as the narration of `content`, or drop the entry for
    /// `title` when `url` is `None`.
    pub fn cache_audio_for_story(&mut self, title: &str, content: &str, url: Option<String>) {
        match url {
            Some(url) => {
                self.audio_cache.insert(
                    title.to_string(),
                    AudioCacheEntry {
                        url,
                        content_signature: content_signature(content),
                    },
                );
            }
            None => {
                self.audio_cache.remove(title);
            }
        }
        self.mark(AUDIO_CACHE_KEY, Pending::Write);
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Whether a generation is in flight.
    ///
    /// A ticket that is never finished, such as one whose `generate_story`
    /// future was dropped mid-request, leaves the state `Generating` until
    /// the next generation begins and finishes.
    pub fn generation_state(&self) -> GenerationState {
        self.state
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, GenerationState::Generating { .. })
    }

    /// Message of the most recent failed generation, cleared on the next
    /// attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Issue a generation request from the current draft.
    ///
    /// Any previously issued ticket becomes stale.
    pub fn begin_generation(&mut self) -> GenerationTicket {
        self.latest_seq += 1;
        let seq = self.latest_seq;
        self.state = GenerationState::Generating { seq };
        self.last_error = None;

        info!(seq, child = %self.request.child_info.name, "story generation started");
        GenerationTicket {
            seq,
            body: self.request.to_backend_request(),
            format: self.request.output_format.clone(),
        }
    }

    /// Apply the backend's answer to `ticket`.
    ///
    /// A stale ticket is discarded without touching the session. On failure
    /// the current and recent stories are left as they were.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<BackendStory, story_api::Error>,
    ) -> Result<GeneratedStory, SessionError> {
        if ticket.seq != self.latest_seq {
            debug!(seq = ticket.seq, latest = self.latest_seq, "discarding stale generation");
            return Err(SessionError::Superseded { seq: ticket.seq });
        }
        self.state = GenerationState::Idle;

        let backend_story = match result {
            Ok(story) => story,
            Err(e) => {
                let err = SessionError::from(e);
                warn!(seq = ticket.seq, error = %err, "story generation failed");
                self.last_error = Some(err.user_message());
                return Err(err);
            }
        };

        let story = GeneratedStory::new(backend_story.title, backend_story.text, ticket.format);
        info!(seq = ticket.seq, title = %story.title, "story generated");

        self.current_story = Some(story.clone());
        self.recent.push(RecentStory::new(story.clone(), Utc::now()));
        self.mark(CURRENT_STORY_KEY, Pending::Write);
        self.mark(RECENT_STORIES_KEY, Pending::Write);

        Ok(story)
    }

    /// Generate a story from the current draft with a single backend call.
    pub async fn generate_story(
        &mut self,
        backend: &dyn StoryBackend,
    ) -> Result<GeneratedStory, SessionError> {
        let ticket = self.begin_generation();
        let result = backend.generate_story(ticket.body()).await;
        self.finish_generation(ticket, result)
    }

    /// Narration for the current story, served from the cache when the
    /// content has not changed since it was generated.
    pub async fn narrate_current_story(
        &mut self,
        backend: &dyn StoryBackend,
    ) -> Result<String, SessionError> {
        let story = self
            .current_story
            .clone()
            .ok_or(SessionError::NoCurrentStory)?;

        if let Some(url) = self.cached_audio_url(&story.title, &story.content) {
            debug!(title = %story.title, "serving cached narration");
            return Ok(url.to_string());
        }

        let url = gateway::generate_audio(backend, &story.title, &story.content).await?;
        self.cache_audio_for_story(&story.title, &story.content, Some(url.clone()));
        Ok(url)
    }

    /// Illustrations for the current story.
    pub async fn illustrate_current_story(
        &self,
        backend: &dyn StoryBackend,
    ) -> Result<Vec<String>, SessionError> {
        let story = self
            .current_story
            .as_ref()
            .ok_or(SessionError::NoCurrentStory)?;
        gateway::generate_illustrations(backend, &story.title, &story.content).await
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Whether any change has not yet been written.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flush pending changes to the stores.
    ///
    /// Failures are logged and the key stays pending so a later save can
    /// retry; they are never returned to the caller.
    pub async fn save(&mut self) {
        let pending: Vec<(&'static str, Pending)> =
            self.pending.iter().map(|(k, p)| (*k, *p)).collect();

        for (key, action) in pending {
            let store = match key {
                STORY_REQUEST_KEY | RECENT_STORIES_KEY => self.durable.as_ref(),
                _ => self.ephemeral.as_ref(),
            };

            let outcome = match action {
                Pending::Remove => store.remove(key).await,
                Pending::Write => match self.serialize(key) {
                    Ok(Some(json)) => store.write(key, &json).await,
                    Ok(None) => store.remove(key).await,
                    Err(e) => Err(e.into()),
                },
            };

            match outcome {
                Ok(()) => {
                    self.pending.remove(key);
                }
                Err(e) => warn!(key, error = %e, "failed to persist session state"),
            }
        }
    }

    fn serialize(&self, key: &str) -> Result<Option<String>, serde_json::Error> {
        match key {
            STORY_REQUEST_KEY => serde_json::to_string(&self.request).map(Some),
            RECENT_STORIES_KEY => serde_json::to_string(&self.recent).map(Some),
            CURRENT_STORY_KEY => self
                .current_story
                .as_ref()
                .map(serde_json::to_string)
                .transpose(),
            AUDIO_CACHE_KEY => serde_json::to_string(&self.audio_cache).map(Some),
            _ => Ok(None),
        }
    }

    fn mark(&mut self, key: &'static str, action: Pending) {
        self.pending.insert(key, action);
    }
}

async fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.read(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "failed to read stored session state");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding malformed stored session state");
            None
        }
    }
}
