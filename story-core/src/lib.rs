//! Story wizard engine.
//!
//! This crate provides:
//! - The session state container behind the story wizard
//! - A generation gateway over the story backend
//! - Durable and ephemeral persistence adapters
//! - Pagination, form validation and test utilities
//!
//! # Quick Start
//!
//! ```ignore
//! use story_core::{ChildInfoPatch, FileStore, MemoryStore, StorySession};
//! use story_api::StoryApi;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = StoryApi::from_env()?;
//!     let mut session = StorySession::load(
//!         Box::new(FileStore::new("./story-data")),
//!         Box::new(MemoryStore::new()),
//!     )
//!     .await;
//!
//!     session.update_child_info(ChildInfoPatch::default().name("Yusuf").age("5"));
//!     let story = session.generate_story(&api).await?;
//!     println!("{}", story.title);
//!
//!     session.save().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod gateway;
pub mod model;
pub mod pages;
pub mod persist;
pub mod request;
pub mod session;
pub mod testing;
pub mod validate;

// Primary public API
pub use error::SessionError;
pub use gateway::{AudioResult, GenerationResult, IllustrationResult, StoryBackend};
pub use model::{
    AudioCacheEntry, ChildInfo, ChildInfoPatch, CustomDescription, CustomDescriptionPatch,
    GeneratedStory, Gender, OutputFormat, OutputFormats, RecentStory, StoryLength, StoryRequest,
    StoryStyle, StoryStylePatch, StoryTheme, StoryValues, StoryValuesPatch,
};
pub use persist::{FileStore, KeyValueStore, MemoryStore, PersistError};
pub use session::{GenerationState, GenerationTicket, StorySession};
pub use testing::{MockBackend, TestHarness};
pub use validate::ValidationError;
