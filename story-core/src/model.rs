//! Story request, generated story and cache types.
//!
//! Everything here serializes with camelCase field names and kebab-case
//! enum values so that stored drafts keep the shape the wizard has always
//! written to its storage keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Maximum number of entries kept in the recent-stories list.
pub const RECENT_STORY_LIMIT: usize = 5;

// ============================================================================
// Enumerations
// ============================================================================

/// The child's gender, as chosen on the first wizard step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
    Boy,
    Girl,
}

/// How long the generated story should be.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoryLength {
    Short,
    #[default]
    Medium,
    Long,
}

/// Where the story takes place.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoryTheme {
    #[default]
    Adventure,
    Home,
    School,
}

/// A delivery format the user wants for the finished story.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum OutputFormat {
    TextOnly,
    IllustratedDigitalBook,
    AudioVersion,
    PrintablePdf,
}

impl OutputFormat {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::TextOnly => "Text Only",
            OutputFormat::IllustratedDigitalBook => "Illustrated Digital Book",
            OutputFormat::AudioVersion => "Audio Version",
            OutputFormat::PrintablePdf => "Printable PDF",
        }
    }
}

// ============================================================================
// Output format selection
// ============================================================================

/// An ordered, duplicate-free, never-empty set of output formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFormats", into = "Vec<OutputFormat>")]
pub struct OutputFormats(Vec<OutputFormat>);

impl OutputFormats {
    /// Build a selection, dropping duplicates and falling back to the default
    /// when nothing is selected.
    pub fn new(formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        let mut selected: Vec<OutputFormat> = Vec::new();
        for format in formats {
            if !selected.contains(&format) {
                selected.push(format);
            }
        }

        if selected.is_empty() {
            Self::default()
        } else {
            Self(selected)
        }
    }

    /// Build a selection from raw strings, ignoring values that are not a
    /// known format.
    pub fn from_values<S: AsRef<str>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            values
                .into_iter()
                .filter_map(|v| OutputFormat::from_str(v.as_ref().trim()).ok()),
        )
    }

    pub fn contains(&self, format: OutputFormat) -> bool {
        self.0.contains(&format)
    }

    pub fn iter(&self) -> impl Iterator<Item = OutputFormat> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[OutputFormat] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add `format` if absent, remove it if present.
    ///
    /// Removing the last selected format is rejected and returns `false`.
    pub fn toggle(&mut self, format: OutputFormat) -> bool {
        if let Some(pos) = self.0.iter().position(|f| *f == format) {
            if self.0.len() == 1 {
                return false;
            }
            self.0.remove(pos);
        } else {
            self.0.push(format);
        }
        true
    }
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self(vec![OutputFormat::TextOnly])
    }
}

impl From<OutputFormat> for OutputFormats {
    fn from(format: OutputFormat) -> Self {
        Self(vec![format])
    }
}

impl From<Vec<OutputFormat>> for OutputFormats {
    fn from(formats: Vec<OutputFormat>) -> Self {
        Self::new(formats)
    }
}

impl From<OutputFormats> for Vec<OutputFormat> {
    fn from(formats: OutputFormats) -> Self {
        formats.0
    }
}

/// Stored selections are either a single string (older drafts) or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFormats {
    One(String),
    Many(Vec<String>),
}

impl From<RawFormats> for OutputFormats {
    fn from(raw: RawFormats) -> Self {
        match raw {
            RawFormats::One(value) => Self::from_values([value]),
            RawFormats::Many(values) => Self::from_values(values),
        }
    }
}

// ============================================================================
// Story request
// ============================================================================

/// Information about the child the story is for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildInfo {
    pub name: String,

    /// Digits only once validated; kept as entered.
    pub age: String,

    #[serde(deserialize_with = "lenient_gender")]
    pub gender: Option<Gender>,

    pub favourite_pet: String,

    /// Comma-separated list of friends' names.
    pub friends_name: String,

    pub description: String,
}

/// Drafts written before a gender was picked store an empty string.
fn lenient_gender<'de, D>(deserializer: D) -> Result<Option<Gender>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Gender::from_str(s.trim()).ok()))
}

/// The values the story should teach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryValues {
    /// Why this story is being written.
    pub goal: String,
    pub tags: Vec<String>,
}

impl StoryValues {
    /// Add a tag the way the tag entry widget does: trimmed, ignoring empty
    /// and duplicate tags. Returns whether the tag was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Remove every occurrence of `tag`. Returns whether anything was removed.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryStyle {
    pub length: StoryLength,
    pub theme: StoryTheme,
    pub islamic_teaching: bool,
}

impl Default for StoryStyle {
    fn default() -> Self {
        Self {
            length: StoryLength::Medium,
            theme: StoryTheme::Adventure,
            islamic_teaching: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomDescription {
    pub personal_description: String,
}

/// The draft of the next generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryRequest {
    pub child_info: ChildInfo,
    pub story_values: StoryValues,
    pub story_style: StoryStyle,
    pub custom_description: CustomDescription,
    pub output_format: OutputFormats,
}

// ============================================================================
// Patches
// ============================================================================

/// Partial update for [`ChildInfo`]. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildInfoPatch {
    pub name: Option<String>,
    pub age: Option<String>,
    pub gender: Option<Gender>,
    pub favourite_pet: Option<String>,
    pub friends_name: Option<String>,
    pub description: Option<String>,
}

impl ChildInfoPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn age(mut self, age: impl Into<String>) -> Self {
        self.age = Some(age.into());
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn favourite_pet(mut self, pet: impl Into<String>) -> Self {
        self.favourite_pet = Some(pet.into());
        self
    }

    pub fn friends_name(mut self, friends: impl Into<String>) -> Self {
        self.friends_name = Some(friends.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Merge into `target`.
    pub fn apply(self, target: &mut ChildInfo) {
        if let Some(name) = self.name {
            target.name = name;
        }
        if let Some(age) = self.age {
            target.age = age;
        }
        if let Some(gender) = self.gender {
            target.gender = Some(gender);
        }
        if let Some(pet) = self.favourite_pet {
            target.favourite_pet = pet;
        }
        if let Some(friends) = self.friends_name {
            target.friends_name = friends;
        }
        if let Some(description) = self.description {
            target.description = description;
        }
    }
}

/// Partial update for [`StoryValues`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryValuesPatch {
    pub goal: Option<String>,
    /// Replaces the tag list as given; duplicates are kept.
    pub tags: Option<Vec<String>>,
}

impl StoryValuesPatch {
    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn apply(self, target: &mut StoryValues) {
        if let Some(goal) = self.goal {
            target.goal = goal;
        }
        if let Some(tags) = self.tags {
            target.tags = tags;
        }
    }
}

/// Partial update for [`StoryStyle`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryStylePatch {
    pub length: Option<StoryLength>,
    pub theme: Option<StoryTheme>,
    pub islamic_teaching: Option<bool>,
}

impl StoryStylePatch {
    pub fn length(mut self, length: StoryLength) -> Self {
        self.length = Some(length);
        self
    }

    pub fn theme(mut self, theme: StoryTheme) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn islamic_teaching(mut self, enabled: bool) -> Self {
        self.islamic_teaching = Some(enabled);
        self
    }

    pub fn apply(self, target: &mut StoryStyle) {
        if let Some(length) = self.length {
            target.length = length;
        }
        if let Some(theme) = self.theme {
            target.theme = theme;
        }
        if let Some(enabled) = self.islamic_teaching {
            target.islamic_teaching = enabled;
        }
    }
}

/// Partial update for [`CustomDescription`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomDescriptionPatch {
    pub personal_description: Option<String>,
}

impl CustomDescriptionPatch {
    pub fn personal_description(mut self, text: impl Into<String>) -> Self {
        self.personal_description = Some(text.into());
        self
    }

    pub fn apply(self, target: &mut CustomDescription) {
        if let Some(text) = self.personal_description {
            target.personal_description = text;
        }
    }
}

// ============================================================================
// Generated stories
// ============================================================================

/// A story returned by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub title: String,

    /// Paragraphs separated by blank lines; one paragraph per page.
    pub content: String,

    /// The output formats selected when the story was generated.
    pub format: OutputFormats,
}

impl GeneratedStory {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        format: OutputFormats,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            format,
        }
    }

    /// The story split into display pages.
    pub fn pages(&self) -> Vec<String> {
        crate::pages::split_into_pages(&self.content)
    }

    /// Fingerprint of the current content.
    pub fn signature(&self) -> String {
        content_signature(&self.content)
    }

    pub fn wants(&self, format: OutputFormat) -> bool {
        self.format.contains(format)
    }
}

/// A generated story together with when it was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentStory {
    #[serde(flatten)]
    pub story: GeneratedStory,
    pub created_at: DateTime<Utc>,
}

impl RecentStory {
    pub fn new(story: GeneratedStory, created_at: DateTime<Utc>) -> Self {
        Self { story, created_at }
    }

    pub fn title(&self) -> &str {
        &self.story.title
    }
}

/// Most-recent-first list of stories, unique by title and capped at
/// [`RECENT_STORY_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RecentStory>", into = "Vec<RecentStory>")]
pub struct RecentStories(Vec<RecentStory>);

impl RecentStories {
    /// Put `entry` at the front, replacing any entry with the same title and
    /// evicting the oldest beyond the cap.
    pub fn push(&mut self, entry: RecentStory) {
        self.0.retain(|s| s.story.title != entry.story.title);
        self.0.insert(0, entry);
        self.0.truncate(RECENT_STORY_LIMIT);
    }

    /// Replace the content of the entry titled `title`. Returns whether an
    /// entry was found.
    pub fn update_content(&mut self, title: &str, content: &str) -> bool {
        match self.0.iter_mut().find(|s| s.story.title == title) {
            Some(entry) => {
                entry.story.content = content.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&RecentStory> {
        self.0.get(index)
    }

    pub fn find(&self, title: &str) -> Option<&RecentStory> {
        self.0.iter().find(|s| s.story.title == title)
    }

    pub fn as_slice(&self) -> &[RecentStory] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<RecentStory>> for RecentStories {
    /// Stored lists are trusted only as far as their order: later duplicates
    /// and entries past the cap are dropped.
    fn from(entries: Vec<RecentStory>) -> Self {
        let mut kept: Vec<RecentStory> = Vec::new();
        for entry in entries {
            if kept.len() == RECENT_STORY_LIMIT {
                break;
            }
            if !kept.iter().any(|k| k.story.title == entry.story.title) {
                kept.push(entry);
            }
        }
        Self(kept)
    }
}

impl From<RecentStories> for Vec<RecentStory> {
    fn from(recent: RecentStories) -> Self {
        recent.0
    }
}

/// Cached narration audio for a story title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioCacheEntry {
    pub url: String,
    pub content_signature: String,
}

/// SHA-256 hex digest of story content.
pub fn content_signature(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn story(title: &str) -> GeneratedStory {
        GeneratedStory::new(title, "content", OutputFormats::default())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let request = StoryRequest::default();
        assert_eq!(request.story_style.length, StoryLength::Medium);
        assert_eq!(request.story_style.theme, StoryTheme::Adventure);
        assert!(request.story_style.islamic_teaching);
        assert_eq!(request.output_format.as_slice(), &[OutputFormat::TextOnly]);
        assert_eq!(request.child_info.gender, None);
    }

    #[test]
    fn test_output_formats_never_empty() {
        assert_eq!(OutputFormats::new(Vec::new()), OutputFormats::default());
        assert_eq!(
            OutputFormats::from_values(["bogus", ""]),
            OutputFormats::default()
        );
    }

    #[test]
    fn test_output_formats_dedupe_preserves_order() {
        let formats = OutputFormats::new([
            OutputFormat::AudioVersion,
            OutputFormat::TextOnly,
            OutputFormat::AudioVersion,
        ]);
        assert_eq!(
            formats.as_slice(),
            &[OutputFormat::AudioVersion, OutputFormat::TextOnly]
        );
    }

    #[test]
    fn test_output_formats_toggle_rejects_last() {
        let mut formats = OutputFormats::default();
        assert!(!formats.toggle(OutputFormat::TextOnly));
        assert_eq!(formats.len(), 1);

        assert!(formats.toggle(OutputFormat::PrintablePdf));
        assert!(formats.toggle(OutputFormat::TextOnly));
        assert_eq!(formats.as_slice(), &[OutputFormat::PrintablePdf]);
    }

    #[test]
    fn test_output_formats_accepts_single_string() {
        let formats: OutputFormats = serde_json::from_str("\"audio-version\"").unwrap();
        assert_eq!(formats.as_slice(), &[OutputFormat::AudioVersion]);

        let formats: OutputFormats =
            serde_json::from_str("[\"printable-pdf\", \"nope\", \"text-only\"]").unwrap();
        assert_eq!(
            formats.as_slice(),
            &[OutputFormat::PrintablePdf, OutputFormat::TextOnly]
        );

        let formats: OutputFormats = serde_json::from_str("[]").unwrap();
        assert_eq!(formats, OutputFormats::default());
    }

    #[test]
    fn test_stored_draft_shape() {
        let json = serde_json::json!({
            "childInfo": {
                "name": "Yusuf",
                "age": "7",
                "gender": "",
                "favouritePet": "Cat",
                "friendsName": "Ali, Sara",
                "description": ""
            },
            "storyValues": { "goal": "Honesty", "tags": ["truth"] },
            "storyStyle": { "length": "long", "theme": "school", "islamicTeaching": false },
            "customDescription": { "personalDescription": "Loves trains", "tags": [] },
            "outputFormat": "text-only"
        });

        let request: StoryRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.child_info.name, "Yusuf");
        assert_eq!(request.child_info.gender, None);
        assert_eq!(request.story_style.length, StoryLength::Long);
        assert!(!request.story_style.islamic_teaching);
        assert_eq!(request.custom_description.personal_description, "Loves trains");

        let out = serde_json::to_value(&request).unwrap();
        assert_eq!(out["childInfo"]["favouritePet"], "Cat");
        assert_eq!(out["outputFormat"], serde_json::json!(["text-only"]));
    }

    #[test]
    fn test_patch_preserves_unset_fields() {
        let mut info = ChildInfo {
            name: "Maryam".to_string(),
            age: "5".to_string(),
            ..Default::default()
        };

        ChildInfoPatch::default()
            .gender(Gender::Girl)
            .favourite_pet("Rabbit")
            .apply(&mut info);

        assert_eq!(info.name, "Maryam");
        assert_eq!(info.age, "5");
        assert_eq!(info.gender, Some(Gender::Girl));
        assert_eq!(info.favourite_pet, "Rabbit");
    }

    #[test]
    fn test_add_tag_filters_duplicates() {
        let mut values = StoryValues::default();
        assert!(values.add_tag(" kindness "));
        assert!(!values.add_tag("kindness"));
        assert!(!values.add_tag("   "));
        assert!(values.add_tag("patience"));
        assert_eq!(values.tags, vec!["kindness", "patience"]);

        assert!(values.remove_tag("kindness"));
        assert!(!values.remove_tag("kindness"));
    }

    #[test]
    fn test_recent_stories_dedupe_and_cap() {
        let mut recent = RecentStories::default();
        for i in 0..6 {
            recent.push(RecentStory::new(story(&format!("Story {i}")), at(i)));
        }
        assert_eq!(recent.len(), RECENT_STORY_LIMIT);
        assert_eq!(recent.get(0).unwrap().title(), "Story 5");
        assert!(recent.find("Story 0").is_none());

        recent.push(RecentStory::new(story("Story 3"), at(10)));
        assert_eq!(recent.len(), RECENT_STORY_LIMIT);
        assert_eq!(recent.get(0).unwrap().title(), "Story 3");
        assert_eq!(recent.get(0).unwrap().created_at, at(10));
        let titles: Vec<_> = recent.as_slice().iter().map(|s| s.title()).collect();
        assert_eq!(titles.iter().filter(|t| **t == "Story 3").count(), 1);
    }

    #[test]
    fn test_recent_stories_normalized_on_load() {
        let entries: Vec<RecentStory> = ["A", "B", "A", "C", "D", "E", "F"]
            .iter()
            .enumerate()
            .map(|(i, t)| RecentStory::new(story(t), at(i as i64)))
            .collect();
        let json = serde_json::to_string(&entries).unwrap();

        let recent: RecentStories = serde_json::from_str(&json).unwrap();
        let titles: Vec<_> = recent.as_slice().iter().map(|s| s.title()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_recent_story_json_is_flat() {
        let entry = RecentStory::new(story("Flat"), at(0));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["title"], "Flat");
        assert_eq!(value["format"], serde_json::json!(["text-only"]));
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_content_signature() {
        assert_eq!(content_signature("abc"), content_signature("abc"));
        assert_ne!(content_signature("abc"), content_signature("abd"));
        assert_eq!(content_signature("").len(), 64);
    }
}
