//! Mapping the wizard draft onto the backend's request schema.

use crate::model::StoryRequest;
use story_api::{ChildInformation, StoryRequestBody};
use tracing::debug;

impl StoryRequest {
    /// Build the body sent to the story generation endpoint.
    ///
    /// Empty optional fields are omitted rather than sent as empty strings.
    pub fn to_backend_request(&self) -> StoryRequestBody {
        let child = &self.child_info;

        StoryRequestBody {
            child_information: ChildInformation {
                name: child.name.clone(),
                favorite_pet_name: non_empty(&child.favourite_pet),
                friends_names: parse_friends(&child.friends_name),
                age: parse_age(&child.age),
                gender: child.gender.map(|g| g.to_string()),
                description: non_empty(&child.description),
            },
            story_goal: self.story_values.goal.clone(),
            tags: if self.story_values.tags.is_empty() {
                None
            } else {
                Some(self.story_values.tags.clone())
            },
            story_length: self.story_style.length.to_string(),
            story_theme: self.story_style.theme.to_string(),
            include_islamic_teaching: self.story_style.islamic_teaching,
            additional_instructions: non_empty(&self.custom_description.personal_description),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a comma-separated list of names, trimming and dropping blanks.
pub fn parse_friends(raw: &str) -> Option<Vec<String>> {
    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// Parse the age field; absent or non-numeric ages are omitted.
pub fn parse_age(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(age) => Some(age),
        Err(_) => {
            debug!(age = trimmed, "dropping non-numeric age from request");
            None
        }
    }
}
