//! Form validation for the wizard steps.
//!
//! These rules gate navigation between steps. The session and the gateway
//! never call them: a draft that fails validation can still be stored and
//! sent.

use crate::model::{ChildInfo, StoryRequest, StoryValues};
use std::fmt;

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The camelCase field name, as stored.
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the child information step.
pub fn validate_child_info(child: &ChildInfo) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if child.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "Name is required"));
    }

    let age = child.age.trim();
    if age.is_empty() {
        errors.push(ValidationError::new("age", "Age is required"));
    } else if !age.chars().all(|c| c.is_ascii_digit()) {
        errors.push(ValidationError::new("age", "Age must be a number"));
    }

    if child.gender.is_none() {
        errors.push(ValidationError::new("gender", "Gender is required"));
    }

    errors
}

/// Validate the story values step.
pub fn validate_story_values(values: &StoryValues) -> Vec<ValidationError> {
    if values.goal.trim().is_empty() {
        vec![ValidationError::new("goal", "Story goal is required")]
    } else {
        Vec::new()
    }
}

/// Validate every step of a draft.
pub fn validate_request(request: &StoryRequest) -> Vec<ValidationError> {
    let mut errors = validate_child_info(&request.child_info);
    errors.extend(validate_story_values(&request.story_values));
    errors
}
