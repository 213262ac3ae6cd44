//! End-to-end wizard flows against an in-process story backend.
//!
//! A small axum server stands in for the generation, narration and
//! illustration endpoints so the real HTTP client is exercised.
//! Run with: `cargo test -p story-core --test session_flow`

use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use story_api::{StoryApi, StoryRequestBody};
use story_core::persist::{CURRENT_STORY_KEY, RECENT_STORIES_KEY};
use story_core::testing::{
    assert_current_title, assert_no_current_story, assert_recent_titles, TestHarness,
};
use story_core::{
    ChildInfoPatch, GenerationResult, MemoryStore, OutputFormat, StorySession, StoryValuesPatch,
};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

fn memory_session() -> StorySession {
    StorySession::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
}

// =============================================================================
// Generation against the HTTP backend
// =============================================================================

#[tokio::test]
async fn test_backend_failure_leaves_state_untouched() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/story/generate",
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Json(serde_json::json!({"title": "First", "text": "Once."})).into_response()
                } else {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({"error": "boom"})),
                    )
                        .into_response()
                }
            }
        }),
    );
    let api = StoryApi::new(serve(router).await).expect("Failed to build client");
    let mut session = memory_session();

    session.generate_story(&api).await.expect("first generation");
    let before_current = session.current_story().cloned();
    let before_recent = session.recent_stories().to_vec();

    let result = GenerationResult::from(session.generate_story(&api).await);

    assert_eq!(
        result,
        GenerationResult {
            success: false,
            story: None,
            error: Some("boom".to_string()),
        }
    );
    assert_eq!(session.current_story().cloned(), before_current);
    assert_eq!(session.recent_stories(), before_recent.as_slice());
    assert!(!session.is_generating());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_two_paragraph_story_has_two_pages() {
    let router = Router::new().route(
        "/story/generate",
        post(|Json(body): Json<StoryRequestBody>| async move {
            assert_eq!(
                body.child_information.friends_names,
                Some(vec![
                    "Lena".to_string(),
                    "Dania".to_string(),
                    "sarah".to_string()
                ])
            );
            Json(serde_json::json!({"title": "T", "text": "Para1\n\nPara2"}))
        }),
    );
    let api = StoryApi::new(serve(router).await).expect("Failed to build client");
    let mut session = memory_session();

    session.update_child_info(
        ChildInfoPatch::default()
            .name("Hana")
            .friends_name("Lena, Dania, sarah"),
    );
    session.update_output_format([OutputFormat::TextOnly]);

    let result = GenerationResult::from(session.generate_story(&api).await);
    assert!(result.success);

    let story = session.current_story().expect("current story");
    assert_eq!(story.title, "T");
    assert_eq!(story.format.as_slice(), &[OutputFormat::TextOnly]);
    assert_eq!(session.current_pages(), vec!["Para1", "Para2"]);
}

#[tokio::test]
async fn test_unreachable_backend_reports_unexpected_error() {
    let api = StoryApi::new("http://127.0.0.1:1").expect("Failed to build client");
    let mut session = memory_session();

    let err = session.generate_story(&api).await.unwrap_err();

    assert_eq!(err.user_message(), "Unexpected error generating story");
    assert!(err.to_string().contains("127.0.0.1:1"));
    assert_eq!(session.last_error(), Some("Unexpected error generating story"));
    assert!(session.current_story().is_none());
    assert!(session.recent_stories().is_empty());
}

#[tokio::test]
async fn test_narration_is_cached_until_content_changes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new()
        .route(
            "/story/generate",
            post(|| async { Json(serde_json::json!({"title": "Moon", "text": "Goodnight."})) }),
        )
        .route(
            "/narration/stream",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let text = params.get("text").cloned().unwrap_or_default();
                    ([(header::CONTENT_TYPE, "audio/wav")], text.into_bytes())
                }
            }),
        );
    let api = StoryApi::new(serve(router).await).expect("Failed to build client");
    let mut session = memory_session();
    session.generate_story(&api).await.expect("generation");

    let first = session.narrate_current_story(&api).await.expect("narration");
    let second = session.narrate_current_story(&api).await.expect("cached narration");
    assert_eq!(first, second);
    assert!(first.starts_with("data:audio/wav;base64,"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(session.update_current_story_content("Goodnight, moon."));
    let third = session.narrate_current_story(&api).await.expect("fresh narration");
    assert_ne!(third, first);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_illustrations_for_current_story() {
    let router = Router::new()
        .route(
            "/story/generate",
            post(|| async { Json(serde_json::json!({"title": "Sea", "text": "Waves."})) }),
        )
        .route(
            "/generate-illustrations",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["title"], "Sea");
                Json(serde_json::json!({"images": ["data:image/png;base64,AA"]}))
            }),
        );
    let api = StoryApi::new(serve(router).await).expect("Failed to build client");
    let mut session = memory_session();

    assert!(session.illustrate_current_story(&api).await.is_err());

    session.generate_story(&api).await.expect("generation");
    let images = session.illustrate_current_story(&api).await.expect("images");
    assert_eq!(images, vec!["data:image/png;base64,AA".to_string()]);
}

// =============================================================================
// Scripted scenarios over the test harness
// =============================================================================

#[tokio::test]
async fn test_recent_stories_dedupe_and_cap() {
    let mut harness = TestHarness::new();
    for title in ["A", "B", "C", "D", "E", "F", "C"] {
        harness.expect_story(title, format!("Story {title}"));
    }

    for _ in 0..7 {
        harness.generate().await.expect("generation");
    }

    assert_recent_titles(&harness, &["C", "F", "E", "D", "B"]);
    assert_current_title(&harness, "C");
}

#[tokio::test]
async fn test_empty_draft_still_reaches_backend() {
    let mut harness = TestHarness::new();
    harness.expect_failure(422, "Child name is required");

    let result = GenerationResult::from(harness.generate().await);

    assert_eq!(result.error.as_deref(), Some("Child name is required"));
    let request = harness.backend.last_request().await.expect("request sent");
    assert_eq!(request.child_information.name, "");
    assert_eq!(harness.session.last_error(), Some("Child name is required"));
}

#[tokio::test]
async fn test_reset_clears_draft_keys_but_keeps_recent() {
    let mut harness = TestHarness::new();
    harness.session.update_child_info(ChildInfoPatch::default().name("Idris"));
    harness
        .session
        .update_story_values(StoryValuesPatch::default().goal("Be kind"));
    harness.expect_story("Kindness", "Be kind.");
    harness.generate().await.expect("generation");
    harness.save().await;

    assert!(harness.stored("storyGenerationData").await.is_some());
    assert!(harness.stored(CURRENT_STORY_KEY).await.is_some());

    harness.session.reset_story_data();
    assert_no_current_story(&harness);
    harness.save().await;

    assert!(harness.stored("storyGenerationData").await.is_none());
    assert!(harness.stored(CURRENT_STORY_KEY).await.is_none());
    assert!(harness.stored(RECENT_STORIES_KEY).await.is_some());

    harness.reload().await;
    assert_recent_titles(&harness, &["Kindness"]);
    assert_eq!(harness.session.request().child_info.name, "");
}

#[tokio::test]
async fn test_selecting_recent_story_restores_it() {
    let mut harness = TestHarness::new();
    harness.expect_story("Old", "old").expect_story("New", "new");
    harness.generate().await.expect("generation");
    harness.generate().await.expect("generation");

    harness.session.select_recent(1);

    assert_current_title(&harness, "Old");
    assert_recent_titles(&harness, &["New", "Old"]);
    assert_eq!(harness.backend.requests().await.len(), 2);
}
