//! Integration tests for the SQLite store backend
//!
//! Uses a temporary on-disk database per test so schema init, ordering and
//! not-found behavior are exercised against real SQLite.

use studyhall_common::models::{
    Difficulty, FlashcardPatch, NewChapter, NewFlashcard, NewSubject, NewSubtopic, NewTopic,
    SubtopicPatch, TitlePatch,
};
use studyhall_common::store::{RemoteStore, SessionEvent, SqliteStore};
use studyhall_common::Error;
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> SqliteStore {
    SqliteStore::connect(&dir.path().join("studyhall.db"))
        .await
        .expect("store should open")
}

#[tokio::test]
async fn test_schema_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studyhall.db");

    let first = SqliteStore::connect(&path).await.unwrap();
    first
        .insert_subject(NewSubject { title: "Science".into(), id: Some("sci".into()) })
        .await
        .unwrap();
    drop(first);

    // Reopening must not lose rows or fail on existing tables
    let second = SqliteStore::connect(&path).await.unwrap();
    let subjects = second.list_subjects().await.unwrap();
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0].id, "sci");
}

#[tokio::test]
async fn test_listing_order_is_creation_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    // Inserted within the same clock tick; rowid breaks the tie
    for title in ["First", "Second", "Third", "Fourth"] {
        store
            .insert_subject(NewSubject { title: title.into(), id: None })
            .await
            .unwrap();
    }

    let titles: Vec<String> = store
        .list_subjects()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, ["First", "Second", "Third", "Fourth"]);
}

#[tokio::test]
async fn test_full_hierarchy_crud() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store
        .insert_subject(NewSubject { title: "Science".into(), id: Some("sci".into()) })
        .await
        .unwrap();
    store
        .insert_chapter(NewChapter {
            title: "Reactions".into(),
            id: Some("ch1".into()),
            subject_id: "sci".into(),
        })
        .await
        .unwrap();
    store
        .insert_topic(NewTopic {
            title: "Intro".into(),
            id: Some("t1".into()),
            chapter_id: "ch1".into(),
        })
        .await
        .unwrap();
    let subtopic = store
        .insert_subtopic(NewSubtopic {
            title: "Basics".into(),
            id: Some("st1".into()),
            topic_id: "t1".into(),
            video_url: None,
            summary: None,
        })
        .await
        .unwrap();
    assert_eq!(subtopic.id, "st1");

    store
        .update_subtopic(
            "st1",
            SubtopicPatch {
                title: "Basics, revised".into(),
                video_url: Some("https://example.com/v.mp4".into()),
                summary: Some("A summary".into()),
            },
        )
        .await
        .unwrap();

    let subtopics = store.list_subtopics().await.unwrap();
    assert_eq!(subtopics[0].title, "Basics, revised");
    assert_eq!(subtopics[0].video_url.as_deref(), Some("https://example.com/v.mp4"));

    store.delete_subtopic("st1").await.unwrap();
    assert!(store.list_subtopics().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_and_delete_missing_rows_are_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let err = store
        .update_subject("ghost", TitlePatch { title: "x".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert!(matches!(store.delete_chapter("ghost").await.unwrap_err(), Error::NotFound(_)));
    assert!(matches!(store.delete_topic("ghost").await.unwrap_err(), Error::NotFound(_)));
    assert!(matches!(store.delete_flashcard("ghost").await.unwrap_err(), Error::NotFound(_)));
}

#[tokio::test]
async fn test_flashcard_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let card = store
        .insert_flashcard(
            "ch1",
            NewFlashcard {
                question: "What is H2O?".into(),
                answer: "Water".into(),
                difficulty: Difficulty::Easy,
                tags: vec!["chemistry".into(), "basics".into()],
            },
        )
        .await
        .unwrap();
    assert!(card.updated_at.is_none());

    let listed = store.list_flashcards("ch1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].question, "What is H2O?");
    assert_eq!(listed[0].difficulty, Difficulty::Easy);
    assert_eq!(listed[0].tags, vec!["chemistry", "basics"]);

    store
        .update_flashcard(
            &card.id,
            FlashcardPatch {
                question: "What is H2O called?".into(),
                answer: "Water".into(),
                difficulty: Difficulty::Medium,
                tags: None,
            },
        )
        .await
        .unwrap();

    let updated = &store.list_flashcards("ch1").await.unwrap()[0];
    assert_eq!(updated.question, "What is H2O called?");
    // Tags untouched when the patch omits them
    assert_eq!(updated.tags, vec!["chemistry", "basics"]);
    assert!(updated.updated_at.is_some());

    // Scoped listing excludes other chapters
    assert!(store.list_flashcards("other").await.unwrap().is_empty());
    assert_eq!(store.list_all_flashcards().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_local_session_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    assert!(store.get_session().await.unwrap().is_none());

    let mut rx = store.subscribe_sessions();
    store.sign_in_with_provider("local").await.unwrap();

    match rx.recv().await.unwrap() {
        SessionEvent::SignedIn { identity } => assert_eq!(identity.display_name, "Local User"),
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(store.get_session().await.unwrap().is_some());

    store.sign_out().await.unwrap();
    assert!(matches!(rx.recv().await.unwrap(), SessionEvent::SignedOut));
    assert!(store.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_unconfigured_provider_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let err = store.sign_in_with_provider("google").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(store.get_session().await.unwrap().is_none());
}
