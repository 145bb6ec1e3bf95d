//! Integration tests for curriculum fetch over the store boundary
//!
//! Includes a failing-store double to verify that a single collection read
//! failure aborts the whole assembly with no partial tree.

use async_trait::async_trait;
use studyhall_common::curriculum::fetch_curriculum;
use studyhall_common::models::*;
use studyhall_common::store::{MemoryStore, RemoteStore, SessionEvent};
use studyhall_common::{Error, Result};
use tokio::sync::broadcast;

/// Delegates everything to a MemoryStore but fails one collection read
struct BrokenSubtopics {
    inner: MemoryStore,
}

#[async_trait]
impl RemoteStore for BrokenSubtopics {
    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        self.inner.list_subjects().await
    }
    async fn insert_subject(&self, new: NewSubject) -> Result<Subject> {
        self.inner.insert_subject(new).await
    }
    async fn update_subject(&self, id: &str, patch: TitlePatch) -> Result<()> {
        self.inner.update_subject(id, patch).await
    }
    async fn delete_subject(&self, id: &str) -> Result<()> {
        self.inner.delete_subject(id).await
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>> {
        self.inner.list_chapters().await
    }
    async fn insert_chapter(&self, new: NewChapter) -> Result<Chapter> {
        self.inner.insert_chapter(new).await
    }
    async fn update_chapter(&self, id: &str, patch: TitlePatch) -> Result<()> {
        self.inner.update_chapter(id, patch).await
    }
    async fn delete_chapter(&self, id: &str) -> Result<()> {
        self.inner.delete_chapter(id).await
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        self.inner.list_topics().await
    }
    async fn insert_topic(&self, new: NewTopic) -> Result<Topic> {
        self.inner.insert_topic(new).await
    }
    async fn update_topic(&self, id: &str, patch: TitlePatch) -> Result<()> {
        self.inner.update_topic(id, patch).await
    }
    async fn delete_topic(&self, id: &str) -> Result<()> {
        self.inner.delete_topic(id).await
    }

    async fn list_subtopics(&self) -> Result<Vec<Subtopic>> {
        Err(Error::Internal("subtopics collection unavailable".into()))
    }
    async fn insert_subtopic(&self, new: NewSubtopic) -> Result<Subtopic> {
        self.inner.insert_subtopic(new).await
    }
    async fn update_subtopic(&self, id: &str, patch: SubtopicPatch) -> Result<()> {
        self.inner.update_subtopic(id, patch).await
    }
    async fn delete_subtopic(&self, id: &str) -> Result<()> {
        self.inner.delete_subtopic(id).await
    }

    async fn list_flashcards(&self, chapter_id: &str) -> Result<Vec<Flashcard>> {
        self.inner.list_flashcards(chapter_id).await
    }
    async fn list_all_flashcards(&self) -> Result<Vec<Flashcard>> {
        self.inner.list_all_flashcards().await
    }
    async fn insert_flashcard(&self, chapter_id: &str, new: NewFlashcard) -> Result<Flashcard> {
        self.inner.insert_flashcard(chapter_id, new).await
    }
    async fn update_flashcard(&self, id: &str, patch: FlashcardPatch) -> Result<()> {
        self.inner.update_flashcard(id, patch).await
    }
    async fn delete_flashcard(&self, id: &str) -> Result<()> {
        self.inner.delete_flashcard(id).await
    }

    async fn get_session(&self) -> Result<Option<Identity>> {
        self.inner.get_session().await
    }
    fn subscribe_sessions(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.subscribe_sessions()
    }
    async fn sign_in_with_provider(&self, provider: &str) -> Result<()> {
        self.inner.sign_in_with_provider(provider).await
    }
    async fn sign_out(&self) -> Result<()> {
        self.inner.sign_out().await
    }
}

async fn seed_one_branch(store: &dyn RemoteStore) {
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
    store
        .insert_subtopic(NewSubtopic {
            title: "Basics".into(),
            id: Some("st1".into()),
            topic_id: "t1".into(),
            video_url: None,
            summary: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fetch_assembles_full_branch() {
    let store = MemoryStore::new();
    seed_one_branch(&store).await;

    let tree = fetch_curriculum(&store).await.unwrap();
    let found = tree.find_subtopic("st1").unwrap();
    assert_eq!(found.topic_id, "t1");
    assert_eq!(found.chapter_id, "ch1");
    assert_eq!(found.subject_id, "sci");
}

#[tokio::test]
async fn test_single_read_failure_aborts_whole_fetch() {
    let store = BrokenSubtopics { inner: MemoryStore::new() };
    seed_one_branch(&store).await;

    // Three of four reads succeed; the result must still be an error, not a
    // partial tree.
    let err = fetch_curriculum(&store).await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}
