//! Remote store abstraction
//!
//! The original deployment ran the same call sites against two hosted
//! providers. Here that contract is a single trait with swappable backends
//! selected at startup: SQLite for durable installs, in-memory for tests
//! and zero-setup demos.

pub mod memory;
pub mod sqlite;

use crate::models::{
    Chapter, Flashcard, FlashcardPatch, Identity, NewChapter, NewFlashcard, NewSubject,
    NewSubtopic, NewTopic, Subject, Subtopic, SubtopicPatch, TitlePatch, Topic,
};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Session lifecycle notification
///
/// Delivered on the broadcast channel returned by
/// [`RemoteStore::subscribe_sessions`]. Dropping the receiver unsubscribes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A session was established or replaced
    SignedIn { identity: Identity },
    /// The remote session ended (sign-out or expiry)
    SignedOut,
}

/// CRUD + session boundary to the hosted data store
///
/// List operations return rows in creation order; stable iteration order is
/// a correctness requirement for the assembled tree, not a cosmetic one.
/// Update/delete of a missing id returns [`crate::Error::NotFound`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // Subjects
    async fn list_subjects(&self) -> Result<Vec<Subject>>;
    async fn insert_subject(&self, new: NewSubject) -> Result<Subject>;
    async fn update_subject(&self, id: &str, patch: TitlePatch) -> Result<()>;
    async fn delete_subject(&self, id: &str) -> Result<()>;

    // Chapters
    async fn list_chapters(&self) -> Result<Vec<Chapter>>;
    async fn insert_chapter(&self, new: NewChapter) -> Result<Chapter>;
    async fn update_chapter(&self, id: &str, patch: TitlePatch) -> Result<()>;
    async fn delete_chapter(&self, id: &str) -> Result<()>;

    // Topics
    async fn list_topics(&self) -> Result<Vec<Topic>>;
    async fn insert_topic(&self, new: NewTopic) -> Result<Topic>;
    async fn update_topic(&self, id: &str, patch: TitlePatch) -> Result<()>;
    async fn delete_topic(&self, id: &str) -> Result<()>;

    // Subtopics
    async fn list_subtopics(&self) -> Result<Vec<Subtopic>>;
    async fn insert_subtopic(&self, new: NewSubtopic) -> Result<Subtopic>;
    async fn update_subtopic(&self, id: &str, patch: SubtopicPatch) -> Result<()>;
    async fn delete_subtopic(&self, id: &str) -> Result<()>;

    // Flashcards
    async fn list_flashcards(&self, chapter_id: &str) -> Result<Vec<Flashcard>>;
    async fn list_all_flashcards(&self) -> Result<Vec<Flashcard>>;
    async fn insert_flashcard(&self, chapter_id: &str, new: NewFlashcard) -> Result<Flashcard>;
    async fn update_flashcard(&self, id: &str, patch: FlashcardPatch) -> Result<()>;
    async fn delete_flashcard(&self, id: &str) -> Result<()>;

    // Sessions
    /// One-shot session lookup
    async fn get_session(&self) -> Result<Option<Identity>>;

    /// Ongoing session change notifications; drop the receiver to unsubscribe
    fn subscribe_sessions(&self) -> broadcast::Receiver<SessionEvent>;

    /// Begin a provider sign-in. May redirect the whole application in a
    /// hosted deployment; backends here resolve inline or reject.
    async fn sign_in_with_provider(&self, provider: &str) -> Result<()>;

    async fn sign_out(&self) -> Result<()>;
}
