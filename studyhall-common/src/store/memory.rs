//! In-memory store backend
//!
//! Used by tests and as the zero-setup demo backend. Rows live in
//! `RwLock`-held vectors in insertion order, which satisfies the
//! creation-order listing contract for free. Session state can be injected
//! directly to drive gate tests.

use crate::models::{
    id_or_generate, Chapter, Flashcard, FlashcardPatch, Identity, NewChapter, NewFlashcard,
    NewSubject, NewSubtopic, NewTopic, Subject, Subtopic, SubtopicPatch, TitlePatch, Topic,
};
use crate::store::{RemoteStore, SessionEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    subjects: Vec<Subject>,
    chapters: Vec<Chapter>,
    topics: Vec<Topic>,
    subtopics: Vec<Subtopic>,
    flashcards: Vec<Flashcard>,
    session: Option<Identity>,
}

/// In-memory [`RemoteStore`] implementation
pub struct MemoryStore {
    tables: RwLock<Tables>,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (session_tx, _) = broadcast::channel(16);
        Self {
            tables: RwLock::new(Tables::default()),
            session_tx,
        }
    }

    /// Install a session directly and notify subscribers.
    ///
    /// Test hook standing in for a real provider callback.
    pub fn set_session(&self, identity: Identity) {
        self.tables
            .write()
            .expect("memory store lock poisoned")
            .session = Some(identity.clone());
        let _ = self.session_tx.send(SessionEvent::SignedIn { identity });
    }

    /// Clear the session and notify subscribers
    pub fn end_session(&self) {
        self.tables
            .write()
            .expect("memory store lock poisoned")
            .session = None;
        let _ = self.session_tx.send(SessionEvent::SignedOut);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().expect("memory store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().expect("memory store lock poisoned")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(kind: &str, id: &str) -> Error {
    Error::NotFound(format!("{} {}", kind, id))
}

fn duplicate(kind: &str, id: &str) -> Error {
    Error::InvalidInput(format!("{} id {} already exists", kind, id))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        Ok(self.read().subjects.clone())
    }

    async fn insert_subject(&self, new: NewSubject) -> Result<Subject> {
        let subject = Subject {
            id: id_or_generate(new.id),
            title: new.title,
        };
        let mut tables = self.write();
        if tables.subjects.iter().any(|s| s.id == subject.id) {
            return Err(duplicate("subject", &subject.id));
        }
        tables.subjects.push(subject.clone());
        Ok(subject)
    }

    async fn update_subject(&self, id: &str, patch: TitlePatch) -> Result<()> {
        let mut tables = self.write();
        let subject = tables
            .subjects
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found("subject", id))?;
        subject.title = patch.title;
        Ok(())
    }

    async fn delete_subject(&self, id: &str) -> Result<()> {
        let mut tables = self.write();
        let before = tables.subjects.len();
        tables.subjects.retain(|s| s.id != id);
        if tables.subjects.len() == before {
            return Err(not_found("subject", id));
        }
        Ok(())
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>> {
        Ok(self.read().chapters.clone())
    }

    async fn insert_chapter(&self, new: NewChapter) -> Result<Chapter> {
        let chapter = Chapter {
            id: id_or_generate(new.id),
            title: new.title,
            subject_id: new.subject_id,
        };
        let mut tables = self.write();
        if tables.chapters.iter().any(|c| c.id == chapter.id) {
            return Err(duplicate("chapter", &chapter.id));
        }
        tables.chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn update_chapter(&self, id: &str, patch: TitlePatch) -> Result<()> {
        let mut tables = self.write();
        let chapter = tables
            .chapters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("chapter", id))?;
        chapter.title = patch.title;
        Ok(())
    }

    async fn delete_chapter(&self, id: &str) -> Result<()> {
        let mut tables = self.write();
        let before = tables.chapters.len();
        tables.chapters.retain(|c| c.id != id);
        if tables.chapters.len() == before {
            return Err(not_found("chapter", id));
        }
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        Ok(self.read().topics.clone())
    }

    async fn insert_topic(&self, new: NewTopic) -> Result<Topic> {
        let topic = Topic {
            id: id_or_generate(new.id),
            title: new.title,
            chapter_id: new.chapter_id,
        };
        let mut tables = self.write();
        if tables.topics.iter().any(|t| t.id == topic.id) {
            return Err(duplicate("topic", &topic.id));
        }
        tables.topics.push(topic.clone());
        Ok(topic)
    }

    async fn update_topic(&self, id: &str, patch: TitlePatch) -> Result<()> {
        let mut tables = self.write();
        let topic = tables
            .topics
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("topic", id))?;
        topic.title = patch.title;
        Ok(())
    }

    async fn delete_topic(&self, id: &str) -> Result<()> {
        let mut tables = self.write();
        let before = tables.topics.len();
        tables.topics.retain(|t| t.id != id);
        if tables.topics.len() == before {
            return Err(not_found("topic", id));
        }
        Ok(())
    }

    async fn list_subtopics(&self) -> Result<Vec<Subtopic>> {
        Ok(self.read().subtopics.clone())
    }

    async fn insert_subtopic(&self, new: NewSubtopic) -> Result<Subtopic> {
        let subtopic = Subtopic {
            id: id_or_generate(new.id),
            title: new.title,
            topic_id: new.topic_id,
            video_url: new.video_url,
            summary: new.summary,
        };
        let mut tables = self.write();
        if tables.subtopics.iter().any(|s| s.id == subtopic.id) {
            return Err(duplicate("subtopic", &subtopic.id));
        }
        tables.subtopics.push(subtopic.clone());
        Ok(subtopic)
    }

    async fn update_subtopic(&self, id: &str, patch: SubtopicPatch) -> Result<()> {
        let mut tables = self.write();
        let subtopic = tables
            .subtopics
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found("subtopic", id))?;
        subtopic.title = patch.title;
        subtopic.video_url = patch.video_url;
        subtopic.summary = patch.summary;
        Ok(())
    }

    async fn delete_subtopic(&self, id: &str) -> Result<()> {
        let mut tables = self.write();
        let before = tables.subtopics.len();
        tables.subtopics.retain(|s| s.id != id);
        if tables.subtopics.len() == before {
            return Err(not_found("subtopic", id));
        }
        Ok(())
    }

    async fn list_flashcards(&self, chapter_id: &str) -> Result<Vec<Flashcard>> {
        Ok(self
            .read()
            .flashcards
            .iter()
            .filter(|f| f.chapter_id == chapter_id)
            .cloned()
            .collect())
    }

    async fn list_all_flashcards(&self) -> Result<Vec<Flashcard>> {
        Ok(self.read().flashcards.clone())
    }

    async fn insert_flashcard(&self, chapter_id: &str, new: NewFlashcard) -> Result<Flashcard> {
        let card = Flashcard {
            id: Uuid::new_v4().to_string(),
            chapter_id: chapter_id.to_string(),
            question: new.question,
            answer: new.answer,
            difficulty: new.difficulty,
            tags: new.tags,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.write().flashcards.push(card.clone());
        Ok(card)
    }

    async fn update_flashcard(&self, id: &str, patch: FlashcardPatch) -> Result<()> {
        let mut tables = self.write();
        let card = tables
            .flashcards
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| not_found("flashcard", id))?;
        card.question = patch.question;
        card.answer = patch.answer;
        card.difficulty = patch.difficulty;
        if let Some(tags) = patch.tags {
            card.tags = tags;
        }
        card.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_flashcard(&self, id: &str) -> Result<()> {
        let mut tables = self.write();
        let before = tables.flashcards.len();
        tables.flashcards.retain(|f| f.id != id);
        if tables.flashcards.len() == before {
            return Err(not_found("flashcard", id));
        }
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Identity>> {
        Ok(self.read().session.clone())
    }

    fn subscribe_sessions(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }

    async fn sign_in_with_provider(&self, provider: &str) -> Result<()> {
        // No hosted provider behind the memory backend
        Err(Error::Auth(format!(
            "Provider sign-in ({}) is not available on the memory backend",
            provider
        )))
    }

    async fn sign_out(&self) -> Result<()> {
        self.end_session();
        Ok(())
    }
}
