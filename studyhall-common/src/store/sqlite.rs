//! SQLite store backend
//!
//! Durable [`RemoteStore`] implementation. Schema initialization is
//! idempotent (`CREATE TABLE IF NOT EXISTS`), runs on every connect, and the
//! database file is created automatically on first run.
//!
//! Listing order: every table carries a `created_at` column, and all list
//! queries order by `created_at, rowid` so creation order is stable even for
//! rows inserted within the same clock tick.

use crate::models::{
    id_or_generate, Chapter, Difficulty, Flashcard, FlashcardPatch, Identity, NewChapter,
    NewFlashcard, NewSubject, NewSubtopic, NewTopic, Subject, Subtopic, SubtopicPatch, TitlePatch,
    Topic,
};
use crate::store::{RemoteStore, SessionEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

/// SQLite-backed [`RemoteStore`]
pub struct SqliteStore {
    pool: SqlitePool,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and initialize
    /// the schema.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

        // WAL allows concurrent readers while the admin panel writes
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        init_schema(&pool).await?;

        let (session_tx, _) = broadcast::channel(16);
        Ok(Self { pool, session_tx })
    }

    /// Construct from an existing pool (tests)
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        init_schema(&pool).await?;
        let (session_tx, _) = broadcast::channel(16);
        Ok(Self { pool, session_tx })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            chapter_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subtopics (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            topic_id TEXT NOT NULL,
            video_url TEXT,
            summary TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS flashcards (
            id TEXT PRIMARY KEY,
            chapter_id TEXT NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            difficulty TEXT NOT NULL DEFAULT 'medium',
            tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            uid TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            email TEXT NOT NULL,
            photo_url TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn require_affected(result: sqlx::sqlite::SqliteQueryResult, kind: &str, id: &str) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {}", kind, id)));
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp in database: {}", e)))
}

fn flashcard_from_row(
    row: (String, String, String, String, String, String, String, Option<String>),
) -> Result<Flashcard> {
    let (id, chapter_id, question, answer, difficulty, tags, created_at, updated_at) = row;
    Ok(Flashcard {
        id,
        chapter_id,
        question,
        answer,
        difficulty: Difficulty::parse(&difficulty)?,
        tags: serde_json::from_str(&tags)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, title FROM subjects ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id, title)| Subject { id, title }).collect())
    }

    async fn insert_subject(&self, new: NewSubject) -> Result<Subject> {
        let subject = Subject { id: id_or_generate(new.id), title: new.title };
        sqlx::query("INSERT INTO subjects (id, title) VALUES (?, ?)")
            .bind(&subject.id)
            .bind(&subject.title)
            .execute(&self.pool)
            .await?;
        Ok(subject)
    }

    async fn update_subject(&self, id: &str, patch: TitlePatch) -> Result<()> {
        let result = sqlx::query("UPDATE subjects SET title = ? WHERE id = ?")
            .bind(&patch.title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "subject", id)
    }

    async fn delete_subject(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM subjects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "subject", id)
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, title, subject_id FROM chapters ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, title, subject_id)| Chapter { id, title, subject_id })
            .collect())
    }

    async fn insert_chapter(&self, new: NewChapter) -> Result<Chapter> {
        let chapter = Chapter {
            id: id_or_generate(new.id),
            title: new.title,
            subject_id: new.subject_id,
        };
        sqlx::query("INSERT INTO chapters (id, title, subject_id) VALUES (?, ?, ?)")
            .bind(&chapter.id)
            .bind(&chapter.title)
            .bind(&chapter.subject_id)
            .execute(&self.pool)
            .await?;
        Ok(chapter)
    }

    async fn update_chapter(&self, id: &str, patch: TitlePatch) -> Result<()> {
        let result = sqlx::query("UPDATE chapters SET title = ? WHERE id = ?")
            .bind(&patch.title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "chapter", id)
    }

    async fn delete_chapter(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM chapters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "chapter", id)
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, title, chapter_id FROM topics ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, title, chapter_id)| Topic { id, title, chapter_id })
            .collect())
    }

    async fn insert_topic(&self, new: NewTopic) -> Result<Topic> {
        let topic = Topic {
            id: id_or_generate(new.id),
            title: new.title,
            chapter_id: new.chapter_id,
        };
        sqlx::query("INSERT INTO topics (id, title, chapter_id) VALUES (?, ?, ?)")
            .bind(&topic.id)
            .bind(&topic.title)
            .bind(&topic.chapter_id)
            .execute(&self.pool)
            .await?;
        Ok(topic)
    }

    async fn update_topic(&self, id: &str, patch: TitlePatch) -> Result<()> {
        let result = sqlx::query("UPDATE topics SET title = ? WHERE id = ?")
            .bind(&patch.title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "topic", id)
    }

    async fn delete_topic(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "topic", id)
    }

    async fn list_subtopics(&self) -> Result<Vec<Subtopic>> {
        let rows = sqlx::query_as::<_, (String, String, String, Option<String>, Option<String>)>(
            "SELECT id, title, topic_id, video_url, summary FROM subtopics \
             ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, title, topic_id, video_url, summary)| Subtopic {
                id,
                title,
                topic_id,
                video_url,
                summary,
            })
            .collect())
    }

    async fn insert_subtopic(&self, new: NewSubtopic) -> Result<Subtopic> {
        let subtopic = Subtopic {
            id: id_or_generate(new.id),
            title: new.title,
            topic_id: new.topic_id,
            video_url: new.video_url,
            summary: new.summary,
        };
        sqlx::query(
            "INSERT INTO subtopics (id, title, topic_id, video_url, summary) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&subtopic.id)
        .bind(&subtopic.title)
        .bind(&subtopic.topic_id)
        .bind(&subtopic.video_url)
        .bind(&subtopic.summary)
        .execute(&self.pool)
        .await?;
        Ok(subtopic)
    }

    async fn update_subtopic(&self, id: &str, patch: SubtopicPatch) -> Result<()> {
        let result =
            sqlx::query("UPDATE subtopics SET title = ?, video_url = ?, summary = ? WHERE id = ?")
                .bind(&patch.title)
                .bind(&patch.video_url)
                .bind(&patch.summary)
                .bind(id)
                .execute(&self.pool)
                .await?;
        require_affected(result, "subtopic", id)
    }

    async fn delete_subtopic(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM subtopics WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "subtopic", id)
    }

    async fn list_flashcards(&self, chapter_id: &str) -> Result<Vec<Flashcard>> {
        let rows = sqlx::query_as::<
            _,
            (String, String, String, String, String, String, String, Option<String>),
        >(
            "SELECT id, chapter_id, question, answer, difficulty, tags, created_at, updated_at \
             FROM flashcards WHERE chapter_id = ? ORDER BY created_at, rowid",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(flashcard_from_row).collect()
    }

    async fn list_all_flashcards(&self) -> Result<Vec<Flashcard>> {
        let rows = sqlx::query_as::<
            _,
            (String, String, String, String, String, String, String, Option<String>),
        >(
            "SELECT id, chapter_id, question, answer, difficulty, tags, created_at, updated_at \
             FROM flashcards ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(flashcard_from_row).collect()
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
        sqlx::query(
            "INSERT INTO flashcards (id, chapter_id, question, answer, difficulty, tags, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&card.id)
        .bind(&card.chapter_id)
        .bind(&card.question)
        .bind(&card.answer)
        .bind(card.difficulty.as_str())
        .bind(serde_json::to_string(&card.tags)?)
        .bind(card.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(card)
    }

    async fn update_flashcard(&self, id: &str, patch: FlashcardPatch) -> Result<()> {
        let tags_json = match &patch.tags {
            Some(tags) => Some(serde_json::to_string(tags)?),
            None => None,
        };
        let result = sqlx::query(
            "UPDATE flashcards SET question = ?, answer = ?, difficulty = ?, \
             tags = COALESCE(?, tags), updated_at = ? WHERE id = ?",
        )
        .bind(&patch.question)
        .bind(&patch.answer)
        .bind(patch.difficulty.as_str())
        .bind(tags_json)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        require_affected(result, "flashcard", id)
    }

    async fn delete_flashcard(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_affected(result, "flashcard", id)
    }

    async fn get_session(&self) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, (String, String, String, Option<String>)>(
            "SELECT uid, display_name, email, photo_url FROM sessions \
             ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(uid, display_name, email, photo_url)| Identity {
            uid,
            display_name,
            email,
            photo_url,
        }))
    }

    fn subscribe_sessions(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }

    /// Only the `local` provider is available on this backend; hosted OAuth
    /// providers require the deployment's identity service.
    async fn sign_in_with_provider(&self, provider: &str) -> Result<()> {
        if provider != "local" {
            return Err(Error::Auth(format!(
                "Provider sign-in ({}) is not configured on the sqlite backend",
                provider
            )));
        }

        let identity = Identity {
            uid: Uuid::new_v4().to_string(),
            display_name: "Local User".to_string(),
            email: "local@studyhall".to_string(),
            photo_url: None,
        };
        sqlx::query(
            "INSERT OR REPLACE INTO sessions (uid, display_name, email, photo_url, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&identity.uid)
        .bind(&identity.display_name)
        .bind(&identity.email)
        .bind(&identity.photo_url)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let _ = self.session_tx.send(SessionEvent::SignedIn { identity });
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions").execute(&self.pool).await?;
        let _ = self.session_tx.send(SessionEvent::SignedOut);
        Ok(())
    }
}
