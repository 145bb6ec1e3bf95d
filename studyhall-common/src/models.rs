//! Entity models
//!
//! Flat row types as stored by the remote store. The assembled curriculum
//! tree uses separate node types (see `curriculum`), so storage shape and
//! derived shape never mix.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level curriculum entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub title: String,
}

/// Chapter row, owned by a subject via `subject_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub subject_id: String,
}

/// Topic row, owned by a chapter via `chapter_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub chapter_id: String,
}

/// Subtopic row, the leaf content unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtopic {
    pub id: String,
    pub title: String,
    pub topic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Flashcard difficulty rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(Error::InvalidInput(format!(
                "Unknown difficulty: {}",
                other
            ))),
        }
    }
}

/// Flashcard row, associated with exactly one chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub chapter_id: String,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Authenticated identity (or the local developer bypass sentinel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Fixed uid of the local developer-bypass identity
pub const BYPASS_UID: &str = "dev-bypass";

impl Identity {
    /// The local developer-bypass identity. Never created by the remote
    /// store and never cleared by remote session events.
    pub fn developer_bypass() -> Self {
        Self {
            uid: BYPASS_UID.to_string(),
            display_name: "Developer".to_string(),
            email: "dev@example.com".to_string(),
            photo_url: Some(
                "https://api.dicebear.com/7.x/avataaars/svg?seed=Developer".to_string(),
            ),
        }
    }

    pub fn is_bypass(&self) -> bool {
        self.uid == BYPASS_UID
    }
}

// ============================================================================
// Insert payloads
// ============================================================================

/// New subject payload; id generated when absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubject {
    pub title: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewChapter {
    pub title: String,
    #[serde(default)]
    pub id: Option<String>,
    pub subject_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTopic {
    pub title: String,
    #[serde(default)]
    pub id: Option<String>,
    pub chapter_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubtopic {
    pub title: String,
    #[serde(default)]
    pub id: Option<String>,
    pub topic_id: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFlashcard {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ============================================================================
// Update payloads
// ============================================================================

/// Title-only update shared by subjects, chapters and topics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitlePatch {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtopicPatch {
    pub title: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardPatch {
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

// ============================================================================
// Validation
// ============================================================================

/// Reject blank titles before any write is issued
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("Title is required".to_string()));
    }
    Ok(())
}

/// Reject flashcards with a blank question or answer before any write
pub fn validate_flashcard(question: &str, answer: &str) -> Result<()> {
    if question.trim().is_empty() || answer.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Both question and answer are required".to_string(),
        ));
    }
    Ok(())
}

/// Use the supplied id when present and non-blank, otherwise generate one
pub fn id_or_generate(id: Option<String>) -> String {
    match id {
        Some(id) if !id.trim().is_empty() => id,
        _ => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_round_trip() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(Difficulty::parse(d.as_str()).unwrap(), d);
        }
        assert!(Difficulty::parse("extreme").is_err());
    }

    #[test]
    fn test_difficulty_default_is_medium() {
        assert_eq!(Difficulty::default(), Difficulty::Medium);

        // Missing field deserializes to the default
        let card: NewFlashcard =
            serde_json::from_str(r#"{"question":"q","answer":"a"}"#).unwrap();
        assert_eq!(card.difficulty, Difficulty::Medium);
        assert!(card.tags.is_empty());
    }

    #[test]
    fn test_bypass_identity() {
        let dev = Identity::developer_bypass();
        assert!(dev.is_bypass());
        assert_eq!(dev.uid, BYPASS_UID);

        let real = Identity {
            uid: "user-1".to_string(),
            display_name: "A User".to_string(),
            email: "a@example.com".to_string(),
            photo_url: None,
        };
        assert!(!real.is_bypass());
    }

    #[test]
    fn test_validate_title_rejects_blank() {
        assert!(validate_title("Reactions").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
    }

    #[test]
    fn test_validate_flashcard_requires_both_fields() {
        assert!(validate_flashcard("q", "a").is_ok());
        assert!(validate_flashcard("", "a").is_err());
        assert!(validate_flashcard("q", "  ").is_err());
    }

    #[test]
    fn test_id_or_generate() {
        assert_eq!(id_or_generate(Some("sci".to_string())), "sci");
        assert!(!id_or_generate(None).is_empty());
        assert!(!id_or_generate(Some("  ".to_string())).trim().is_empty());
    }
}
