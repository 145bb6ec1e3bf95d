//! Local profile persistence
//!
//! Durable snapshot of exactly three fields: identity, theme, per-chapter
//! progress. The snapshot is versioned and written through an explicit
//! serialize boundary so fields added elsewhere never leak into storage by
//! accident. The curriculum tree is never persisted here; it is always
//! re-fetched.

use crate::models::Identity;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Snapshot file name inside the data folder
pub const PROFILE_FILE: &str = "profile.json";

const PROFILE_VERSION: u32 = 1;

/// Light/dark UI theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Study progress for one chapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterProgress {
    #[serde(default)]
    pub completed_subtopics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quiz_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flashcards_reviewed: Option<u32>,
}

/// The three persisted fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub progress: HashMap<String, ChapterProgress>,
}

/// On-disk envelope; `version` gates deserialization
#[derive(Debug, Serialize, Deserialize)]
struct ProfileSnapshot {
    version: u32,
    #[serde(flatten)]
    profile: Profile,
}

/// Reads and rewrites the profile snapshot in the data folder
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(data_folder: &Path) -> Self {
        Self {
            path: data_folder.join(PROFILE_FILE),
        }
    }

    /// Load the persisted profile. A missing file yields defaults; a
    /// corrupt or unreadable file degrades to defaults with a warning
    /// rather than aborting startup. An unknown version is an error the
    /// caller sees.
    pub fn load(&self) -> Result<Profile> {
        if !self.path.exists() {
            return Ok(Profile::default());
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read profile snapshot, using defaults: {}", e);
                return Ok(Profile::default());
            }
        };

        let snapshot: ProfileSnapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Corrupt profile snapshot, using defaults: {}", e);
                return Ok(Profile::default());
            }
        };

        if snapshot.version != PROFILE_VERSION {
            return Err(Error::Config(format!(
                "Unsupported profile version {} (expected {})",
                snapshot.version, PROFILE_VERSION
            )));
        }

        Ok(snapshot.profile)
    }

    /// Rewrite the whole snapshot. Called on every mutation of identity,
    /// theme or progress.
    pub fn save(&self, profile: &Profile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = ProfileSnapshot {
            version: PROFILE_VERSION,
            profile: profile.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
