//! Shared application state
//!
//! Explicit, injectable state containers passed to handlers via the app
//! context; no ambient singletons, so tests can build isolated instances.
//!
//! The curriculum snapshot is a throwaway cache rebuilt wholesale after
//! every mutation. A reload superseded by a newer reload is not cancelled;
//! last write wins.

use serde::Serialize;
use std::sync::Mutex;
use studyhall_common::curriculum::{fetch_curriculum, CurriculumTree};
use studyhall_common::models::Identity;
use studyhall_common::profile::{ChapterProgress, Profile, ProfileStore, Theme};
use studyhall_common::seed::{bundled_tree, SeedReport};
use studyhall_common::store::RemoteStore;
use studyhall_common::Result;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

/// Where the current curriculum snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Nothing fetched yet
    Empty,
    /// Assembled from the remote store
    Remote,
    /// Bundled static dataset substituted after a fetch failure
    Bundled,
}

/// Application events streamed to SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// Curriculum snapshot replaced
    CurriculumReloaded {
        source: SnapshotSource,
        subject_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bundled dataset seeded into the store
    CurriculumSeeded {
        report: SeedReport,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Identity changed (sign-in, sign-out, bypass)
    SessionChanged {
        identity: Option<Identity>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Flashcards for a chapter were created, updated or deleted
    FlashcardsChanged {
        chapter_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// UI theme toggled
    ThemeChanged {
        theme: Theme,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

struct Snapshot {
    tree: CurriculumTree,
    source: SnapshotSource,
}

/// Shared state accessible by all handlers
pub struct SharedState {
    snapshot: RwLock<Snapshot>,
    event_tx: broadcast::Sender<AppEvent>,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            snapshot: RwLock::new(Snapshot {
                tree: CurriculumTree::default(),
                source: SnapshotSource::Empty,
            }),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: AppEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    /// Current snapshot tree (cloned; trees are small)
    pub async fn tree(&self) -> CurriculumTree {
        self.snapshot.read().await.tree.clone()
    }

    pub async fn source(&self) -> SnapshotSource {
        self.snapshot.read().await.source
    }

    /// Re-fetch the whole tree from the store and replace the snapshot.
    ///
    /// On fetch failure with `fallback_to_bundled` set, substitutes the
    /// bundled dataset as an explicit, logged degradation and tags the
    /// snapshot accordingly. Without the fallback the error propagates and
    /// the previous snapshot stays in place.
    pub async fn reload(
        &self,
        store: &dyn RemoteStore,
        fallback_to_bundled: bool,
    ) -> Result<SnapshotSource> {
        let (tree, source) = match fetch_curriculum(store).await {
            Ok(tree) => (tree, SnapshotSource::Remote),
            Err(e) if fallback_to_bundled => {
                warn!("Curriculum fetch failed, substituting bundled dataset: {}", e);
                (bundled_tree()?, SnapshotSource::Bundled)
            }
            Err(e) => return Err(e),
        };

        let subject_count = tree.subjects.len();
        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.tree = tree;
            snapshot.source = source;
        }

        self.broadcast_event(AppEvent::CurriculumReloaded {
            source,
            subject_count,
            timestamp: chrono::Utc::now(),
        });
        Ok(source)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Profile container: in-memory copy plus the durable snapshot, rewritten
/// on every mutation of identity, theme or progress.
pub struct ProfileState {
    store: ProfileStore,
    profile: Mutex<Profile>,
}

impl ProfileState {
    /// Load from disk, degrading to defaults on a corrupt snapshot
    pub fn load(store: ProfileStore) -> Result<Self> {
        let profile = store.load()?;
        Ok(Self {
            store,
            profile: Mutex::new(profile),
        })
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    pub fn set_identity(&self, identity: Option<Identity>) -> Result<()> {
        let mut profile = self.lock();
        profile.identity = identity;
        self.store.save(&profile)
    }

    pub fn theme(&self) -> Theme {
        self.lock().theme
    }

    pub fn set_theme(&self, theme: Theme) -> Result<Theme> {
        let mut profile = self.lock();
        profile.theme = theme;
        self.store.save(&profile)?;
        Ok(theme)
    }

    pub fn toggle_theme(&self) -> Result<Theme> {
        let mut profile = self.lock();
        profile.theme = profile.theme.toggled();
        let theme = profile.theme;
        self.store.save(&profile)?;
        Ok(theme)
    }

    pub fn progress(&self) -> std::collections::HashMap<String, ChapterProgress> {
        self.lock().progress.clone()
    }

    /// Merge `update` into the chapter's progress entry
    pub fn update_progress(&self, chapter_id: &str, update: ChapterProgress) -> Result<ChapterProgress> {
        let mut profile = self.lock();
        let entry = profile.progress.entry(chapter_id.to_string()).or_default();

        for subtopic in update.completed_subtopics {
            if !entry.completed_subtopics.contains(&subtopic) {
                entry.completed_subtopics.push(subtopic);
            }
        }
        if update.last_quiz_score.is_some() {
            entry.last_quiz_score = update.last_quiz_score;
        }
        if update.flashcards_reviewed.is_some() {
            entry.flashcards_reviewed = update.flashcards_reviewed;
        }

        let merged = entry.clone();
        self.store.save(&profile)?;
        Ok(merged)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Profile> {
        self.profile.lock().expect("profile lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhall_common::models::NewSubject;
    use studyhall_common::store::MemoryStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reload_replaces_snapshot() {
        let state = SharedState::new();
        let store = MemoryStore::new();
        assert_eq!(state.source().await, SnapshotSource::Empty);

        store
            .insert_subject(NewSubject { title: "Science".into(), id: Some("sci".into()) })
            .await
            .unwrap();

        let source = state.reload(&store, false).await.unwrap();
        assert_eq!(source, SnapshotSource::Remote);
        assert_eq!(state.tree().await.subjects.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_broadcasts_event() {
        let state = SharedState::new();
        let store = MemoryStore::new();
        let mut rx = state.subscribe_events();

        state.reload(&store, false).await.unwrap();
        match rx.recv().await.unwrap() {
            AppEvent::CurriculumReloaded { source, subject_count, .. } => {
                assert_eq!(source, SnapshotSource::Remote);
                assert_eq!(subject_count, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_profile_state_persists_mutations() {
        let dir = TempDir::new().unwrap();
        let profile = ProfileState::load(ProfileStore::new(dir.path())).unwrap();

        assert_eq!(profile.theme(), Theme::Light);
        assert_eq!(profile.toggle_theme().unwrap(), Theme::Dark);

        profile
            .update_progress(
                "ch1",
                ChapterProgress {
                    completed_subtopics: vec!["st1".into()],
                    last_quiz_score: Some(70),
                    flashcards_reviewed: None,
                },
            )
            .unwrap();

        // A fresh load sees everything written
        let reloaded = ProfileState::load(ProfileStore::new(dir.path())).unwrap();
        assert_eq!(reloaded.theme(), Theme::Dark);
        let progress = reloaded.progress();
        assert_eq!(progress["ch1"].last_quiz_score, Some(70));
        assert_eq!(progress["ch1"].completed_subtopics, vec!["st1"]);
    }

    #[test]
    fn test_progress_merge_is_additive() {
        let dir = TempDir::new().unwrap();
        let profile = ProfileState::load(ProfileStore::new(dir.path())).unwrap();

        profile
            .update_progress(
                "ch1",
                ChapterProgress {
                    completed_subtopics: vec!["st1".into()],
                    last_quiz_score: Some(50),
                    flashcards_reviewed: None,
                },
            )
            .unwrap();
        let merged = profile
            .update_progress(
                "ch1",
                ChapterProgress {
                    completed_subtopics: vec!["st1".into(), "st2".into()],
                    last_quiz_score: None,
                    flashcards_reviewed: Some(3),
                },
            )
            .unwrap();

        // No duplicates, older score kept when the update omits one
        assert_eq!(merged.completed_subtopics, vec!["st1", "st2"]);
        assert_eq!(merged.last_quiz_score, Some(50));
        assert_eq!(merged.flashcards_reviewed, Some(3));
    }
}
