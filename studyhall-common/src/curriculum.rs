//! Curriculum tree assembly and lookup
//!
//! The store holds four flat collections related by parent ids. This module
//! reconstructs the nested subject → chapter → topic → subtopic tree from a
//! single concurrent snapshot of all four, and answers point lookups over
//! the assembled tree annotated with the ancestor chain for breadcrumbs.
//!
//! The tree is a derived, disposable cache: it is rebuilt wholesale after
//! every mutation, never patched incrementally.

use crate::models::{Chapter, Subject, Subtopic, Topic};
use crate::store::RemoteStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Assembled tree types
// ============================================================================

/// Subtopic leaf in the assembled tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtopicNode {
    pub id: String,
    pub title: String,
    pub topic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: String,
    pub title: String,
    pub chapter_id: String,
    pub subtopics: Vec<SubtopicNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterNode {
    pub id: String,
    pub title: String,
    pub subject_id: String,
    pub topics: Vec<TopicNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectNode {
    pub id: String,
    pub title: String,
    pub chapters: Vec<ChapterNode>,
}

/// The assembled four-level curriculum tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurriculumTree {
    pub subjects: Vec<SubjectNode>,
}

// ============================================================================
// Annotated lookup results
// ============================================================================

/// Chapter plus its owning subject, for breadcrumb display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoundChapter {
    pub chapter: ChapterNode,
    pub subject_id: String,
    pub subject_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoundTopic {
    pub topic: TopicNode,
    pub chapter_id: String,
    pub chapter_title: String,
    pub subject_id: String,
    pub subject_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoundSubtopic {
    pub subtopic: SubtopicNode,
    pub topic_id: String,
    pub topic_title: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub subject_id: String,
    pub subject_title: String,
}

// ============================================================================
// Assembly
// ============================================================================

/// Fetch all four collections and assemble the nested tree.
///
/// The four reads are issued concurrently; assembly does not start until all
/// have settled, and any single failure fails the whole call. No partial or
/// fallback tree is ever returned from here — a degraded substitute is the
/// caller's explicit decision.
///
/// Children whose parent id matches no parent row are excluded silently.
/// Relative order within every group follows the flat input lists.
pub async fn fetch_curriculum(store: &dyn RemoteStore) -> Result<CurriculumTree> {
    let (subjects, chapters, topics, subtopics) = tokio::try_join!(
        store.list_subjects(),
        store.list_chapters(),
        store.list_topics(),
        store.list_subtopics(),
    )?;

    Ok(assemble(subjects, chapters, topics, subtopics))
}

/// Pure join over already-fetched snapshots.
///
/// Grouped by parent id up front (O(n) instead of the naive nested filter);
/// `Vec` push order inside each group preserves the input order.
pub fn assemble(
    subjects: Vec<Subject>,
    chapters: Vec<Chapter>,
    topics: Vec<Topic>,
    subtopics: Vec<Subtopic>,
) -> CurriculumTree {
    let mut subtopics_by_topic: HashMap<String, Vec<SubtopicNode>> = HashMap::new();
    for s in subtopics {
        subtopics_by_topic
            .entry(s.topic_id.clone())
            .or_default()
            .push(SubtopicNode {
                id: s.id,
                title: s.title,
                topic_id: s.topic_id,
                video_url: s.video_url,
                summary: s.summary,
            });
    }

    let mut topics_by_chapter: HashMap<String, Vec<TopicNode>> = HashMap::new();
    for t in topics {
        let subtopics = subtopics_by_topic.remove(&t.id).unwrap_or_default();
        topics_by_chapter
            .entry(t.chapter_id.clone())
            .or_default()
            .push(TopicNode {
                id: t.id,
                title: t.title,
                chapter_id: t.chapter_id,
                subtopics,
            });
    }

    let mut chapters_by_subject: HashMap<String, Vec<ChapterNode>> = HashMap::new();
    for c in chapters {
        let topics = topics_by_chapter.remove(&c.id).unwrap_or_default();
        chapters_by_subject
            .entry(c.subject_id.clone())
            .or_default()
            .push(ChapterNode {
                id: c.id,
                title: c.title,
                subject_id: c.subject_id,
                topics,
            });
    }

    let subjects = subjects
        .into_iter()
        .map(|s| SubjectNode {
            chapters: chapters_by_subject.remove(&s.id).unwrap_or_default(),
            id: s.id,
            title: s.title,
        })
        .collect();

    CurriculumTree { subjects }
}

// ============================================================================
// Lookup
// ============================================================================

impl CurriculumTree {
    /// Direct top-level match by subject id
    pub fn get_subject(&self, subject_id: &str) -> Option<&SubjectNode> {
        self.subjects.iter().find(|s| s.id == subject_id)
    }

    /// Find a chapter anywhere in the tree, annotated with its owning
    /// subject.
    ///
    /// Ids are assumed unique across the tree; on a duplicate (an upstream
    /// data-integrity violation) the first match in iteration order wins.
    pub fn find_chapter(&self, chapter_id: &str) -> Option<FoundChapter> {
        for subject in &self.subjects {
            if let Some(chapter) = subject.chapters.iter().find(|c| c.id == chapter_id) {
                return Some(FoundChapter {
                    chapter: chapter.clone(),
                    subject_id: subject.id.clone(),
                    subject_title: subject.title.clone(),
                });
            }
        }
        None
    }

    /// Find a topic anywhere in the tree with its full ancestor chain
    pub fn find_topic(&self, topic_id: &str) -> Option<FoundTopic> {
        for subject in &self.subjects {
            for chapter in &subject.chapters {
                if let Some(topic) = chapter.topics.iter().find(|t| t.id == topic_id) {
                    return Some(FoundTopic {
                        topic: topic.clone(),
                        chapter_id: chapter.id.clone(),
                        chapter_title: chapter.title.clone(),
                        subject_id: subject.id.clone(),
                        subject_title: subject.title.clone(),
                    });
                }
            }
        }
        None
    }

    /// Find a subtopic anywhere in the tree with its full ancestor chain
    pub fn find_subtopic(&self, subtopic_id: &str) -> Option<FoundSubtopic> {
        for subject in &self.subjects {
            for chapter in &subject.chapters {
                for topic in &chapter.topics {
                    if let Some(subtopic) =
                        topic.subtopics.iter().find(|s| s.id == subtopic_id)
                    {
                        return Some(FoundSubtopic {
                            subtopic: subtopic.clone(),
                            topic_id: topic.id.clone(),
                            topic_title: topic.title.clone(),
                            chapter_id: chapter.id.clone(),
                            chapter_title: chapter.title.clone(),
                            subject_id: subject.id.clone(),
                            subject_title: subject.title.clone(),
                        });
                    }
                }
            }
        }
        None
    }
}
