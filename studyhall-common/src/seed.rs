//! Curriculum seeding
//!
//! Seeds a store from the bundled dataset with a strict parent-before-child
//! sequential traversal: each level's insert completes before any child
//! referencing it is issued, so foreign keys are always valid mid-seed.
//! One write per node; no batching.

use crate::curriculum::{
    ChapterNode, CurriculumTree, SubjectNode, SubtopicNode, TopicNode,
};
use crate::models::{NewChapter, NewSubject, NewSubtopic, NewTopic};
use crate::store::RemoteStore;
use crate::Result;
use serde::Deserialize;
use tracing::info;

/// Bundled dataset, embedded at compile time
const BUNDLED_DATASET: &str = include_str!("../data/curriculum.json");

/// Nested seed dataset (parent ids are implied by nesting)
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDataset {
    pub subjects: Vec<SeedSubject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSubject {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub chapters: Vec<SeedChapter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedChapter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub topics: Vec<SeedTopic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTopic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtopics: Vec<SeedSubtopic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSubtopic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Per-level insert counts, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SeedReport {
    pub subjects: usize,
    pub chapters: usize,
    pub topics: usize,
    pub subtopics: usize,
}

/// Parse the bundled dataset
pub fn bundled_dataset() -> Result<SeedDataset> {
    Ok(serde_json::from_str(BUNDLED_DATASET)?)
}

/// The bundled dataset assembled as a tree, for the explicit degraded
/// fallback when a reload fails.
pub fn bundled_tree() -> Result<CurriculumTree> {
    let dataset = bundled_dataset()?;
    let subjects = dataset
        .subjects
        .into_iter()
        .map(|s| SubjectNode {
            chapters: s
                .chapters
                .into_iter()
                .map(|c| ChapterNode {
                    topics: c
                        .topics
                        .into_iter()
                        .map(|t| TopicNode {
                            subtopics: t
                                .subtopics
                                .into_iter()
                                .map(|st| SubtopicNode {
                                    id: st.id,
                                    title: st.title,
                                    topic_id: t.id.clone(),
                                    video_url: st.video_url,
                                    summary: st.summary,
                                })
                                .collect(),
                            id: t.id,
                            title: t.title,
                            chapter_id: c.id.clone(),
                        })
                        .collect(),
                    id: c.id,
                    title: c.title,
                    subject_id: s.id.clone(),
                })
                .collect(),
            id: s.id,
            title: s.title,
        })
        .collect();
    Ok(CurriculumTree { subjects })
}

/// Seed `dataset` into `store`, depth-first, parents before children
pub async fn seed_curriculum(
    store: &dyn RemoteStore,
    dataset: &SeedDataset,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for subject in &dataset.subjects {
        store
            .insert_subject(NewSubject {
                title: subject.title.clone(),
                id: Some(subject.id.clone()),
            })
            .await?;
        report.subjects += 1;

        for chapter in &subject.chapters {
            store
                .insert_chapter(NewChapter {
                    title: chapter.title.clone(),
                    id: Some(chapter.id.clone()),
                    subject_id: subject.id.clone(),
                })
                .await?;
            report.chapters += 1;

            for topic in &chapter.topics {
                store
                    .insert_topic(NewTopic {
                        title: topic.title.clone(),
                        id: Some(topic.id.clone()),
                        chapter_id: chapter.id.clone(),
                    })
                    .await?;
                report.topics += 1;

                for subtopic in &topic.subtopics {
                    store
                        .insert_subtopic(NewSubtopic {
                            title: subtopic.title.clone(),
                            id: Some(subtopic.id.clone()),
                            topic_id: topic.id.clone(),
                            video_url: subtopic.video_url.clone().or_else(|| Some(String::new())),
                            summary: subtopic.summary.clone().or_else(|| Some(String::new())),
                        })
                        .await?;
                    report.subtopics += 1;
                }
            }
        }
        info!("Seeded subject: {}", subject.title);
    }

    Ok(report)
}
