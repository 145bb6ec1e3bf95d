//! Admin content-manager navigation state
//!
//! A stack of breadcrumbs tracking the admin's drill-down position in the
//! curriculum tree, independent of any URL routing. The list to display is
//! always re-derived from the live tree snapshot, never cached here, so
//! edits show up immediately and concurrently deleted ancestors degrade to
//! an empty list instead of a panic.

use serde::{Deserialize, Serialize};
use studyhall_common::curriculum::CurriculumTree;

/// Tree level of a breadcrumb entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrumbKind {
    Subject,
    Chapter,
    Topic,
    Subtopic,
}

/// One breadcrumb entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crumb {
    pub id: String,
    pub title: String,
    pub kind: CrumbKind,
}

/// Which list the admin view shows; one state per tree depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminView {
    Subjects,
    Chapters,
    Topics,
    Subtopics,
}

/// Item in the currently displayed list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavItem {
    pub id: String,
    pub title: String,
}

/// Breadcrumb stack state machine
#[derive(Debug, Clone, Default, Serialize)]
pub struct NavState {
    path: Vec<Crumb>,
}

impl NavState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &[Crumb] {
        &self.path
    }

    /// View implied by the top of the stack; a path of length N operates at
    /// tree depth N.
    pub fn view(&self) -> AdminView {
        match self.path.last().map(|c| c.kind) {
            None => AdminView::Subjects,
            Some(CrumbKind::Subject) => AdminView::Chapters,
            Some(CrumbKind::Chapter) => AdminView::Topics,
            Some(CrumbKind::Topic) | Some(CrumbKind::Subtopic) => AdminView::Subtopics,
        }
    }

    /// Drill into an item. Subtopics are leaves; a subtopic crumb is not
    /// pushed and the view stays put.
    pub fn navigate_to(&mut self, crumb: Crumb) {
        if crumb.kind == CrumbKind::Subtopic {
            return;
        }
        self.path.push(crumb);
    }

    /// Pop one level; empty stack means back at the subjects root
    pub fn navigate_back(&mut self) {
        self.path.pop();
    }

    /// Breadcrumb-click jump to any ancestor: truncate the stack to length
    /// `index + 1`.
    pub fn navigate_to_depth(&mut self, index: usize) {
        self.path.truncate(index + 1);
    }

    /// Re-derive the list for the current depth by walking the live tree
    /// with the ids on the stack. A stale id (concurrently deleted by
    /// another session) yields an empty list.
    pub fn current_list(&self, tree: &CurriculumTree) -> Vec<NavItem> {
        match self.view() {
            AdminView::Subjects => tree
                .subjects
                .iter()
                .map(|s| NavItem { id: s.id.clone(), title: s.title.clone() })
                .collect(),
            AdminView::Chapters => self
                .subject_of(tree)
                .map(|s| {
                    s.chapters
                        .iter()
                        .map(|c| NavItem { id: c.id.clone(), title: c.title.clone() })
                        .collect()
                })
                .unwrap_or_default(),
            AdminView::Topics => self
                .chapter_of(tree)
                .map(|c| {
                    c.topics
                        .iter()
                        .map(|t| NavItem { id: t.id.clone(), title: t.title.clone() })
                        .collect()
                })
                .unwrap_or_default(),
            AdminView::Subtopics => self
                .topic_of(tree)
                .map(|t| {
                    t.subtopics
                        .iter()
                        .map(|s| NavItem { id: s.id.clone(), title: s.title.clone() })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// True when the stack references an id the tree no longer contains;
    /// the view layer offers a reset-to-root action in that case.
    pub fn is_stale(&self, tree: &CurriculumTree) -> bool {
        match self.view() {
            AdminView::Subjects => false,
            AdminView::Chapters => self.subject_of(tree).is_none(),
            AdminView::Topics => self.chapter_of(tree).is_none(),
            AdminView::Subtopics => self.topic_of(tree).is_none(),
        }
    }

    /// Reset to the subjects root
    pub fn reset(&mut self) {
        self.path.clear();
    }

    fn subject_of<'t>(
        &self,
        tree: &'t CurriculumTree,
    ) -> Option<&'t studyhall_common::curriculum::SubjectNode> {
        let crumb = self.path.first()?;
        tree.subjects.iter().find(|s| s.id == crumb.id)
    }

    fn chapter_of<'t>(
        &self,
        tree: &'t CurriculumTree,
    ) -> Option<&'t studyhall_common::curriculum::ChapterNode> {
        let crumb = self.path.get(1)?;
        self.subject_of(tree)?.chapters.iter().find(|c| c.id == crumb.id)
    }

    fn topic_of<'t>(
        &self,
        tree: &'t CurriculumTree,
    ) -> Option<&'t studyhall_common::curriculum::TopicNode> {
        let crumb = self.path.get(2)?;
        self.chapter_of(tree)?.topics.iter().find(|t| t.id == crumb.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhall_common::curriculum::assemble;
    use studyhall_common::models::{Chapter, Subject, Subtopic, Topic};

    fn crumb(id: &str, title: &str, kind: CrumbKind) -> Crumb {
        Crumb { id: id.to_string(), title: title.to_string(), kind }
    }

    fn sample_tree() -> CurriculumTree {
        assemble(
            vec![Subject { id: "sci".into(), title: "Science".into() }],
            vec![Chapter { id: "ch1".into(), title: "Reactions".into(), subject_id: "sci".into() }],
            vec![Topic { id: "t1".into(), title: "Intro".into(), chapter_id: "ch1".into() }],
            vec![Subtopic {
                id: "st1".into(),
                title: "Basics".into(),
                topic_id: "t1".into(),
                video_url: None,
                summary: None,
            }],
        )
    }

    fn drilled_in() -> NavState {
        let mut nav = NavState::new();
        nav.navigate_to(crumb("sci", "Science", CrumbKind::Subject));
        nav.navigate_to(crumb("ch1", "Reactions", CrumbKind::Chapter));
        nav.navigate_to(crumb("t1", "Intro", CrumbKind::Topic));
        nav
    }

    #[test]
    fn test_view_follows_depth() {
        let mut nav = NavState::new();
        assert_eq!(nav.view(), AdminView::Subjects);

        nav.navigate_to(crumb("sci", "Science", CrumbKind::Subject));
        assert_eq!(nav.view(), AdminView::Chapters);

        nav.navigate_to(crumb("ch1", "Reactions", CrumbKind::Chapter));
        assert_eq!(nav.view(), AdminView::Topics);

        nav.navigate_to(crumb("t1", "Intro", CrumbKind::Topic));
        assert_eq!(nav.view(), AdminView::Subtopics);
    }

    #[test]
    fn test_subtopics_have_no_descent() {
        let mut nav = drilled_in();
        nav.navigate_to(crumb("st1", "Basics", CrumbKind::Subtopic));
        assert_eq!(nav.path().len(), 3);
        assert_eq!(nav.view(), AdminView::Subtopics);
    }

    #[test]
    fn test_equal_pushes_and_pops_return_to_root() {
        let mut nav = drilled_in();
        nav.navigate_back();
        nav.navigate_back();
        nav.navigate_back();
        assert_eq!(nav.view(), AdminView::Subjects);
        assert!(nav.path().is_empty());

        // Extra pops at the root are harmless
        nav.navigate_back();
        assert_eq!(nav.view(), AdminView::Subjects);
    }

    #[test]
    fn test_depth_jump_scenario() {
        // Starting at depth 3 (subtopics), jumping to the first breadcrumb
        // truncates to one crumb and shows chapters.
        let mut nav = drilled_in();
        assert_eq!(nav.view(), AdminView::Subtopics);

        nav.navigate_to_depth(0);
        assert_eq!(nav.path().len(), 1);
        assert_eq!(nav.path()[0].id, "sci");
        assert_eq!(nav.view(), AdminView::Chapters);
    }

    #[test]
    fn test_current_list_walks_live_tree() {
        let tree = sample_tree();
        let mut nav = NavState::new();

        let subjects = nav.current_list(&tree);
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].id, "sci");

        nav.navigate_to(crumb("sci", "Science", CrumbKind::Subject));
        let chapters = nav.current_list(&tree);
        assert_eq!(chapters[0].title, "Reactions");

        nav.navigate_to(crumb("ch1", "Reactions", CrumbKind::Chapter));
        nav.navigate_to(crumb("t1", "Intro", CrumbKind::Topic));
        let subtopics = nav.current_list(&tree);
        assert_eq!(subtopics[0].id, "st1");
    }

    #[test]
    fn test_current_list_reflects_newer_snapshot() {
        let mut nav = NavState::new();
        nav.navigate_to(crumb("sci", "Science", CrumbKind::Subject));

        let before = sample_tree();
        assert_eq!(nav.current_list(&before).len(), 1);

        // Same path against a re-fetched tree with an extra chapter
        let after = assemble(
            vec![Subject { id: "sci".into(), title: "Science".into() }],
            vec![
                Chapter { id: "ch1".into(), title: "Reactions".into(), subject_id: "sci".into() },
                Chapter { id: "ch2".into(), title: "Forces".into(), subject_id: "sci".into() },
            ],
            vec![],
            vec![],
        );
        assert_eq!(nav.current_list(&after).len(), 2);
    }

    #[test]
    fn test_stale_ids_yield_empty_list() {
        let tree = sample_tree();
        let mut nav = NavState::new();
        nav.navigate_to(crumb("deleted-subject", "Gone", CrumbKind::Subject));

        assert!(nav.current_list(&tree).is_empty());
        assert!(nav.is_stale(&tree));

        nav.reset();
        assert!(!nav.is_stale(&tree));
        assert_eq!(nav.view(), AdminView::Subjects);
    }

    #[test]
    fn test_stale_deep_ancestor() {
        let mut nav = drilled_in();
        // Tree where the chapter was deleted out from under the admin
        let tree = assemble(
            vec![Subject { id: "sci".into(), title: "Science".into() }],
            vec![],
            vec![],
            vec![],
        );
        assert!(nav.current_list(&tree).is_empty());
        assert!(nav.is_stale(&tree));
        // navigate_back to a still-valid level recovers
        nav.navigate_to_depth(0);
        assert!(!nav.is_stale(&tree));
    }
}
