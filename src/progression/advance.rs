// src/progression/advance.rs

use std::collections::BTreeSet;

use crate::catalog::{Course, Task};

/// Location of a task for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPosition {
    pub chapter_index: usize,
    pub task_index: usize,
}

/// First task after `current_id` (in course order) that is not completed.
///
/// `None` when every later task is completed, `current_id` is the last
/// task, or `current_id` is not in the course.
pub fn find_next_task<'a>(
    course: &'a Course,
    current_id: &str,
    completed: &BTreeSet<String>,
) -> Option<&'a Task> {
    let ordered = course.ordered_tasks();
    let position = ordered.iter().position(|t| t.id == current_id)?;
    ordered[position + 1..]
        .iter()
        .find(|t| !completed.contains(&t.id))
        .copied()
}

/// Task immediately before `current_id`, regardless of completion.
pub fn find_previous_task<'a>(course: &'a Course, current_id: &str) -> Option<&'a Task> {
    let ordered = course.ordered_tasks();
    let position = ordered.iter().position(|t| t.id == current_id)?;
    position.checked_sub(1).map(|p| ordered[p])
}

pub fn find_task_position(course: &Course, task_id: &str) -> Option<TaskPosition> {
    course.chapters.iter().enumerate().find_map(|(chapter_index, chapter)| {
        chapter
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .map(|task_index| TaskPosition {
                chapter_index,
                task_index,
            })
    })
}

/// Where a learner resumes: the lowest-order task not yet completed.
pub fn first_open_task<'a>(course: &'a Course, completed: &BTreeSet<String>) -> Option<&'a Task> {
    course.tasks().find(|t| !completed.contains(&t.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, RawCatalogFile};

    fn course() -> Course {
        let raw: RawCatalogFile = toml::from_str(
            r#"
            [[course]]
            id = "js"
            title = "JS"
            category = "frontend"
            [[course.chapter]]
            id = "c1"
            title = "One"
            [[course.chapter.task]]
            id = "t1"
            title = "1"
            language = "javascript"
            [[course.chapter.task]]
            id = "t2"
            title = "2"
            language = "javascript"
            [[course.chapter]]
            id = "c2"
            title = "Two"
            [[course.chapter.task]]
            id = "t3"
            title = "3"
            language = "javascript"
            "#,
        )
        .unwrap();
        Catalog::try_from(raw).unwrap().courses()[0].clone()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn next_task_after_completing_second() {
        let c = course();
        let next = find_next_task(&c, "t2", &set(&["t1", "t2"])).unwrap();
        assert_eq!(next.id, "t3");
        assert_eq!(
            find_task_position(&c, &next.id),
            Some(TaskPosition {
                chapter_index: 1,
                task_index: 0
            })
        );
    }

    #[test]
    fn next_skips_completed_and_does_not_wrap() {
        let c = course();
        assert_eq!(find_next_task(&c, "t1", &set(&["t1", "t2"])).unwrap().id, "t3");
        assert!(find_next_task(&c, "t3", &set(&[])).is_none());
        assert!(find_next_task(&c, "t1", &set(&["t1", "t2", "t3"])).is_none());
        assert!(find_next_task(&c, "ghost", &set(&[])).is_none());
    }

    #[test]
    fn previous_and_resume_point() {
        let c = course();
        assert_eq!(find_previous_task(&c, "t3").unwrap().id, "t2");
        assert!(find_previous_task(&c, "t1").is_none());
        assert_eq!(first_open_task(&c, &set(&["t1"])).unwrap().id, "t2");
        assert!(first_open_task(&c, &set(&["t1", "t2", "t3"])).is_none());
    }
}
