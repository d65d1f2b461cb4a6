// src/progression/summary.rs

use std::collections::BTreeSet;

use crate::catalog::{Chapter, Course, Task};

/// Completion counts for a chapter or course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    /// Rounded to the nearest integer; 0 when there are no tasks.
    pub percent: u8,
}

impl ProgressSummary {
    fn from_tasks<'a>(tasks: impl Iterator<Item = &'a Task>, completed: &BTreeSet<String>) -> Self {
        let (mut total, mut done) = (0usize, 0usize);
        for task in tasks {
            total += 1;
            if completed.contains(&task.id) {
                done += 1;
            }
        }
        let percent = if total == 0 {
            0
        } else {
            ((done as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            total,
            completed: done,
            remaining: total - done,
            percent,
        }
    }

    pub fn for_chapter(chapter: &Chapter, completed: &BTreeSet<String>) -> Self {
        Self::from_tasks(chapter.tasks.iter(), completed)
    }

    /// Ids in `completed` that are not tasks of the course are ignored.
    pub fn for_course(course: &Course, completed: &BTreeSet<String>) -> Self {
        Self::from_tasks(course.tasks(), completed)
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.remaining == 0
    }
}

pub fn is_course_complete(course: &Course, completed: &BTreeSet<String>) -> bool {
    ProgressSummary::for_course(course, completed).is_complete()
}
