// src/progression/unlock.rs

use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::{Course, Task};

/// Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Locked,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Locked => "locked",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Whether the learner may edit and submit a task with this status.
pub fn can_attempt(status: TaskStatus) -> bool {
    status != TaskStatus::Locked
}

/// Status of `task` given the completed ids and the course's tasks.
///
/// A task is unlocked iff every task with a strictly lower order is
/// completed. Linear in the number of tasks.
pub fn task_status<'a>(
    task: &Task,
    completed: &BTreeSet<String>,
    course_tasks: impl IntoIterator<Item = &'a Task>,
) -> TaskStatus {
    if completed.contains(&task.id) {
        return TaskStatus::Completed;
    }
    let blocked = course_tasks
        .into_iter()
        .any(|t| t.order < task.order && !completed.contains(&t.id));
    if blocked {
        TaskStatus::Locked
    } else {
        TaskStatus::InProgress
    }
}

/// Precomputed unlock boundary for one course and completed set.
///
/// `boundary` is the highest order such that every task with a lower order
/// is completed; a task is unlocked iff `task.order <= boundary`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockIndex {
    boundary: u32,
}

impl UnlockIndex {
    pub fn new(course: &Course, completed: &BTreeSet<String>) -> Self {
        let mut boundary = 1;
        for task in course.tasks() {
            if !completed.contains(&task.id) {
                break;
            }
            boundary = task.order + 1;
        }
        Self { boundary }
    }

    /// Orders up to and including this value are unlocked.
    pub fn boundary(&self) -> u32 {
        self.boundary
    }

    pub fn status(&self, task: &Task, completed: &BTreeSet<String>) -> TaskStatus {
        if completed.contains(&task.id) {
            TaskStatus::Completed
        } else if task.order <= self.boundary {
            TaskStatus::InProgress
        } else {
            TaskStatus::Locked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, RawCatalogFile};

    fn course() -> Course {
        let raw: RawCatalogFile = toml::from_str(
            r#"
            [[course]]
            id = "html"
            title = "HTML"
            category = "frontend"
            [[course.chapter]]
            id = "c1"
            title = "One"
            [[course.chapter.task]]
            id = "t1"
            title = "1"
            language = "html"
            [[course.chapter.task]]
            id = "t2"
            title = "2"
            language = "html"
            [[course.chapter]]
            id = "c2"
            title = "Two"
            [[course.chapter.task]]
            id = "t3"
            title = "3"
            language = "html"
            "#,
        )
        .unwrap();
        Catalog::try_from(raw).unwrap().courses()[0].clone()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nothing_completed_locks_all_but_first() {
        let c = course();
        let done = set(&[]);
        let t2 = c.task("t2").unwrap();
        assert_eq!(task_status(t2, &done, c.tasks()), TaskStatus::Locked);
        assert_eq!(
            task_status(c.task("t1").unwrap(), &done, c.tasks()),
            TaskStatus::InProgress
        );
    }

    #[test]
    fn first_completed_unlocks_only_second() {
        let c = course();
        let done = set(&["t1"]);
        assert_eq!(task_status(c.task("t2").unwrap(), &done, c.tasks()), TaskStatus::InProgress);
        assert_eq!(task_status(c.task("t3").unwrap(), &done, c.tasks()), TaskStatus::Locked);
    }

    #[test]
    fn out_of_order_completion_keeps_later_tasks_locked() {
        let c = course();
        let done = set(&["t2"]);
        assert_eq!(task_status(c.task("t2").unwrap(), &done, c.tasks()), TaskStatus::Completed);
        assert_eq!(task_status(c.task("t3").unwrap(), &done, c.tasks()), TaskStatus::Locked);

        let index = UnlockIndex::new(&c, &done);
        assert_eq!(index.boundary(), 1);
        assert_eq!(index.status(c.task("t3").unwrap(), &done), TaskStatus::Locked);
    }

    #[test]
    fn attempt_allowed_unless_locked() {
        assert!(can_attempt(TaskStatus::InProgress));
        assert!(can_attempt(TaskStatus::Completed));
        assert!(!can_attempt(TaskStatus::Locked));
    }
}
