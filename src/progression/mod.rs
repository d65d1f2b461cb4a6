// src/progression/mod.rs

//! Unlock policy, advancement and progress summaries.
//!
//! Everything here is a pure function of a [`Course`](crate::catalog::Course)
//! and a completed-id set; nothing is cached between calls.

pub mod advance;
pub mod summary;
pub mod unlock;

pub use advance::{
    TaskPosition, find_next_task, find_previous_task, find_task_position, first_open_task,
};
pub use summary::{ProgressSummary, is_course_complete};
pub use unlock::{TaskStatus, UnlockIndex, can_attempt, task_status};
