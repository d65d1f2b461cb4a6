// src/store/snapshots.rs

use std::sync::Arc;

use tracing::warn;

use super::storage::Storage;
use crate::catalog::Task;

/// Per-task code drafts so edits survive restarts. Keyed by course as well,
/// since task ids are only unique within their course.
#[derive(Debug, Clone)]
pub struct CodeSnapshots {
    storage: Arc<dyn Storage>,
}

impl CodeSnapshots {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn key_for(course_id: &str, task_id: &str) -> String {
        format!("journey:code:{course_id}:{task_id}")
    }

    /// Saved draft for `task` of `course_id`, or its starter code.
    pub fn load(&self, course_id: &str, task: &Task) -> String {
        match self.storage.get(&Self::key_for(course_id, &task.id)) {
            Ok(Some(code)) => code,
            Ok(None) => task.starter_code.clone(),
            Err(err) => {
                warn!(course = course_id, task = %task.id, error = %err, "failed to read code snapshot; using starter code");
                task.starter_code.clone()
            }
        }
    }

    pub fn save(&self, course_id: &str, task_id: &str, code: &str) {
        if let Err(err) = self.storage.set(&Self::key_for(course_id, task_id), code) {
            warn!(course = course_id, task = task_id, error = %err, "failed to save code snapshot");
        }
    }
}
