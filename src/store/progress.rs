// src/store/progress.rs

//! Per-course completion sets, persisted under [`PROGRESS_KEY`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::remote::RemoteCompletion;
use super::storage::Storage;
use crate::catalog::Catalog;

/// Storage key of the progress record.
pub const PROGRESS_KEY: &str = "journey-progress";

static EMPTY: LazyLock<BTreeSet<String>> = LazyLock::new(BTreeSet::new);

/// Completed task ids for one course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseProgress {
    pub completed: BTreeSet<String>,
}

/// Persisted shape of one course entry.
#[derive(Serialize)]
struct CourseProgressView<'a> {
    completed: BTreeMap<&'a str, bool>,
}

/// All courses' progress.
///
/// Serialized as `{ "<course>": { "completed": { "<task>": true } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressRecord {
    pub courses: BTreeMap<String, CourseProgress>,
}

impl ProgressRecord {
    pub fn is_empty(&self) -> bool {
        self.courses.values().all(|c| c.completed.is_empty())
    }

    /// Decode leniently. Courses that do not have the expected shape are
    /// skipped; a task flagged `false` is not completed.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(input)?;
        let mut record = ProgressRecord::default();

        let Value::Object(courses) = value else {
            warn!("progress record is not a JSON object; ignoring it");
            return Ok(record);
        };

        for (course_id, entry) in courses {
            let Some(Value::Object(completed)) = entry.get("completed") else {
                warn!(course = %course_id, "malformed course progress entry; skipping");
                continue;
            };
            let ids: BTreeSet<String> = completed
                .iter()
                .filter(|(_, flag)| flag.as_bool().unwrap_or(false))
                .map(|(id, _)| id.clone())
                .collect();
            record
                .courses
                .insert(course_id, CourseProgress { completed: ids });
        }
        Ok(record)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let view: BTreeMap<&str, CourseProgressView<'_>> = self
            .courses
            .iter()
            .map(|(course_id, progress)| {
                let completed = progress.completed.iter().map(|id| (id.as_str(), true)).collect();
                (course_id.as_str(), CourseProgressView { completed })
            })
            .collect();
        serde_json::to_string(&view)
    }

    fn insert(&mut self, course_id: &str, task_id: &str) -> bool {
        self.courses
            .entry(course_id.to_string())
            .or_default()
            .completed
            .insert(task_id.to_string())
    }
}

/// Progress state for the session, written through to [`Storage`].
///
/// The in-memory record is authoritative; storage failures are logged and
/// otherwise ignored. Completed ids are never removed.
#[derive(Debug)]
pub struct ProgressStore {
    storage: Arc<dyn Storage>,
    record: ProgressRecord,
}

impl ProgressStore {
    /// Read the record from `storage`. Missing or unreadable data yields an
    /// empty record.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let record = match storage.get(PROGRESS_KEY) {
            Ok(Some(raw)) => ProgressRecord::from_json(&raw).unwrap_or_else(|err| {
                warn!(error = %err, "unparsable progress record; starting empty");
                ProgressRecord::default()
            }),
            Ok(None) => ProgressRecord::default(),
            Err(err) => {
                warn!(error = %err, "failed to read progress record; starting empty");
                ProgressRecord::default()
            }
        };
        debug!(courses = record.courses.len(), "progress loaded");
        Self { storage, record }
    }

    /// Write the current record. Failures are logged and swallowed.
    pub fn save(&self) {
        let json = match self.record.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to encode progress; keeping it in memory");
                return;
            }
        };
        if let Err(err) = self.storage.set(PROGRESS_KEY, &json) {
            warn!(error = %err, "failed to persist progress; keeping it in memory");
        }
    }

    /// Add `task_id` to the completed set. Returns `true` only when it was
    /// not already there; redundant calls neither write nor notify.
    pub fn mark_complete(&mut self, course_id: &str, task_id: &str) -> bool {
        let added = self.record.insert(course_id, task_id);
        if added {
            info!(course = course_id, task = task_id, "task completed");
            self.save();
        }
        added
    }

    /// Union remote completions into the local record. Returns how many ids
    /// were added. Records with blank ids are skipped.
    pub fn merge(&mut self, remote: &[RemoteCompletion]) -> usize {
        self.merge_filtered(remote, |_| true)
    }

    /// As [`merge`](Self::merge), additionally dropping ids the catalog does
    /// not know.
    pub fn merge_known(&mut self, remote: &[RemoteCompletion], catalog: &Catalog) -> usize {
        self.merge_filtered(remote, |r| catalog.contains(&r.course, &r.task))
    }

    fn merge_filtered(
        &mut self,
        remote: &[RemoteCompletion],
        keep: impl Fn(&RemoteCompletion) -> bool,
    ) -> usize {
        let mut added = 0;
        let mut ignored = 0;
        for entry in remote {
            if !entry.is_well_formed() || !keep(entry) {
                ignored += 1;
                continue;
            }
            if self.record.insert(entry.course.trim(), entry.task.trim()) {
                added += 1;
            }
        }
        if added > 0 {
            self.save();
        }
        debug!(added, ignored, total = remote.len(), "merged remote progress");
        added
    }

    pub fn completed(&self, course_id: &str) -> &BTreeSet<String> {
        self.record
            .courses
            .get(course_id)
            .map(|c| &c.completed)
            .unwrap_or(&EMPTY)
    }

    pub fn is_completed(&self, course_id: &str, task_id: &str) -> bool {
        self.completed(course_id).contains(task_id)
    }

    pub fn completed_count(&self, course_id: &str) -> usize {
        self.completed(course_id).len()
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }
}
