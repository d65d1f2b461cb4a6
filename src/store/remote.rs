// src/store/remote.rs

//! Decoding of server-synced completions.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::{JourneyError, Result};

/// One remote completion, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCompletion {
    pub course: String,
    pub task: String,
    pub completed_at: Option<String>,
}

impl RemoteCompletion {
    pub fn new(course: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            course: course.into(),
            task: task.into(),
            completed_at: None,
        }
    }

    /// Both identifiers are present and non-blank.
    pub fn is_well_formed(&self) -> bool {
        !self.course.trim().is_empty() && !self.task.trim().is_empty()
    }
}

/// `{ track, lesson, completed?, completedAt? }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonEntry {
    track: String,
    lesson: String,
    #[serde(default = "default_true")]
    completed: bool,
    #[serde(default)]
    completed_at: Option<Value>,
}

/// `{ taskId, courseSlug, completedAt? }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskEntry {
    task_id: String,
    course_slug: String,
    #[serde(default)]
    completed_at: Option<Value>,
}

fn default_true() -> bool {
    true
}

fn timestamp(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Payload of the progress sync endpoint.
///
/// Accepts either `{ "progress": [...], "tasks": [...] }` or a bare list of
/// lesson entries. Entries that do not decode are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePayload {
    pub completions: Vec<RemoteCompletion>,
    /// Entries dropped because they did not decode.
    pub skipped: usize,
}

impl RemotePayload {
    pub fn from_json(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)?;
        let mut payload = RemotePayload::default();

        match value {
            Value::Array(entries) => payload.push_lessons(entries),
            Value::Object(mut map) => {
                if let Some(Value::Array(entries)) = map.remove("progress") {
                    payload.push_lessons(entries);
                }
                if let Some(Value::Array(entries)) = map.remove("tasks") {
                    payload.push_tasks(entries);
                }
            }
            _ => {
                return Err(JourneyError::Storage(
                    "remote payload must be a JSON object or array".to_string(),
                ));
            }
        }

        debug!(
            completions = payload.completions.len(),
            skipped = payload.skipped,
            "decoded remote payload"
        );
        Ok(payload)
    }

    fn push_lessons(&mut self, entries: Vec<Value>) {
        for entry in entries {
            match serde_json::from_value::<LessonEntry>(entry) {
                Ok(e) if e.completed => self.completions.push(RemoteCompletion {
                    course: e.track,
                    task: e.lesson,
                    completed_at: timestamp(e.completed_at),
                }),
                Ok(_) => {}
                Err(_) => self.skipped += 1,
            }
        }
    }

    fn push_tasks(&mut self, entries: Vec<Value>) {
        for entry in entries {
            match serde_json::from_value::<TaskEntry>(entry) {
                Ok(e) => self.completions.push(RemoteCompletion {
                    course: e.course_slug,
                    task: e.task_id,
                    completed_at: timestamp(e.completed_at),
                }),
                Err(_) => self.skipped += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_both_lists() {
        let payload = RemotePayload::from_json(
            r#"{
                "progress": [
                    {"track": "html", "lesson": "t1", "completed": true, "completedAt": "2024-05-01T10:00:00Z"},
                    {"track": "html", "lesson": "t9", "completed": false},
                    {"track": "html"}
                ],
                "tasks": [{"taskId": "js-1", "courseSlug": "javascript", "completedAt": null, "xpEarned": 10}]
            }"#,
        )
        .unwrap();
        assert_eq!(
            payload.completions,
            vec![
                RemoteCompletion {
                    course: "html".into(),
                    task: "t1".into(),
                    completed_at: Some("2024-05-01T10:00:00Z".into()),
                },
                RemoteCompletion::new("javascript", "js-1"),
            ]
        );
        assert_eq!(payload.skipped, 1);
    }

    #[test]
    fn bare_list_is_accepted() {
        let payload =
            RemotePayload::from_json(r#"[{"track":"html","lesson":"t1"},{"track":"html","lesson":"t2"}]"#)
                .unwrap();
        assert_eq!(payload.completions.len(), 2);
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(RemotePayload::from_json("42").is_err());
        assert!(RemotePayload::from_json("{not json").is_err());
    }
}
