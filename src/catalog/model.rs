// src/catalog/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::eval::{SandboxLimits, TestPredicate};
use crate::types::{CourseCategory, Language, StorageMode};

/// Catalog file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// debounce_ms = 600
/// storage = "file"
///
/// [[course]]
/// id = "html"
/// title = "HTML Foundations"
/// category = "frontend"
///
/// [[course.chapter]]
/// id = "html-phase-1"
/// title = "Structure"
///
/// [[course.chapter.task]]
/// id = "html-phase-1-task-1"
/// title = "Your first page"
/// language = "html"
///
/// [[course.chapter.task.test]]
/// id = "has-heading"
/// description = "The page has a heading"
/// check = { kind = "markup", expect = [{ selector = "h1" }] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCatalogFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default, rename = "course")]
    pub courses: Vec<RawCourse>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Quiet period after the last edit before an auto-run.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub storage: StorageMode,

    /// Directory for `storage = "file"`, relative to the catalog file.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default)]
    pub sandbox: SandboxSection,
}

fn default_debounce_ms() -> u64 {
    600
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".journey")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            storage: StorageMode::default(),
            storage_dir: default_storage_dir(),
            sandbox: SandboxSection::default(),
        }
    }
}

/// `[config.sandbox]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSection {
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

fn default_max_operations() -> u64 {
    SandboxLimits::default().max_operations
}

fn default_timeout_ms() -> u64 {
    SandboxLimits::default().timeout.as_millis() as u64
}

fn default_max_call_depth() -> usize {
    SandboxLimits::default().max_call_depth
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            timeout_ms: default_timeout_ms(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Perk {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resource {
    pub label: String,
    pub href: String,
}

/// `[[course]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCourse {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tagline: String,
    pub category: CourseCategory,
    #[serde(default)]
    pub certificate: Option<Perk>,
    #[serde(default)]
    pub membership_perk: Option<Perk>,
    #[serde(default, rename = "chapter")]
    pub chapters: Vec<RawChapter>,
}

/// `[[course.chapter]]` entry. Its index is positional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChapter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "task")]
    pub tasks: Vec<RawTask>,
}

/// `[[course.chapter.task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub id: String,
    /// Optional; when present it must equal the position in the course.
    #[serde(default)]
    pub order: Option<u32>,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub starter_code: String,
    pub language: Language,
    #[serde(default)]
    pub narration: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub completion_message: Option<String>,
    #[serde(default, rename = "test")]
    pub tests: Vec<TestPredicate>,
}

// ---------------------------------------------------------------------------
// Validated model

/// Smallest unit of learner work.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    /// 1-based, contiguous across the whole course.
    pub order: u32,
    pub title: String,
    pub summary: String,
    pub explanation: String,
    pub instructions: Vec<String>,
    pub starter_code: String,
    pub language: Language,
    pub tests: Vec<TestPredicate>,
    pub narration: String,
    pub resources: Vec<Resource>,
    pub completion_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: String,
    /// 0-based position within the course.
    pub index: usize,
    pub title: String,
    pub description: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub tagline: String,
    pub category: CourseCategory,
    pub chapters: Vec<Chapter>,
    pub certificate: Option<Perk>,
    pub membership_perk: Option<Perk>,
}

impl Course {
    /// All tasks in global order (chapter nesting order).
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.chapters.iter().flat_map(|c| c.tasks.iter())
    }

    pub fn ordered_tasks(&self) -> Vec<&Task> {
        self.tasks().collect()
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks().find(|t| t.id == task_id)
    }

    pub fn task_count(&self) -> usize {
        self.chapters.iter().map(|c| c.tasks.len()).sum()
    }
}

/// Validated `[config]`.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub debounce: Duration,
    pub storage: StorageMode,
    pub storage_dir: PathBuf,
    pub sandbox: SandboxLimits,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let section = ConfigSection::default();
        Self::from(&section)
    }
}

impl From<&ConfigSection> for CatalogConfig {
    fn from(section: &ConfigSection) -> Self {
        Self {
            debounce: Duration::from_millis(section.debounce_ms),
            storage: section.storage,
            storage_dir: section.storage_dir.clone(),
            sandbox: SandboxLimits {
                max_operations: section.sandbox.max_operations,
                timeout: Duration::from_millis(section.sandbox.timeout_ms),
                max_call_depth: section.sandbox.max_call_depth,
                ..SandboxLimits::default()
            },
        }
    }
}

/// Immutable, validated catalog. Build once and share as `Arc<Catalog>`.
#[derive(Debug, Clone)]
pub struct Catalog {
    config: CatalogConfig,
    courses: Vec<Course>,
}

/// A task together with the course and chapter that own it.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub course: &'a Course,
    pub chapter: &'a Chapter,
    pub task: &'a Task,
}

impl Catalog {
    /// Construct without validation. Callers must uphold the ordering
    /// invariants; use [`Catalog::new`] otherwise.
    pub(crate) fn new_unchecked(config: CatalogConfig, courses: Vec<Course>) -> Self {
        Self { config, courses }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn find_course(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn course(&self, course_id: &str) -> crate::errors::Result<&Course> {
        self.find_course(course_id)
            .ok_or_else(|| crate::errors::JourneyError::CourseNotFound(course_id.to_string()))
    }

    pub fn task(&self, course_id: &str, task_id: &str) -> crate::errors::Result<&Task> {
        Ok(self.context(course_id, task_id)?.task)
    }

    pub fn context(&self, course_id: &str, task_id: &str) -> crate::errors::Result<TaskContext<'_>> {
        let course = self.course(course_id)?;
        course
            .chapters
            .iter()
            .find_map(|chapter| {
                chapter
                    .tasks
                    .iter()
                    .find(|t| t.id == task_id)
                    .map(|task| TaskContext {
                        course,
                        chapter,
                        task,
                    })
            })
            .ok_or_else(|| crate::errors::JourneyError::TaskNotFound {
                course: course_id.to_string(),
                task: task_id.to_string(),
            })
    }

    /// Whether `task_id` is a task of `course_id`.
    pub fn contains(&self, course_id: &str, task_id: &str) -> bool {
        self.find_course(course_id)
            .is_some_and(|c| c.task(task_id).is_some())
    }
}
