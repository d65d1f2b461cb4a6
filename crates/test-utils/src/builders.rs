#![allow(dead_code)]

use std::time::Duration;

use journey::catalog::{Catalog, CatalogConfig, Chapter, Course, Task};
use journey::eval::{Check, TestPredicate};
use journey::types::{CourseCategory, Language, StorageMode};

/// Builder for `Catalog` to simplify test setup.
pub struct CatalogBuilder {
    config: CatalogConfig,
    courses: Vec<Course>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        let mut config = CatalogConfig::default();
        config.storage = StorageMode::Memory;
        Self {
            config,
            courses: Vec::new(),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.config.debounce = debounce;
        self
    }

    pub fn with_course(mut self, course: CourseBuilder) -> Self {
        self.courses.push(course.build());
        self
    }

    pub fn build(self) -> Catalog {
        Catalog::new(self.config, self.courses).expect("Failed to build valid catalog from builder")
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Course`. Chapter indexes and task orders are assigned in
/// insertion order.
pub struct CourseBuilder {
    id: String,
    title: String,
    category: CourseCategory,
    chapters: Vec<(String, Vec<TaskBuilder>)>,
}

impl CourseBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: id.to_uppercase(),
            category: CourseCategory::Frontend,
            chapters: Vec::new(),
        }
    }

    pub fn chapter(mut self, id: &str, tasks: Vec<TaskBuilder>) -> Self {
        self.chapters.push((id.to_string(), tasks));
        self
    }

    pub fn build(self) -> Course {
        let mut order = 0;
        let chapters = self
            .chapters
            .into_iter()
            .enumerate()
            .map(|(index, (id, tasks))| Chapter {
                title: format!("Chapter {}", index + 1),
                id,
                index,
                description: String::new(),
                tasks: tasks
                    .into_iter()
                    .map(|t| {
                        order += 1;
                        t.build(order)
                    })
                    .collect(),
            })
            .collect();

        Course {
            id: self.id,
            title: self.title,
            tagline: String::new(),
            category: self.category,
            chapters,
            certificate: None,
            membership_perk: None,
        }
    }
}

/// Builder for `Task`.
pub struct TaskBuilder {
    id: String,
    language: Language,
    starter_code: String,
    tests: Vec<TestPredicate>,
    completion_message: Option<String>,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            language: Language::Html,
            starter_code: String::new(),
            tests: Vec::new(),
            completion_message: None,
        }
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn starter(mut self, code: &str) -> Self {
        self.starter_code = code.to_string();
        self
    }

    pub fn test(mut self, predicate: TestPredicate) -> Self {
        self.tests.push(predicate);
        self
    }

    /// Shorthand for a `contains` test named after the pattern.
    pub fn requires(self, pattern: &str) -> Self {
        let predicate = TestPredicate::new(
            format!("contains-{}", self.tests.len() + 1),
            format!("code contains {pattern}"),
            Check::Contains {
                pattern: pattern.to_string(),
            },
        );
        self.test(predicate)
    }

    pub fn completion_message(mut self, message: &str) -> Self {
        self.completion_message = Some(message.to_string());
        self
    }

    fn build(self, order: u32) -> Task {
        Task {
            title: format!("Task {}", self.id),
            id: self.id,
            order,
            summary: String::new(),
            explanation: String::new(),
            instructions: Vec::new(),
            starter_code: self.starter_code,
            language: self.language,
            tests: self.tests,
            narration: String::new(),
            resources: Vec::new(),
            completion_message: self.completion_message,
        }
    }
}

/// Course `id` with tasks `t1..=tn`, `per_chapter` tasks per chapter, each
/// requiring the text `done-<task>`.
pub fn linear_course(id: &str, n: usize, per_chapter: usize) -> CourseBuilder {
    let per_chapter = per_chapter.max(1);
    let mut course = CourseBuilder::new(id);
    let ids: Vec<usize> = (1..=n).collect();
    for (c, chunk) in ids.chunks(per_chapter).enumerate() {
        let tasks = chunk
            .iter()
            .map(|i| TaskBuilder::new(&format!("t{i}")).requires(&format!("done-t{i}")))
            .collect();
        course = course.chapter(&format!("c{}", c + 1), tasks);
    }
    course
}
