// src/catalog/validate.rs

use std::collections::HashSet;

use crate::catalog::model::{
    Catalog, CatalogConfig, Chapter, Course, RawCatalogFile, RawChapter, RawCourse, RawTask, Task,
};
use crate::errors::{JourneyError, Result};

impl TryFrom<RawCatalogFile> for Catalog {
    type Error = JourneyError;

    fn try_from(raw: RawCatalogFile) -> std::result::Result<Self, Self::Error> {
        let config = CatalogConfig::from(&raw.config);
        let courses = raw
            .courses
            .into_iter()
            .map(course_from_raw)
            .collect::<Result<Vec<_>>>()?;
        Catalog::new(config, courses)
    }
}

impl Catalog {
    /// Validate and construct a catalog.
    pub fn new(config: CatalogConfig, courses: Vec<Course>) -> Result<Self> {
        validate_config(&config)?;
        ensure_has_courses(&courses)?;
        ensure_unique_course_ids(&courses)?;
        for course in &courses {
            validate_course(course)?;
        }
        Ok(Catalog::new_unchecked(config, courses))
    }
}

fn catalog_error(msg: impl Into<String>) -> JourneyError {
    JourneyError::Catalog(msg.into())
}

/// Assign chapter indexes and task orders; explicit orders must agree.
fn course_from_raw(raw: RawCourse) -> Result<Course> {
    let mut next_order: u32 = 1;
    let mut chapters = Vec::with_capacity(raw.chapters.len());

    for (index, RawChapter { id, title, description, tasks }) in
        raw.chapters.into_iter().enumerate()
    {
        let mut out = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Some(explicit) = task.order {
                if explicit != next_order {
                    return Err(catalog_error(format!(
                        "course '{}': task '{}' declares order {} but its position is {}",
                        raw.id, task.id, explicit, next_order
                    )));
                }
            }
            out.push(task_from_raw(task, next_order));
            next_order += 1;
        }
        chapters.push(Chapter {
            id,
            index,
            title,
            description,
            tasks: out,
        });
    }

    Ok(Course {
        id: raw.id,
        title: raw.title,
        tagline: raw.tagline,
        category: raw.category,
        chapters,
        certificate: raw.certificate,
        membership_perk: raw.membership_perk,
    })
}

fn task_from_raw(raw: RawTask, order: u32) -> Task {
    Task {
        id: raw.id,
        order,
        title: raw.title,
        summary: raw.summary,
        explanation: raw.explanation,
        instructions: raw.instructions,
        starter_code: raw.starter_code,
        language: raw.language,
        tests: raw.tests,
        narration: raw.narration,
        resources: raw.resources,
        completion_message: raw.completion_message,
    }
}

fn validate_config(config: &CatalogConfig) -> Result<()> {
    if config.debounce.is_zero() {
        return Err(catalog_error("[config].debounce_ms must be >= 1 (got 0)"));
    }
    let sandbox = &config.sandbox;
    if sandbox.max_operations == 0 || sandbox.timeout.is_zero() || sandbox.max_call_depth == 0 {
        return Err(catalog_error(
            "[config.sandbox] budgets (max_operations, timeout_ms, max_call_depth) must be >= 1",
        ));
    }
    Ok(())
}

fn ensure_has_courses(courses: &[Course]) -> Result<()> {
    if courses.is_empty() {
        return Err(catalog_error(
            "catalog must contain at least one [[course]] section",
        ));
    }
    Ok(())
}

fn ensure_unique_course_ids(courses: &[Course]) -> Result<()> {
    let mut seen = HashSet::new();
    for course in courses {
        if course.id.trim().is_empty() {
            return Err(catalog_error("course ids must not be empty"));
        }
        if !seen.insert(course.id.as_str()) {
            return Err(catalog_error(format!("duplicate course id '{}'", course.id)));
        }
    }
    Ok(())
}

fn validate_course(course: &Course) -> Result<()> {
    let mut chapter_ids = HashSet::new();
    let mut task_ids = HashSet::new();
    let mut expected_order: u32 = 1;

    for (position, chapter) in course.chapters.iter().enumerate() {
        if !chapter_ids.insert(chapter.id.as_str()) {
            return Err(catalog_error(format!(
                "course '{}': duplicate chapter id '{}'",
                course.id, chapter.id
            )));
        }
        if chapter.index != position {
            return Err(catalog_error(format!(
                "course '{}': chapter '{}' has index {} but is at position {}",
                course.id, chapter.id, chapter.index, position
            )));
        }

        for task in &chapter.tasks {
            if task.id.trim().is_empty() {
                return Err(catalog_error(format!(
                    "course '{}': task ids must not be empty",
                    course.id
                )));
            }
            if !task_ids.insert(task.id.as_str()) {
                return Err(catalog_error(format!(
                    "course '{}': duplicate task id '{}'",
                    course.id, task.id
                )));
            }
            if task.order != expected_order {
                return Err(catalog_error(format!(
                    "course '{}': task '{}' has order {} but {} was expected (orders must be contiguous from 1)",
                    course.id, task.id, task.order, expected_order
                )));
            }
            expected_order += 1;
            validate_predicates(course, task)?;
        }
    }
    Ok(())
}

fn validate_predicates(course: &Course, task: &Task) -> Result<()> {
    let mut ids = HashSet::new();
    for predicate in &task.tests {
        if !ids.insert(predicate.id.as_str()) {
            return Err(catalog_error(format!(
                "task '{}/{}': duplicate test id '{}'",
                course.id, task.id, predicate.id
            )));
        }
        predicate.check.validate().map_err(|reason| {
            catalog_error(format!(
                "task '{}/{}': test '{}': {}",
                course.id, task.id, predicate.id, reason
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Catalog> {
        let raw: RawCatalogFile = toml::from_str(src)?;
        Catalog::try_from(raw)
    }

    const TWO_CHAPTERS: &str = r#"
        [[course]]
        id = "html"
        title = "HTML"
        category = "frontend"

        [[course.chapter]]
        id = "c1"
        title = "One"

        [[course.chapter.task]]
        id = "t1"
        title = "First"
        language = "html"

        [[course.chapter.task]]
        id = "t2"
        title = "Second"
        language = "html"

        [[course.chapter]]
        id = "c2"
        title = "Two"

        [[course.chapter.task]]
        id = "t3"
        order = 3
        title = "Third"
        language = "html"
    "#;

    #[test]
    fn orders_and_indexes_are_assigned_in_nesting_order() {
        let catalog = parse(TWO_CHAPTERS).unwrap();
        let course = catalog.course("html").unwrap();
        let orders: Vec<_> = course.tasks().map(|t| (t.id.as_str(), t.order)).collect();
        assert_eq!(orders, vec![("t1", 1), ("t2", 2), ("t3", 3)]);
        assert_eq!(course.chapters[1].index, 1);
        assert_eq!(catalog.context("html", "t3").unwrap().chapter.id, "c2");
    }

    #[test]
    fn explicit_order_must_match_position() {
        let src = TWO_CHAPTERS.replace("order = 3", "order = 7");
        let err = parse(&src).unwrap_err().to_string();
        assert!(err.contains("declares order 7"), "{err}");
    }

    #[test]
    fn duplicate_task_ids_are_rejected() {
        let src = TWO_CHAPTERS.replace("id = \"t3\"", "id = \"t1\"");
        assert!(parse(&src).is_err());
    }

    #[test]
    fn empty_catalog_and_zero_debounce_are_rejected() {
        assert!(parse("").is_err());
        let src = format!("[config]\ndebounce_ms = 0\n{TWO_CHAPTERS}");
        assert!(parse(&src).is_err());
    }

    #[test]
    fn broken_check_pattern_names_the_test() {
        let src = format!(
            "{TWO_CHAPTERS}\n[[course.chapter.task.test]]\nid = \"kw\"\ndescription = \"d\"\ncheck = {{ kind = \"contains\", pattern = \"(\" }}\n"
        );
        let err = parse(&src).unwrap_err().to_string();
        assert!(err.contains("html/t3") && err.contains("'kw'"), "{err}");
    }
}
