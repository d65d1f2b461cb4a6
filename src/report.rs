// src/report.rs

//! Plain-text rendering for the CLI.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::catalog::{Catalog, Course};
use crate::eval::PredicateResult;
use crate::progression::{ProgressSummary, TaskStatus, UnlockIndex};
use crate::store::ProgressStore;
use crate::workspace::WorkspaceNotice;

fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "[x]",
        TaskStatus::InProgress => "[>]",
        TaskStatus::Locked => "[ ]",
    }
}

fn summary_line(summary: &ProgressSummary) -> String {
    format!(
        "{}/{} done ({}%)",
        summary.completed, summary.total, summary.percent
    )
}

/// One line per course.
pub fn format_courses(catalog: &Catalog, progress: &ProgressStore) -> String {
    let mut out = String::new();
    for course in catalog.courses() {
        let summary = ProgressSummary::for_course(course, progress.completed(&course.id));
        let _ = writeln!(
            out,
            "{:<12} {:<32} {:>2} chapters  {:>3} tasks  {}",
            course.id,
            course.title,
            course.chapters.len(),
            summary.total,
            summary_line(&summary)
        );
    }
    out
}

/// Every task of `course` grouped by chapter, with unlock status.
pub fn format_status(course: &Course, completed: &BTreeSet<String>) -> String {
    let index = UnlockIndex::new(course, completed);
    let mut out = String::new();

    let _ = writeln!(out, "{} ({})", course.title, course.id);
    if !course.tagline.is_empty() {
        let _ = writeln!(out, "  {}", course.tagline);
    }
    for chapter in &course.chapters {
        let summary = ProgressSummary::for_chapter(chapter, completed);
        let _ = writeln!(
            out,
            "\n{}. {}  {}",
            chapter.index + 1,
            chapter.title,
            summary_line(&summary)
        );
        for task in &chapter.tasks {
            let _ = writeln!(
                out,
                "  {} {:>3}  {:<28} {}",
                status_marker(index.status(task, completed)),
                task.order,
                task.id,
                task.title
            );
        }
    }

    let summary = ProgressSummary::for_course(course, completed);
    let _ = writeln!(out, "\ncourse: {}", summary_line(&summary));
    if summary.is_complete() {
        if let Some(cert) = &course.certificate {
            let _ = writeln!(out, "certificate unlocked: {}", cert.title);
        }
    }
    out
}

/// Predicate results in declared order, with hints and errors for failures.
pub fn format_results(results: &[PredicateResult]) -> String {
    let mut out = String::new();
    for r in results {
        let mark = if r.pass { "PASS" } else { "FAIL" };
        let _ = writeln!(out, "  {mark}  {}", r.description);
        if !r.pass {
            if let Some(hint) = &r.hint {
                let _ = writeln!(out, "        hint: {hint}");
            }
            if let Some(error) = &r.error {
                let _ = writeln!(out, "        error: {error}");
            }
        }
    }
    let passed = results.iter().filter(|r| r.pass).count();
    let _ = write!(out, "  {passed}/{} checks passed", results.len());
    out
}

/// Human-readable notice; task ids are resolved to titles when known.
pub fn format_notice(notice: &WorkspaceNotice, course: &Course) -> String {
    let title = |id: &str| {
        course
            .task(id)
            .map(|t| format!("{} ({id})", t.title))
            .unwrap_or_else(|| id.to_string())
    };

    match notice {
        WorkspaceNotice::ResultsReady { task_id, results, .. } => {
            format!("results for {}:\n{}", title(task_id), format_results(results))
        }
        WorkspaceNotice::Celebrate {
            task_id, message, ..
        } => match message {
            Some(message) => format!("completed {}! {message}", title(task_id)),
            None => format!("completed {}!", title(task_id)),
        },
        WorkspaceNotice::Advanced { to, position, .. } => format!(
            "next up: {} (chapter {}, task {})",
            title(to),
            position.chapter_index + 1,
            position.task_index + 1
        ),
        WorkspaceNotice::CourseFinished { .. } => {
            format!("course '{}' finished", course.title)
        }
        WorkspaceNotice::RunRejected { task_id, reason } => {
            format!("cannot run {}: {reason}", title(task_id))
        }
        WorkspaceNotice::StaleRunDiscarded { run_id } => {
            format!("discarded results of outdated run #{run_id}")
        }
        WorkspaceNotice::ProgressSynced { added } => {
            format!("merged {added} completion(s) from remote")
        }
        WorkspaceNotice::UnknownTask { task_id } => format!("no task '{task_id}' in this course"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawCatalogFile;

    fn catalog() -> Catalog {
        let raw: RawCatalogFile = toml::from_str(
            r#"
            [[course]]
            id = "md"
            title = "Writing"
            category = "fullstack"
            certificate = { title = "Writer" }
            [[course.chapter]]
            id = "c1"
            title = "Basics"
            [[course.chapter.task]]
            id = "intro"
            title = "Introduce yourself"
            language = "markdown"
            [[course.chapter.task]]
            id = "sample"
            title = "Show code"
            language = "markdown"
            "#,
        )
        .unwrap();
        Catalog::try_from(raw).unwrap()
    }

    #[test]
    fn status_marks_each_task() {
        let catalog = catalog();
        let course = &catalog.courses()[0];
        let done: BTreeSet<String> = ["intro".to_string()].into();
        let text = format_status(course, &done);
        assert!(text.contains("[x]   1  intro"), "{text}");
        assert!(text.contains("[>]   2  sample"), "{text}");
        assert!(text.contains("course: 1/2 done (50%)"), "{text}");
        assert!(!text.contains("certificate"));
    }

    #[test]
    fn failing_results_show_hint_and_error() {
        let results = vec![PredicateResult {
            predicate_id: "f".into(),
            description: "calls f".into(),
            hint: Some("define f".into()),
            pass: false,
            error: Some("x".into()),
        }];
        let text = format_results(&results);
        assert!(text.contains("FAIL  calls f"));
        assert!(text.contains("hint: define f"));
        assert!(text.contains("error: x"));
        assert!(text.ends_with("0/1 checks passed"));
    }

    #[test]
    fn notices_use_task_titles() {
        let catalog = catalog();
        let course = &catalog.courses()[0];
        let text = format_notice(
            &WorkspaceNotice::Celebrate {
                course_id: "md".into(),
                task_id: "intro".into(),
                message: None,
            },
            course,
        );
        assert_eq!(text, "completed Introduce yourself (intro)!");
    }
}
