// tests/evaluator_backend.rs

mod common;
use crate::common::{init_tracing, open_core};

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;

use journey::eval::{Check, Evaluator, TestPredicate};
use journey::exec::EvaluatorBackend;
use journey::types::Language;
use journey::workspace::{Runtime, RuntimeOptions, WorkspaceEvent, WorkspaceNotice};
use journey_test_utils::builders::{CatalogBuilder, CourseBuilder, TaskBuilder, linear_course};
use journey_test_utils::{drain, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn check_once(
    catalog: &Arc<journey::catalog::Catalog>,
    course: &str,
    task: &str,
    done: &[&str],
    code: &str,
) -> Result<(journey::workspace::WorkspaceCore, Vec<WorkspaceNotice>), Box<dyn Error>> {
    let options = RuntimeOptions {
        exit_when_settled: true,
    };
    let (core, _storage) = open_core(catalog, course, Some(task), done, options);
    let (tx, rx) = mpsc::channel(16);
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    let backend = EvaluatorBackend::new(Evaluator::default(), tx.clone());

    tx.send(WorkspaceEvent::CodeEdited { code: code.into() }).await?;
    tx.send(WorkspaceEvent::RunRequested).await?;

    let core = with_timeout(Runtime::new(core, rx, &tx, backend, notice_tx).run()).await?;
    Ok((core, drain(&mut notice_rx).await))
}

#[tokio::test]
async fn passing_code_completes_the_last_task_and_finishes_the_course() -> TestResult {
    init_tracing();
    let catalog = Arc::new(
        CatalogBuilder::new()
            .with_course(linear_course("html", 3, 2))
            .build(),
    );

    let (core, notices) = check_once(&catalog, "html", "t3", &["t1", "t2"], "done-t3").await?;

    assert!(core.progress().is_completed("html", "t3"));
    assert!(matches!(
        notices.as_slice(),
        [
            WorkspaceNotice::ResultsReady { all_pass: true, .. },
            WorkspaceNotice::Celebrate { .. },
            WorkspaceNotice::CourseFinished { .. },
        ]
    ));
    Ok(())
}

#[tokio::test]
async fn script_errors_fail_only_their_own_predicate() -> TestResult {
    init_tracing();
    let task = TaskBuilder::new("sum")
        .language(Language::Javascript)
        .test(TestPredicate::new(
            "defines",
            "defines add",
            Check::Defines {
                function: "add".into(),
            },
        ))
        .test(TestPredicate::new(
            "adds",
            "add(2, 3) is 5",
            Check::Script {
                assert: "add(2, 3) == 5".into(),
                template: None,
            },
        ))
        .test(TestPredicate::new(
            "logs",
            "logs the sum",
            Check::Logs {
                pattern: "^5$".into(),
                call: Some("add(2, 3)".into()),
            },
        ));
    let catalog = Arc::new(
        CatalogBuilder::new()
            .with_course(CourseBuilder::new("js").chapter("c1", vec![task]))
            .build(),
    );

    // Returns the wrong value and never logs.
    let (core, notices) = check_once(&catalog, "js", "sum", &[], "fn add(a, b) { a - b }").await?;

    let results = match notices.as_slice() {
        [WorkspaceNotice::ResultsReady { results, all_pass: false, .. }] => results.clone(),
        other => panic!("unexpected notices {other:?}"),
    };
    let passes: Vec<_> = results.iter().map(|r| (r.predicate_id.as_str(), r.pass)).collect();
    assert_eq!(passes, vec![("defines", true), ("adds", false), ("logs", false)]);
    assert!(!core.progress().is_completed("js", "sum"));
    Ok(())
}
