// src/workspace/core.rs

//! Pure workspace state machine.
//!
//! [`WorkspaceCore`] consumes [`WorkspaceEvent`]s and returns the commands
//! the async shell should carry out. It owns the progress store and code
//! snapshots but never touches channels, timers or the evaluator, so every
//! transition can be unit tested synchronously.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::handlers::{
    CoreCommand, CoreStep, handle_auto_run, handle_code_edited, handle_complete_manually,
    handle_remote_synced, handle_reset_code, handle_run_finished, handle_run_requested,
    handle_switch_task,
};
use super::{
    RejectReason, RunState, RunTrigger, RuntimeOptions, ScheduledRun, WorkspaceEvent,
    WorkspaceNotice,
};
use crate::catalog::{Catalog, Course, Task};
use crate::errors::{JourneyError, Result};
use crate::eval::PredicateResult;
use crate::progression::{
    TaskPosition, TaskStatus, find_next_task, find_task_position, first_open_task,
    is_course_complete, task_status,
};
use crate::store::{CodeSnapshots, ProgressStore};

/// State of the active task's workspace.
#[derive(Debug)]
pub struct WorkspaceCore {
    pub(super) catalog: Arc<Catalog>,
    pub(super) course_index: usize,
    pub(super) position: TaskPosition,
    pub(super) code: String,
    pub(super) state: RunState,
    pub(super) results: Vec<PredicateResult>,
    pub(super) progress: ProgressStore,
    pub(super) snapshots: CodeSnapshots,
    pub(super) next_run_id: u64,
    /// Bumped on every edit, reset and task switch; stale timers compare it.
    pub(super) generation: u64,
    /// Hash of the code that last reached `Passed`.
    pub(super) passed_hash: Option<blake3::Hash>,
    pub(super) debounce: Duration,
    pub(super) options: RuntimeOptions,
}

impl WorkspaceCore {
    /// Open `course_id` at `task_id`, or where the learner left off.
    pub fn new(
        catalog: Arc<Catalog>,
        course_id: &str,
        task_id: Option<&str>,
        progress: ProgressStore,
        snapshots: CodeSnapshots,
        options: RuntimeOptions,
    ) -> Result<Self> {
        let course_index = catalog
            .courses()
            .iter()
            .position(|c| c.id == course_id)
            .ok_or_else(|| JourneyError::CourseNotFound(course_id.to_string()))?;
        let course = &catalog.courses()[course_index];

        let task = match task_id {
            Some(id) => catalog.task(course_id, id)?,
            None => first_open_task(course, progress.completed(course_id))
                .or_else(|| course.tasks().next())
                .ok_or_else(|| {
                    JourneyError::Catalog(format!("course '{course_id}' has no tasks"))
                })?,
        };
        let position = find_task_position(course, &task.id).ok_or_else(|| {
            JourneyError::TaskNotFound {
                course: course_id.to_string(),
                task: task.id.clone(),
            }
        })?;
        let code = snapshots.load(course_id, task);
        let debounce = catalog.config().debounce;
        debug!(course = course_id, task = %task.id, "workspace opened");

        Ok(Self {
            catalog,
            course_index,
            position,
            code,
            state: RunState::Idle,
            results: Vec::new(),
            progress,
            snapshots,
            next_run_id: 1,
            generation: 0,
            passed_hash: None,
            debounce,
            options,
        })
    }

    /// Handle one event, returning the commands for the shell.
    pub fn step(&mut self, event: WorkspaceEvent) -> CoreStep {
        let settles = matches!(
            event,
            WorkspaceEvent::RunRequested
                | WorkspaceEvent::RunFinished { .. }
                | WorkspaceEvent::CompleteManually
        );

        let mut step = match event {
            WorkspaceEvent::CodeEdited { code } => handle_code_edited(self, code),
            WorkspaceEvent::RunRequested => handle_run_requested(self),
            WorkspaceEvent::AutoRunElapsed { generation } => handle_auto_run(self, generation),
            WorkspaceEvent::RunFinished {
                run_id,
                task_id,
                results,
            } => handle_run_finished(self, run_id, task_id, results),
            WorkspaceEvent::SwitchTask { task_id } => handle_switch_task(self, &task_id),
            WorkspaceEvent::ResetCode => handle_reset_code(self),
            WorkspaceEvent::CompleteManually => handle_complete_manually(self),
            WorkspaceEvent::RemoteSynced { records } => handle_remote_synced(self, &records),
            WorkspaceEvent::ShutdownRequested => CoreStep::stop(),
        };

        if self.options.exit_when_settled
            && settles
            && step.keep_running
            && !self.state.is_running()
        {
            step.commands.push(CoreCommand::RequestExit);
            step.keep_running = false;
        }
        step
    }

    pub fn course(&self) -> &Course {
        &self.catalog.courses()[self.course_index]
    }

    pub fn course_id(&self) -> &str {
        &self.course().id
    }

    pub fn active_task(&self) -> &Task {
        &self.course().chapters[self.position.chapter_index].tasks[self.position.task_index]
    }

    pub fn task_id(&self) -> &str {
        &self.active_task().id
    }

    pub fn position(&self) -> TaskPosition {
        self.position
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Results of the last applied run, in declared order.
    pub fn results(&self) -> &[PredicateResult] {
        &self.results
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> TaskStatus {
        task_status(
            self.active_task(),
            self.progress.completed(self.course_id()),
            self.course().tasks(),
        )
    }

    pub(super) fn code_hash(&self) -> blake3::Hash {
        blake3::hash(self.code.as_bytes())
    }

    /// Reasons the active task cannot be run right now.
    pub(super) fn check_runnable(&self) -> std::result::Result<(), RejectReason> {
        if self.state.is_running() {
            return Err(RejectReason::AlreadyRunning);
        }
        if self.status() == TaskStatus::Locked {
            return Err(RejectReason::Locked);
        }
        if self.active_task().tests.is_empty() {
            return Err(RejectReason::NoTests);
        }
        Ok(())
    }

    pub(super) fn start_run(&mut self, trigger: RunTrigger) -> CoreCommand {
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.state = RunState::Running {
            run_id,
            code_hash: self.code_hash(),
        };

        let task = self.active_task();
        debug!(run_id, task = %task.id, ?trigger, "run started");
        CoreCommand::StartRun(ScheduledRun {
            run_id,
            course_id: self.course_id().to_string(),
            task_id: task.id.clone(),
            code: self.code.clone(),
            predicates: task.tests.clone(),
            trigger,
        })
    }

    /// Make `position` the active task with a fresh attempt.
    pub(super) fn switch_to(&mut self, position: TaskPosition) {
        self.position = position;
        self.state = RunState::Idle;
        self.results.clear();
        self.passed_hash = None;
        self.generation += 1;
        self.code = self.snapshots.load(self.course_id(), self.active_task());
        debug!(task = %self.task_id(), "active task switched");
    }

    /// Record completion of the active task and advance when possible.
    /// Returns whether the active task changed.
    pub(super) fn complete_active(&mut self, commands: &mut Vec<CoreCommand>) -> bool {
        let catalog = Arc::clone(&self.catalog);
        let course = &catalog.courses()[self.course_index];
        let task = &course.chapters[self.position.chapter_index].tasks[self.position.task_index];

        let newly_completed = self.progress.mark_complete(&course.id, &task.id);
        if newly_completed {
            commands.push(CoreCommand::Notify(WorkspaceNotice::Celebrate {
                course_id: course.id.clone(),
                task_id: task.id.clone(),
                message: task.completion_message.clone(),
            }));
        } else {
            debug!(task = %task.id, "task was already completed");
        }

        let completed = self.progress.completed(&course.id);
        let next = find_next_task(course, &task.id, completed)
            .and_then(|next| find_task_position(course, &next.id).map(|p| (next, p)));

        match next {
            Some((next, position)) => {
                info!(from = %task.id, to = %next.id, "advancing to next task");
                commands.push(CoreCommand::Notify(WorkspaceNotice::Advanced {
                    from: task.id.clone(),
                    to: next.id.clone(),
                    position,
                }));
                self.switch_to(position);
                true
            }
            None => {
                if newly_completed && is_course_complete(course, completed) {
                    info!(course = %course.id, "course finished");
                    commands.push(CoreCommand::Notify(WorkspaceNotice::CourseFinished {
                        course_id: course.id.clone(),
                    }));
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawCatalogFile;
    use crate::store::{MemoryStorage, RemoteCompletion, Storage};

    const CATALOG: &str = r#"
        [config]
        debounce_ms = 250

        [[course]]
        id = "html"
        title = "HTML"
        category = "frontend"

        [[course.chapter]]
        id = "c1"
        title = "One"

        [[course.chapter.task]]
        id = "t1"
        title = "Heading"
        language = "html"
        starter_code = "<h1></h1>"
        completion_message = "Nice heading!"

        [[course.chapter.task.test]]
        id = "h1"
        description = "has a heading"
        check = { kind = "contains", pattern = "<h1>" }

        [[course.chapter.task.test]]
        id = "p"
        description = "has a paragraph"
        check = { kind = "contains", pattern = "<p>" }

        [[course.chapter.task]]
        id = "t2"
        title = "List"
        language = "html"
        starter_code = "<ul></ul>"

        [[course.chapter.task.test]]
        id = "li"
        description = "has an item"
        check = { kind = "contains", pattern = "<li>" }

        [[course.chapter]]
        id = "c2"
        title = "Two"

        [[course.chapter.task]]
        id = "t3"
        title = "Reflect"
        language = "markdown"
    "#;

    fn catalog() -> Arc<Catalog> {
        let raw: RawCatalogFile = toml::from_str(CATALOG).unwrap();
        Arc::new(Catalog::try_from(raw).unwrap())
    }

    fn open(done: &[&str], task: Option<&str>, options: RuntimeOptions) -> WorkspaceCore {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut progress = ProgressStore::load(Arc::clone(&storage));
        for id in done {
            progress.mark_complete("html", id);
        }
        let snapshots = CodeSnapshots::new(storage);
        WorkspaceCore::new(catalog(), "html", task, progress, snapshots, options).unwrap()
    }

    fn results(passes: &[bool]) -> Vec<PredicateResult> {
        passes
            .iter()
            .enumerate()
            .map(|(i, &pass)| PredicateResult {
                predicate_id: format!("p{i}"),
                description: format!("predicate {i}"),
                hint: None,
                pass,
                error: None,
            })
            .collect()
    }

    fn started(step: &CoreStep) -> ScheduledRun {
        step.commands
            .iter()
            .find_map(|c| match c {
                CoreCommand::StartRun(run) => Some(run.clone()),
                _ => None,
            })
            .expect("a run was started")
    }

    fn notices(step: &CoreStep) -> Vec<WorkspaceNotice> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Notify(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    fn finish(core: &mut WorkspaceCore, run: &ScheduledRun, passes: &[bool]) -> CoreStep {
        core.step(WorkspaceEvent::RunFinished {
            run_id: run.run_id,
            task_id: run.task_id.clone(),
            results: results(passes),
        })
    }

    #[test]
    fn opens_at_first_open_task_with_starter_code() {
        let core = open(&["t1"], None, RuntimeOptions::default());
        assert_eq!(core.task_id(), "t2");
        assert_eq!(core.code(), "<ul></ul>");
        assert_eq!(core.state(), RunState::Idle);
        assert_eq!(core.status(), TaskStatus::InProgress);
    }

    #[test]
    fn concurrent_run_request_is_rejected_not_queued() {
        let mut core = open(&[], None, RuntimeOptions::default());
        let run = started(&core.step(WorkspaceEvent::RunRequested));
        assert_eq!(run.run_id, 1);
        assert_eq!(run.predicates.len(), 2);
        assert!(core.state().is_running());

        let step = core.step(WorkspaceEvent::RunRequested);
        assert_eq!(
            notices(&step),
            vec![WorkspaceNotice::RunRejected {
                task_id: "t1".into(),
                reason: RejectReason::AlreadyRunning
            }]
        );
        assert!(!step.commands.iter().any(|c| matches!(c, CoreCommand::StartRun(_))));
    }

    #[test]
    fn passing_run_completes_celebrates_and_advances() {
        let mut core = open(&[], None, RuntimeOptions::default());
        core.step(WorkspaceEvent::CodeEdited {
            code: "<h1>Hi</h1><p>x</p>".into(),
        });
        let run = started(&core.step(WorkspaceEvent::RunRequested));
        let step = finish(&mut core, &run, &[true, true]);

        let n = notices(&step);
        assert!(matches!(&n[0], WorkspaceNotice::ResultsReady { all_pass: true, .. }));
        assert_eq!(
            n[1],
            WorkspaceNotice::Celebrate {
                course_id: "html".into(),
                task_id: "t1".into(),
                message: Some("Nice heading!".into())
            }
        );
        assert_eq!(
            n[2],
            WorkspaceNotice::Advanced {
                from: "t1".into(),
                to: "t2".into(),
                position: TaskPosition {
                    chapter_index: 0,
                    task_index: 1
                }
            }
        );
        assert!(core.progress().is_completed("html", "t1"));
        assert_eq!(core.task_id(), "t2");
        assert_eq!(core.state(), RunState::Idle);
        assert!(core.results().is_empty());
        assert_eq!(core.code(), "<ul></ul>");
    }

    #[test]
    fn failing_run_returns_to_idle_and_keeps_every_result() {
        let mut core = open(&[], None, RuntimeOptions::default());
        let run = started(&core.step(WorkspaceEvent::RunRequested));
        let step = finish(&mut core, &run, &[true, false]);

        assert_eq!(notices(&step).len(), 1);
        assert_eq!(core.state(), RunState::Idle);
        assert_eq!(core.results().len(), 2);
        assert!(core.results()[0].pass && !core.results()[1].pass);
        assert!(!core.progress().is_completed("html", "t1"));
    }

    #[test]
    fn results_for_a_switched_away_task_are_discarded() {
        let mut core = open(&["t1"], Some("t1"), RuntimeOptions::default());
        let run = started(&core.step(WorkspaceEvent::RunRequested));
        core.step(WorkspaceEvent::SwitchTask {
            task_id: "t2".into(),
        });

        let step = finish(&mut core, &run, &[true, true]);
        assert_eq!(
            notices(&step),
            vec![WorkspaceNotice::StaleRunDiscarded { run_id: run.run_id }]
        );
        assert_eq!(core.task_id(), "t2");
        assert!(core.results().is_empty());
    }

    #[test]
    fn locked_task_can_be_visited_but_not_run() {
        let mut core = open(&[], None, RuntimeOptions::default());
        core.step(WorkspaceEvent::SwitchTask {
            task_id: "t2".into(),
        });
        assert_eq!(core.status(), TaskStatus::Locked);
        let step = core.step(WorkspaceEvent::RunRequested);
        assert_eq!(
            notices(&step),
            vec![WorkspaceNotice::RunRejected {
                task_id: "t2".into(),
                reason: RejectReason::Locked
            }]
        );

        let step = core.step(WorkspaceEvent::SwitchTask {
            task_id: "nope".into(),
        });
        assert_eq!(
            notices(&step),
            vec![WorkspaceNotice::UnknownTask {
                task_id: "nope".into()
            }]
        );
    }

    #[test]
    fn edits_schedule_debounced_runs_and_stale_timers_are_ignored() {
        let mut core = open(&[], None, RuntimeOptions::default());
        let step = core.step(WorkspaceEvent::CodeEdited { code: "<h1>".into() });
        assert!(matches!(
            &step.commands[..],
            [CoreCommand::ScheduleAutoRun { generation: 1, delay }] if *delay == Duration::from_millis(250)
        ));
        core.step(WorkspaceEvent::CodeEdited {
            code: "<h1><p>".into(),
        });

        assert!(core
            .step(WorkspaceEvent::AutoRunElapsed { generation: 1 })
            .commands
            .is_empty());
        let run = started(&core.step(WorkspaceEvent::AutoRunElapsed { generation: 2 }));
        assert_eq!(run.trigger, RunTrigger::Auto);
        assert_eq!(run.code, "<h1><p>");

        assert!(core
            .step(WorkspaceEvent::CodeEdited {
                code: "<h1><p>".into()
            })
            .commands
            .is_empty());
    }

    #[test]
    fn already_completed_task_does_not_celebrate_again() {
        let mut core = open(&["t1"], Some("t1"), RuntimeOptions::default());
        let run = started(&core.step(WorkspaceEvent::RunRequested));
        let n = notices(&finish(&mut core, &run, &[true, true]));
        assert!(!n.iter().any(|n| matches!(n, WorkspaceNotice::Celebrate { .. })));
        assert!(n.iter().any(|n| matches!(n, WorkspaceNotice::Advanced { .. })));
    }

    #[test]
    fn passed_with_unchanged_code_suppresses_auto_run() {
        let mut core = open(&["t1", "t3"], Some("t2"), RuntimeOptions::default());
        let run = started(&core.step(WorkspaceEvent::RunRequested));
        let n = notices(&finish(&mut core, &run, &[true]));
        assert!(n.contains(&WorkspaceNotice::CourseFinished {
            course_id: "html".into()
        }));
        assert_eq!(core.state(), RunState::Passed);

        let generation = core.generation();
        assert!(core
            .step(WorkspaceEvent::AutoRunElapsed { generation })
            .commands
            .is_empty());

        core.step(WorkspaceEvent::CodeEdited {
            code: "<ul><li>a</li></ul>".into(),
        });
        assert_eq!(core.state(), RunState::Idle);
    }

    #[test]
    fn manual_completion_only_for_tasks_without_tests() {
        let mut core = open(&[], None, RuntimeOptions::default());
        let step = core.step(WorkspaceEvent::CompleteManually);
        assert_eq!(
            notices(&step),
            vec![WorkspaceNotice::RunRejected {
                task_id: "t1".into(),
                reason: RejectReason::HasTests
            }]
        );

        let mut core = open(&["t1", "t2"], None, RuntimeOptions::default());
        assert_eq!(core.task_id(), "t3");
        assert_eq!(
            notices(&core.step(WorkspaceEvent::RunRequested)),
            vec![WorkspaceNotice::RunRejected {
                task_id: "t3".into(),
                reason: RejectReason::NoTests
            }]
        );
        let n = notices(&core.step(WorkspaceEvent::CompleteManually));
        assert!(matches!(n[0], WorkspaceNotice::Celebrate { .. }));
        assert!(matches!(n[1], WorkspaceNotice::CourseFinished { .. }));
    }

    #[test]
    fn reset_restores_starter_code() {
        let mut core = open(&[], None, RuntimeOptions::default());
        core.step(WorkspaceEvent::CodeEdited {
            code: "<h1>mine</h1>".into(),
        });
        core.step(WorkspaceEvent::ResetCode);
        assert_eq!(core.code(), "<h1></h1>");
        assert_eq!(core.state(), RunState::Idle);
    }

    #[test]
    fn reset_during_a_run_discards_its_results() {
        let mut core = open(&[], None, RuntimeOptions::default());
        core.step(WorkspaceEvent::CodeEdited {
            code: "<h1>Hi</h1><p>x</p>".into(),
        });
        let run = started(&core.step(WorkspaceEvent::RunRequested));
        core.step(WorkspaceEvent::ResetCode);
        assert_eq!(core.state(), RunState::Idle);
        assert_eq!(core.code(), "<h1></h1>");

        let step = finish(&mut core, &run, &[true, true]);
        assert_eq!(
            notices(&step),
            vec![WorkspaceNotice::StaleRunDiscarded { run_id: run.run_id }]
        );
        assert!(!core.progress().is_completed("html", "t1"));
        assert_eq!(core.task_id(), "t1");
        assert!(core.results().is_empty());

        let rerun = started(&core.step(WorkspaceEvent::RunRequested));
        assert_eq!(rerun.run_id, run.run_id + 1);
        assert_eq!(rerun.code, "<h1></h1>");
    }

    #[test]
    fn drafts_are_kept_per_course() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let snapshots = CodeSnapshots::new(Arc::clone(&storage));
        snapshots.save("css", "t1", "body { color: red; }");

        let mut core = WorkspaceCore::new(
            catalog(),
            "html",
            Some("t1"),
            ProgressStore::load(Arc::clone(&storage)),
            snapshots,
            RuntimeOptions::default(),
        )
        .unwrap();
        assert_eq!(core.code(), "<h1></h1>");

        core.step(WorkspaceEvent::CodeEdited {
            code: "<h1>draft</h1>".into(),
        });
        assert_eq!(
            storage.get(&CodeSnapshots::key_for("html", "t1")).unwrap().as_deref(),
            Some("<h1>draft</h1>")
        );
        assert_eq!(
            storage.get(&CodeSnapshots::key_for("css", "t1")).unwrap().as_deref(),
            Some("body { color: red; }")
        );
    }

    #[test]
    fn one_shot_mode_exits_once_settled() {
        let options = RuntimeOptions {
            exit_when_settled: true,
        };
        let mut core = open(&[], None, options);
        let step = core.step(WorkspaceEvent::RunRequested);
        assert!(step.keep_running);
        let run = started(&step);
        let step = finish(&mut core, &run, &[false, false]);
        assert!(!step.keep_running);
        assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));

        let mut core = open(&[], Some("t2"), options);
        assert!(!core.step(WorkspaceEvent::RunRequested).keep_running);
    }

    #[test]
    fn remote_sync_reports_added_ids() {
        let mut core = open(&[], None, RuntimeOptions::default());
        let step = core.step(WorkspaceEvent::RemoteSynced {
            records: vec![
                RemoteCompletion::new("html", "t1"),
                RemoteCompletion::new("html", "unknown"),
            ],
        });
        assert_eq!(notices(&step), vec![WorkspaceNotice::ProgressSynced { added: 1 }]);
        assert_eq!(core.status(), TaskStatus::Completed);
    }
}
