// src/workspace/handlers.rs

//! Event handling logic for the workspace core.

use std::time::Duration;

use tracing::{debug, info};

use super::core::WorkspaceCore;
use super::{RejectReason, RunState, RunTrigger, ScheduledRun, WorkspaceNotice};
use crate::eval::PredicateResult;
use crate::progression::{TaskStatus, find_task_position};
use crate::store::RemoteCompletion;

/// Command produced by the pure core, to be executed by the async shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand this run to the backend.
    StartRun(ScheduledRun),
    /// Send `AutoRunElapsed { generation }` after `delay`.
    ScheduleAutoRun { generation: u64, delay: Duration },
    /// Forward to the UI.
    Notify(WorkspaceNotice),
    /// Stop the runtime (one-shot mode).
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn nothing() -> Self {
        Self::continue_with(Vec::new())
    }

    pub fn stop() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }

    fn notify(notice: WorkspaceNotice) -> Self {
        Self::continue_with(vec![CoreCommand::Notify(notice)])
    }
}

/// Store the new code and arm the debounce timer.
///
/// An edit after `Passed` reopens the attempt. Edits during a run do not
/// cancel it; the run's results are applied to the task as usual.
pub fn handle_code_edited(core: &mut WorkspaceCore, code: String) -> CoreStep {
    if code == core.code {
        debug!("code unchanged; ignoring edit");
        return CoreStep::nothing();
    }

    core.code = code;
    core.snapshots
        .save(core.course_id(), core.active_task().id.as_str(), &core.code);
    core.generation += 1;
    if core.state == RunState::Passed {
        debug!(task = %core.task_id(), "edit after pass; attempt reopened");
        core.state = RunState::Idle;
    }

    CoreStep::continue_with(vec![CoreCommand::ScheduleAutoRun {
        generation: core.generation,
        delay: core.debounce,
    }])
}

pub fn handle_run_requested(core: &mut WorkspaceCore) -> CoreStep {
    match core.check_runnable() {
        Ok(()) => CoreStep::continue_with(vec![core.start_run(RunTrigger::Manual)]),
        Err(reason) => {
            debug!(task = %core.task_id(), %reason, "run rejected");
            CoreStep::notify(WorkspaceNotice::RunRejected {
                task_id: core.task_id().to_string(),
                reason,
            })
        }
    }
}

/// Auto-run only from a settled attempt whose code has not already passed.
pub fn handle_auto_run(core: &mut WorkspaceCore, generation: u64) -> CoreStep {
    if generation != core.generation {
        debug!(generation, current = core.generation, "superseded auto-run timer");
        return CoreStep::nothing();
    }
    if core.state == RunState::Passed && core.passed_hash == Some(core.code_hash()) {
        debug!("code already passed; auto-run suppressed");
        return CoreStep::nothing();
    }
    if let Err(reason) = core.check_runnable() {
        debug!(%reason, "auto-run suppressed");
        return CoreStep::nothing();
    }
    CoreStep::continue_with(vec![core.start_run(RunTrigger::Auto)])
}

/// Apply the results of the in-flight run, or discard them when the run is
/// no longer current.
pub fn handle_run_finished(
    core: &mut WorkspaceCore,
    run_id: u64,
    task_id: String,
    results: Vec<PredicateResult>,
) -> CoreStep {
    let code_hash = match core.state {
        RunState::Running {
            run_id: current,
            code_hash,
        } if current == run_id && task_id == core.task_id() => code_hash,
        _ => {
            debug!(run_id, task = %task_id, "discarding stale run results");
            return CoreStep::notify(WorkspaceNotice::StaleRunDiscarded { run_id });
        }
    };

    let all_pass = PredicateResult::all_pass(&results);
    let passed = results.iter().filter(|r| r.pass).count();
    info!(
        run_id,
        task = %task_id,
        passed,
        total = results.len(),
        all_pass,
        "run finished"
    );

    core.results = results.clone();
    let mut commands = vec![CoreCommand::Notify(WorkspaceNotice::ResultsReady {
        task_id,
        results,
        all_pass,
    })];
    let edited_during_run = core.code_hash() != code_hash;

    let advanced = if all_pass {
        core.state = RunState::Passed;
        core.passed_hash = Some(code_hash);
        core.complete_active(&mut commands)
    } else {
        core.state = RunState::Idle;
        false
    };

    if edited_during_run && !advanced {
        commands.push(CoreCommand::ScheduleAutoRun {
            generation: core.generation,
            delay: core.debounce,
        });
    }
    CoreStep::continue_with(commands)
}

/// Switching away from a running task leaves its run to be discarded.
pub fn handle_switch_task(core: &mut WorkspaceCore, task_id: &str) -> CoreStep {
    if task_id == core.task_id() {
        return CoreStep::nothing();
    }
    match find_task_position(core.course(), task_id) {
        Some(position) => {
            core.switch_to(position);
            CoreStep::nothing()
        }
        None => CoreStep::notify(WorkspaceNotice::UnknownTask {
            task_id: task_id.to_string(),
        }),
    }
}

pub fn handle_reset_code(core: &mut WorkspaceCore) -> CoreStep {
    let starter = core.active_task().starter_code.clone();
    core.snapshots
        .save(core.course_id(), core.active_task().id.as_str(), &starter);
    core.code = starter;
    core.results.clear();
    core.passed_hash = None;
    core.generation += 1;
    // An in-flight run no longer matches and its results are discarded.
    core.state = RunState::Idle;
    debug!(task = %core.task_id(), "code reset to starter");
    CoreStep::nothing()
}

/// Tasks without automated tests are completed by the learner directly.
pub fn handle_complete_manually(core: &mut WorkspaceCore) -> CoreStep {
    let rejection = if core.state.is_running() {
        Some(RejectReason::AlreadyRunning)
    } else if core.status() == TaskStatus::Locked {
        Some(RejectReason::Locked)
    } else if !core.active_task().tests.is_empty() {
        Some(RejectReason::HasTests)
    } else {
        None
    };
    if let Some(reason) = rejection {
        return CoreStep::notify(WorkspaceNotice::RunRejected {
            task_id: core.task_id().to_string(),
            reason,
        });
    }

    core.state = RunState::Passed;
    core.passed_hash = Some(core.code_hash());
    let mut commands = Vec::new();
    core.complete_active(&mut commands);
    CoreStep::continue_with(commands)
}

pub fn handle_remote_synced(core: &mut WorkspaceCore, records: &[RemoteCompletion]) -> CoreStep {
    let added = core.progress.merge_known(records, &core.catalog);
    CoreStep::notify(WorkspaceNotice::ProgressSynced { added })
}
