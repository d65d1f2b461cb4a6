// src/workspace/mod.rs

//! Workspace controller for the active task of one course.
//!
//! The pure state machine lives in [`core`] (with its event handlers in
//! [`handlers`]); the async shell that reads events, dispatches runs to a
//! [`RunBackend`](crate::exec::RunBackend) and arms debounce timers is in
//! [`runtime`].

use std::fmt;

use crate::eval::{PredicateResult, TestPredicate};
use crate::progression::TaskPosition;
use crate::store::RemoteCompletion;

pub mod core;
pub mod handlers;
pub mod runtime;

pub use core::WorkspaceCore;
pub use handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;

/// Options shared by the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once a requested run (or manual completion) has settled.
    /// Used for one-shot checks.
    pub exit_when_settled: bool,
}

/// Attempt state of the active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run since the last edit or task switch, or the last run failed.
    Idle,
    /// A run is in flight for the code with this hash.
    Running { run_id: u64, code_hash: blake3::Hash },
    /// Every predicate passed for the current attempt.
    Passed,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Manual,
    Auto,
}

/// A run handed to the backend.
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub run_id: u64,
    pub course_id: String,
    pub task_id: String,
    pub code: String,
    pub predicates: Vec<TestPredicate>,
    pub trigger: RunTrigger,
}

/// Events flowing into the workspace from the UI, timers and the backend.
#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    /// The learner's code changed.
    CodeEdited { code: String },
    /// Explicit "run tests".
    RunRequested,
    /// A debounce timer armed for `generation` fired.
    AutoRunElapsed { generation: u64 },
    /// The backend finished evaluating a run.
    RunFinished {
        run_id: u64,
        task_id: String,
        results: Vec<PredicateResult>,
    },
    SwitchTask { task_id: String },
    /// Restore the starter code of the active task.
    ResetCode,
    /// Complete a task that has no automated tests.
    CompleteManually,
    /// Remote completions fetched by the caller.
    RemoteSynced { records: Vec<RemoteCompletion> },
    ShutdownRequested,
}

/// Why a run or manual completion was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyRunning,
    Locked,
    NoTests,
    /// Manual completion is only for tasks without tests.
    HasTests,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::AlreadyRunning => "a run is already in progress",
            RejectReason::Locked => "task is locked until earlier tasks are completed",
            RejectReason::NoTests => "task has no automated tests; complete it manually",
            RejectReason::HasTests => "task has automated tests; run them instead",
        };
        f.write_str(s)
    }
}

/// UI-facing notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceNotice {
    ResultsReady {
        task_id: String,
        results: Vec<PredicateResult>,
        all_pass: bool,
    },
    /// First completion of a task.
    Celebrate {
        course_id: String,
        task_id: String,
        message: Option<String>,
    },
    Advanced {
        from: String,
        to: String,
        position: TaskPosition,
    },
    CourseFinished { course_id: String },
    RunRejected {
        task_id: String,
        reason: RejectReason,
    },
    StaleRunDiscarded { run_id: u64 },
    ProgressSynced { added: usize },
    UnknownTask { task_id: String },
}
