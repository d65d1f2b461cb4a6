// src/exec/backend.rs

//! Pluggable run backend abstraction.
//!
//! The workspace runtime hands every [`ScheduledRun`] to a `RunBackend`
//! instead of calling the evaluator directly. Production code uses
//! [`EvaluatorBackend`]; tests can provide a backend that records runs and
//! answers with scripted results.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::eval::{Evaluator, PredicateResult, TestPredicate};
use crate::workspace::{ScheduledRun, WorkspaceEvent};

/// Trait abstracting how scheduled runs are evaluated.
///
/// Implementations must not wait for the evaluation to finish: the result
/// is reported later as `WorkspaceEvent::RunFinished`, so the runtime keeps
/// accepting edits while a run is in flight.
pub trait RunBackend: Send {
    fn start_run(
        &mut self,
        run: ScheduledRun,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Evaluates runs on Tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct EvaluatorBackend {
    evaluator: Evaluator,
    runtime_tx: mpsc::Sender<WorkspaceEvent>,
}

impl EvaluatorBackend {
    pub fn new(evaluator: Evaluator, runtime_tx: mpsc::Sender<WorkspaceEvent>) -> Self {
        Self {
            evaluator,
            runtime_tx,
        }
    }
}

impl RunBackend for EvaluatorBackend {
    fn start_run(
        &mut self,
        run: ScheduledRun,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone so the spawned task does not borrow `self`.
        let evaluator = self.evaluator.clone();
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            tokio::spawn(async move {
                let ScheduledRun {
                    run_id,
                    task_id,
                    code,
                    predicates,
                    ..
                } = run;

                let fallback = predicates.clone();
                let results = match tokio::task::spawn_blocking(move || {
                    evaluator.evaluate_all(&predicates, &code)
                })
                .await
                {
                    Ok(results) => results,
                    Err(err) => {
                        warn!(run_id, error = %err, "evaluation task aborted");
                        aborted_results(&fallback, &err.to_string())
                    }
                };

                debug!(run_id, task = %task_id, "evaluation finished");
                if tx
                    .send(WorkspaceEvent::RunFinished {
                        run_id,
                        task_id,
                        results,
                    })
                    .await
                    .is_err()
                {
                    debug!(run_id, "runtime gone; dropping run results");
                }
            });
            Ok(())
        })
    }
}

fn aborted_results(predicates: &[TestPredicate], message: &str) -> Vec<PredicateResult> {
    predicates
        .iter()
        .map(|p| PredicateResult {
            predicate_id: p.id.clone(),
            description: p.description.clone(),
            hint: p.hint.clone(),
            pass: false,
            error: Some(message.to_string()),
        })
        .collect()
}
