use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use journey::errors::Result;
use journey::eval::PredicateResult;
use journey::exec::RunBackend;
use journey::workspace::{ScheduledRun, WorkspaceEvent};
use tokio::sync::mpsc;

/// How the fake answers a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOutcome {
    PassAll,
    FailAll,
    /// Record the run but never report it finished.
    Silent,
}

/// A fake backend that:
/// - records which runs were started
/// - immediately reports `RunFinished` with scripted results.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<WorkspaceEvent>,
    runs: Arc<Mutex<Vec<ScheduledRun>>>,
    outcome: Arc<Mutex<FakeOutcome>>,
}

impl FakeBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<WorkspaceEvent>,
        runs: Arc<Mutex<Vec<ScheduledRun>>>,
        outcome: Arc<Mutex<FakeOutcome>>,
    ) -> Self {
        Self {
            runtime_tx,
            runs,
            outcome,
        }
    }
}

/// One result per predicate of `run`, all passing or all failing.
pub fn uniform_results(run: &ScheduledRun, pass: bool) -> Vec<PredicateResult> {
    run.predicates
        .iter()
        .map(|p| PredicateResult {
            predicate_id: p.id.clone(),
            description: p.description.clone(),
            hint: p.hint.clone(),
            pass,
            error: None,
        })
        .collect()
}

impl RunBackend for FakeBackend {
    fn start_run(
        &mut self,
        run: ScheduledRun,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let runs = Arc::clone(&self.runs);
        let outcome = *self.outcome.lock().unwrap();

        Box::pin(async move {
            runs.lock().unwrap().push(run.clone());

            let results = match outcome {
                FakeOutcome::PassAll => uniform_results(&run, true),
                FakeOutcome::FailAll => uniform_results(&run, false),
                FakeOutcome::Silent => return Ok(()),
            };

            tx.send(WorkspaceEvent::RunFinished {
                run_id: run.run_id,
                task_id: run.task_id.clone(),
                results,
            })
            .await
            .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }
}
