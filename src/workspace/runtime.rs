// src/workspace/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::core::WorkspaceCore;
use super::{CoreCommand, WorkspaceEvent, WorkspaceNotice};
use crate::errors::Result;
use crate::exec::RunBackend;

/// Drives a [`WorkspaceCore`] from `WorkspaceEvent`s and carries out its
/// commands: runs go to the backend, debounce timers feed back into the
/// event channel and notices go to the UI sink.
pub struct Runtime<B: RunBackend> {
    core: WorkspaceCore,
    event_rx: mpsc::Receiver<WorkspaceEvent>,
    /// Used by debounce timers to report back without keeping the channel
    /// open.
    timer_tx: mpsc::WeakSender<WorkspaceEvent>,
    backend: B,
    notices: mpsc::UnboundedSender<WorkspaceNotice>,
}

impl<B: RunBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: RunBackend> Runtime<B> {
    pub fn new(
        core: WorkspaceCore,
        event_rx: mpsc::Receiver<WorkspaceEvent>,
        event_tx: &mpsc::Sender<WorkspaceEvent>,
        backend: B,
        notices: mpsc::UnboundedSender<WorkspaceNotice>,
    ) -> Self {
        Self {
            core,
            event_rx,
            timer_tx: event_tx.downgrade(),
            backend,
            notices,
        }
    }

    /// Main event loop. Returns the core once the loop stops so callers can
    /// inspect the final state.
    pub async fn run(mut self) -> Result<WorkspaceCore> {
        info!(
            course = %self.core.course_id(),
            task = %self.core.task_id(),
            "workspace runtime started"
        );

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("workspace event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "workspace received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping workspace runtime");
                break;
            }
        }

        Ok(self.core)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::StartRun(run) => {
                debug!(run_id = run.run_id, task = %run.task_id, "dispatching run");
                self.backend.start_run(run).await?;
            }
            CoreCommand::ScheduleAutoRun { generation, delay } => {
                let tx = self.timer_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(tx) = tx.upgrade() {
                        // The runtime may have stopped while we slept.
                        let _ = tx.send(WorkspaceEvent::AutoRunElapsed { generation }).await;
                    }
                });
            }
            CoreCommand::Notify(notice) => {
                if self.notices.send(notice).is_err() {
                    debug!("notice receiver dropped");
                }
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }
}
