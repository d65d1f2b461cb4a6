// src/lib.rs

pub mod catalog;
pub mod cli;
pub mod dom;
pub mod errors;
pub mod eval;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod progression;
pub mod report;
pub mod store;
pub mod types;
pub mod watch;
pub mod workspace;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::catalog::loader::load_and_validate;
use crate::cli::{CliArgs, Command};
use crate::eval::Evaluator;
use crate::exec::EvaluatorBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::{CodeSnapshots, ProgressStore, RemotePayload, Storage, open_storage};
use crate::workspace::{
    Runtime, RuntimeOptions, WorkspaceCore, WorkspaceEvent, WorkspaceNotice,
};

/// Shared pieces every command needs.
struct Session {
    catalog: Arc<Catalog>,
    fs: Arc<dyn FileSystem>,
    storage: Arc<dyn Storage>,
}

/// High-level entry point used by `main.rs`.
///
/// Loads the catalog once, opens storage and dispatches the subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let catalog_path = PathBuf::from(&args.catalog);
    let catalog = Arc::new(load_and_validate(&catalog_path)?);

    let mode = args.storage.unwrap_or(catalog.config().storage);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let storage = open_storage(mode, &catalog.config().storage_dir, Arc::clone(&fs));
    debug!(?mode, dir = %catalog.config().storage_dir.display(), "storage opened");

    let session = Session {
        catalog,
        fs,
        storage,
    };

    match args.command {
        Command::Courses => {
            let progress = ProgressStore::load(Arc::clone(&session.storage));
            print!("{}", report::format_courses(&session.catalog, &progress));
            Ok(())
        }
        Command::Status { course } => {
            let progress = ProgressStore::load(Arc::clone(&session.storage));
            let course = session.catalog.course(&course)?;
            print!(
                "{}",
                report::format_status(course, progress.completed(&course.id))
            );
            Ok(())
        }
        Command::Check { course, task, file } => run_check(&session, &course, &task, &file).await,
        Command::Watch { course, task, file } => {
            run_watch(&session, &course, task.as_deref(), &file).await
        }
        Command::Sync { course, remote } => run_sync(&session, course.as_deref(), &remote),
    }
}

fn open_workspace(
    session: &Session,
    course: &str,
    task: Option<&str>,
    options: RuntimeOptions,
) -> Result<WorkspaceCore> {
    let progress = ProgressStore::load(Arc::clone(&session.storage));
    let snapshots = CodeSnapshots::new(Arc::clone(&session.storage));
    Ok(WorkspaceCore::new(
        Arc::clone(&session.catalog),
        course,
        task,
        progress,
        snapshots,
        options,
    )?)
}

/// One-shot: run the task's checks against `file` and exit.
async fn run_check(session: &Session, course: &str, task: &str, file: &Path) -> Result<()> {
    let code = session.fs.read_to_string(file)?;
    let core = open_workspace(
        session,
        course,
        Some(task),
        RuntimeOptions {
            exit_when_settled: true,
        },
    )?;

    let (tx, rx) = mpsc::channel::<WorkspaceEvent>(64);
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<WorkspaceNotice>();
    let backend = EvaluatorBackend::new(
        Evaluator::with_limits(session.catalog.config().sandbox),
        tx.clone(),
    );

    tx.send(WorkspaceEvent::CodeEdited { code }).await?;
    tx.send(WorkspaceEvent::RunRequested).await?;

    let runtime = Runtime::new(core, rx, &tx, backend, notice_tx);
    let core = runtime.run().await?;

    let course = core.course();
    let mut outcome = None;
    while let Some(notice) = notice_rx.recv().await {
        if let WorkspaceNotice::ResultsReady { results, .. } = &notice {
            let failed = results.iter().filter(|r| !r.pass).count();
            outcome = Some((failed, results.len()));
        }
        println!("{}", report::format_notice(&notice, course));
    }

    match outcome {
        None => bail!("no checks were run for task '{task}'"),
        Some((0, _)) => Ok(()),
        Some((failed, total)) => bail!("{failed} of {total} checks failed"),
    }
}

/// Watch `file` and re-run checks after every save until Ctrl-C.
async fn run_watch(session: &Session, course: &str, task: Option<&str>, file: &Path) -> Result<()> {
    let code = session.fs.read_to_string(file)?;
    let core = open_workspace(session, course, task, RuntimeOptions::default())?;
    let active = core.active_task();
    println!("{} ({})", active.title, active.id);
    for (i, step) in active.instructions.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }

    let (tx, rx) = mpsc::channel::<WorkspaceEvent>(64);
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<WorkspaceNotice>();
    let backend = EvaluatorBackend::new(
        Evaluator::with_limits(session.catalog.config().sandbox),
        tx.clone(),
    );

    let _watcher_handle =
        watch::spawn_file_watcher(file, tx.clone(), Arc::clone(&session.fs))?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(WorkspaceEvent::ShutdownRequested).await;
        });
    }

    {
        let catalog = Arc::clone(&session.catalog);
        let course_id = course.to_string();
        tokio::spawn(async move {
            while let Some(notice) = notice_rx.recv().await {
                if let Some(course) = catalog.find_course(&course_id) {
                    println!("{}", report::format_notice(&notice, course));
                }
            }
        });
    }

    tx.send(WorkspaceEvent::CodeEdited { code }).await?;
    tx.send(WorkspaceEvent::RunRequested).await?;

    let runtime = Runtime::new(core, rx, &tx, backend, notice_tx);
    drop(tx);
    let core = runtime.run().await?;
    info!(task = %core.task_id(), "watch session ended");
    Ok(())
}

/// Merge a remote payload file into local progress.
fn run_sync(session: &Session, course: Option<&str>, remote: &Path) -> Result<()> {
    if let Some(id) = course {
        session.catalog.course(id)?;
    }
    let raw = session.fs.read_to_string(remote)?;
    let payload = RemotePayload::from_json(&raw)?;

    let records: Vec<_> = payload
        .completions
        .into_iter()
        .filter(|r| course.is_none_or(|id| r.course == id))
        .collect();

    let mut progress = ProgressStore::load(Arc::clone(&session.storage));
    let added = progress.merge_known(&records, &session.catalog);
    println!(
        "merged {added} new completion(s) from {} record(s); {} malformed skipped",
        records.len(),
        payload.skipped
    );
    Ok(())
}
