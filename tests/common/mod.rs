#![allow(dead_code)]

use std::sync::Arc;

use journey::catalog::Catalog;
use journey::store::{CodeSnapshots, MemoryStorage, ProgressStore, Storage};
use journey::workspace::{RuntimeOptions, WorkspaceCore};

pub use journey_test_utils::init_tracing;

/// Open a workspace over in-memory storage with `done` already completed.
pub fn open_core(
    catalog: &Arc<Catalog>,
    course: &str,
    task: Option<&str>,
    done: &[&str],
    options: RuntimeOptions,
) -> (WorkspaceCore, Arc<dyn Storage>) {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut progress = ProgressStore::load(Arc::clone(&storage));
    for id in done {
        progress.mark_complete(course, id);
    }
    let core = WorkspaceCore::new(
        Arc::clone(catalog),
        course,
        task,
        progress,
        CodeSnapshots::new(Arc::clone(&storage)),
        options,
    )
    .expect("workspace opens");
    (core, storage)
}
