// tests/progress_store.rs

mod common;
use crate::common::init_tracing;

use std::sync::Arc;

use proptest::prelude::*;
use tempfile::tempdir;

use journey::fs::RealFileSystem;
use journey::store::{
    CodeSnapshots, FileStorage, MemoryStorage, PROGRESS_KEY, ProgressStore, RemoteCompletion,
    RemotePayload, Storage,
};
use journey_test_utils::builders::{CatalogBuilder, CourseBuilder, TaskBuilder};

fn memory_store() -> ProgressStore {
    ProgressStore::load(Arc::new(MemoryStorage::new()))
}

fn pairs() -> impl Strategy<Value = Vec<(u8, u8)>> {
    proptest::collection::vec((0u8..3, 0u8..8), 0..20)
}

fn completions(pairs: &[(u8, u8)]) -> Vec<RemoteCompletion> {
    pairs
        .iter()
        .map(|(c, t)| RemoteCompletion::new(format!("c{c}"), format!("t{t}")))
        .collect()
}

proptest! {
    #[test]
    fn mark_complete_twice_equals_once(marks in pairs()) {
        let mut once = memory_store();
        let mut twice = memory_store();
        for (c, t) in &marks {
            once.mark_complete(&format!("c{c}"), &format!("t{t}"));
            twice.mark_complete(&format!("c{c}"), &format!("t{t}"));
            twice.mark_complete(&format!("c{c}"), &format!("t{t}"));
        }
        prop_assert_eq!(once.record(), twice.record());
    }

    #[test]
    fn merge_is_a_union_that_never_removes(local in pairs(), remote in pairs()) {
        let mut store = memory_store();
        for (c, t) in &local {
            store.mark_complete(&format!("c{c}"), &format!("t{t}"));
        }
        let before = store.record().clone();

        store.merge(&completions(&remote));
        for (course, progress) in &before.courses {
            prop_assert!(progress.completed.is_subset(store.completed(course)));
        }
        for (c, t) in &remote {
            let merged = store.is_completed(&format!("c{c}"), &format!("t{t}"));
            prop_assert!(merged, "c{}/t{} missing after merge", c, t);
        }
    }

    #[test]
    fn merging_empty_or_contained_lists_changes_nothing(local in pairs()) {
        let mut store = memory_store();
        for (c, t) in &local {
            store.mark_complete(&format!("c{c}"), &format!("t{t}"));
        }
        let before = store.record().clone();

        prop_assert_eq!(store.merge(&[]), 0);
        prop_assert_eq!(store.merge(&completions(&local)), 0);
        prop_assert_eq!(store.record(), &before);
    }
}

#[test]
fn persisted_record_merged_with_remote_lessons() {
    init_tracing();
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path(), Arc::new(RealFileSystem)));
    storage
        .set(PROGRESS_KEY, r#"{"html":{"completed":{"t1":true}}}"#)
        .unwrap();

    let payload =
        RemotePayload::from_json(r#"[{"track":"html","lesson":"t1"},{"track":"html","lesson":"t2"}]"#)
            .unwrap();
    let mut store = ProgressStore::load(Arc::clone(&storage));
    assert_eq!(store.merge(&payload.completions), 1);

    let ids: Vec<_> = store.completed("html").iter().cloned().collect();
    assert_eq!(ids, vec!["t1".to_string(), "t2".to_string()]);

    // Survives a reload from disk.
    let reloaded = ProgressStore::load(storage);
    assert!(reloaded.is_completed("html", "t2"));
}

#[test]
fn corrupt_progress_file_starts_empty_and_is_repaired_on_save() {
    init_tracing();
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(PROGRESS_KEY), "{ not json").unwrap();

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path(), Arc::new(RealFileSystem)));
    let mut store = ProgressStore::load(Arc::clone(&storage));
    assert!(store.record().is_empty());

    assert!(store.mark_complete("css", "selectors"));
    let raw = storage.get(PROGRESS_KEY).unwrap().unwrap();
    assert_eq!(raw, r#"{"css":{"completed":{"selectors":true}}}"#);
}

#[test]
fn code_snapshots_live_in_their_own_files_per_course() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path(), Arc::new(RealFileSystem)));
    let catalog = CatalogBuilder::new()
        .with_course(
            CourseBuilder::new("html")
                .chapter("c1", vec![TaskBuilder::new("t1").starter("<p></p>")]),
        )
        .with_course(
            CourseBuilder::new("css").chapter("c1", vec![TaskBuilder::new("t1").starter("body {}")]),
        )
        .build();

    let snapshots = CodeSnapshots::new(Arc::clone(&storage));
    snapshots.save("html", "t1", "<p>html draft</p>");

    // Reopen over the same directory.
    let reopened = CodeSnapshots::new(Arc::new(FileStorage::new(
        dir.path(),
        Arc::new(RealFileSystem),
    )));
    assert_eq!(
        reopened.load("html", catalog.task("html", "t1").unwrap()),
        "<p>html draft</p>"
    );
    assert_eq!(
        reopened.load("css", catalog.task("css", "t1").unwrap()),
        "body {}"
    );
    let file = FileStorage::new(dir.path(), Arc::new(RealFileSystem))
        .path_for(&CodeSnapshots::key_for("html", "t1"));
    assert!(file.is_file());
}
