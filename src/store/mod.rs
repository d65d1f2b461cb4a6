// src/store/mod.rs

//! Progression state store.
//!
//! - [`storage`]: key-value backends (files or memory).
//! - [`progress`]: completed-task sets with load/save/mark/merge.
//! - [`remote`]: decoding of server-synced completions.
//! - [`snapshots`]: per-task code drafts.

pub mod progress;
pub mod remote;
pub mod snapshots;
pub mod storage;

pub use progress::{CourseProgress, PROGRESS_KEY, ProgressRecord, ProgressStore};
pub use remote::{RemoteCompletion, RemotePayload};
pub use snapshots::CodeSnapshots;
pub use storage::{FileStorage, MemoryStorage, Storage, open_storage};
