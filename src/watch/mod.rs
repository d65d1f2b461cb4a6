// src/watch/mod.rs

//! File watching for the `watch` command.
//!
//! Turns saves of the learner's source file into `CodeEdited` events. A
//! content hash drops notifications that did not change the file.

pub mod watcher;

pub use watcher::{ContentFilter, WatcherHandle, spawn_file_watcher};
