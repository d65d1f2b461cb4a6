// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::workspace::WorkspaceEvent;

/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Remembers the hash of the last forwarded content so saves that do not
/// change the file (or duplicate notify events) are dropped.
#[derive(Debug, Default)]
pub struct ContentFilter {
    last: Option<blake3::Hash>,
}

impl ContentFilter {
    pub fn seeded(content: &str) -> Self {
        Self {
            last: Some(blake3::hash(content.as_bytes())),
        }
    }

    /// `true` when `content` differs from the last content seen.
    pub fn changed(&mut self, content: &str) -> bool {
        let hash = blake3::hash(content.as_bytes());
        if self.last == Some(hash) {
            return false;
        }
        self.last = Some(hash);
        true
    }
}

fn is_content_event(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Watch a single source file and send `WorkspaceEvent::CodeEdited` with its
/// new contents whenever they change.
///
/// The parent directory is watched (non-recursively) so editors that save
/// by replacing the file are still observed.
pub fn spawn_file_watcher(
    file: impl Into<PathBuf>,
    runtime_tx: mpsc::Sender<WorkspaceEvent>,
    fs: Arc<dyn FileSystem>,
) -> Result<WatcherHandle> {
    let file = file.into();
    let file = fs.canonicalize(&file).unwrap_or(file);
    let dir = file
        .parent()
        .map(Path::to_path_buf)
        .context("watched file has no parent directory")?;

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("journey: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("journey: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!("watching {:?}", file);

    let initial = fs.read_to_string(&file).unwrap_or_default();
    let mut filter = ContentFilter::seeded(&initial);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !is_content_event(&event.kind) {
                continue;
            }
            let touches_file = event
                .paths
                .iter()
                .any(|p| fs.canonicalize(p).map_or(p == &file, |c| c == file));
            if !touches_file {
                continue;
            }

            let code = match fs.read_to_string(&file) {
                Ok(code) => code,
                Err(err) => {
                    // Typically a save in progress; the next event will retry.
                    debug!(error = %err, "could not read watched file");
                    continue;
                }
            };
            if !filter.changed(&code) {
                debug!("watched file content unchanged");
                continue;
            }

            if runtime_tx
                .send(WorkspaceEvent::CodeEdited { code })
                .await
                .is_err()
            {
                debug!("workspace runtime gone; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn filter_drops_repeated_content() {
        let mut filter = ContentFilter::seeded("<p>a</p>");
        assert!(!filter.changed("<p>a</p>"));
        assert!(filter.changed("<p>b</p>"));
        assert!(!filter.changed("<p>b</p>"));
        assert!(filter.changed("<p>a</p>"));
    }

    #[test]
    fn only_create_and_modify_events_count() {
        assert!(is_content_event(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_content_event(&EventKind::Create(CreateKind::File)));
        assert!(!is_content_event(&EventKind::Access(AccessKind::Any)));
    }
}
