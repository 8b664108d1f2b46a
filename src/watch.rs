//! File system change feed for a [`ConfigResolver`].

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::RecommendedWatcher;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};
use tracing::{debug, error, info, warn};

use crate::{ConfigResolver, Error};

type EventResult = Result<Vec<DebouncedEvent>, notify::Error>;

/// Watches module resource roots and evicts cached configuration when a
/// configuration file in one of them changes.
///
/// Watching stops when the handle is dropped.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use profile_config::{ConfigResolver, ConfigWatcher, Module};
///
/// let resolver = Arc::new(ConfigResolver::builder().build());
/// let module = Module::new("web", "web/src/main/resources");
/// let _watcher = ConfigWatcher::start(
///     Arc::clone(&resolver),
///     [module.resource_root()],
///     Duration::from_millis(200),
/// )?;
/// # Ok::<(), profile_config::Error>(())
/// ```
pub struct ConfigWatcher {
    roots: Vec<PathBuf>,
    _debouncer: Debouncer<RecommendedWatcher>,
    /// Exits once the debouncer is dropped and the channel closes.
    _worker: JoinHandle<()>,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Starts watching `roots` (non-recursively). Roots are canonicalized;
    /// roots that do not exist are skipped with a warning.
    pub fn start<P: AsRef<Path>>(
        resolver: Arc<ConfigResolver>,
        roots: impl IntoIterator<Item = P>,
        debounce: Duration,
    ) -> Result<Self, Error> {
        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, tx)?;

        let mut watched = Vec::new();
        for root in roots {
            let root = root.as_ref();
            if !root.is_dir() {
                warn!(root = %root.display(), "resource root does not exist, skipping watch");
                continue;
            }
            let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
            debouncer
                .watcher()
                .watch(&root, notify::RecursiveMode::NonRecursive)?;
            info!(root = %root.display(), "watching resource root");
            watched.push(root);
        }

        let worker = thread::Builder::new()
            .name("profile-config-watch".to_string())
            .spawn(move || process_events(rx, &resolver))
            .map_err(|e| Error::Watch(notify::Error::io(e)))?;

        Ok(Self {
            roots: watched,
            _debouncer: debouncer,
            _worker: worker,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn process_events(rx: mpsc::Receiver<EventResult>, resolver: &ConfigResolver) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let evicted = apply_events(&events, resolver);
                if evicted > 0 {
                    debug!(events = events.len(), evicted, "configuration change applied");
                }
            }
            Ok(Err(e)) => error!(error = %e, "file watcher error"),
            Err(_) => {
                info!("configuration watcher stopped");
                return;
            }
        }
    }
}

fn apply_events(events: &[DebouncedEvent], resolver: &ConfigResolver) -> usize {
    events
        .iter()
        .filter(|event| {
            matches!(
                event.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .map(|event| resolver.on_file_changed(&event.path))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Module;
    use tempfile::TempDir;

    #[test]
    fn test_apply_events_evicts_owning_module() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("application.yml"), "a: 1\n").unwrap();
        let resolver = ConfigResolver::builder().build();
        let module = Module::new("web", dir.path());
        assert_eq!(resolver.get_config(&module, "a"), "1");

        let events = vec![
            DebouncedEvent {
                path: dir.path().join("notes.txt"),
                kind: DebouncedEventKind::Any,
            },
            DebouncedEvent {
                path: dir.path().join("application.yml"),
                kind: DebouncedEventKind::Any,
            },
        ];
        assert_eq!(apply_events(&events, &resolver), 1);
        assert!(!resolver.is_cached(&module));
    }

    #[test]
    fn test_missing_roots_are_skipped() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(ConfigResolver::builder().build());
        let missing = dir.path().join("missing");

        let watcher = ConfigWatcher::start(
            resolver,
            [dir.path(), missing.as_path()],
            Duration::from_millis(50),
        )
        .unwrap();
        assert_eq!(watcher.roots(), &[dir.path().canonicalize().unwrap()]);
    }

    #[test]
    fn test_relative_root_is_evicted_on_change() {
        let dir = TempDir::new_in(".").unwrap();
        let file = dir.path().join("application.yml");
        std::fs::write(&file, "a: 1\n").unwrap();

        let resolver = Arc::new(
            ConfigResolver::builder()
                .with_settings(crate::Settings {
                    scan_on_query: false,
                    ..crate::Settings::default()
                })
                .build(),
        );
        let module = Module::new("web", dir.path());
        assert!(module.resource_root().is_relative());
        assert_eq!(resolver.get_config(&module, "a"), "1");

        let watcher = ConfigWatcher::start(
            Arc::clone(&resolver),
            [module.resource_root()],
            Duration::from_millis(50),
        )
        .unwrap();
        assert!(watcher.roots()[0].is_absolute());

        std::fs::write(&file, "a: 2\n").unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while resolver.is_cached(&module) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(resolver.get_config(&module, "a"), "2");
    }
}
