//! Debounced source watching for development builds.
//!
//! One watcher can cover several bundles; each change batch is mapped back to
//! the indices of the bundles whose source directory it touched.
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use kolibri_build_core::types::JobSpec;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use notify_debouncer_mini::new_debouncer;
use notify_debouncer_mini::DebounceEventResult;
use notify_debouncer_mini::DebouncedEventKind;
use notify_debouncer_mini::Debouncer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
  #[error("Failed to initialize file watcher: {0}")]
  WatcherInit(#[source] notify::Error),

  #[error("Failed to watch {path:?}: {source}")]
  WatchPath {
    path: PathBuf,
    #[source]
    source: notify::Error,
  },

  #[error("File watcher stopped unexpectedly")]
  Disconnected,
}

struct WatchRoot {
  index: usize,
  path: PathBuf,
}

pub struct SourceWatcher {
  _debouncer: Debouncer<RecommendedWatcher>,
  events: Receiver<DebounceEventResult>,
  roots: Vec<WatchRoot>,
  ignored: Vec<PathBuf>,
}

impl SourceWatcher {
  /// Watches the source directory of every job that has one.
  ///
  /// Returns `None` if none of the jobs has anything to watch.
  pub fn for_jobs(jobs: &[JobSpec], debounce: Duration) -> Result<Option<Self>, WatchError> {
    let roots = jobs
      .iter()
      .filter_map(|job| {
        job.bundle.plugin_path.as_ref().map(|path| WatchRoot {
          index: job.index,
          path: path.clone(),
        })
      })
      .collect::<Vec<_>>();

    if roots.is_empty() {
      return Ok(None);
    }

    // Build output often lives inside the plugin directory
    let ignored = jobs
      .iter()
      .flat_map(|job| [&job.bundle.output_path, &job.bundle.stats_file])
      .flatten()
      .cloned()
      .collect::<Vec<_>>();

    let (tx, events) = channel();
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

    let unique_paths = roots
      .iter()
      .map(|root| root.path.clone())
      .collect::<BTreeSet<_>>();
    for path in unique_paths {
      debouncer
        .watcher()
        .watch(&path, RecursiveMode::Recursive)
        .map_err(|source| WatchError::WatchPath {
          path: path.clone(),
          source,
        })?;
      tracing::info!("Watching {} for changes", path.display());
    }

    Ok(Some(Self {
      _debouncer: debouncer,
      events,
      roots,
      ignored,
    }))
  }

  /// Blocks until a batch of relevant changes arrives and returns the
  /// affected job indices in ascending order
  pub fn next_changes(&self) -> Result<Vec<usize>, WatchError> {
    loop {
      match self.events.recv() {
        Ok(Ok(events)) => {
          let changed = self.changed_indices(
            events
              .iter()
              .filter(|event| matches!(event.kind, DebouncedEventKind::Any))
              .map(|event| event.path.as_path()),
          );
          if !changed.is_empty() {
            return Ok(changed);
          }
        }
        Ok(Err(error)) => {
          tracing::warn!("Watch error: {:?}", error);
        }
        Err(_) => return Err(WatchError::Disconnected),
      }
    }
  }

  fn changed_indices<'a>(&self, paths: impl Iterator<Item = &'a Path>) -> Vec<usize> {
    let mut changed = BTreeSet::new();
    for path in paths {
      if !is_relevant(path, &self.ignored) {
        continue;
      }
      for root in &self.roots {
        if path.starts_with(&root.path) {
          changed.insert(root.index);
        }
      }
    }
    changed.into_iter().collect()
  }
}

fn is_relevant(path: &Path, ignored: &[PathBuf]) -> bool {
  if path
    .components()
    .any(|component| component.as_os_str() == "node_modules")
  {
    return false;
  }
  !ignored.iter().any(|ignored| path.starts_with(ignored))
}
