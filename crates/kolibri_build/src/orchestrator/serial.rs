use std::time::Duration;

use crossbeam_channel::Receiver;
use kolibri_build_core::types::JobSpec;

use super::PassTracker;
use super::PoolEvent;
use super::RunOutcome;
use super::WorkerExit;
use crate::runner::run_pass;
use crate::runner::ChannelSink;
use crate::runner::JobRunner;
use crate::watch::SourceWatcher;

/// Builds every job in this process, one after another.
///
/// Watched jobs share a single watcher once the first pass is over, and
/// rebuilds run in job order.
pub(crate) fn run_serial(
  runner: &dyn JobRunner,
  jobs: &[JobSpec],
  persistent: bool,
  watch_debounce: Duration,
  tracker: &mut PassTracker<'_>,
) -> anyhow::Result<RunOutcome> {
  let (events_tx, events) = crossbeam_channel::unbounded();
  let mut failed = Vec::new();

  for job in jobs {
    let sink = ChannelSink::new(job.index, events_tx.clone());
    let result = run_pass(runner, job, &sink, true);
    drain(&events, tracker);

    if let Err(error) = result {
      tracing::error!(bundle = %job.bundle.name, "Build failed: {:#}", error);
      if persistent {
        return Ok(RunOutcome::Aborted {
          index: job.index,
          exit: WorkerExit {
            code: Some(1),
            signal: None,
          },
        });
      }
      failed.push(job.index);
    }
  }

  let watched = jobs.iter().filter(|job| job.watch).cloned().collect::<Vec<_>>();
  if watched.is_empty() {
    return Ok(RunOutcome::Completed { failed });
  }

  let Some(watcher) = SourceWatcher::for_jobs(&watched, watch_debounce)? else {
    return Ok(RunOutcome::Completed { failed });
  };

  loop {
    for index in watcher.next_changes()? {
      let Some(job) = jobs.iter().find(|job| job.index == index) else {
        continue;
      };
      let sink = ChannelSink::new(index, events_tx.clone());
      run_pass(runner, job, &sink, false)?;
      drain(&events, tracker);
    }
  }
}

fn drain(events: &Receiver<PoolEvent>, tracker: &mut PassTracker<'_>) {
  for event in events.try_iter() {
    if let PoolEvent::Message { message, .. } = event {
      tracker.handle(message);
    }
  }
}
