use kolibri_build_core::protocol::ParentMessage;
use kolibri_build_core::protocol::WorkerMessage;
use kolibri_build_core::types::JobSpec;

use super::PassTracker;
use super::PoolEvent;
use super::RunOutcome;
use super::WorkerProcess;
use super::WorkerSpawner;

struct PoolSlot {
  worker: Option<Box<dyn WorkerProcess>>,
  started: bool,
}

/// Fans the jobs out to one worker each, letting at most `pool_size` of them
/// build at once.
///
/// Job `i` starts right away if it falls in the first round of the pool.
/// Otherwise it is started once job `i - pool_size` has finished its first
/// pass or exited.
pub(crate) fn run_pool(
  spawner: &dyn WorkerSpawner,
  jobs: Vec<JobSpec>,
  pool_size: usize,
  persistent: bool,
  tracker: &mut PassTracker<'_>,
) -> anyhow::Result<RunOutcome> {
  let pool_size = pool_size.max(1);
  let (events_tx, events) = crossbeam_channel::unbounded();
  let mut slots = Vec::with_capacity(jobs.len());

  for (index, job) in jobs.into_iter().enumerate() {
    let job = JobSpec {
      index,
      start_immediately: index / pool_size == 0,
      ..job
    };
    let started = job.start_immediately;

    match spawner.spawn(job, events_tx.clone()) {
      Ok(worker) => slots.push(PoolSlot {
        worker: Some(worker),
        started,
      }),
      Err(error) => {
        terminate_all(&mut slots, None);
        return Err(error);
      }
    }
  }
  drop(events_tx);

  tracing::debug!(workers = slots.len(), pool_size, "Started build workers");

  let mut live = slots.len();
  let mut failed = Vec::new();

  while live > 0 {
    let Ok(event) = events.recv() else {
      break;
    };

    match event {
      PoolEvent::Message { index, message } => {
        tracker.handle(message);
        if message == WorkerMessage::Done {
          release(&mut slots, index + pool_size);
        }
      }
      PoolEvent::Closed { index } => {
        let Some(mut worker) = slots.get_mut(index).and_then(|slot| slot.worker.take()) else {
          continue;
        };
        let exit = worker.wait()?;
        live -= 1;

        if exit.is_abnormal() {
          if persistent {
            tracing::error!(
              index,
              code = ?exit.code,
              signal = ?exit.signal,
              "Build worker exited unexpectedly, stopping all builds"
            );
            terminate_all(&mut slots, exit.signal);
            return Ok(RunOutcome::Aborted { index, exit });
          }

          tracing::warn!(index, code = ?exit.code, signal = ?exit.signal, "Build worker failed");
          failed.push(index);
        }

        release(&mut slots, index + pool_size);
      }
    }
  }

  Ok(RunOutcome::Completed { failed })
}

fn release(slots: &mut [PoolSlot], index: usize) {
  let Some(slot) = slots.get_mut(index) else {
    return;
  };
  if slot.started {
    return;
  }
  slot.started = true;

  let Some(worker) = slot.worker.as_mut() else {
    return;
  };
  tracing::debug!(index, "Starting queued build worker");
  if let Err(error) = worker.send(ParentMessage::Start) {
    tracing::warn!(index, "Failed to start build worker: {:#}", error);
  }
}

fn terminate_all(slots: &mut [PoolSlot], signal: Option<i32>) {
  for slot in slots.iter_mut() {
    if let Some(worker) = slot.worker.as_mut() {
      if let Err(error) = worker.kill(signal) {
        tracing::warn!("Failed to stop build worker: {:#}", error);
      }
    }
  }

  for slot in slots.iter_mut() {
    if let Some(mut worker) = slot.worker.take() {
      let _ = worker.wait();
    }
  }
}
