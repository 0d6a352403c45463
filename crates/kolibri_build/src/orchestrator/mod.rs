//! Runs a set of bundle builds to completion, either serially in this process
//! or fanned out across a bounded pool of worker processes, and reports when
//! every bundle has finished its current compilation pass.
//!
//! All run state lives on the thread that calls [`Orchestrator::run_all`].
//! Workers only ever talk to it through [`PoolEvent`]s on a channel, which
//! are handled one at a time.
use std::sync::Arc;
use std::time::Duration;

use kolibri_build_core::completion::CompletionCounter;
use kolibri_build_core::completion::PassCompletion;
use kolibri_build_core::protocol::WorkerMessage;
use kolibri_build_core::types::BuildMode;
use kolibri_build_core::types::BuildOptions;
use kolibri_build_core::types::BundleDescriptor;
use kolibri_build_core::types::JobSpec;

use crate::runner::JobRunner;

mod execution_mode;
mod serial;
mod spawner;
#[cfg(test)]
mod testing;
mod worker_pool;

pub use self::execution_mode::*;
pub use self::spawner::*;

/// Called with the run's bundles and options each time a pass completes
pub type CompletionCallback = Box<dyn FnMut(&[BundleDescriptor], &BuildOptions) + Send>;

#[derive(Default)]
pub struct RunConfig {
  pub completion_callback: Option<CompletionCallback>,
  /// Abort the whole run as soon as any job exits abnormally
  pub persistent: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
  /// Every job has exited. `failed` lists the jobs that exited abnormally.
  Completed { failed: Vec<usize> },
  /// A job exited abnormally during a persistent run and the others were
  /// stopped
  Aborted { index: usize, exit: WorkerExit },
}

impl RunOutcome {
  pub fn exit_code(&self) -> i32 {
    match self {
      RunOutcome::Completed { failed } if failed.is_empty() => 0,
      RunOutcome::Completed { .. } => 1,
      RunOutcome::Aborted { exit, .. } => exit.exit_code(),
    }
  }
}

pub struct OrchestratorOptions {
  pub execution_mode: ExecutionMode,
  pub build_mode: BuildMode,
  /// Builds bundles in this process when running serially
  pub runner: Arc<dyn JobRunner>,
  /// Starts worker processes when running as a pool
  pub spawner: Arc<dyn WorkerSpawner>,
  pub watch_debounce: Duration,
}

pub struct Orchestrator {
  execution_mode: ExecutionMode,
  build_mode: BuildMode,
  runner: Arc<dyn JobRunner>,
  spawner: Arc<dyn WorkerSpawner>,
  watch_debounce: Duration,
}

impl Orchestrator {
  pub fn new(options: OrchestratorOptions) -> Self {
    Self {
      execution_mode: options.execution_mode,
      build_mode: options.build_mode,
      runner: options.runner,
      spawner: options.spawner,
      watch_debounce: options.watch_debounce,
    }
  }

  /// Builds every bundle and returns once all jobs have exited.
  ///
  /// `bundles` must not be empty. Runs that watch for changes only return
  /// if a job fails or watching breaks.
  pub fn run_all(
    &self,
    bundles: &[BundleDescriptor],
    options: &BuildOptions,
    config: RunConfig,
  ) -> anyhow::Result<RunOutcome> {
    let jobs = bundles
      .iter()
      .enumerate()
      .map(|(index, bundle)| JobSpec {
        index,
        ..JobSpec::new(bundle, options, self.build_mode)
      })
      .collect::<Vec<_>>();

    let mut tracker = PassTracker::new(bundles, options, config.completion_callback);

    tracing::info!(
      bundles = bundles.len(),
      mode = %self.build_mode,
      execution_mode = ?self.execution_mode,
      "Building bundles"
    );

    match self.execution_mode {
      ExecutionMode::Serial => serial::run_serial(
        self.runner.as_ref(),
        &jobs,
        config.persistent,
        self.watch_debounce,
        &mut tracker,
      ),
      ExecutionMode::Pool { size } => worker_pool::run_pool(
        self.spawner.as_ref(),
        jobs,
        size,
        config.persistent,
        &mut tracker,
      ),
    }
  }
}

/// Turns job messages into pass completions for one run
pub(crate) struct PassTracker<'a> {
  counter: CompletionCounter,
  bundles: &'a [BundleDescriptor],
  options: &'a BuildOptions,
  callback: Option<CompletionCallback>,
}

impl<'a> PassTracker<'a> {
  fn new(
    bundles: &'a [BundleDescriptor],
    options: &'a BuildOptions,
    callback: Option<CompletionCallback>,
  ) -> Self {
    Self {
      counter: CompletionCounter::new(bundles.len()),
      bundles,
      options,
      callback,
    }
  }

  pub(crate) fn handle(&mut self, message: WorkerMessage) {
    match message {
      WorkerMessage::Compile => self.counter.on_compile(),
      WorkerMessage::Done => {
        let Some(completion) = self.counter.on_done() else {
          return;
        };
        match completion {
          PassCompletion::Initial { elapsed } => {
            tracing::info!(
              "Initial build complete in {:.2} seconds",
              elapsed.as_secs_f64()
            );
          }
          PassCompletion::Rebuild => tracing::info!("All builds complete!"),
        }
        if let Some(callback) = self.callback.as_mut() {
          callback(self.bundles, self.options);
        }
      }
    }
  }
}
