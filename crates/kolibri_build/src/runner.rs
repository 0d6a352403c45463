use std::collections::HashMap;
use std::io::ErrorKind;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::Sender;
use kolibri_build_core::protocol::encode_line;
use kolibri_build_core::protocol::WorkerMessage;
use kolibri_build_core::types::JobSpec;
#[cfg(test)]
use mockall::automock;

use crate::config::BuildConfig;
use crate::exec::command;
use crate::exec::ExecOptions;
use crate::orchestrator::PoolEvent;
use crate::watch::SourceWatcher;

pub const BUILD_MODE_ENV: &str = "KOLIBRI_BUILD_MODE";
pub const BUNDLE_NAME_ENV: &str = "KOLIBRI_BUNDLE_NAME";

/// Compiles a single bundle
///
/// The bundler itself lives outside of this crate; implementors only need to
/// run one compilation pass and report whether it succeeded.
#[cfg_attr(test, automock)]
pub trait JobRunner: Send + Sync {
  fn compile(&self, job: &JobSpec) -> anyhow::Result<()>;
}

/// Where a running job reports its lifecycle events
pub trait MessageSink: Send + Sync {
  fn send(&self, message: WorkerMessage) -> anyhow::Result<()>;
}

/// Runs the configured bundler command once per compilation pass.
///
/// The bundler gets the job specification as JSON on stdin. Anything it
/// prints goes to stderr so that a worker's stdout stays reserved for
/// protocol messages.
pub struct BundlerJobRunner {
  bundler: Vec<String>,
  project_root: PathBuf,
}

impl BundlerJobRunner {
  pub fn new(config: &BuildConfig) -> Self {
    Self {
      bundler: config.bundler.clone(),
      project_root: config.project_root.clone(),
    }
  }
}

impl JobRunner for BundlerJobRunner {
  fn compile(&self, job: &JobSpec) -> anyhow::Result<()> {
    let mut command = command(
      &self.bundler,
      ExecOptions {
        cwd: Some(self.project_root.clone()),
        env: Some(HashMap::from([
          (BUILD_MODE_ENV.to_string(), job.mode.to_string()),
          (BUNDLE_NAME_ENV.to_string(), job.bundle.name.clone()),
        ])),
      },
    )?;
    command.stdin(Stdio::piped());
    command.stdout(Stdio::from(std::io::stderr()));
    command.stderr(Stdio::inherit());

    let mut child = command
      .spawn()
      .with_context(|| format!("Failed to start bundler {:?}", self.bundler))?;

    if let Some(mut stdin) = child.stdin.take() {
      let payload = serde_json::to_vec(job)?;
      // A bundler that does not read its job specification closes the pipe early
      if let Err(error) = stdin.write_all(&payload) {
        if error.kind() != ErrorKind::BrokenPipe {
          return Err(error.into());
        }
      }
    }

    let status = child.wait()?;
    if !status.success() {
      return Err(anyhow::anyhow!(
        "Bundler exited with status {} for {}",
        status,
        job.bundle.name
      ));
    }

    Ok(())
  }
}

/// Writes protocol messages to stdout, for use inside a worker process
#[derive(Default)]
pub struct StdoutSink {}

impl MessageSink for StdoutSink {
  fn send(&self, message: WorkerMessage) -> anyhow::Result<()> {
    let line = encode_line(&message)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(line.as_bytes())?;
    stdout.flush()?;
    Ok(())
  }
}

/// Forwards messages of one in-process job to the orchestrator's event loop
pub struct ChannelSink {
  index: usize,
  events: Sender<PoolEvent>,
}

impl ChannelSink {
  pub fn new(index: usize, events: Sender<PoolEvent>) -> Self {
    Self { index, events }
  }
}

impl MessageSink for ChannelSink {
  fn send(&self, message: WorkerMessage) -> anyhow::Result<()> {
    self
      .events
      .send(PoolEvent::Message {
        index: self.index,
        message,
      })
      .map_err(|_| anyhow::anyhow!("Build event loop has shut down"))
  }
}

/// Runs one compilation pass and reports it to `sink`.
///
/// The first pass sends no compile event, since the completion count already
/// starts with every bundle compiling. In watch mode a failed pass is logged
/// and still reported as done so that the next change can trigger a rebuild.
pub fn run_pass(
  runner: &dyn JobRunner,
  job: &JobSpec,
  sink: &dyn MessageSink,
  first_pass: bool,
) -> anyhow::Result<()> {
  if !first_pass {
    sink.send(WorkerMessage::Compile)?;
  }

  match runner.compile(job) {
    Ok(()) => {}
    Err(error) if job.watch => {
      tracing::error!(bundle = %job.bundle.name, "Build failed: {:#}", error);
    }
    Err(error) => return Err(error),
  }

  sink.send(WorkerMessage::Done)
}

/// Runs a job to completion: the first pass and, in watch mode, a rebuild
/// for every change to the bundle's sources. Watching only ends on error.
pub fn run_job(
  runner: &dyn JobRunner,
  job: &JobSpec,
  sink: &dyn MessageSink,
  watch_debounce: Duration,
) -> anyhow::Result<()> {
  run_pass(runner, job, sink, true)?;

  if !job.watch {
    return Ok(());
  }

  let Some(watcher) = SourceWatcher::for_jobs(std::slice::from_ref(job), watch_debounce)? else {
    tracing::warn!(bundle = %job.bundle.name, "No source directory to watch");
    return Ok(());
  };

  loop {
    watcher.next_changes()?;
    run_pass(runner, job, sink, false)?;
  }
}
