use std::io::BufRead;

use anyhow::Context as _;
use clap::Parser;
use kolibri_build::protocol::decode_line;
use kolibri_build::protocol::ParentMessage;
use kolibri_build::runner::run_job;
use kolibri_build::runner::BundlerJobRunner;
use kolibri_build::runner::StdoutSink;
use kolibri_build::types::JobSpec;

use crate::context::Context;

#[derive(Debug, Parser)]
pub struct WorkerCommand {}

/// Builds the job the parent sends on stdin, reporting progress on stdout
pub fn main(ctx: Context, _cmd: WorkerCommand) -> anyhow::Result<i32> {
  let mut lines = std::io::stdin().lines();

  let job = match lines.next() {
    Some(line) => serde_json::from_str::<JobSpec>(&line?).context("Invalid job specification")?,
    None => return Ok(0),
  };

  if !job.start_immediately {
    tracing::debug!(index = job.index, "Waiting for a build slot");
    if !wait_for_start(&mut lines)? {
      return Ok(0);
    }
  }

  // Release the stdin lock so the watcher thread can take it over
  drop(lines);
  std::thread::Builder::new()
    .name(String::from("kolibri-worker-stdin"))
    .spawn(|| {
      for _ in std::io::stdin().lines().map_while(Result::ok) {}
      // The parent has gone away, so nobody is listening to this build
      tracing::debug!("Build orchestrator closed the connection");
      kolibri_build_monitoring::close_monitoring();
      stop_process_group();
      std::process::exit(0);
    })?;

  let runner = BundlerJobRunner::new(&ctx.config);
  match run_job(&runner, &job, &StdoutSink::default(), ctx.config.watch_debounce) {
    Ok(()) => Ok(0),
    Err(error) => {
      tracing::error!(bundle = %job.bundle.name, "{:#}", error);
      Ok(1)
    }
  }
}

/// Takes the bundler down with this worker when the worker leads its own
/// process group, as it does when the orchestrator spawned it
fn stop_process_group() {
  #[cfg(unix)]
  {
    // SAFETY: getpgrp and getpid cannot fail
    let leads_group = unsafe { libc::getpgrp() == libc::getpid() };
    if leads_group {
      // SAFETY: pid 0 addresses this worker's own process group
      unsafe {
        libc::kill(0, libc::SIGTERM);
      }
    }
  }
}

/// Returns false if stdin closed before the parent allowed the build to start
fn wait_for_start(lines: &mut impl Iterator<Item = std::io::Result<String>>) -> anyhow::Result<bool> {
  for line in lines {
    if let Some(ParentMessage::Start) = decode_line::<ParentMessage>(&line?) {
      return Ok(true);
    }
  }
  Ok(false)
}
