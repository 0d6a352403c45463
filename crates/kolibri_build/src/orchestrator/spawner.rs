use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::PathBuf;
use std::process::Child;
use std::process::ChildStdin;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;

use anyhow::Context;
use crossbeam_channel::Sender;
use kolibri_build_core::protocol::decode_line;
use kolibri_build_core::protocol::encode_line;
use kolibri_build_core::protocol::ParentMessage;
use kolibri_build_core::protocol::WorkerMessage;
use kolibri_build_core::types::JobSpec;

/// Everything the orchestrator's event loop reacts to
#[derive(Clone, Debug, PartialEq)]
pub enum PoolEvent {
  Message {
    index: usize,
    message: WorkerMessage,
  },
  /// The job's message stream has ended, usually because it exited
  Closed { index: usize },
}

/// How a worker process ended
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WorkerExit {
  pub code: Option<i32>,
  pub signal: Option<i32>,
}

impl WorkerExit {
  pub fn success() -> Self {
    Self {
      code: Some(0),
      signal: None,
    }
  }

  pub fn is_abnormal(&self) -> bool {
    self.signal.is_some() || self.code != Some(0)
  }

  /// The exit code the parent should finish with to mirror this exit
  pub fn exit_code(&self) -> i32 {
    match (self.signal, self.code) {
      (Some(signal), _) => 128 + signal,
      (None, Some(code)) => code,
      (None, None) => 1,
    }
  }
}

impl From<ExitStatus> for WorkerExit {
  fn from(status: ExitStatus) -> Self {
    #[cfg(unix)]
    let signal = {
      use std::os::unix::process::ExitStatusExt;
      status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Self {
      code: status.code(),
      signal,
    }
  }
}

/// Starts one worker per job
pub trait WorkerSpawner: Send + Sync {
  /// Starts a worker for `job`. Everything the worker reports, including the
  /// end of its message stream, is delivered on `events`.
  fn spawn(&self, job: JobSpec, events: Sender<PoolEvent>)
    -> anyhow::Result<Box<dyn WorkerProcess>>;
}

pub trait WorkerProcess: Send {
  fn send(&mut self, message: ParentMessage) -> anyhow::Result<()>;

  /// Terminates the worker with `signal`, or with the platform default
  fn kill(&mut self, signal: Option<i32>) -> anyhow::Result<()>;

  /// Blocks until the worker has exited
  fn wait(&mut self) -> anyhow::Result<WorkerExit>;
}

/// Spawns workers as child processes running a worker command, usually
/// `kolibri-tools worker`
pub struct ProcessWorkerSpawner {
  program: PathBuf,
  args: Vec<String>,
}

impl ProcessWorkerSpawner {
  pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }
}

impl WorkerSpawner for ProcessWorkerSpawner {
  fn spawn(
    &self,
    job: JobSpec,
    events: Sender<PoolEvent>,
  ) -> anyhow::Result<Box<dyn WorkerProcess>> {
    let index = job.index;
    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit());

    // Each worker leads its own process group so a kill reaches its bundler too
    #[cfg(unix)]
    {
      use std::os::unix::process::CommandExt;
      command.process_group(0);
    }

    let mut child = command
      .spawn()
      .with_context(|| format!("Failed to spawn worker for {}", job.bundle.name))?;

    let mut stdin = child
      .stdin
      .take()
      .context("Worker stdin was not captured")?;
    let stdout = child
      .stdout
      .take()
      .context("Worker stdout was not captured")?;

    stdin.write_all(encode_line(&job)?.as_bytes())?;
    stdin.flush()?;

    std::thread::Builder::new()
      .name(format!("kolibri-worker-{index}-reader"))
      .spawn(move || {
        for line in BufReader::new(stdout).lines() {
          let Ok(line) = line else {
            break;
          };
          match decode_line::<WorkerMessage>(&line) {
            Some(message) => {
              if events.send(PoolEvent::Message { index, message }).is_err() {
                return;
              }
            }
            None => tracing::debug!(index, line = %line, "Ignoring worker output"),
          }
        }
        let _ = events.send(PoolEvent::Closed { index });
      })?;

    tracing::debug!(index, pid = child.id(), "Spawned worker");

    Ok(Box::new(ChildWorker {
      child,
      stdin: Some(stdin),
      exit: None,
    }))
  }
}

struct ChildWorker {
  child: Child,
  stdin: Option<ChildStdin>,
  exit: Option<WorkerExit>,
}

impl WorkerProcess for ChildWorker {
  fn send(&mut self, message: ParentMessage) -> anyhow::Result<()> {
    let stdin = self
      .stdin
      .as_mut()
      .context("Worker stdin is already closed")?;
    stdin.write_all(encode_line(&message)?.as_bytes())?;
    stdin.flush()?;
    Ok(())
  }

  fn kill(&mut self, signal: Option<i32>) -> anyhow::Result<()> {
    if self.exit.is_some() || self.child.try_wait()?.is_some() {
      return Ok(());
    }

    #[cfg(unix)]
    {
      let pid = libc::pid_t::try_from(self.child.id())?;
      let signal = signal.unwrap_or(libc::SIGTERM);
      // SAFETY: the child has not been reaped yet, so its pid is still the id
      // of the process group it leads
      if unsafe { libc::kill(-pid, signal) } != 0 {
        return Err(std::io::Error::last_os_error().into());
      }
      Ok(())
    }

    #[cfg(not(unix))]
    {
      let _ = signal;
      self.child.kill()?;
      Ok(())
    }
  }

  fn wait(&mut self) -> anyhow::Result<WorkerExit> {
    if let Some(exit) = self.exit {
      return Ok(exit);
    }
    self.stdin.take();
    let exit = WorkerExit::from(self.child.wait()?);
    self.exit = Some(exit);
    Ok(exit)
  }
}
