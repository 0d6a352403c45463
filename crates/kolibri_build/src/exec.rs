use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use anyhow::Context;

#[derive(Debug, Default, Clone)]
pub struct ExecOptions {
  pub cwd: Option<PathBuf>,
  pub env: Option<HashMap<String, String>>,
}

/// Builds a [`Command`] from an argv-style list, where the first item is the program
pub fn command<I, S>(args: I, options: ExecOptions) -> anyhow::Result<Command>
where
  I: IntoIterator<Item = S>,
  S: AsRef<OsStr>,
{
  let mut args = args.into_iter();
  let Some(arg0) = args.next() else {
    return Err(anyhow::anyhow!("Cannot run an empty command"));
  };

  let mut command = Command::new(arg0);
  command.args(args);

  if let Some(cwd) = options.cwd {
    command.current_dir(cwd);
  }

  if let Some(extra_env) = options.env {
    for (key, val) in extra_env {
      command.env(key, val);
    }
  }

  Ok(command)
}

/// Runs a command to completion and returns what it printed on stdout.
/// Its stderr is passed through to ours.
pub fn exec_output<I, S>(args: I, options: ExecOptions) -> anyhow::Result<Vec<u8>>
where
  I: IntoIterator<Item = S>,
  S: AsRef<OsStr>,
{
  let mut command = command(args, options)?;
  command.stdin(Stdio::null());
  command.stderr(Stdio::inherit());

  let program = format!("{:?}", command.get_program());
  let output = command
    .output()
    .with_context(|| format!("Failed to run {program}"))?;

  if !output.status.success() {
    return Err(anyhow::anyhow!(
      "{} exited with status {}",
      program,
      output.status
    ));
  }

  Ok(output.stdout)
}
