use std::path::PathBuf;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Env {
  pub pwd: PathBuf,
  /// Path of this executable, used to spawn build workers
  pub exe_path: PathBuf,
}

impl Env {
  pub fn parse() -> anyhow::Result<Self> {
    let pwd = std::env::current_dir().context("Cannot read the working directory")?;
    let exe_path = std::env::current_exe().context("Cannot locate the current executable")?;

    Ok(Self { pwd, exe_path })
  }
}
