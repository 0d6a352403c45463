//! Build configuration read from the `[kolibri:build]` section of `setup.cfg`.
//!
//! ```ini
//! [kolibri:build]
//! bundler = npx webpack --config ./webpack.config.js
//! manifest_command = python -m kolibri.utils.build_manifest
//! watch_debounce_ms = 300
//! ```
//!
//! Every key is optional. A missing file yields the defaults.
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

pub const SETUP_CFG: &str = "setup.cfg";
pub const BUILD_SECTION: &str = "kolibri:build";

pub const DEFAULT_BUNDLER: &[&str] = &["npx", "webpack"];
pub const DEFAULT_MANIFEST_COMMAND: &[&str] = &["python", "-m", "kolibri.utils.build_manifest"];
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigFileError {
  #[error("Failed to read setup.cfg: {0}")]
  ReadError(#[from] ini::Error),

  #[error("Invalid configuration: [{section}] {key} = '{value}' - {reason}")]
  InvalidValue {
    section: String,
    key: String,
    value: String,
    reason: String,
  },
}

/// Configuration for a build run, parsed once at startup and passed down
#[derive(Clone, Debug, PartialEq)]
pub struct BuildConfig {
  /// Directory the build was started from; commands run here
  pub project_root: PathBuf,
  /// Command line used to invoke the bundler for one bundle
  pub bundler: Vec<String>,
  /// Command line that prints the bundle manifest for a set of plugins
  pub manifest_command: Vec<String>,
  pub watch_debounce: Duration,
}

impl BuildConfig {
  pub fn new(project_root: impl Into<PathBuf>) -> Self {
    Self {
      project_root: project_root.into(),
      bundler: to_command(DEFAULT_BUNDLER),
      manifest_command: to_command(DEFAULT_MANIFEST_COMMAND),
      watch_debounce: Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS),
    }
  }

  /// Loads `setup.cfg` from the project root, if there is one
  pub fn load(project_root: &Path) -> Result<Self, ConfigFileError> {
    let path = project_root.join(SETUP_CFG);
    if !path.exists() {
      return Ok(Self::new(project_root));
    }
    let ini = Ini::load_from_file(&path)?;
    Self::from_ini(project_root, &ini)
  }

  pub fn from_ini(project_root: &Path, ini: &Ini) -> Result<Self, ConfigFileError> {
    let mut config = Self::new(project_root);

    let Some(section) = ini.section(Some(BUILD_SECTION)) else {
      return Ok(config);
    };

    if let Some(value) = section.get("bundler") {
      config.bundler = parse_command("bundler", value)?;
    }

    if let Some(value) = section.get("manifest_command") {
      config.manifest_command = parse_command("manifest_command", value)?;
    }

    if let Some(value) = section.get("watch_debounce_ms") {
      let millis = value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid_value("watch_debounce_ms", value, "expected milliseconds"))?;
      config.watch_debounce = Duration::from_millis(millis);
    }

    Ok(config)
  }
}

/// Splits a command the way a POSIX shell would, honouring quotes
fn parse_command(key: &str, value: &str) -> Result<Vec<String>, ConfigFileError> {
  let command =
    shlex::split(value).ok_or_else(|| invalid_value(key, value, "unbalanced quotes"))?;
  if command.is_empty() {
    return Err(invalid_value(key, value, "command must not be empty"));
  }
  Ok(command)
}

fn invalid_value(key: &str, value: &str, reason: &str) -> ConfigFileError {
  ConfigFileError::InvalidValue {
    section: BUILD_SECTION.to_string(),
    key: key.to_string(),
    value: value.to_string(),
    reason: reason.to_string(),
  }
}

fn to_command(parts: &[&str]) -> Vec<String> {
  parts.iter().map(|part| part.to_string()).collect()
}
