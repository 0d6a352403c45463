use thiserror::Error;

/// Errors reported to the user before any build job is started
#[derive(Error, Debug)]
pub enum BuildError {
  #[error("Build mode must be specified")]
  MissingMode,

  #[error("Build mode invalid value: {0}")]
  InvalidMode(String),

  #[error("Hot module reloading can only be used in dev mode.")]
  HotOutsideDevelopment,

  #[error("No valid bundle data was returned from the plugins specified")]
  NoBundles,
}
