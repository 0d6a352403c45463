use serde::Deserialize;
use serde::Serialize;

use super::BuildMode;
use super::BuildOptions;
use super::BundleDescriptor;

/// The read-only job specification a worker is launched with
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JobSpec {
  pub bundle: BundleDescriptor,
  pub index: usize,
  /// When false the worker must wait for a `start` message from the parent
  pub start_immediately: bool,
  pub options: BuildOptions,
  pub mode: BuildMode,
  /// Keep rebuilding on source changes after the first pass
  pub watch: bool,
}

impl JobSpec {
  pub fn new(bundle: &BundleDescriptor, options: &BuildOptions, mode: BuildMode) -> Self {
    Self {
      bundle: bundle.clone(),
      index: bundle.index,
      start_immediately: true,
      options: *options,
      mode,
      watch: mode.watches(),
    }
  }
}
