use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// One independently buildable frontend output
///
/// Descriptors are produced by the plugin manifest and are read-only for the
/// rest of the run.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct BundleDescriptor {
  pub name: String,

  /// Ordinal position of the bundle within the run
  #[serde(default)]
  pub index: usize,

  /// Bundler configuration for this bundle, passed through untouched
  #[serde(default)]
  pub config: serde_json::Value,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub config_path: Option<PathBuf>,

  /// Source directory of the plugin, watched in development mode
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub plugin_path: Option<PathBuf>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_path: Option<PathBuf>,

  /// Bundle analysis report written by stats builds
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stats_file: Option<PathBuf>,
}

impl BundleDescriptor {
  pub fn new(name: impl Into<String>, index: usize) -> Self {
    Self {
      name: name.into(),
      index,
      ..Default::default()
    }
  }
}
