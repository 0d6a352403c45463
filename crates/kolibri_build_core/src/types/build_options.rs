use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_PORT: u16 = 3000;

/// Options shared by every job in a build run
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BuildOptions {
  /// Use hot module reloading in the development server
  pub hot: bool,
  /// Base port for development servers and bundle stats servers
  pub port: u16,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      hot: false,
      port: DEFAULT_PORT,
    }
  }
}
