use kolibri_build::config::BuildConfig;

use crate::env::Env;

#[derive(Debug, Clone)]
pub struct Context {
  pub env: Env,
  pub config: BuildConfig,
}
