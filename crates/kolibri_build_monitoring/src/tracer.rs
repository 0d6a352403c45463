//! This module configures `tracing_subscriber` to write to the console, a log
//! file, or both.
//!
//! Console output always goes to stderr. Worker processes use stdout to talk
//! to the orchestrator, so nothing else may be written there.
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::from_env::optional_var;
use crate::from_env::FromEnvError;

pub const TRACING_MODE_ENV: &str = "KOLIBRI_TRACING_MODE";

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum TracerMode {
  /// Human readable logs on stderr
  Console,
  /// Hourly rotated log files in the temp directory
  File,
}

impl TracerMode {
  pub fn from_env() -> Result<Vec<Self>, FromEnvError> {
    let Some(mode) = optional_var(TRACING_MODE_ENV) else {
      return Ok(vec![]);
    };

    let mut tracer_modes = vec![];
    let mut used_modes = HashSet::new();

    for mode in mode.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
      let tracer_mode = match mode {
        "console" | "stdout" => Self::Console,
        "file" => Self::File,
        value => {
          return Err(FromEnvError::InvalidKey {
            key: String::from(TRACING_MODE_ENV),
            value: value.to_string(),
          })
        }
      };
      if used_modes.insert(tracer_mode) {
        tracer_modes.push(tracer_mode);
      }
    }

    Ok(tracer_modes)
  }
}

pub struct Tracer {
  #[allow(unused)]
  worker_guards: Vec<WorkerGuard>,
}

impl Tracer {
  pub fn new(options: &[TracerMode]) -> anyhow::Result<Self> {
    let mut worker_guards = vec![];

    let console_layer = if options.contains(&TracerMode::Console) {
      // Written synchronously so nothing is lost when the process exits with a code
      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(std::io::stderr)
          .with_target(false)
          .with_filter(env_filter()),
      )
    } else {
      None
    };

    let file_layer = if options.contains(&TracerMode::File) {
      let directory = std::env::temp_dir().join("kolibri_build_trace");
      let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::HOURLY)
        .max_log_files(4)
        .filename_prefix("kolibri-build-tracing")
        .build(&directory)
        .map_err(|err| anyhow::anyhow!(err))?;
      let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
      worker_guards.push(worker_guard);

      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(non_blocking)
          .with_ansi(false)
          .with_span_events(FmtSpan::CLOSE)
          .with_filter(env_filter()),
      )
    } else {
      None
    };

    let subscriber = Registry::default().with(console_layer).with(file_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Self { worker_guards })
  }
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
