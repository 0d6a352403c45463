//! This module configures tracing for the build tools.
//!
//! Console logging is enabled unless `KOLIBRI_TRACING_MODE` selects otherwise.
//!
//! Monitoring should only be initialized once per process.
use std::sync::Mutex;

pub use from_env::FromEnvError;
pub use tracer::TracerMode;
pub use tracer::TRACING_MODE_ENV;

mod from_env;
mod tracer;

pub static MONITORING_GUARD: Mutex<Option<MonitoringGuard>> = Mutex::new(None);

#[derive(Default)]
pub struct MonitoringGuard {
  #[allow(unused)]
  tracer: Option<tracer::Tracer>,
}

#[derive(Debug)]
pub struct MonitoringOptions {
  pub tracing_options: Vec<TracerMode>,
}

impl MonitoringOptions {
  pub fn from_env() -> Result<Self, FromEnvError> {
    let mut tracing_options = TracerMode::from_env()?;
    if tracing_options.is_empty() {
      tracing_options.push(TracerMode::Console);
    }
    Ok(Self { tracing_options })
  }
}

pub fn initialize_monitoring(options: MonitoringOptions) -> anyhow::Result<()> {
  let mut global = MONITORING_GUARD
    .lock()
    .map_err(|_| anyhow::anyhow!("Monitoring guard is poisoned"))?;
  if global.is_some() {
    tracing::warn!("Monitoring is getting set-up twice, this will no-op");
    return Ok(());
  }

  let tracer = Some(tracer::Tracer::new(&options.tracing_options)?);

  *global = Some(MonitoringGuard { tracer });

  Ok(())
}

pub fn initialize_from_env() -> anyhow::Result<()> {
  initialize_monitoring(MonitoringOptions::from_env()?)
}

/// Flushes any buffered log output. Call before exiting the process.
pub fn close_monitoring() {
  let Ok(mut monitoring_guard) = MONITORING_GUARD.lock() else {
    return;
  };
  monitoring_guard.take();
}
