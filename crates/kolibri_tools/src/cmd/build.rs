use std::path::PathBuf;
use std::sync::Arc;

use clap::CommandFactory;
use clap::Parser;
use kolibri_build::clean::clean;
use kolibri_build::orchestrator::CompletionCallback;
use kolibri_build::orchestrator::ExecutionMode;
use kolibri_build::orchestrator::Orchestrator;
use kolibri_build::orchestrator::OrchestratorOptions;
use kolibri_build::orchestrator::ProcessWorkerSpawner;
use kolibri_build::orchestrator::RunConfig;
use kolibri_build::orchestrator::RunOutcome;
use kolibri_build::resolver::BundleResolver;
use kolibri_build::resolver::ManifestResolver;
use kolibri_build::resolver::ResolveRequest;
use kolibri_build::runner::BundlerJobRunner;
use kolibri_build::stats_server::start_stats_servers;
use kolibri_build::stats_server::StatsServerHandle;
use kolibri_build::types::BuildMode;
use kolibri_build::types::BuildOptions;
use kolibri_build::types::BundleDescriptor;
use kolibri_build::types::DEFAULT_PORT;
use kolibri_build::BuildError;
use parking_lot::Mutex;

use crate::context::Context;

#[derive(Debug, Parser)]
pub struct BuildCommand {
  /// Mode to run in, options are: d/dev/development, p/prod/production,
  /// i/i18n/internationalization, c/clean, s/stats
  pub mode: Option<String>,
  /// Set custom file which lists plugins that should be built, or a JSON
  /// bundle manifest
  #[arg(short = 'f', long)]
  pub file: Option<PathBuf>,
  /// An explicit comma separated list of plugins that should be built
  #[arg(long, value_delimiter = ',')]
  pub plugins: Vec<String>,
  /// A system path to the plugin or module that should be added to the
  /// Python path so that it can be imported during build time
  #[arg(long = "pluginPath")]
  pub plugin_path: Option<PathBuf>,
  /// Run using a single core to reduce CPU burden
  #[arg(short, long)]
  pub single: bool,
  /// Use hot module reloading in the development server
  #[arg(long)]
  pub hot: bool,
  /// Set a port number to start devservers or bundle stats servers on
  #[arg(short, long, default_value_t = DEFAULT_PORT)]
  pub port: u16,
}

pub fn main(ctx: Context, cmd: BuildCommand) -> anyhow::Result<i32> {
  let mode = match cmd.mode.as_deref().unwrap_or_default().parse::<BuildMode>() {
    Ok(mode) => mode,
    Err(error @ BuildError::MissingMode) => {
      tracing::error!("{}", error);
      return Ok(1);
    }
    Err(error) => {
      tracing::error!("{}", error);
      print_help();
      return Ok(1);
    }
  };

  if let Err(error) = mode.validate_hot(cmd.hot) {
    tracing::error!("{}", error);
    return Ok(1);
  }

  let options = BuildOptions {
    hot: cmd.hot,
    port: cmd.port,
  };

  let bundles = ManifestResolver::new(&ctx.config).resolve(&ResolveRequest {
    plugin_file: cmd.file,
    plugins: cmd.plugins,
    plugin_path: cmd.plugin_path,
  })?;

  if bundles.is_empty() {
    tracing::error!("{}", BuildError::NoBundles);
    return Ok(1);
  }

  if mode == BuildMode::Clean {
    let removed = clean(&bundles)?;
    tracing::info!("Cleaned {} build outputs", removed);
    return Ok(0);
  }

  let orchestrator = Orchestrator::new(OrchestratorOptions {
    execution_mode: ExecutionMode::detect(cmd.single),
    build_mode: mode,
    runner: Arc::new(BundlerJobRunner::new(&ctx.config)),
    spawner: Arc::new(worker_spawner(&ctx)),
    watch_debounce: ctx.config.watch_debounce,
  });

  let stats_servers = Arc::new(Mutex::new(None));
  let completion_callback = match mode {
    BuildMode::Stats => Some(stats_callback(stats_servers.clone())),
    _ => None,
  };

  let outcome = orchestrator.run_all(
    &bundles,
    &options,
    RunConfig {
      completion_callback,
      persistent: mode.is_persistent(),
    },
  )?;

  report_outcome(&outcome, &bundles);
  if outcome.exit_code() != 0 {
    return Ok(outcome.exit_code());
  }

  let stats_servers = stats_servers.lock().take();
  if let Some(handle) = stats_servers {
    handle.wait()?;
  }

  Ok(0)
}

fn print_help() {
  let mut command = crate::KolibriToolsCommand::command();
  if let Some(build) = command.find_subcommand_mut("build") {
    let _ = build.print_help();
  }
}

/// Workers are this executable again, pointed at the same project
fn worker_spawner(ctx: &Context) -> ProcessWorkerSpawner {
  ProcessWorkerSpawner::new(
    ctx.env.exe_path.clone(),
    vec![
      String::from("--project-root"),
      ctx.config.project_root.to_string_lossy().to_string(),
      String::from("worker"),
    ],
  )
}

fn stats_callback(servers: Arc<Mutex<Option<StatsServerHandle>>>) -> CompletionCallback {
  Box::new(move |bundles, options| {
    let mut servers = servers.lock();
    if servers.is_some() {
      return;
    }
    match start_stats_servers(bundles, options) {
      Ok(handle) => *servers = Some(handle),
      Err(error) => tracing::error!("Failed to start the stats servers: {:#}", error),
    }
  })
}

fn report_outcome(outcome: &RunOutcome, bundles: &[BundleDescriptor]) {
  let name = |index: usize| {
    bundles
      .get(index)
      .map(|bundle| bundle.name.as_str())
      .unwrap_or("unknown bundle")
  };

  match outcome {
    RunOutcome::Completed { failed } if failed.is_empty() => {}
    RunOutcome::Completed { failed } => {
      let names = failed.iter().map(|index| name(*index)).collect::<Vec<_>>();
      tracing::error!("{} bundles failed to build: {}", failed.len(), names.join(", "));
    }
    RunOutcome::Aborted { index, exit } => {
      tracing::error!(
        "Build aborted after {} exited with code {}",
        name(*index),
        exit.exit_code()
      );
    }
  }
}
