mod cmd;
mod context;
mod env;

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use env::Env;
use kolibri_build::config::BuildConfig;

#[derive(Debug, Subcommand)]
pub enum KolibriToolsCommandType {
  /// Build frontend assets for Kolibri frontend plugins
  Build(cmd::build::BuildCommand),
  /// Gzip built files so they can be served precompressed
  Compress(cmd::compress::CompressCommand),
  /// Build a single bundle on behalf of a parent build
  #[clap(hide = true)]
  Worker(cmd::worker::WorkerCommand),
}

const ENV_HELP: &str = "Environment:
  RUST_LOG              error, warn, info, debug or trace [default: info]
  KOLIBRI_TRACING_MODE  console and/or file, comma separated [default: console]
  KOLIBRI_BUILD_SINGLE  build every bundle in this process";

#[derive(Parser, Debug)]
#[command(
  name = "kolibri-tools",
  about = "Tools for Kolibri frontend plugins",
  after_help = ENV_HELP
)]
pub struct KolibriToolsCommand {
  #[clap(subcommand)]
  pub command: KolibriToolsCommandType,
  /// Directory containing setup.cfg [default: the working directory]
  #[arg(long, global = true, env = "KOLIBRI_PROJECT_ROOT")]
  pub project_root: Option<PathBuf>,
}

fn main() {
  let args = KolibriToolsCommand::parse();

  if let Err(error) = kolibri_build_monitoring::initialize_from_env() {
    eprintln!("Error: {:#}", error);
    std::process::exit(1);
  }

  let code = match run(args) {
    Ok(code) => code,
    Err(error) => {
      tracing::error!("{:#}", error);
      1
    }
  };

  kolibri_build_monitoring::close_monitoring();
  std::process::exit(code);
}

fn run(args: KolibriToolsCommand) -> anyhow::Result<i32> {
  let env = Env::parse()?;
  let project_root = args.project_root.unwrap_or_else(|| env.pwd.clone());
  let config = BuildConfig::load(&project_root)?;
  let ctx = context::Context { env, config };

  match args.command {
    KolibriToolsCommandType::Build(cmd) => cmd::build::main(ctx, cmd),
    KolibriToolsCommandType::Compress(cmd) => cmd::compress::main(ctx, cmd),
    KolibriToolsCommandType::Worker(cmd) => cmd::worker::main(ctx, cmd),
  }
}
