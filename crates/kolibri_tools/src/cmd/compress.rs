use clap::CommandFactory;
use clap::Parser;
use kolibri_build::compress::compress_globs;

use crate::context::Context;

#[derive(Debug, Parser)]
pub struct CompressCommand {
  /// List of custom file globs or file names to compress
  pub files: Vec<String>,
}

pub fn main(_ctx: Context, cmd: CompressCommand) -> anyhow::Result<i32> {
  if cmd.files.is_empty() {
    let mut command = crate::KolibriToolsCommand::command();
    if let Some(compress) = command.find_subcommand_mut("compress") {
      let _ = compress.print_help();
    }
    return Ok(1);
  }

  let summary = compress_globs(&cmd.files)?;
  tracing::info!("Compressed {} files", summary.compressed.len());

  if !summary.failed.is_empty() {
    tracing::error!("Failed to compress {} files", summary.failed.len());
    return Ok(1);
  }

  Ok(0)
}
