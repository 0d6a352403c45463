use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use flate2::write::GzEncoder;
use flate2::Compression;

#[derive(Debug, Default, PartialEq)]
pub struct CompressSummary {
  pub compressed: Vec<PathBuf>,
  pub failed: Vec<PathBuf>,
}

/// Writes a gzipped copy of `path` next to it as `<path>.gz`
pub fn compress_file(path: &Path) -> anyhow::Result<PathBuf> {
  let mut target = path.as_os_str().to_owned();
  target.push(".gz");
  let target = PathBuf::from(target);

  let mut reader = BufReader::new(
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
  );
  let writer = BufWriter::new(
    File::create(&target).with_context(|| format!("Failed to create {}", target.display()))?,
  );

  let mut encoder = GzEncoder::new(writer, Compression::best());
  std::io::copy(&mut reader, &mut encoder)?;
  encoder.finish()?.into_inner()?;

  Ok(target)
}

/// Compresses every file matched by the glob patterns, carrying on past
/// individual failures
pub fn compress_globs<S: AsRef<str>>(patterns: &[S]) -> anyhow::Result<CompressSummary> {
  let mut summary = CompressSummary::default();

  for pattern in patterns {
    let pattern = pattern.as_ref();
    let mut matched = false;

    for entry in glob::glob(pattern).with_context(|| format!("Invalid pattern {pattern}"))? {
      let path = match entry {
        Ok(path) => path,
        Err(error) => {
          tracing::warn!("Cannot read {}: {}", error.path().display(), error);
          summary.failed.push(error.path().to_path_buf());
          continue;
        }
      };
      if !path.is_file() {
        continue;
      }
      matched = true;

      match compress_file(&path) {
        Ok(target) => {
          tracing::debug!("Compressed {}", target.display());
          summary.compressed.push(path);
        }
        Err(error) => {
          tracing::error!("{:#}", error);
          summary.failed.push(path);
        }
      }
    }

    if !matched {
      tracing::warn!("No files matched {pattern}");
    }
  }

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use std::io::Read;

  use flate2::read::GzDecoder;
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn gzips_matching_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app.js");
    let vendor = dir.path().join("vendor.js");
    std::fs::write(&app, "console.log('learn');".repeat(50)).unwrap();
    std::fs::write(&vendor, "export default {};").unwrap();
    std::fs::write(dir.path().join("app.css"), "body {}").unwrap();

    let pattern = dir.path().join("*.js").to_string_lossy().to_string();
    let summary = compress_globs(&[pattern]).unwrap();

    assert_eq!(
      summary,
      CompressSummary {
        compressed: vec![app.clone(), vendor],
        failed: vec![],
      }
    );
    assert!(!dir.path().join("app.css.gz").exists());

    let mut decoded = String::new();
    GzDecoder::new(File::open(dir.path().join("app.js.gz")).unwrap())
      .read_to_string(&mut decoded)
      .unwrap();
    assert_eq!(decoded, std::fs::read_to_string(app).unwrap());
  }

  #[test]
  fn unmatched_patterns_compress_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("*.js").to_string_lossy().to_string();

    let summary = compress_globs(&[pattern]).unwrap();

    assert_eq!(summary, CompressSummary::default());
  }

  #[test]
  fn rejects_invalid_patterns() {
    assert!(compress_globs(&["[unclosed"]).is_err());
  }
}
