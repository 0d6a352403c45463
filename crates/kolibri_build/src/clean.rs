use std::path::Path;

use anyhow::Context;
use kolibri_build_core::types::BundleDescriptor;

/// Removes the build output and stats report of every bundle.
///
/// Returns how many paths were removed. Paths that do not exist are skipped.
pub fn clean(bundles: &[BundleDescriptor]) -> anyhow::Result<usize> {
  let mut removed = 0;

  for bundle in bundles {
    for path in [&bundle.output_path, &bundle.stats_file].into_iter().flatten() {
      if remove_path(path).with_context(|| format!("Failed to clean {}", path.display()))? {
        tracing::info!(bundle = %bundle.name, "Removed {}", path.display());
        removed += 1;
      }
    }
  }

  Ok(removed)
}

fn remove_path(path: &Path) -> std::io::Result<bool> {
  match std::fs::symlink_metadata(path) {
    Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(path)?,
    Ok(_) => std::fs::remove_file(path)?,
    Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(false),
    Err(error) => return Err(error),
  }
  Ok(true)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn removes_output_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("learn/static");
    let stats = dir.path().join("learn-stats.json");
    std::fs::create_dir_all(output.join("js")).unwrap();
    std::fs::write(output.join("js/app.js"), "").unwrap();
    std::fs::write(&stats, "{}").unwrap();

    let bundles = [
      BundleDescriptor {
        output_path: Some(output.clone()),
        stats_file: Some(stats.clone()),
        ..BundleDescriptor::new("kolibri.plugins.learn.app", 0)
      },
      BundleDescriptor {
        output_path: Some(dir.path().join("coach/static")),
        ..BundleDescriptor::new("kolibri.plugins.coach.app", 1)
      },
    ];

    assert_eq!(clean(&bundles).unwrap(), 2);
    assert!(!output.exists());
    assert!(!stats.exists());
    assert!(dir.path().join("learn").exists());

    assert_eq!(clean(&bundles).unwrap(), 0);
  }
}
