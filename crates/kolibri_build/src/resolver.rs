use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use kolibri_build_core::types::BundleDescriptor;

use crate::config::BuildConfig;
use crate::exec::exec_output;
use crate::exec::ExecOptions;

/// Which plugins to build, as given on the command line
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolveRequest {
  /// Either a JSON bundle manifest or a file listing plugins
  pub plugin_file: Option<PathBuf>,
  pub plugins: Vec<String>,
  /// Added to the Python path when the manifest command runs
  pub plugin_path: Option<PathBuf>,
}

pub trait BundleResolver {
  fn resolve(&self, request: &ResolveRequest) -> anyhow::Result<Vec<BundleDescriptor>>;
}

/// Resolves bundles by reading a JSON manifest directly, or by asking the
/// plugin manifest command to print one
pub struct ManifestResolver {
  manifest_command: Vec<String>,
  project_root: PathBuf,
}

impl ManifestResolver {
  pub fn new(config: &BuildConfig) -> Self {
    Self {
      manifest_command: config.manifest_command.clone(),
      project_root: config.project_root.clone(),
    }
  }

  fn manifest_args(&self, request: &ResolveRequest) -> Vec<String> {
    let mut args = self.manifest_command.clone();
    if let Some(plugin_file) = &request.plugin_file {
      args.push(String::from("--plugin-file"));
      args.push(plugin_file.to_string_lossy().to_string());
    }
    if !request.plugins.is_empty() {
      args.push(String::from("--plugins"));
      args.push(request.plugins.join(","));
    }
    args
  }

  fn manifest_env(&self, request: &ResolveRequest) -> Option<HashMap<String, String>> {
    let plugin_path = request.plugin_path.as_ref()?;
    let python_path = match std::env::var("PYTHONPATH") {
      Ok(existing) if !existing.is_empty() => {
        format!("{}:{}", plugin_path.display(), existing)
      }
      _ => plugin_path.to_string_lossy().to_string(),
    };
    Some(HashMap::from([(String::from("PYTHONPATH"), python_path)]))
  }
}

impl BundleResolver for ManifestResolver {
  fn resolve(&self, request: &ResolveRequest) -> anyhow::Result<Vec<BundleDescriptor>> {
    if let Some(plugin_file) = &request.plugin_file {
      if is_json_manifest(plugin_file) {
        let contents = std::fs::read(plugin_file)
          .with_context(|| format!("Failed to read bundle manifest {}", plugin_file.display()))?;
        return parse_manifest(&contents);
      }
    }

    let args = self.manifest_args(request);
    tracing::debug!(?args, "Reading bundle manifest");

    let stdout = exec_output(
      &args,
      ExecOptions {
        cwd: Some(self.project_root.clone()),
        env: self.manifest_env(request),
      },
    )?;

    parse_manifest(&stdout)
  }
}

fn is_json_manifest(path: &Path) -> bool {
  path
    .extension()
    .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

/// Parses a manifest and numbers the bundles by their position in it
pub fn parse_manifest(contents: &[u8]) -> anyhow::Result<Vec<BundleDescriptor>> {
  let mut bundles: Vec<BundleDescriptor> =
    serde_json::from_slice(contents).context("Invalid bundle manifest")?;

  for (index, bundle) in bundles.iter_mut().enumerate() {
    bundle.index = index;
  }

  Ok(bundles)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  const MANIFEST: &str = r#"[
    {"name": "kolibri.plugins.learn.app", "index": 4, "output_path": "/build/learn"},
    {"name": "kolibri.plugins.coach.app", "config": {"entry": "app.js"}}
  ]"#;

  #[test]
  fn parse_manifest_reindexes_bundles() {
    let bundles = parse_manifest(MANIFEST.as_bytes()).unwrap();

    assert_eq!(
      bundles
        .iter()
        .map(|bundle| (bundle.name.as_str(), bundle.index))
        .collect::<Vec<_>>(),
      vec![
        ("kolibri.plugins.learn.app", 0),
        ("kolibri.plugins.coach.app", 1)
      ]
    );
    assert_eq!(bundles[0].output_path, Some(PathBuf::from("/build/learn")));
  }

  #[test]
  fn parse_manifest_rejects_invalid_json() {
    assert!(parse_manifest(b"{\"name\": \"not a list\"}").is_err());
  }

  #[test]
  fn reads_json_manifest_files_directly() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("bundles.json");
    std::fs::write(&manifest_path, MANIFEST).unwrap();

    let resolver = ManifestResolver::new(&BuildConfig {
      manifest_command: vec![String::from("does-not-exist")],
      ..BuildConfig::new(dir.path())
    });

    let bundles = resolver
      .resolve(&ResolveRequest {
        plugin_file: Some(manifest_path),
        ..Default::default()
      })
      .unwrap();

    assert_eq!(bundles.len(), 2);
  }

  #[test]
  fn forwards_plugins_to_the_manifest_command() {
    let resolver = ManifestResolver::new(&BuildConfig {
      manifest_command: vec![String::from("python"), String::from("manifest.py")],
      ..BuildConfig::new("/project")
    });

    let args = resolver.manifest_args(&ResolveRequest {
      plugin_file: Some(PathBuf::from("plugins.txt")),
      plugins: vec![
        String::from("kolibri.plugins.learn"),
        String::from("kolibri.plugins.coach"),
      ],
      plugin_path: None,
    });

    assert_eq!(
      args,
      vec![
        "python",
        "manifest.py",
        "--plugin-file",
        "plugins.txt",
        "--plugins",
        "kolibri.plugins.learn,kolibri.plugins.coach",
      ]
    );
  }

  #[cfg(unix)]
  #[test]
  fn runs_the_manifest_command() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = ManifestResolver::new(&BuildConfig {
      manifest_command: vec![
        String::from("sh"),
        String::from("-c"),
        String::from("printf '[{\"name\": \"%s\"}]' \"$PYTHONPATH\""),
      ],
      ..BuildConfig::new(dir.path())
    });

    let bundles = resolver
      .resolve(&ResolveRequest {
        plugin_path: Some(PathBuf::from("/plugins")),
        ..Default::default()
      })
      .unwrap();

    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].name.starts_with("/plugins"));
  }
}
