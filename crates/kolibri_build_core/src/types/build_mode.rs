use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::BuildError;

/// The kind of build requested on the command line
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
  Development,
  Production,
  I18n,
  Clean,
  Stats,
}

impl BuildMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildMode::Development => "development",
      BuildMode::Production => "production",
      BuildMode::I18n => "i18n",
      BuildMode::Clean => "clean",
      BuildMode::Stats => "stats",
    }
  }

  /// Whether one worker's abnormal exit should take down the whole run.
  ///
  /// Production builds and message extraction are one-shot, so their bundles
  /// are allowed to fail independently.
  pub fn is_persistent(&self) -> bool {
    matches!(self, BuildMode::Development | BuildMode::Stats)
  }

  /// Whether bundles keep rebuilding on source changes after the first pass
  pub fn watches(&self) -> bool {
    matches!(self, BuildMode::Development)
  }

  pub fn validate_hot(&self, hot: bool) -> Result<(), BuildError> {
    if hot && *self != BuildMode::Development {
      return Err(BuildError::HotOutsideDevelopment);
    }
    Ok(())
  }
}

impl Display for BuildMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for BuildMode {
  type Err = BuildError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "" => Err(BuildError::MissingMode),
      "d" | "dev" | "development" => Ok(BuildMode::Development),
      "p" | "prod" | "production" => Ok(BuildMode::Production),
      "i" | "i18n" | "internationalization" => Ok(BuildMode::I18n),
      "c" | "clean" => Ok(BuildMode::Clean),
      "s" | "stats" => Ok(BuildMode::Stats),
      other => Err(BuildError::InvalidMode(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn parses_every_mode_alias() {
    let cases = [
      ("d", BuildMode::Development),
      ("dev", BuildMode::Development),
      ("development", BuildMode::Development),
      ("p", BuildMode::Production),
      ("prod", BuildMode::Production),
      ("production", BuildMode::Production),
      ("i", BuildMode::I18n),
      ("i18n", BuildMode::I18n),
      ("internationalization", BuildMode::I18n),
      ("c", BuildMode::Clean),
      ("clean", BuildMode::Clean),
      ("s", BuildMode::Stats),
      ("stats", BuildMode::Stats),
    ];

    for (input, expected) in cases {
      assert_eq!(input.parse::<BuildMode>().unwrap(), expected, "{input}");
    }
  }

  #[test]
  fn rejects_unknown_and_empty_modes() {
    assert!(matches!(
      "watch".parse::<BuildMode>(),
      Err(BuildError::InvalidMode(mode)) if mode == "watch"
    ));
    assert!(matches!(
      "".parse::<BuildMode>(),
      Err(BuildError::MissingMode)
    ));
  }

  #[test]
  fn hot_reloading_is_only_allowed_in_development() {
    assert!(BuildMode::Development.validate_hot(true).is_ok());
    assert!(BuildMode::Production.validate_hot(false).is_ok());

    for mode in [
      BuildMode::Production,
      BuildMode::I18n,
      BuildMode::Clean,
      BuildMode::Stats,
    ] {
      assert!(matches!(
        mode.validate_hot(true),
        Err(BuildError::HotOutsideDevelopment)
      ));
    }
  }

  #[test]
  fn persistence_follows_mode() {
    assert!(BuildMode::Development.is_persistent());
    assert!(BuildMode::Stats.is_persistent());
    assert!(!BuildMode::Production.is_persistent());
    assert!(!BuildMode::I18n.is_persistent());
    assert!(BuildMode::Development.watches());
    assert!(!BuildMode::Stats.watches());
  }

  #[test]
  fn serializes_lowercase() {
    assert_eq!(
      serde_json::to_string(&BuildMode::I18n).unwrap(),
      "\"i18n\""
    );
    assert_eq!(BuildMode::Development.to_string(), "development");
  }
}
