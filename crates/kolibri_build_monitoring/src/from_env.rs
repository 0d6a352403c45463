use thiserror::Error;

#[derive(Debug, Error)]
pub enum FromEnvError {
  #[error("Invalid value for {key}: {value}")]
  InvalidKey { key: String, value: String },
}

/// Reads an environment variable, treating an empty value as unset
pub fn optional_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|value| !value.is_empty())
}
