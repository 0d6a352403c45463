//! Line protocol spoken between the orchestrator and its worker processes.
//!
//! Every message is a single JSON value terminated by a newline. The first
//! line a worker reads on stdin is its [`JobSpec`](crate::types::JobSpec);
//! afterwards the parent only ever sends [`ParentMessage`]s. Workers answer
//! on stdout with [`WorkerMessage`]s.
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

/// Lifecycle events a build job reports back to the orchestrator
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMessage {
  /// A compilation pass has started
  Compile,
  /// A compilation pass has finished
  Done,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentMessage {
  /// Permission for a queued worker to begin building
  Start,
}

pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
  let mut line = serde_json::to_string(message)?;
  line.push('\n');
  Ok(line)
}

/// Decodes one protocol line, returning `None` for anything unrecognised
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Option<T> {
  let line = line.trim();
  if line.is_empty() {
    return None;
  }
  serde_json::from_str(line).ok()
}
