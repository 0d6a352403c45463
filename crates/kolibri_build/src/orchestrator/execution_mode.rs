/// Setting this to any non-empty value forces single-process builds
pub const SINGLE_CORE_ENV: &str = "KOLIBRI_BUILD_SINGLE";

/// How the bundles of a run are distributed
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionMode {
  /// Every bundle is built in this process, one after another
  Serial,
  /// Every bundle gets its own worker process and at most `size` of them
  /// build at the same time
  Pool { size: usize },
}

impl ExecutionMode {
  /// Picks the execution mode for a machine with `cores` logical cores
  pub fn select(cores: usize, single: bool, env_single: bool) -> Self {
    let size = pool_size(cores);
    if single || env_single || size <= 1 {
      return ExecutionMode::Serial;
    }
    ExecutionMode::Pool { size }
  }

  pub fn detect(single: bool) -> Self {
    let mode = Self::select(num_cpus::get(), single, single_core_env_set());
    tracing::debug!(?mode, "Selected execution mode");
    mode
  }
}

/// One core is left for the orchestrator and the rest of the machine
pub fn pool_size(cores: usize) -> usize {
  cores.saturating_sub(1).max(1)
}

fn single_core_env_set() -> bool {
  std::env::var_os(SINGLE_CORE_ENV).is_some_and(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn uses_all_but_one_core() {
    assert_eq!(
      ExecutionMode::select(4, false, false),
      ExecutionMode::Pool { size: 3 }
    );
    assert_eq!(
      ExecutionMode::select(16, false, false),
      ExecutionMode::Pool { size: 15 }
    );
  }

  #[test]
  fn small_machines_build_serially() {
    assert_eq!(pool_size(0), 1);
    assert_eq!(pool_size(1), 1);
    assert_eq!(pool_size(2), 1);
    assert_eq!(ExecutionMode::select(1, false, false), ExecutionMode::Serial);
    assert_eq!(ExecutionMode::select(2, false, false), ExecutionMode::Serial);
  }

  #[test]
  fn single_flag_and_env_force_serial() {
    assert_eq!(ExecutionMode::select(8, true, false), ExecutionMode::Serial);
    assert_eq!(ExecutionMode::select(8, false, true), ExecutionMode::Serial);
  }

  static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

  #[test]
  fn empty_single_core_env_counts_as_unset() {
    let _guard = TEST_LOCK.lock();

    std::env::remove_var(SINGLE_CORE_ENV);
    assert!(!single_core_env_set());

    std::env::set_var(SINGLE_CORE_ENV, "");
    assert!(!single_core_env_set());

    std::env::set_var(SINGLE_CORE_ENV, "1");
    assert!(single_core_env_set());
    assert_eq!(ExecutionMode::detect(false), ExecutionMode::Serial);

    std::env::remove_var(SINGLE_CORE_ENV);
  }
}
