use std::time::Duration;
use std::time::Instant;

/// Reported when every bundle has finished its current compilation pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PassCompletion {
  Initial { elapsed: Duration },
  Rebuild,
}

/// Counts bundles that are still compiling within one build run
///
/// The count starts at the number of bundles, since the first pass starts
/// without a compile event. Each compile event adds one and each done event
/// takes one away, so the count reaches zero exactly when a pass completes.
#[derive(Debug)]
pub struct CompletionCounter {
  total_bundles: usize,
  currently_compiling: usize,
  first_run: bool,
  started_at: Instant,
}

impl CompletionCounter {
  pub fn new(total_bundles: usize) -> Self {
    Self {
      total_bundles,
      currently_compiling: total_bundles,
      first_run: true,
      started_at: Instant::now(),
    }
  }

  pub fn total_bundles(&self) -> usize {
    self.total_bundles
  }

  pub fn currently_compiling(&self) -> usize {
    self.currently_compiling
  }

  pub fn on_compile(&mut self) {
    self.currently_compiling += 1;
  }

  pub fn on_done(&mut self) -> Option<PassCompletion> {
    if self.currently_compiling == 0 {
      tracing::warn!("Received a done event with no compilation in progress");
      return None;
    }

    self.currently_compiling -= 1;
    if self.currently_compiling > 0 {
      return None;
    }

    if self.first_run {
      self.first_run = false;
      Some(PassCompletion::Initial {
        elapsed: self.started_at.elapsed(),
      })
    } else {
      Some(PassCompletion::Rebuild)
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn completes_once_after_every_bundle_is_done() {
    let mut counter = CompletionCounter::new(3);

    assert_eq!(counter.on_done(), None);
    assert_eq!(counter.on_done(), None);
    assert!(matches!(
      counter.on_done(),
      Some(PassCompletion::Initial { .. })
    ));
    assert_eq!(counter.currently_compiling(), 0);
  }

  #[test]
  fn later_passes_are_rebuilds() {
    let mut counter = CompletionCounter::new(2);
    counter.on_done();
    counter.on_done();

    counter.on_compile();
    assert_eq!(counter.on_done(), Some(PassCompletion::Rebuild));

    counter.on_compile();
    counter.on_compile();
    assert_eq!(counter.on_done(), None);
    assert_eq!(counter.on_done(), Some(PassCompletion::Rebuild));
  }

  #[test]
  fn never_goes_negative() {
    let mut counter = CompletionCounter::new(1);
    assert!(counter.on_done().is_some());
    assert_eq!(counter.on_done(), None);
    assert_eq!(counter.currently_compiling(), 0);
  }

  #[test]
  fn tracks_interleaved_events_arithmetically() {
    // Compile events that arrive before the first pass finishes push the
    // count above the number of bundles.
    let events = [true, false, true, true, false, false, false, false, false];
    let mut counter = CompletionCounter::new(3);
    let mut starts = 0;
    let mut dones = 0;
    let mut completions = 0;

    for is_compile in events {
      if is_compile {
        starts += 1;
        counter.on_compile();
      } else {
        dones += 1;
        if counter.on_done().is_some() {
          completions += 1;
        }
      }
      assert_eq!(
        counter.currently_compiling(),
        counter.total_bundles() + starts - dones
      );
      assert!(counter.currently_compiling() <= counter.total_bundles() + 2);
    }

    assert_eq!(completions, 1);
    assert_eq!(counter.currently_compiling(), 0);
  }
}
