use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use kolibri_build_core::protocol::ParentMessage;
use kolibri_build_core::protocol::WorkerMessage;
use kolibri_build_core::types::JobSpec;
use parking_lot::Mutex;

use super::PoolEvent;
use super::WorkerExit;
use super::WorkerProcess;
use super::WorkerSpawner;

const DEFAULT_SIGNAL: i32 = 15;

#[derive(Clone, Copy, Debug)]
pub enum Behaviour {
  Succeed,
  Fail(i32),
  /// Builds forever, until killed
  Hang,
  /// Dies from `signal` as soon as it starts building
  Signal(i32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FakeEvent {
  Started(usize),
  Done(usize),
  Killed(usize, Option<i32>),
}

enum Control {
  Start,
  Kill(Option<i32>),
}

/// Spawns thread-backed workers that follow the worker protocol
#[derive(Default)]
pub struct FakeWorkerSpawner {
  behaviours: HashMap<usize, Behaviour>,
  log: Arc<Mutex<Vec<FakeEvent>>>,
  active: Arc<AtomicUsize>,
  max_active: Arc<AtomicUsize>,
}

impl FakeWorkerSpawner {
  pub fn with_behaviour(mut self, index: usize, behaviour: Behaviour) -> Self {
    self.behaviours.insert(index, behaviour);
    self
  }

  pub fn log(&self) -> Vec<FakeEvent> {
    self.log.lock().clone()
  }

  pub fn position(&self, event: FakeEvent) -> usize {
    self
      .log()
      .iter()
      .position(|logged| *logged == event)
      .unwrap_or_else(|| panic!("{event:?} was never logged"))
  }

  pub fn max_active(&self) -> usize {
    self.max_active.load(Ordering::SeqCst)
  }
}

impl WorkerSpawner for FakeWorkerSpawner {
  fn spawn(
    &self,
    job: JobSpec,
    events: Sender<PoolEvent>,
  ) -> anyhow::Result<Box<dyn WorkerProcess>> {
    let (control, control_rx) = crossbeam_channel::unbounded();
    let worker = FakeWorkerThread {
      index: job.index,
      start_immediately: job.start_immediately,
      behaviour: self
        .behaviours
        .get(&job.index)
        .copied()
        .unwrap_or(Behaviour::Succeed),
      control: control_rx,
      events,
      log: self.log.clone(),
      active: self.active.clone(),
      max_active: self.max_active.clone(),
    };

    let handle = std::thread::spawn(move || worker.run());

    Ok(Box::new(FakeWorker {
      control,
      handle: Some(handle),
      exit: None,
    }))
  }
}

struct FakeWorkerThread {
  index: usize,
  start_immediately: bool,
  behaviour: Behaviour,
  control: Receiver<Control>,
  events: Sender<PoolEvent>,
  log: Arc<Mutex<Vec<FakeEvent>>>,
  active: Arc<AtomicUsize>,
  max_active: Arc<AtomicUsize>,
}

impl FakeWorkerThread {
  fn run(self) -> WorkerExit {
    let exit = self.build();
    let _ = self.events.send(PoolEvent::Closed { index: self.index });
    exit
  }

  fn build(&self) -> WorkerExit {
    if !self.start_immediately {
      match self.control.recv() {
        Ok(Control::Start) => {}
        Ok(Control::Kill(signal)) => return self.killed(signal),
        Err(_) => return WorkerExit::default(),
      }
    }

    self.log.lock().push(FakeEvent::Started(self.index));
    let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_active.fetch_max(active, Ordering::SeqCst);

    match self.behaviour {
      Behaviour::Succeed => {
        std::thread::sleep(Duration::from_millis(5));
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.log.lock().push(FakeEvent::Done(self.index));
        let _ = self.events.send(PoolEvent::Message {
          index: self.index,
          message: WorkerMessage::Done,
        });
        WorkerExit::success()
      }
      Behaviour::Fail(code) => {
        self.active.fetch_sub(1, Ordering::SeqCst);
        WorkerExit {
          code: Some(code),
          signal: None,
        }
      }
      Behaviour::Signal(signal) => {
        self.active.fetch_sub(1, Ordering::SeqCst);
        WorkerExit {
          code: None,
          signal: Some(signal),
        }
      }
      Behaviour::Hang => loop {
        match self.control.recv() {
          Ok(Control::Kill(signal)) => {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return self.killed(signal);
          }
          Ok(Control::Start) => {}
          Err(_) => return WorkerExit::default(),
        }
      },
    }
  }

  fn killed(&self, signal: Option<i32>) -> WorkerExit {
    self.log.lock().push(FakeEvent::Killed(self.index, signal));
    WorkerExit {
      code: None,
      signal: Some(signal.unwrap_or(DEFAULT_SIGNAL)),
    }
  }
}

struct FakeWorker {
  control: Sender<Control>,
  handle: Option<JoinHandle<WorkerExit>>,
  exit: Option<WorkerExit>,
}

impl WorkerProcess for FakeWorker {
  fn send(&mut self, message: ParentMessage) -> anyhow::Result<()> {
    match message {
      ParentMessage::Start => {
        let _ = self.control.send(Control::Start);
      }
    }
    Ok(())
  }

  fn kill(&mut self, signal: Option<i32>) -> anyhow::Result<()> {
    let _ = self.control.send(Control::Kill(signal));
    Ok(())
  }

  fn wait(&mut self) -> anyhow::Result<WorkerExit> {
    if let Some(exit) = self.exit {
      return Ok(exit);
    }
    let handle = self
      .handle
      .take()
      .ok_or_else(|| anyhow::anyhow!("Worker was already reaped"))?;
    let exit = handle
      .join()
      .map_err(|_| anyhow::anyhow!("Fake worker panicked"))?;
    self.exit = Some(exit);
    Ok(exit)
  }
}
