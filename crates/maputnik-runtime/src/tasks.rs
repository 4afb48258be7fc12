#![forbid(unsafe_code)]

//! Background fetch jobs and their completion channel.
//!
//! Jobs run through a [`TaskSpawner`] and report a [`Completion`] over an
//! `mpsc` channel. The store drains the channel only from its `pump` methods,
//! so a completion can never interleave with an edit in progress.
//!
//! # How it works
//!
//! 1. The store calls [`TaskQueue::submit`] with a closure producing a `Completion`
//! 2. The spawner runs the closure (worker thread, inline, or on demand)
//! 3. The closure's result is sent through the channel
//! 4. `EditorStore::pump` receives it and updates the derived cache

use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::fetch::FetchResult;

/// Result of a background job, tagged with what it was computed for.
#[derive(Debug)]
pub enum Completion {
    Fonts {
        generation: u64,
        result: FetchResult<Vec<String>>,
    },
    Icons {
        generation: u64,
        icons: Vec<String>,
    },
    SourceLayers {
        source_id: String,
        url: String,
        result: FetchResult<Vec<String>>,
    },
}

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs fire-and-forget tasks.
pub trait TaskSpawner {
    /// Start or queue `task`. Returns false when it was dropped without
    /// running.
    fn spawn(&self, task: Task) -> bool;
}

/// One named worker thread per task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl TaskSpawner for ThreadSpawner {
    fn spawn(&self, task: Task) -> bool {
        match thread::Builder::new()
            .name("maputnik-fetch".into())
            .spawn(task)
        {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "could not spawn fetch worker");
                false
            }
        }
    }
}

/// Runs each task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSpawner;

impl TaskSpawner for InlineSpawner {
    fn spawn(&self, task: Task) -> bool {
        task();
        true
    }
}

/// Holds tasks until the caller runs them, in any order.
#[derive(Clone, Default)]
pub struct ManualSpawner {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl fmt::Debug for ManualSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualSpawner")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualSpawner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().map_or(0, |queue| queue.len())
    }

    fn take(&self, newest: bool) -> Option<Task> {
        let mut queue = self.queue.lock().ok()?;
        if newest {
            queue.pop_back()
        } else {
            queue.pop_front()
        }
    }

    /// Run the oldest queued task. Returns false when none was queued.
    pub fn run_oldest(&self) -> bool {
        self.take(false).map(|task| task()).is_some()
    }

    /// Run the most recently queued task.
    pub fn run_newest(&self) -> bool {
        self.take(true).map(|task| task()).is_some()
    }

    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_oldest() {
            ran += 1;
        }
        ran
    }
}

impl TaskSpawner for ManualSpawner {
    fn spawn(&self, task: Task) -> bool {
        match self.queue.lock() {
            Ok(mut queue) => {
                queue.push_back(task);
                true
            }
            Err(_) => {
                warn!("manual task queue poisoned; dropping task");
                false
            }
        }
    }
}

/// Submits jobs and collects their completions.
pub struct TaskQueue {
    spawner: Box<dyn TaskSpawner>,
    sender: mpsc::Sender<Completion>,
    receiver: mpsc::Receiver<Completion>,
    in_flight: usize,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    #[must_use]
    pub fn new(spawner: impl TaskSpawner + 'static) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            spawner: Box::new(spawner),
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn submit(&mut self, job: impl FnOnce() -> Completion + Send + 'static) {
        let sender = self.sender.clone();
        let spawned = self.spawner.spawn(Box::new(move || {
            // The receiver is gone only when the store was dropped.
            let _ = sender.send(job());
        }));
        if spawned {
            self.in_flight += 1;
        }
    }

    /// Jobs submitted whose completion has not been received yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn try_recv(&mut self) -> Option<Completion> {
        let completion = self.receiver.try_recv().ok()?;
        self.received();
        Some(completion)
    }

    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Completion> {
        let completion = self.receiver.recv_timeout(timeout).ok()?;
        self.received();
        Some(completion)
    }

    fn received(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        debug!(in_flight = self.in_flight, "completion received");
    }
}
