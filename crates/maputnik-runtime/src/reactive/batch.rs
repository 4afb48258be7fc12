#![forbid(unsafe_code)]

//! Publish batches for [`Observable`](super::Observable) notifications.
//!
//! The store publishes several observables per edit (document, dirty
//! preview, errors). Inside a [`BatchScope`] values change immediately but
//! notifications are held back until the outermost scope exits, so no
//! subscriber can observe the new document next to the old error list.
//!
//! # Invariants
//!
//! 1. Nested batches are supported: only the outermost scope flushes.
//! 2. Within a batch, `Observable::get()` returns the latest value.
//! 3. Each subscriber fires at most once per flush, with the final value.
//! 4. Flush calls deferred callbacks in the order they were first enqueued.
//!
//! # Failure Modes
//!
//! - **Callback panics during flush**: remaining callbacks still run; the
//!   first panic is re-raised afterwards.

use std::cell::RefCell;
use std::time::Instant;

use tracing::{debug, info_span};

type DeferredNotify = Box<dyn FnOnce()>;

struct DeferredEntry {
    key: usize,
    notify: DeferredNotify,
}

struct BatchContext {
    depth: u32,
    deferred: Vec<DeferredEntry>,
}

thread_local! {
    static BATCH_CTX: RefCell<Option<BatchContext>> = const { RefCell::new(None) };
}

/// True while a batch is active on this thread.
pub fn is_batching() -> bool {
    BATCH_CTX.with(|ctx| ctx.borrow().is_some())
}

/// Queue `f` under `key`, replacing an earlier entry with the same key while
/// keeping its position. Runs `f` immediately outside a batch.
///
/// Returns `true` if the notification was deferred.
pub fn defer_or_run_keyed(key: usize, f: impl FnOnce() + 'static) -> bool {
    BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        if let Some(ref mut batch) = *guard {
            if let Some(entry) = batch.deferred.iter_mut().find(|entry| entry.key == key) {
                entry.notify = Box::new(f);
            } else {
                batch.deferred.push(DeferredEntry {
                    key,
                    notify: Box::new(f),
                });
            }
            true
        } else {
            drop(guard);
            f();
            false
        }
    })
}

fn flush() {
    let deferred: Vec<DeferredNotify> = BATCH_CTX.with(|ctx| {
        ctx.borrow_mut()
            .as_mut()
            .map(|batch| {
                std::mem::take(&mut batch.deferred)
                    .into_iter()
                    .map(|entry| entry.notify)
                    .collect()
            })
            .unwrap_or_default()
    });
    if deferred.is_empty() {
        return;
    }

    let notified = deferred.len();
    let start = Instant::now();
    let _span = info_span!("store.publish", notified).entered();

    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    for notify in deferred {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(notify));
        if let Err(payload) = result
            && first_panic.is_none()
        {
            first_panic = Some(payload);
        }
    }

    debug!(
        duration_us = start.elapsed().as_micros() as u64,
        notified, "publish batch flushed"
    );

    if let Some(payload) = first_panic {
        std::panic::resume_unwind(payload);
    }
}

/// RAII guard for a publish batch.
pub struct BatchScope {
    is_root: bool,
}

impl BatchScope {
    #[must_use]
    pub fn new() -> Self {
        let is_root = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            match *guard {
                Some(ref mut batch) => {
                    batch.depth += 1;
                    false
                }
                None => {
                    *guard = Some(BatchContext {
                        depth: 1,
                        deferred: Vec::new(),
                    });
                    true
                }
            }
        });
        Self { is_root }
    }

    /// Notifications queued in the current batch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        BATCH_CTX.with(|ctx| ctx.borrow().as_ref().map_or(0, |b| b.deferred.len()))
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let should_flush = BATCH_CTX.with(|ctx| match ctx.borrow_mut().as_mut() {
            Some(batch) => {
                batch.depth -= 1;
                batch.depth == 0
            }
            None => false,
        });

        if should_flush {
            flush();
            BATCH_CTX.with(|ctx| {
                *ctx.borrow_mut() = None;
            });
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("is_root", &self.is_root)
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn batch_defers_and_coalesces() {
        let obs = Observable::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v| sink.borrow_mut().push(*v));

        {
            let _batch = BatchScope::new();
            obs.set(1);
            obs.set(2);
            assert!(seen.borrow().is_empty());
            assert_eq!(obs.get(), 2);
        }
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn observers_never_see_partial_state() {
        let document = Observable::new(0);
        let errors = Observable::new(0);
        let consistent = Rc::new(Cell::new(true));

        let errors_view = errors.clone();
        let flag = Rc::clone(&consistent);
        let _sub = document.subscribe(move |doc| {
            if errors_view.get() != *doc {
                flag.set(false);
            }
        });

        {
            let _batch = BatchScope::new();
            document.set(7);
            errors.set(7);
        }
        assert!(consistent.get());
    }

    #[test]
    fn nested_batches_flush_once() {
        let obs = Observable::new(0);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let _sub = obs.subscribe(move |_| counter.set(counter.get() + 1));

        {
            let _outer = BatchScope::new();
            {
                let inner = BatchScope::new();
                obs.set(1);
                assert_eq!(inner.pending_count(), 1);
            }
            assert_eq!(calls.get(), 0);
        }
        assert_eq!(calls.get(), 1);
        assert!(!is_batching());
    }
}
