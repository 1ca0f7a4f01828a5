//! Callback delivery and the async dispatcher
//!
//! Design: Native code calls callbacks on its own threads, often while
//! holding locks of its own. A callback can be delivered two ways:
//! - `Direct` runs the closure on the calling thread and returns its result
//! - `Async` copies the arguments into a task for the single dispatcher
//!   worker and returns `R::default()` at once
//!
//! The dispatcher is one worker thread draining a mutex-protected queue.
//! Producers push and notify; the worker swaps the whole queue out under the
//! lock and runs the batch without it. `stop` lets the worker finish what is
//! queued before it exits. A failing or panicking task is reported and the
//! worker moves on. There is no cancellation and no timeout.
//!
//! Architecture:
//! - `mod.rs` - Call modes and the dispatcher
//! - `handler.rs` - Async exception handler hook
//! - `overrides.rs` - Calls into foreign overrides of native virtual methods

pub mod handler;
pub mod overrides;

pub use handler::{clear_exception_handler, set_exception_handler, AsyncDispatchError};
pub use overrides::call_override;

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::binding::panic_message;
use crate::core::Closure;
use crate::errors::{BindError, BindResult};
use crate::logging::{debug, error, info, trace};

/// How a callback reaches its closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackMode {
    Direct,
    #[default]
    Async,
}

/// Type-level call mode for transforms and trampolines
pub trait CallMode: 'static {
    const MODE: CallbackMode;

    #[inline]
    fn deliver<A, R>(closure: &Closure<A, R>, args: A) -> R
    where
        A: Send + 'static,
        R: Default + Send + 'static,
    {
        deliver(Self::MODE, closure, args)
    }
}

/// Synchronous delivery on the native thread
pub struct Direct;

/// Queued delivery on the dispatcher worker
pub struct Async;

impl CallMode for Direct {
    const MODE: CallbackMode = CallbackMode::Direct;
}

impl CallMode for Async {
    const MODE: CallbackMode = CallbackMode::Async;
}

/// Deliver `args` to `closure`; failures go to the exception handler
pub fn deliver<A, R>(mode: CallbackMode, closure: &Closure<A, R>, args: A) -> R
where
    A: Send + 'static,
    R: Default + Send + 'static,
{
    match mode {
        CallbackMode::Direct => match closure.call_guarded(args) {
            Ok(value) => value,
            Err(err) => {
                handler::report(AsyncDispatchError::new(closure.name(), None, err));
                R::default()
            }
        },
        CallbackMode::Async => {
            let closure = closure.clone();
            global().add(move || {
                if let Err(err) = closure.call_guarded(args) {
                    handler::report(AsyncDispatchError::new(closure.name(), None, err));
                }
            });
            R::default()
        }
    }
}

static DEFAULT_MODE: AtomicU8 = AtomicU8::new(1);

/// Mode used by slot-backed function pointers
pub fn default_mode() -> CallbackMode {
    match DEFAULT_MODE.load(Ordering::Acquire) {
        0 => CallbackMode::Direct,
        _ => CallbackMode::Async,
    }
}

pub fn set_default_mode(mode: CallbackMode) {
    let raw = match mode {
        CallbackMode::Direct => 0,
        CallbackMode::Async => 1,
    };
    DEFAULT_MODE.store(raw, Ordering::Release);
}

// ============================================================================
// Dispatcher
// ============================================================================

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: Vec<Task>,
    running: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

/// Single-worker task queue
pub struct Dispatcher {
    name: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

static GLOBAL: Lazy<Dispatcher> = Lazy::new(|| Dispatcher::new("typthon-bind-dispatch"));

/// Process-wide dispatcher used by async callbacks
pub fn global() -> &'static Dispatcher {
    &GLOBAL
}

impl Dispatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: Vec::new(),
                    running: false,
                }),
                ready: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Enqueue a task; it runs once the worker is started
    pub fn add<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let pending = {
            let mut queue = self.shared.queue.lock();
            queue.tasks.push(Box::new(task));
            queue.tasks.len()
        };
        self.shared.ready.notify_one();
        trace!(event = "task_queued", dispatcher = %self.name, pending, "Task queued");
    }

    /// Spawn the worker; fails if a running one is already attached
    pub fn start(&self) -> BindResult<()> {
        let mut worker = self.worker.lock();
        if self.reap_stopped(&mut worker) {
            return Err(BindError::Dispatcher {
                message: format!("{} is already started", self.name),
            });
        }
        self.spawn(&mut worker)
    }

    /// Start unless a running worker is already attached
    pub fn ensure_started(&self) -> BindResult<()> {
        let mut worker = self.worker.lock();
        if self.reap_stopped(&mut worker) {
            return Ok(());
        }
        self.spawn(&mut worker)
    }

    /// Join a worker that was stopped but never joined. True when a running
    /// worker is still attached.
    fn reap_stopped(&self, slot: &mut Option<JoinHandle<()>>) -> bool {
        if slot.is_none() {
            return false;
        }
        if self.is_running() {
            return true;
        }
        if let Some(stale) = slot.take() {
            debug!(event = "dispatcher_reaped", dispatcher = %self.name, "Joining stopped worker");
            if stale.join().is_err() {
                error!(event = "dispatcher_join_failed", dispatcher = %self.name, "Dispatcher worker panicked");
            }
        }
        false
    }

    fn spawn(&self, slot: &mut Option<JoinHandle<()>>) -> BindResult<()> {
        self.shared.queue.lock().running = true;
        let shared = Arc::clone(&self.shared);
        let name = self.name.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(shared, name))
            .map_err(|e| {
                self.shared.queue.lock().running = false;
                BindError::Dispatcher {
                    message: format!("cannot spawn {}: {}", self.name, e),
                }
            })?;
        *slot = Some(handle);
        info!(event = "dispatcher_started", dispatcher = %self.name, "Dispatcher started");
        Ok(())
    }

    /// Ask the worker to exit once the queue is empty
    pub fn stop(&self) {
        self.shared.queue.lock().running = false;
        self.shared.ready.notify_all();
        debug!(event = "dispatcher_stopping", dispatcher = %self.name, "Dispatcher stop requested");
    }

    /// Wait for the worker to exit; a later `start` spawns a new one
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(event = "dispatcher_join_failed", dispatcher = %self.name, "Dispatcher worker panicked");
            }
            info!(event = "dispatcher_stopped", dispatcher = %self.name, "Dispatcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.queue.lock().running
    }

    /// Tasks queued and not yet taken by the worker
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

fn run(shared: Arc<Shared>, name: String) {
    loop {
        let batch = {
            let mut queue = shared.queue.lock();
            while queue.tasks.is_empty() && queue.running {
                shared.ready.wait(&mut queue);
            }
            if queue.tasks.is_empty() {
                break;
            }
            std::mem::take(&mut queue.tasks)
        };

        trace!(event = "batch_started", dispatcher = %name, size = batch.len(), "Running batch");
        for task in batch {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                error!(
                    event = "task_panicked",
                    dispatcher = %name,
                    message = %panic_message(&*payload),
                    "Dispatcher task panicked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::time::Duration;

    #[test]
    fn test_tasks_run_in_order() {
        let dispatcher = Dispatcher::new("test-order");
        let (tx, rx) = unbounded();
        for i in 0..5 {
            let tx = tx.clone();
            dispatcher.add(move || tx.send(i).unwrap());
        }
        assert_eq!(dispatcher.pending(), 5);
        dispatcher.start().unwrap();

        let seen: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_start_twice_fails() {
        let dispatcher = Dispatcher::new("test-twice");
        dispatcher.start().unwrap();
        assert!(matches!(dispatcher.start(), Err(BindError::Dispatcher { .. })));
        assert!(dispatcher.ensure_started().is_ok());
        dispatcher.stop();
        dispatcher.join();
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_restart_after_stop_without_join() {
        let dispatcher = Dispatcher::new("test-restart");
        dispatcher.start().unwrap();
        dispatcher.stop();

        dispatcher.ensure_started().unwrap();
        assert!(dispatcher.is_running());
        let (tx, rx) = unbounded();
        dispatcher.add(move || tx.send("ran").unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "ran");

        dispatcher.stop();
        dispatcher.start().unwrap();
        let (tx, rx) = unbounded();
        dispatcher.add(move || tx.send("again").unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "again");
    }

    #[test]
    fn test_panicking_task_does_not_stop_worker() {
        let dispatcher = Dispatcher::new("test-panic");
        let (tx, rx) = unbounded();
        dispatcher.add(|| panic!("task failure"));
        dispatcher.add(move || tx.send("after").unwrap());
        dispatcher.start().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "after");
    }

    #[test]
    fn test_direct_mode_returns_result() {
        let closure: Closure<(i32,), i32> = Closure::from_fn("double", |(x,)| x * 2);
        assert_eq!(Direct::deliver(&closure, (21,)), 42);
    }

    #[test]
    fn test_direct_mode_error_yields_default() {
        let closure: Closure<(), i32> =
            Closure::new("fails", |()| Err(crate::errors::PyErr::runtime("nope")));
        assert_eq!(Direct::deliver(&closure, ()), 0);
    }
}
