//! Single-threaded background task runner.
//!
//! [`TaskRunner`] owns one worker thread and a FIFO queue of fallible
//! tasks. Tasks run strictly in submission order; the first failure is
//! captured and re-raised by the next [`join`](TaskRunner::join), exactly
//! once. [`force_join`](TaskRunner::force_join) abandons queued work and
//! clears any captured failure, for teardown paths that must not fail.
//!
//! A runner is owned and moved, never cloned: exactly one handle controls
//! each worker. Dropping the runner stops the worker once the queue is
//! empty; tasks already queued still run to completion first. Use
//! [`force_join`](TaskRunner::force_join) to discard queued work instead.
//!
//! # Example
//!
//! ```
//! use frameseek::{FrameSeekError, TaskRunner};
//!
//! let runner = TaskRunner::spawn("example");
//! runner.submit(|| {
//!     // runs on the worker thread
//!     Ok(())
//! });
//! runner.join()?;
//! # Ok::<(), FrameSeekError>(())
//! ```

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::error::FrameSeekError;

type Task = Box<dyn FnOnce() -> Result<(), FrameSeekError> + Send + 'static>;

struct RunnerState {
    queue: VecDeque<Task>,
    busy: bool,
    stop: bool,
    failure: Option<FrameSeekError>,
}

struct Shared {
    state: Mutex<RunnerState>,
    task_ready: Condvar,
    task_finished: Condvar,
}

/// One worker thread draining a FIFO queue of fallible tasks.
pub struct TaskRunner {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner").finish_non_exhaustive()
    }
}

impl TaskRunner {
    /// Spawn a runner whose worker thread carries `name` (visible in
    /// thread dumps and panic messages).
    ///
    /// # Panics
    ///
    /// If the operating system refuses to spawn the worker thread, as
    /// [`std::thread::spawn`] does.
    pub fn spawn(name: &str) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(RunnerState {
                queue: VecDeque::new(),
                busy: false,
                stop: false,
                failure: None,
            }),
            task_ready: Condvar::new(),
            task_finished: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(format!("frameseek-{name}"))
            .spawn(move || worker_loop(&worker_shared))
            .unwrap_or_else(|error| panic!("failed to spawn worker thread frameseek-{name}: {error}"));

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Enqueue a task. Returns immediately; the task runs after all
    /// previously submitted tasks.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> Result<(), FrameSeekError> + Send + 'static,
    {
        let mut state = lock(&self.shared.state);
        state.queue.push_back(Box::new(task));
        drop(state);
        self.shared.task_ready.notify_one();
    }

    /// Block until the queue is empty and no task is running.
    ///
    /// # Errors
    ///
    /// Re-raises the first failure captured since the last join, then
    /// clears it: a second join with no new work returns `Ok`.
    pub fn join(&self) -> Result<(), FrameSeekError> {
        let mut state = lock(&self.shared.state);
        while !state.queue.is_empty() || state.busy {
            state = wait(&self.shared.task_finished, state);
        }
        match state.failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Discard all queued-but-unstarted tasks, wait for the in-flight task
    /// to finish, and clear any captured failure.
    pub fn force_join(&self) {
        let mut state = lock(&self.shared.state);
        let discarded = state.queue.len();
        state.queue.clear();
        while state.busy {
            state = wait(&self.shared.task_finished, state);
        }
        if discarded > 0 || state.failure.is_some() {
            log::debug!(
                "force_join discarded {} queued task(s), cleared_failure={}",
                discarded,
                state.failure.is_some(),
            );
        }
        state.failure = None;
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.shared.state);
            state.stop = true;
        }
        self.shared.task_ready.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut state = lock(&shared.state);
            loop {
                if let Some(task) = state.queue.pop_front() {
                    state.busy = true;
                    break task;
                }
                if state.stop {
                    return;
                }
                state = wait(&shared.task_ready, state);
            }
        };

        let outcome = catch_unwind(AssertUnwindSafe(task));

        let mut state = lock(&shared.state);
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                if state.failure.is_none() {
                    state.failure = Some(error);
                } else {
                    log::debug!("Discarding subsequent task failure: {error}");
                }
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "task panicked".to_string());
                if state.failure.is_none() {
                    state.failure = Some(FrameSeekError::TaskFailed(message));
                } else {
                    log::debug!("Discarding subsequent task panic: {message}");
                }
            }
        }
        state.busy = false;
        drop(state);
        shared.task_finished.notify_all();
    }
}

// Poisoned mutexes still hold valid runner state; recover the inner value.
fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn wait<'a, T>(
    condvar: &Condvar,
    guard: std::sync::MutexGuard<'a, T>,
) -> std::sync::MutexGuard<'a, T> {
    match condvar.wait(guard) {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
