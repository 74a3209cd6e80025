// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Job scheduling: units of work, completion handles, wait barriers, and the
//! worker-pool scheduler that drives them.
//!
//! A [`Job`] is one run-to-completion unit of work with a dependency counter
//! and a forward-only state machine. Callers hold [`JobHandle`]s (shared,
//! reference-counted) to wait on completion, group jobs under a [`Barrier`],
//! and submit work through a [`JobScheduler`] owning a fixed pool of worker
//! threads.

mod barrier;
mod error;
mod handle;
mod scheduler;

pub use barrier::Barrier;
pub use error::SchedulerError;
pub use handle::JobHandle;
pub use scheduler::{JobScheduler, SchedulerHandle};

use crate::handle::Handle;
use barrier::BarrierCore;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// The type of work a job executes. Invoked at most once, on a worker thread.
pub type JobFn = Box<dyn FnOnce() + Send + 'static>;

/// Execution state of a [`Job`]. Transitions are strictly forward:
/// `Pending -> Queued -> Running -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    /// Created but not yet ready; dependencies are still unresolved.
    Pending,
    /// In the scheduler's ready queue, awaiting a worker.
    Queued,
    /// Currently executing on a worker thread.
    Running,
    /// The work function (and finish bookkeeping) has completed.
    Finished,
}

/// State guarded by the job's short-held lock.
///
/// The barrier back-link and the state field share one lock so that a
/// barrier attachment can never race a concurrent finish: either the attach
/// observes a pre-`Finished` state and the finish path will notify it, or it
/// observes `Finished` and is rejected.
struct JobInner {
    state: JobState,
    function: Option<JobFn>,
    finish_hooks: Vec<JobFn>,
    barrier: Option<Arc<BarrierCore>>,
}

/// One schedulable unit of work.
///
/// Jobs are created through [`JobScheduler::create_job`] and owned
/// collectively by their outstanding [`JobHandle`]s; while queued or running
/// the scheduler's queue entry holds one of those handles, so a job can
/// never be reclaimed before it finishes even if the caller drops every
/// handle early.
pub struct Job {
    id: Handle,
    unmanaged: bool,
    dependencies: AtomicU32,
    inner: Mutex<JobInner>,
    finished: Condvar,
}

impl Job {
    pub(crate) fn new(
        id: Handle,
        function: JobFn,
        num_deps: u32,
        unmanaged: bool,
        on_finished: Option<JobFn>,
    ) -> Self {
        let mut finish_hooks = Vec::new();
        if let Some(hook) = on_finished {
            finish_hooks.push(hook);
        }
        Self {
            id,
            unmanaged,
            dependencies: AtomicU32::new(num_deps),
            inner: Mutex::new(JobInner {
                state: JobState::Pending,
                function: Some(function),
                finish_hooks,
                barrier: None,
            }),
            finished: Condvar::new(),
        }
    }

    /// Returns the unique identifier assigned at creation.
    pub fn id(&self) -> Handle {
        self.id
    }

    /// Returns the current execution state.
    ///
    /// The load is informational: by the time the caller inspects the value
    /// the job may already have moved forward. Use [`JobHandle::wait`] or a
    /// [`Barrier`] for synchronization.
    pub fn state(&self) -> JobState {
        self.lock_inner().state
    }

    /// Returns `true` once the job has run to completion.
    pub fn is_finished(&self) -> bool {
        self.state() == JobState::Finished
    }

    /// Returns `true` for internally generated jobs (delegate fan-out) that
    /// do not participate in externally visible dependency graphs.
    pub fn is_unmanaged(&self) -> bool {
        self.unmanaged
    }

    /// Returns the number of unresolved prerequisites.
    pub fn dependencies(&self) -> u32 {
        self.dependencies.load(Ordering::Acquire)
    }

    /// Adds one unresolved prerequisite.
    ///
    /// Must only be called while the job is still `Pending`; raising the
    /// count after it has reached zero (and the job was enqueued) violates
    /// the job-graph contract.
    pub fn increment_dependencies(&self) {
        self.dependencies.fetch_add(1, Ordering::AcqRel);
    }

    /// Resolves one prerequisite and returns the number still unresolved.
    ///
    /// Decrementing to exactly zero is the signal that the job is ready; the
    /// observer of that transition must enqueue it via
    /// [`SchedulerHandle::queue_job`]. Decrementing an already-zero counter
    /// is a contract violation and fails fast.
    pub fn decrement_dependencies(&self) -> u32 {
        let previous = self.dependencies.fetch_sub(1, Ordering::AcqRel);
        assert!(
            previous > 0,
            "dependency count underflow on {}: decrement without a matching prerequisite",
            self.id
        );
        previous - 1
    }

    /// Attaches a barrier back-link, failing if the job already finished.
    ///
    /// The check-and-set runs under the state lock so a job finishing
    /// concurrently with the attach is either linked (and will notify) or
    /// rejected (and the barrier skips counting it) — never half of each.
    pub(crate) fn set_barrier(&self, barrier: &Arc<BarrierCore>) -> bool {
        let mut inner = self.lock_inner();
        if inner.state == JobState::Finished {
            return false;
        }
        assert!(
            inner.barrier.is_none(),
            "{} is already attached to a barrier",
            self.id
        );
        inner.barrier = Some(Arc::clone(barrier));
        true
    }

    /// Registers an extra callback to run when the job finishes.
    ///
    /// Returns `false` if the job has already finished, in which case the
    /// caller must run the hook's logic itself.
    pub(crate) fn add_finish_hook(&self, hook: JobFn) -> bool {
        let mut inner = self.lock_inner();
        if inner.state == JobState::Finished {
            return false;
        }
        inner.finish_hooks.push(hook);
        true
    }

    /// Marks the job as sitting in the ready queue.
    ///
    /// Enqueueing the same job twice is a contract violation.
    pub(crate) fn mark_queued(&self) {
        let mut inner = self.lock_inner();
        assert_eq!(
            inner.state,
            JobState::Pending,
            "{} queued twice or queued out of order",
            self.id
        );
        inner.state = JobState::Queued;
    }

    /// Runs the job on the calling worker thread.
    ///
    /// Contract: the job must be `Queued`. A panic inside the work function
    /// is caught at this boundary and logged; the job is marked `Finished`
    /// regardless so barriers and waiters are never left hanging.
    pub(crate) fn execute(&self) {
        let function = {
            let mut inner = self.lock_inner();
            assert_eq!(
                inner.state,
                JobState::Queued,
                "{} executed while not queued",
                self.id
            );
            inner.state = JobState::Running;
            inner
                .function
                .take()
                .unwrap_or_else(|| panic!("{} has no work function left to run", self.id))
        };

        log::trace!("{} running", self.id);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(function)) {
            log::error!("{} panicked: {}", self.id, panic_message(&payload));
        }
        self.on_finished();
    }

    /// Finish bookkeeping: publish `Finished`, wake waiters, run finish
    /// hooks, then notify the attached barrier (in that order).
    ///
    /// Hooks get the same panic containment as the work function: a
    /// panicking hook is logged and the remaining hooks and the barrier
    /// notification still run, so a faulty callback can neither kill its
    /// worker thread nor strand a barrier's waiters.
    fn on_finished(&self) {
        let (hooks, barrier) = {
            let mut inner = self.lock_inner();
            inner.state = JobState::Finished;
            self.finished.notify_all();
            (std::mem::take(&mut inner.finish_hooks), inner.barrier.take())
        };

        for hook in hooks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(hook)) {
                log::error!(
                    "{} finish hook panicked: {}",
                    self.id,
                    panic_message(&payload)
                );
            }
        }
        if let Some(barrier) = barrier {
            barrier.on_job_finished();
        }
        log::trace!("{} finished", self.id);
    }

    /// Blocks the calling thread until the job reaches `Finished`.
    pub(crate) fn wait_until_finished(&self) {
        let mut inner = self.lock_inner();
        while inner.state != JobState::Finished {
            inner = self
                .finished
                .wait(inner)
                .expect("job state lock poisoned");
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, JobInner> {
        self.inner.lock().expect("job state lock poisoned")
    }
}

/// Best-effort extraction of a panic payload's message for logging.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
