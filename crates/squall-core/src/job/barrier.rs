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

//! A wait barrier aggregating completion of a dynamic set of jobs.

use super::JobHandle;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Re-poll interval for [`Barrier::wait`]. A liveness safeguard against
/// missed wakeups, not a caller-visible timeout.
const WAIT_RECHECK_INTERVAL: Duration = Duration::from_millis(100);

/// The shared state jobs hold a back-link to.
///
/// Kept behind an `Arc` so a finishing job can always deliver its
/// notification, even if the owning [`Barrier`] is being torn down on
/// another thread at the same moment.
pub(crate) struct BarrierCore {
    count: AtomicI32,
    lock: Mutex<()>,
    finished: Condvar,
}

impl BarrierCore {
    fn new() -> Self {
        Self {
            count: AtomicI32::new(0),
            lock: Mutex::new(()),
            finished: Condvar::new(),
        }
    }

    /// Called by a job's finish path (or by an attach rollback): drops the
    /// outstanding count by one and wakes all waiters at zero.
    pub(crate) fn on_job_finished(&self) {
        let remaining = self.count.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 {
            // Take the lock so the notification cannot slip between a
            // waiter's predicate check and its wait call.
            let _guard = self.lock.lock().expect("barrier lock poisoned");
            self.finished.notify_all();
        }
    }
}

/// Blocks a waiter until every attached job has finished.
///
/// The attached set may grow after construction: [`add_job`](Barrier::add_job)
/// is safe to call concurrently with jobs finishing. A job that already
/// finished is simply not counted, so the barrier can never undercount or
/// wait forever on work that is already done.
///
/// Dropping a barrier with outstanding jobs blocks until they finish, so the
/// back-links those jobs hold never outlive the barrier's scope semantics.
pub struct Barrier {
    core: Arc<BarrierCore>,
}

impl Barrier {
    /// Creates a barrier with no attached jobs.
    pub fn new() -> Self {
        Self {
            core: Arc::new(BarrierCore::new()),
        }
    }

    /// Creates a barrier over an initial set of jobs.
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a JobHandle>) -> Self {
        let barrier = Self::new();
        for job in jobs {
            barrier.add_job(job);
        }
        barrier
    }

    /// Attaches a job, counting it only if it has not finished yet.
    ///
    /// The count is raised *before* the attach attempt and rolled back if
    /// the job turns out to be finished, so the count never dips negative
    /// while a finish notification races the attachment.
    pub fn add_job(&self, job: &JobHandle) {
        self.core.count.fetch_add(1, Ordering::AcqRel);
        if !job.job().set_barrier(&self.core) {
            // Already finished; undo our share of the count.
            self.core.on_job_finished();
        }
    }

    /// Attaches each job in sequence.
    ///
    /// No atomicity across the batch: jobs finishing mid-loop interleave
    /// freely, which is fine since each attach is independently checked.
    pub fn add_jobs<'a>(&self, jobs: impl IntoIterator<Item = &'a JobHandle>) {
        for job in jobs {
            self.add_job(job);
        }
    }

    /// Blocks the calling thread until every attached job has finished.
    ///
    /// Implemented as a condition-variable wait that re-checks its predicate
    /// on a bounded interval; `wait` never returns early to the caller.
    /// Calling this from a scheduler worker thread can starve the pool —
    /// that is the caller's responsibility to avoid.
    pub fn wait(&self) {
        let mut guard = self.core.lock.lock().expect("barrier lock poisoned");
        while self.core.count.load(Ordering::Acquire) != 0 {
            let (next_guard, _timeout) = self
                .core
                .finished
                .wait_timeout(guard, WAIT_RECHECK_INTERVAL)
                .expect("barrier lock poisoned");
            guard = next_guard;
        }
    }

    /// Returns `true` when no attached job remains unfinished.
    pub fn is_empty(&self) -> bool {
        self.core.count.load(Ordering::Acquire) == 0
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.wait();
        }
    }
}
