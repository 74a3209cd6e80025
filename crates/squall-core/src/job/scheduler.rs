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

//! The worker-pool scheduler: job creation, the shared ready queue, and the
//! dispatch loop each worker thread runs.

use super::{Barrier, Job, JobFn, JobHandle, SchedulerError};
use crate::delegate::Delegate;
use crate::handle::Handle;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

/// Shared scheduler state: the ready queue, its wakeup condition, and the
/// running flag the workers poll.
///
/// Lives behind an `Arc` so worker threads, [`SchedulerHandle`]s, and
/// finish hooks wired by [`create_job_after`](JobScheduler::create_job_after)
/// can all reach the queue without going through the owning scheduler.
struct SchedulerCore {
    queue: Mutex<VecDeque<JobHandle>>,
    job_added: Condvar,
    running: AtomicBool,
    next_job_id: AtomicU32,
    concurrency: usize,
}

impl SchedulerCore {
    fn new(concurrency: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            job_added: Condvar::new(),
            running: AtomicBool::new(true),
            next_job_id: AtomicU32::new(0),
            concurrency,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Hands out the next job id, skipping the invalid sentinel when the
    /// counter wraps so a job id can never alias an empty handle.
    fn next_id(&self) -> Handle {
        let mut raw = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        if raw == u32::MAX {
            raw = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        }
        Handle::new(raw)
    }

    /// Allocates a job and, when it has no unresolved dependencies,
    /// enqueues it immediately. The queue entry is a clone of the returned
    /// handle, so the job outlives any caller-side drop until it finishes.
    fn create_job(
        &self,
        function: JobFn,
        num_deps: u32,
        on_finished: Option<JobFn>,
        unmanaged: bool,
    ) -> JobHandle {
        assert!(
            self.is_running(),
            "job created after scheduler shutdown began"
        );
        let id = self.next_id();
        let job = Arc::new(Job::new(id, function, num_deps, unmanaged, on_finished));
        let handle = JobHandle::new(job);

        log::trace!("created {id} ({num_deps} dependencies, unmanaged: {unmanaged})");
        if num_deps == 0 {
            self.queue_job(handle.clone());
        }
        handle
    }

    /// Appends a ready job to the queue and wakes one idle worker.
    fn queue_job(&self, job: JobHandle) {
        assert!(
            self.is_running(),
            "job queued after scheduler shutdown began"
        );
        job.job().mark_queued();
        let mut queue = self.lock_queue();
        queue.push_back(job);
        self.job_added.notify_one();
    }

    /// Appends a batch of ready jobs and wakes every idle worker.
    fn queue_jobs(&self, jobs: Vec<JobHandle>) {
        if jobs.is_empty() {
            return;
        }
        assert!(
            self.is_running(),
            "jobs queued after scheduler shutdown began"
        );
        for job in &jobs {
            job.job().mark_queued();
        }
        let mut queue = self.lock_queue();
        queue.extend(jobs);
        self.job_added.notify_all();
    }

    /// Wires "when each prerequisite finishes, resolve one dependency of
    /// the new job and enqueue it at zero" without the caller hand-rolling
    /// the callback plumbing.
    fn create_job_after(
        core: &Arc<SchedulerCore>,
        prerequisites: &[JobHandle],
        function: JobFn,
        on_finished: Option<JobFn>,
    ) -> JobHandle {
        // With no prerequisites this degenerates to an immediate enqueue.
        let dependent = core.create_job(function, prerequisites.len() as u32, on_finished, false);

        for prerequisite in prerequisites {
            let dependent_ref = dependent.clone();
            let hook_core = Arc::clone(core);
            let hook: JobFn = Box::new(move || {
                if dependent_ref.job().decrement_dependencies() == 0 {
                    hook_core.queue_job(dependent_ref);
                }
            });
            if !prerequisite.job().add_finish_hook(hook) {
                // The prerequisite finished before the hook landed; settle
                // its share of the count inline.
                if dependent.job().decrement_dependencies() == 0 {
                    core.queue_job(dependent.clone());
                }
            }
        }
        dependent
    }

    /// The dispatch loop each worker runs: blocking FIFO pop, execute,
    /// repeat until the running flag clears.
    fn worker_loop(&self, index: usize) {
        log::debug!("worker {index} started");
        let mut queue = self.lock_queue();
        while self.is_running() {
            match queue.pop_front() {
                Some(job) => {
                    // Execute outside the queue lock so other workers keep
                    // draining while this job runs.
                    drop(queue);
                    job.job().execute();
                    queue = self.lock_queue();
                }
                None => {
                    queue = self
                        .job_added
                        .wait(queue)
                        .expect("ready queue lock poisoned");
                }
            }
        }
        drop(queue);
        log::debug!("worker {index} stopped");
    }

    /// Clears the running flag and wakes every worker so it can observe the
    /// flag and exit. Queued-but-unexecuted jobs are abandoned.
    fn halt(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        // Notify under the queue lock: a worker holds it from its running
        // check until it parks on the condvar, so the wakeup cannot slip
        // into that window and be missed.
        let queue = self.lock_queue();
        if !queue.is_empty() {
            log::warn!(
                "scheduler shutdown is abandoning {} queued job(s)",
                queue.len()
            );
        }
        self.job_added.notify_all();
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<JobHandle>> {
        self.queue.lock().expect("ready queue lock poisoned")
    }
}

/// The job-scheduling engine: a fixed pool of worker threads draining one
/// shared FIFO ready queue.
///
/// Construct exactly one scheduler for the host's lifetime, during startup,
/// and drop (or [`shutdown`](Self::shutdown)) it during teardown. Code that
/// submits jobs receives a [`SchedulerHandle`] rather than reaching for a
/// process-wide global, which keeps the one-instance guarantee a matter of
/// host wiring and lets tests run isolated pools.
pub struct JobScheduler {
    core: Arc<SchedulerCore>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl JobScheduler {
    /// Starts a scheduler with one worker per detected hardware thread.
    ///
    /// # Errors
    /// Returns [`SchedulerError::WorkerSpawn`] if the OS refuses a worker
    /// thread; this is fatal and no partially constructed pool is leaked.
    pub fn new() -> Result<Self, SchedulerError> {
        let concurrency = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_threads(concurrency)
    }

    /// Starts a scheduler with an explicit worker count. Useful for tests
    /// and hosts that reserve cores for other subsystems.
    pub fn with_threads(worker_count: usize) -> Result<Self, SchedulerError> {
        assert!(worker_count > 0, "scheduler needs at least one worker");

        let core = Arc::new(SchedulerCore::new(worker_count));
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let worker_core = Arc::clone(&core);
            let spawned = thread::Builder::new()
                .name(format!("squall-worker-{index}"))
                .spawn(move || worker_core.worker_loop(index));
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(source) => {
                    // Unwind the workers spawned so far before reporting.
                    core.halt();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(SchedulerError::WorkerSpawn { source });
                }
            }
        }

        log::info!("job scheduler started with {worker_count} worker thread(s)");
        Ok(Self { core, workers })
    }

    /// Returns `true` until shutdown begins.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Reports the configured worker-pool size.
    pub fn max_concurrency(&self) -> usize {
        self.core.concurrency
    }

    /// Returns a cheap, clonable submission context for this scheduler.
    ///
    /// Hand this to subsystems that create or queue jobs; it remains valid
    /// for the scheduler's lifetime and fails fast if used afterwards.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            core: Arc::clone(&self.core),
        }
    }

    /// Creates a job and returns its completion handle.
    ///
    /// With `num_deps == 0` the job is enqueued immediately. Otherwise it
    /// stays `Pending` until external code drives its dependency count to
    /// zero and enqueues it via [`queue_job`](Self::queue_job) — or use
    /// [`create_job_after`](Self::create_job_after) to have that wiring done
    /// for you.
    pub fn create_job<F>(&self, function: F, num_deps: u32, on_finished: Option<JobFn>) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.core
            .create_job(Box::new(function), num_deps, on_finished, false)
    }

    /// Creates a job flagged as internal. Same lifecycle as
    /// [`create_job`](Self::create_job), but the job is not meant to join
    /// externally visible dependency graphs.
    pub fn create_unmanaged_job<F>(
        &self,
        function: F,
        num_deps: u32,
        on_finished: Option<JobFn>,
    ) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.core
            .create_job(Box::new(function), num_deps, on_finished, true)
    }

    /// Creates a job that becomes ready only once every job in
    /// `prerequisites` has finished.
    ///
    /// A prerequisite that already finished simply counts as resolved; the
    /// returned job is enqueued exactly once, after the last outstanding
    /// prerequisite completes.
    pub fn create_job_after<F>(
        &self,
        prerequisites: &[JobHandle],
        function: F,
        on_finished: Option<JobFn>,
    ) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        SchedulerCore::create_job_after(&self.core, prerequisites, Box::new(function), on_finished)
    }

    /// Enqueues a job whose dependency count has reached zero.
    pub fn queue_job(&self, job: JobHandle) {
        self.core.queue_job(job);
    }

    /// Enqueues a batch of ready jobs, preserving their order.
    pub fn queue_jobs(&self, jobs: Vec<JobHandle>) {
        self.core.queue_jobs(jobs);
    }

    /// Fans a delegate invocation out as a single asynchronous job.
    ///
    /// See [`SchedulerHandle::execute_delegate_async`].
    pub fn execute_delegate_async<A>(&self, delegate: &Arc<Delegate<A>>, args: A) -> Barrier
    where
        A: Send + 'static,
    {
        self.handle().execute_delegate_async(delegate, args)
    }

    /// Stops the pool: no job starts executing after this returns control
    /// flow to the workers, and every worker is joined before the call
    /// returns. Jobs still sitting in the queue are abandoned.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.core.halt();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        log::info!("job scheduler stopped");
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A clonable submission context over a [`JobScheduler`].
///
/// This is the object hosts inject into subsystems instead of exposing the
/// scheduler as ambient global state. All submission methods share the
/// scheduler's contract: submitting after shutdown fails fast, except for
/// [`try_create_job`](Self::try_create_job) which reports it as an error
/// for hosts that race teardown.
#[derive(Clone)]
pub struct SchedulerHandle {
    core: Arc<SchedulerCore>,
}

impl SchedulerHandle {
    /// Returns `true` until the scheduler's shutdown begins.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Reports the configured worker-pool size.
    pub fn max_concurrency(&self) -> usize {
        self.core.concurrency
    }

    /// See [`JobScheduler::create_job`].
    pub fn create_job<F>(&self, function: F, num_deps: u32, on_finished: Option<JobFn>) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.core
            .create_job(Box::new(function), num_deps, on_finished, false)
    }

    /// Fallible variant of [`create_job`](Self::create_job): instead of
    /// failing fast on a stopped scheduler, reports
    /// [`SchedulerError::SchedulerStopped`].
    pub fn try_create_job<F>(
        &self,
        function: F,
        num_deps: u32,
        on_finished: Option<JobFn>,
    ) -> Result<JobHandle, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.core.is_running() {
            return Err(SchedulerError::SchedulerStopped);
        }
        Ok(self.create_job(function, num_deps, on_finished))
    }

    /// See [`JobScheduler::create_unmanaged_job`].
    pub fn create_unmanaged_job<F>(
        &self,
        function: F,
        num_deps: u32,
        on_finished: Option<JobFn>,
    ) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.core
            .create_job(Box::new(function), num_deps, on_finished, true)
    }

    /// See [`JobScheduler::create_job_after`].
    pub fn create_job_after<F>(
        &self,
        prerequisites: &[JobHandle],
        function: F,
        on_finished: Option<JobFn>,
    ) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        SchedulerCore::create_job_after(&self.core, prerequisites, Box::new(function), on_finished)
    }

    /// See [`JobScheduler::queue_job`].
    pub fn queue_job(&self, job: JobHandle) {
        self.core.queue_job(job);
    }

    /// See [`JobScheduler::queue_jobs`].
    pub fn queue_jobs(&self, jobs: Vec<JobHandle>) {
        self.core.queue_jobs(jobs);
    }

    /// Fans a delegate invocation out as exactly one asynchronous job that
    /// performs a synchronous [`Delegate::execute`] with the captured
    /// arguments, and returns a [`Barrier`] attached to it.
    ///
    /// Waiting on the barrier guarantees every subscriber observed the
    /// arguments. Concurrency granularity is one job per call, not per
    /// subscriber: callbacks still run sequentially inside that job.
    pub fn execute_delegate_async<A>(&self, delegate: &Arc<Delegate<A>>, args: A) -> Barrier
    where
        A: Send + 'static,
    {
        let delegate = Arc::clone(delegate);
        let barrier = Barrier::new();
        let job = self
            .core
            .create_job(Box::new(move || delegate.execute(&args)), 0, None, true);
        barrier.add_job(&job);
        barrier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn pool_reports_its_configured_size() {
        let scheduler = JobScheduler::with_threads(3).expect("pool should start");
        assert_eq!(scheduler.max_concurrency(), 3);
        assert_eq!(scheduler.handle().max_concurrency(), 3);
        assert!(scheduler.is_running());
    }

    #[test]
    fn zero_dependency_job_runs_to_completion() {
        let scheduler = JobScheduler::with_threads(2).expect("pool should start");
        let ran = Arc::new(AtomicU32::new(0));

        let ran_clone = Arc::clone(&ran);
        let handle = scheduler.create_job(
            move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            },
            0,
            None,
        );

        handle.wait();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(handle.job().is_finished());
    }

    #[test]
    fn shutdown_is_idempotent_and_stops_the_pool() {
        let mut scheduler = JobScheduler::with_threads(2).expect("pool should start");
        scheduler.shutdown();
        assert!(!scheduler.is_running());
        scheduler.shutdown();
    }

    #[test]
    #[should_panic(expected = "after scheduler shutdown")]
    fn creating_a_job_after_shutdown_fails_fast() {
        let mut scheduler = JobScheduler::with_threads(1).expect("pool should start");
        let handle = scheduler.handle();
        scheduler.shutdown();
        let _ = handle.create_job(|| {}, 0, None);
    }

    #[test]
    fn try_create_job_reports_a_stopped_scheduler() {
        let mut scheduler = JobScheduler::with_threads(1).expect("pool should start");
        let handle = scheduler.handle();

        assert!(handle.try_create_job(|| {}, 0, None).is_ok());
        scheduler.shutdown();
        assert!(matches!(
            handle.try_create_job(|| {}, 0, None),
            Err(SchedulerError::SchedulerStopped)
        ));
    }

    #[test]
    fn job_ids_skip_the_invalid_sentinel_on_wrap() {
        let core = SchedulerCore::new(1);
        core.next_job_id.store(u32::MAX, Ordering::Relaxed);

        let wrapped = core.next_id();
        assert!(wrapped.is_valid(), "a job id must never alias Handle::INVALID");
        assert_eq!(wrapped, Handle::new(0));
        assert_eq!(core.next_id(), Handle::new(1));
    }

    #[test]
    fn unmanaged_jobs_are_flagged() {
        let scheduler = JobScheduler::with_threads(1).expect("pool should start");
        let job = scheduler.create_unmanaged_job(|| {}, 0, None);
        assert!(job.job().is_unmanaged());
        job.wait();
    }
}
