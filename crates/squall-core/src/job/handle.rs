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

//! A reference-counted completion handle over a scheduled job.

use super::{Job, JobState};
use crate::handle::Handle;
use std::sync::Arc;

/// A shared, reference-counted handle to a [`Job`].
///
/// Cloning is cheap: it only adds a reference. The job's storage is
/// reclaimed when the last handle drops, and since the scheduler's queue
/// entry is itself a handle that lives until execution completes, that can
/// only happen after the job has finished — dropping every caller-side
/// handle early never frees a job out from under a worker.
///
/// A default-constructed handle references nothing and drops as a no-op.
#[derive(Clone, Default)]
pub struct JobHandle {
    job: Option<Arc<Job>>,
}

impl JobHandle {
    pub(crate) fn new(job: Arc<Job>) -> Self {
        Self { job: Some(job) }
    }

    /// Returns a handle that references nothing.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Returns `true` if this handle references a job.
    pub fn is_valid(&self) -> bool {
        self.job.is_some()
    }

    /// Returns the referenced job.
    ///
    /// Dereferencing an invalid handle is a contract violation and fails
    /// fast; check [`is_valid`](Self::is_valid) first when in doubt.
    pub fn job(&self) -> &Job {
        self.job
            .as_deref()
            .expect("dereferenced an invalid JobHandle")
    }

    /// Returns the referenced job, or `None` for an invalid handle.
    pub fn get(&self) -> Option<&Job> {
        self.job.as_deref()
    }

    /// Returns the job's identifier, or [`Handle::INVALID`] for an empty
    /// handle.
    pub fn id(&self) -> Handle {
        self.job.as_deref().map_or(Handle::INVALID, Job::id)
    }

    /// Returns the referenced job's current state.
    ///
    /// Like [`job`](Self::job) and [`wait`](Self::wait), this fails fast on
    /// an invalid handle.
    pub fn state(&self) -> JobState {
        self.job().state()
    }

    /// Blocks the calling thread until the referenced job finishes.
    ///
    /// Waiting on an invalid handle fails fast. Waiting from the worker
    /// thread executing this same job deadlocks — self-waits are a usage
    /// error the scheduler does not detect.
    pub fn wait(&self) {
        self.job().wait_until_finished();
    }
}
