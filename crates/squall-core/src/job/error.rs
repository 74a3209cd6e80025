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

//! Error types for the job scheduler.

use thiserror::Error;

/// Errors surfaced by the scheduler's fallible operations.
///
/// Programmer contract violations (waiting on an invalid handle, executing a
/// job out of order, dependency-count underflow) are not represented here;
/// those fail fast with a panic because they indicate a bug in the caller's
/// job-graph construction, not a recoverable runtime condition.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The OS refused to spawn a worker thread. Fatal at startup: the pool
    /// cannot be partially constructed.
    #[error("failed to spawn worker thread: {source}")]
    WorkerSpawn {
        /// The underlying OS error.
        #[from]
        source: std::io::Error,
    },

    /// A job was submitted to a scheduler that has already shut down.
    #[error("job submitted to a scheduler that has shut down")]
    SchedulerStopped,
}
