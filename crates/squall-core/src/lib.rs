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

//! # Squall Core
//!
//! A lightweight, embeddable job-scheduling engine: a fixed pool of worker
//! threads executing caller-submitted units of work, coordinated through
//! dependency counters, reference-counted completion handles, and multi-job
//! wait barriers. A handle-addressable multicast [`Delegate`] rides on top
//! of the scheduler for asynchronous callback fan-out.
//!
//! The host creates one [`JobScheduler`] during startup, passes
//! [`SchedulerHandle`]s to the subsystems that submit work, and tears the
//! scheduler down during shutdown. Blocking waits ([`JobHandle::wait`],
//! [`Barrier::wait`]) are available from any thread, including workers —
//! with the usual pool-starvation caveat left to the caller.

#![warn(missing_docs)]

pub mod delegate;
pub mod handle;
pub mod job;
pub mod registry;

pub use delegate::{Delegate, DelegateFn};
pub use handle::Handle;
pub use job::{
    Barrier, Job, JobFn, JobHandle, JobScheduler, JobState, SchedulerError, SchedulerHandle,
};
pub use registry::IndexedRegistry;
