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

//! A handle-addressable multicast callback registry.

use crate::handle::Handle;
use crate::registry::IndexedRegistry;
use std::sync::{Arc, Mutex};

/// The callback type stored by a [`Delegate`].
///
/// Callbacks receive the broadcast argument by reference, so a single
/// argument value can fan out to every subscriber without cloning.
pub type DelegateFn<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// A multicast delegate: a set of callbacks keyed by [`Handle`], all invoked
/// with the same argument on [`execute`](Delegate::execute).
///
/// The argument type `A` is fixed per delegate instance; multi-argument
/// delegates use a tuple. The listener registry sits behind a mutex so a
/// delegate can be shared across threads (and with the scheduler's
/// asynchronous fan-out job) behind an `Arc`.
pub struct Delegate<A> {
    listeners: Mutex<IndexedRegistry<DelegateFn<A>>>,
}

impl<A> Delegate<A> {
    /// Creates a delegate with no subscribers.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(IndexedRegistry::new()),
        }
    }

    /// Registers a callback and returns the handle identifying it within
    /// this delegate instance.
    pub fn subscribe<F>(&self, callback: F) -> Handle
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let mut listeners = self.lock_listeners();
        listeners.insert(Arc::new(callback))
    }

    /// Removes the subscription addressed by `handle` and invalidates the
    /// caller's copy of it.
    ///
    /// An invalid or already-removed handle is a benign no-op; the handle is
    /// still invalidated so the caller cannot keep using a stale value.
    pub fn remove(&self, handle: &mut Handle) {
        if handle.is_valid() {
            let mut listeners = self.lock_listeners();
            listeners.remove(*handle);
        }
        handle.invalidate();
    }

    /// Invokes every currently registered callback with `args`, in stable
    /// registry order. An empty delegate returns immediately.
    ///
    /// Callbacks run on the calling thread, outside the registry lock, so a
    /// callback may subscribe to or remove from this same delegate without
    /// deadlocking. No isolation is provided between callbacks: a panic in
    /// one aborts the remaining invocations unless the caller wraps it.
    pub fn execute(&self, args: &A) {
        let snapshot: Vec<DelegateFn<A>> = {
            let listeners = self.lock_listeners();
            if listeners.is_empty() {
                return;
            }
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        log::trace!("delegate fan-out to {} listener(s)", snapshot.len());
        for listener in snapshot {
            listener(args);
        }
    }

    /// Removes every subscription.
    pub fn clear(&self) {
        self.lock_listeners().clear();
    }

    /// Returns the number of current subscriptions.
    pub fn len(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Returns `true` when no callback is subscribed.
    pub fn is_empty(&self) -> bool {
        self.lock_listeners().is_empty()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, IndexedRegistry<DelegateFn<A>>> {
        self.listeners
            .lock()
            .expect("delegate listener registry lock poisoned")
    }
}

impl<A> Default for Delegate<A> {
    fn default() -> Self {
        Self::new()
    }
}
