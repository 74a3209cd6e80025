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

//! A handle-keyed slot store backing the multicast delegate.

use crate::handle::Handle;

/// A generic store whose entries are addressed by [`Handle`].
///
/// Inserting a value returns the handle of the slot it occupies; removed
/// slots are recycled through a free list so handles stay dense. Iteration
/// visits occupied slots in ascending slot order, which gives subscribers a
/// stable invocation order: removing one entry never reorders the others.
#[derive(Debug)]
pub struct IndexedRegistry<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> IndexedRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Inserts a value and returns the handle addressing its slot.
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                Handle::new(index)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Some(value));
                Handle::new(index)
            }
        }
    }

    /// Removes the entry addressed by `handle`, returning it if present.
    ///
    /// An invalid or stale handle is a benign no-op that returns `None`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let index = handle.id();
        let value = self.slots[index as usize].take();
        self.free.push(index);
        self.len -= 1;
        value
    }

    /// Returns `true` if `handle` addresses an occupied slot.
    pub fn contains(&self, handle: Handle) -> bool {
        handle.is_valid()
            && matches!(self.slots.get(handle.id() as usize), Some(Some(_)))
    }

    /// Iterates over occupied slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|v| (Handle::new(index as u32), v)))
    }

    /// Removes every entry. Previously issued handles become stale.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for IndexedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
