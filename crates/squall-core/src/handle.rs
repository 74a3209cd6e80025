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

//! Defines the sentinel-valued identifier type used across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque 32-bit identifier referencing an entry in some indexed store.
///
/// A `Handle` carries no ownership semantics of its own; its meaning is
/// assigned by the container that issued it. The all-ones bit pattern is
/// reserved as the invalid sentinel, so a default-constructed handle
/// references nothing until a container hands out a real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(u32);

impl Handle {
    /// The reserved sentinel value for a handle that references nothing.
    pub const INVALID: Handle = Handle(u32::MAX);

    /// Creates a handle wrapping the given raw index.
    pub const fn new(id: u32) -> Self {
        Handle(id)
    }

    /// Returns the raw index this handle wraps.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns `true` unless this handle is the invalid sentinel.
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Resets this handle to the invalid sentinel.
    pub fn invalidate(&mut self) {
        self.0 = u32::MAX;
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<u32> for Handle {
    fn from(id: u32) -> Self {
        Handle(id)
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl From<Handle> for usize {
    fn from(handle: Handle) -> Self {
        handle.0 as usize
    }
}

impl PartialEq<u32> for Handle {
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Handle({})", self.0)
        } else {
            write!(f, "Handle(invalid)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handle_is_invalid() {
        let handle = Handle::default();
        assert!(!handle.is_valid());
        assert_eq!(handle, Handle::INVALID);
    }

    #[test]
    fn new_handle_is_valid() {
        let handle = Handle::new(42);
        assert!(handle.is_valid());
        assert_eq!(handle.id(), 42);
    }

    #[test]
    fn invalidate_resets_to_sentinel() {
        let mut handle = Handle::new(7);
        handle.invalidate();
        assert!(!handle.is_valid());
        assert_eq!(handle.id(), u32::MAX);
    }

    #[test]
    fn handles_order_by_id() {
        assert!(Handle::new(1) < Handle::new(2));
        assert_eq!(Handle::new(3), Handle::new(3));
        assert_eq!(Handle::new(9), 9u32);
    }

    #[test]
    fn conversions_round_trip() {
        let handle = Handle::from(11u32);
        assert_eq!(u32::from(handle), 11);
        assert_eq!(usize::from(handle), 11);
    }
}
