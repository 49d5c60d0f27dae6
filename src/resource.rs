// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Shared ownership of remote objects.
//!
//! Every remote object (display, context, surface, image, fence) lives behind an `Arc`. Cloning
//! the `Arc` is an acquire, dropping it is a release, and the object's `Drop` impl is its destroy
//! callback, so it runs exactly once after the last reference is gone. A `Registry` entry holds
//! one reference; removing an entry hands that reference back to the caller so it can be dropped
//! after the registry lock is released.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::Weak;

/// Opaque 32-bit id assigned by the host. Zero is invalid.
pub type HostHandle = u32;

/// Guest-visible handle, either a host handle or a native object id.
pub type ClientHandle = u64;

/// An object that can be stored in a `Registry`.
pub trait Registered {
    type Key: Copy + PartialEq + Debug;

    fn registry_key(&self) -> Self::Key;
}

/// A set of objects with at most one entry per key, in insertion order.
pub struct Registry<T: Registered> {
    entries: Vec<Arc<T>>,
}

impl<T: Registered> Registry<T> {
    pub fn new() -> Registry<T> {
        Registry {
            entries: Vec::new(),
        }
    }

    /// Stores a reference to `item`. Returns false if an entry with the same key exists.
    pub fn insert(&mut self, item: &Arc<T>) -> bool {
        let key = item.registry_key();
        if self.entries.iter().any(|entry| entry.registry_key() == key) {
            return false;
        }
        self.entries.push(Arc::clone(item));
        true
    }

    pub fn get(&self, key: T::Key) -> Option<Arc<T>> {
        self.entries
            .iter()
            .find(|entry| entry.registry_key() == key)
            .cloned()
    }

    /// Unlinks the entry for `key` and returns the reference it held.
    pub fn remove(&mut self, key: T::Key) -> Option<Arc<T>> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.registry_key() == key)?;
        Some(self.entries.remove(index))
    }

    /// Unlinks every entry.
    pub fn take_all(&mut self) -> Vec<Arc<T>> {
        std::mem::take(&mut self.entries)
    }

    pub fn keys(&self) -> Vec<T::Key> {
        self.entries.iter().map(|entry| entry.registry_key()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Registered> Default for Registry<T> {
    fn default() -> Self {
        Registry::new()
    }
}

/// Whether `weak` points at the same object as `strong`.
pub fn ptr_eq_weak<T>(weak: &Weak<T>, strong: &Arc<T>) -> bool {
    std::ptr::eq(weak.as_ptr(), Arc::as_ptr(strong))
}
