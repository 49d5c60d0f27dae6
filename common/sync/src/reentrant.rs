// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cell::Ref;
use std::cell::RefCell;
use std::cell::RefMut;
use std::fmt;
use std::fmt::Debug;

use parking_lot::ReentrantMutex;
use parking_lot::ReentrantMutexGuard;

/// A lock that the owning thread may acquire again without deadlocking.
///
/// Holding the lock only grants shared access. Data is reached through `borrow`/`borrow_mut` on
/// the guard, and those borrows must stay short: a nested `lock` from the same thread while a
/// `borrow_mut` is alive panics. Callers never hold a borrow across a call that may re-enter.
pub struct ReentrantLock<T> {
    inner: ReentrantMutex<RefCell<T>>,
}

pub struct ReentrantLockGuard<'a, T> {
    guard: ReentrantMutexGuard<'a, RefCell<T>>,
}

impl<T> ReentrantLock<T> {
    pub fn new(value: T) -> ReentrantLock<T> {
        ReentrantLock {
            inner: ReentrantMutex::new(RefCell::new(value)),
        }
    }

    pub fn lock(&self) -> ReentrantLockGuard<T> {
        ReentrantLockGuard {
            guard: self.inner.lock(),
        }
    }
}

impl<T: Default> Default for ReentrantLock<T> {
    fn default() -> Self {
        ReentrantLock::new(T::default())
    }
}

impl<'a, T> ReentrantLockGuard<'a, T> {
    pub fn borrow(&self) -> Ref<'_, T> {
        self.guard.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.guard.borrow_mut()
    }
}

impl<T: Debug> Debug for ReentrantLock<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let guard = self.lock();
        let result = formatter
            .debug_struct("ReentrantLock")
            .field("data", &*guard.borrow())
            .finish();
        result
    }
}
