// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Lock types for the YaGL runtime.
//!
//! `Mutex` and `Condvar` wrap their standard library counterparts and panic on poison instead of
//! returning an error. Release builds abort on panic, so a poisoned lock can only be observed in
//! tests, where the panic is what we want anyway.
//!
//! `ReentrantLock` is the one lock that may be taken again by the thread already holding it. It
//! guards the display table and the per-display registries, which native event handlers can
//! re-enter while a lookup is in progress.

mod condvar;
mod mutex;
mod reentrant;

use std::sync::Arc;
use std::time::Duration;

pub use crate::condvar::Condvar;
pub use crate::mutex::Mutex;
pub use crate::reentrant::ReentrantLock;
pub use crate::reentrant::ReentrantLockGuard;

/// One-shot completion flag that one thread waits on and another signals.
///
/// Created in pairs with `create_promise_and_waitable`.
pub struct Waitable(Arc<(Condvar, Mutex<bool>)>);

impl Waitable {
    /// Return an already-signaled Waitable.
    pub fn signaled() -> Self {
        Waitable(Arc::new((Condvar::new(), Mutex::new(true))))
    }

    /// Blocks until signaled or until `timeout` elapses. Returns true if signaled.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let (ref condvar, ref signaled) = *self.0;
        let guard = signaled.lock();
        match timeout {
            None => *condvar.wait_while(guard, |signaled| !*signaled),
            Some(timeout) => *condvar.wait_timeout_while(guard, timeout, |signaled| !*signaled).0,
        }
    }

    pub fn is_signaled(&self) -> bool {
        let (_, ref signaled) = *self.0;
        *signaled.lock()
    }
}

/// Signalling side of a `Waitable`.
pub struct Promise(Arc<(Condvar, Mutex<bool>)>);

impl Promise {
    /// Signal this promise and wake every waiter.
    pub fn signal(&self) {
        let (ref condvar, ref signaled) = *self.0;
        *signaled.lock() = true;
        condvar.notify_all();
    }
}

/// Create a paired Promise and Waitable.
pub fn create_promise_and_waitable() -> (Promise, Waitable) {
    let inner = Arc::new((Condvar::new(), Mutex::new(false)));
    (Promise(Arc::clone(&inner)), Waitable(inner))
}
