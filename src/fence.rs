// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Host completion fences.

use std::fmt;
use std::fmt::Debug;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use sync::create_promise_and_waitable;
use sync::Promise;
use sync::Waitable;

use crate::display::Display;
use crate::resource::Registered;

/// How a fence learns that the host has reached it.
pub trait FenceOps: Send + Sync {
    /// Blocks until the fence is signaled. Returns false if waiting failed.
    fn wait(&self) -> bool;

    fn signaled(&self) -> bool;
}

pub struct Fence {
    seq: u32,
    display: Weak<Display>,
    ops: Box<dyn FenceOps>,
}

impl Fence {
    pub fn new(seq: u32, display: &Arc<Display>, ops: Box<dyn FenceOps>) -> Arc<Fence> {
        Arc::new(Fence {
            seq,
            display: Arc::downgrade(display),
            ops,
        })
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn display(&self) -> Option<Arc<Display>> {
        self.display.upgrade()
    }

    pub fn wait(&self) -> bool {
        self.ops.wait()
    }

    pub fn signaled(&self) -> bool {
        self.ops.signaled()
    }
}

impl Registered for Fence {
    type Key = u32;

    fn registry_key(&self) -> u32 {
        self.seq
    }
}

impl Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Fence").field("seq", &self.seq).finish()
    }
}

/// Issues fence sequence numbers in increasing order. Zero means "no fence" on the wire and is
/// never returned.
#[derive(Debug)]
pub struct FenceSequence(AtomicU32);

impl FenceSequence {
    pub const fn new() -> FenceSequence {
        FenceSequence(AtomicU32::new(1))
    }

    pub fn next(&self) -> u32 {
        loop {
            let seq = self.0.fetch_add(1, Ordering::Relaxed);
            if seq != 0 {
                return seq;
            }
        }
    }
}

impl Default for FenceSequence {
    fn default() -> Self {
        FenceSequence::new()
    }
}

/// `FenceOps` backed by a `Waitable`, signaled through the paired `Promise`.
pub struct WaitableFence(Waitable);

impl FenceOps for WaitableFence {
    fn wait(&self) -> bool {
        self.0.wait(None)
    }

    fn signaled(&self) -> bool {
        self.0.is_signaled()
    }
}

/// Creates a fence that is signaled when the returned `Promise` is.
pub fn promise_fence(seq: u32, display: &Arc<Display>) -> (Arc<Fence>, Promise) {
    let (promise, waitable) = create_promise_and_waitable();
    (Fence::new(seq, display, Box::new(WaitableFence(waitable))), promise)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::display::DisplayCaps;

    #[test]
    fn sequence_skips_zero() {
        let seq = FenceSequence(AtomicU32::new(u32::MAX));
        assert_eq!(seq.next(), u32::MAX);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn promise_signals_fence() {
        let display = Display::new(1, 1, DisplayCaps::default());
        let (fence, promise) = promise_fence(5, &display);
        assert_eq!(fence.seq(), 5);
        assert!(!fence.signaled());
        assert!(Arc::ptr_eq(&fence.display().unwrap(), &display));

        let waiter = {
            let fence = fence.clone();
            thread::spawn(move || fence.wait())
        };
        promise.signal();
        assert!(waiter.join().unwrap());
        assert!(fence.signaled());
    }

    #[test]
    fn fence_outlives_display() {
        let display = Display::new(1, 1, DisplayCaps::default());
        let (fence, _promise) = promise_fence(1, &display);
        drop(display);
        assert!(fence.display().is_none());
    }
}
