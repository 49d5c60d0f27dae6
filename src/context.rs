// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::fmt::Debug;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use sync::Mutex;

use crate::client::ClientContext;
use crate::display::Display;
use crate::fence::Fence;
use crate::resource::ptr_eq_weak;
use crate::resource::HostHandle;
use crate::resource::Registered;

#[derive(Default)]
struct Throttle {
    needed: bool,
    fence: Option<Arc<Fence>>,
}

/// An EGL rendering context.
pub struct Context {
    handle: HostHandle,
    display: Weak<Display>,
    client: Box<dyn ClientContext>,
    current: Mutex<bool>,
    throttle: Mutex<Throttle>,
    client_prepared: AtomicBool,
}

impl Context {
    pub fn new(
        handle: HostHandle,
        display: &Arc<Display>,
        client: Box<dyn ClientContext>,
    ) -> Arc<Context> {
        Arc::new(Context {
            handle,
            display: Arc::downgrade(display),
            client,
            current: Mutex::new(false),
            throttle: Mutex::new(Throttle::default()),
            client_prepared: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> HostHandle {
        self.handle
    }

    pub fn display(&self) -> Option<Arc<Display>> {
        self.display.upgrade()
    }

    pub fn belongs_to(&self, display: &Arc<Display>) -> bool {
        ptr_eq_weak(&self.display, display)
    }

    pub fn client(&self) -> &dyn ClientContext {
        self.client.as_ref()
    }

    /// Prepares the client context the first time the context is made current.
    pub fn prepare_client(&self) {
        if !self.client_prepared.swap(true, Ordering::AcqRel) {
            self.client.prepare();
        }
    }

    /// Flips the current flag to `current`. Returns false if it already had that value, i.e.
    /// another thread won the transition.
    pub fn mark_current(&self, current: bool) -> bool {
        let mut flag = self.current.lock();
        if *flag == current {
            return false;
        }
        *flag = current;
        true
    }

    pub fn is_current(&self) -> bool {
        *self.current.lock()
    }

    pub fn needs_throttle(&self) -> bool {
        self.throttle.lock().needed
    }

    /// Records that work was submitted without an explicit fence. `fence`, if any, completes
    /// once that work is done.
    pub fn set_need_throttle(&self, fence: Option<Arc<Fence>>) {
        let old = {
            let mut throttle = self.throttle.lock();
            throttle.needed = true;
            std::mem::replace(&mut throttle.fence, fence)
        };
        drop(old);
    }

    /// Waits for the work recorded by `set_need_throttle`. Without a fence `wait_host` is called
    /// to drain the host instead.
    pub fn throttle<F: FnOnce()>(&self, wait_host: F) {
        let fence = {
            let mut throttle = self.throttle.lock();
            if !throttle.needed {
                return;
            }
            throttle.needed = false;
            throttle.fence.take()
        };
        match fence {
            Some(fence) => {
                fence.wait();
            }
            None => wait_host(),
        }
    }
}

impl Registered for Context {
    type Key = HostHandle;

    fn registry_key(&self) -> HostHandle {
        self.handle
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("handle", &self.handle)
            .field("api", &self.client.api())
            .finish()
    }
}
