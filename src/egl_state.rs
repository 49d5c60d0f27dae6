// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-thread EGL state: the sticky error, the bound API and the current context and surfaces.
//!
//! The state lives in a thread-local cell stamped with the runtime it belongs to and the fork
//! generation it was created in. State from another runtime is dropped on first use. State
//! inherited across `fork` is leaked instead, since its objects belong to the parent's
//! connections.
//!
//! Borrows of the cell never span a call into another object, so the transport's flush hook can
//! always look at the current context.

use std::cell::RefCell;
use std::mem;
use std::sync::Arc;

use log::debug;

use crate::context::Context;
use crate::egl::defs::EGL_OPENGL_ES_API;
use crate::error::EglError;
use crate::runtime::fork_generation;
use crate::runtime::Runtime;
use crate::surface::Surface;

thread_local! {
    static EGL_STATE: RefCell<Option<EglState>> = const { RefCell::new(None) };
}

/// The objects current on a thread.
#[derive(Clone, Default)]
pub struct Current {
    pub context: Option<Arc<Context>>,
    pub draw: Option<Arc<Surface>>,
    pub read: Option<Arc<Surface>>,
}

pub(crate) struct EglState {
    runtime_id: u64,
    generation: u64,
    error: EglError,
    api: u32,
    current: Current,
}

impl EglState {
    fn new(runtime_id: u64, generation: u64) -> EglState {
        EglState {
            runtime_id,
            generation,
            error: EglError::Success,
            api: EGL_OPENGL_ES_API,
            current: Current::default(),
        }
    }

    fn take_error(&mut self) -> EglError {
        mem::replace(&mut self.error, EglError::Success)
    }

    /// Keeps the first error until it is read.
    fn set_error(&mut self, error: EglError) {
        if self.error == EglError::Success {
            self.error = error;
        }
    }

    /// Makes `next` current on this thread.
    ///
    /// Objects that are not current here yet are marked current first. If any of them is
    /// current on another thread the marks made so far are undone and `next` is handed back.
    /// Otherwise objects that are no longer current here are unmarked, and the replaced
    /// references are returned so the caller can drop them outside the cell.
    fn set_current(&mut self, next: Current) -> Result<Current, Current> {
        let old = &self.current;
        let mut marked_context = false;
        let mut marked_surfaces: Vec<&Arc<Surface>> = Vec::new();

        let mut success = true;
        if let Some(context) = &next.context {
            if !same(&old.context, &next.context) {
                success = context.mark_current(true);
                marked_context = success;
            }
        }
        if success {
            for surface in new_surfaces(&next, old) {
                if !surface.mark_current(true) {
                    success = false;
                    break;
                }
                marked_surfaces.push(surface);
            }
        }

        if !success {
            if marked_context {
                if let Some(context) = &next.context {
                    context.mark_current(false);
                }
            }
            for surface in marked_surfaces {
                surface.mark_current(false);
            }
            return Err(next);
        }

        if let Some(context) = &old.context {
            if !same(&old.context, &next.context) {
                context.mark_current(false);
            }
        }
        for surface in new_surfaces(old, &next) {
            surface.mark_current(false);
        }

        Ok(mem::replace(&mut self.current, next))
    }
}

impl Drop for EglState {
    /// Runs on thread exit. Whatever was current here becomes available to other threads.
    fn drop(&mut self) {
        let current = mem::take(&mut self.current);
        if let Some(context) = &current.context {
            context.mark_current(false);
        }
        for surface in new_surfaces(&current, &Current::default()) {
            surface.mark_current(false);
        }
    }
}

fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn holds(current: &Current, surface: &Arc<Surface>) -> bool {
    [&current.draw, &current.read]
        .into_iter()
        .flatten()
        .any(|held| Arc::ptr_eq(held, surface))
}

/// Surfaces of `next` that `prev` does not hold, each listed once.
fn new_surfaces<'a>(next: &'a Current, prev: &Current) -> Vec<&'a Arc<Surface>> {
    let mut surfaces: Vec<&Arc<Surface>> = Vec::new();
    for surface in [&next.draw, &next.read].into_iter().flatten() {
        if !holds(prev, surface) && !surfaces.iter().any(|s| Arc::ptr_eq(s, surface)) {
            surfaces.push(surface);
        }
    }
    surfaces
}

/// Runs `f` on this thread's state for `rt`, creating it if needed.
fn with_state<R, F>(rt: &Runtime, f: F) -> R
where
    F: FnOnce(&mut EglState) -> R,
{
    let generation = fork_generation();
    let (result, stale) = EGL_STATE.with(|cell| {
        let mut slot = cell.borrow_mut();
        let is_stale = slot
            .as_ref()
            .is_some_and(|state| state.runtime_id != rt.id() || state.generation != generation);
        let stale = if is_stale { slot.take() } else { None };
        let state = slot.get_or_insert_with(|| EglState::new(rt.id(), generation));
        (f(state), stale)
    });
    if let Some(stale) = stale {
        if stale.generation != generation {
            debug!("leaking EGL state inherited across fork");
            mem::forget(stale);
        } else {
            drop(stale);
        }
    }
    result
}

/// Returns and clears the thread's last error.
pub fn get_error(rt: &Runtime) -> EglError {
    with_state(rt, EglState::take_error)
}

/// Records `error` unless an earlier error has not been read yet.
pub fn set_error(rt: &Runtime, error: EglError) {
    with_state(rt, |state| state.set_error(error))
}

pub fn api(rt: &Runtime) -> u32 {
    with_state(rt, |state| state.api)
}

pub fn set_api(rt: &Runtime, api: u32) {
    with_state(rt, |state| state.api = api)
}

pub fn current(rt: &Runtime) -> Current {
    with_state(rt, |state| state.current.clone())
}

pub fn context(rt: &Runtime) -> Option<Arc<Context>> {
    with_state(rt, |state| state.current.context.clone())
}

pub fn draw_surface(rt: &Runtime) -> Option<Arc<Surface>> {
    with_state(rt, |state| state.current.draw.clone())
}

pub fn read_surface(rt: &Runtime) -> Option<Arc<Surface>> {
    with_state(rt, |state| state.current.read.clone())
}

/// Makes `context`, `draw` and `read` current on this thread. Returns false, with nothing
/// changed, if any of them is current on another thread.
pub fn set_context(
    rt: &Runtime,
    context: Option<Arc<Context>>,
    draw: Option<Arc<Surface>>,
    read: Option<Arc<Surface>>,
) -> bool {
    let next = Current {
        context,
        draw,
        read,
    };
    // Whichever side is handed back is dropped here, after the cell is released.
    match with_state(rt, |state| state.set_current(next)) {
        Ok(_replaced) => true,
        Err(_rejected) => false,
    }
}

/// Releases everything current and restores the error and API defaults.
pub fn reset(rt: &Runtime) {
    set_context(rt, None, None, None);
    with_state(rt, |state| {
        state.error = EglError::Success;
        state.api = EGL_OPENGL_ES_API;
    })
}

/// The context current on this thread for the runtime `runtime_id`, if the state can be looked
/// at right now.
pub(crate) fn current_context_of(runtime_id: u64) -> Option<Arc<Context>> {
    let generation = fork_generation();
    EGL_STATE
        .try_with(|cell| {
            let slot = cell.try_borrow().ok()?;
            let state = slot.as_ref()?;
            if state.runtime_id != runtime_id || state.generation != generation {
                return None;
            }
            state.current.context.clone()
        })
        .ok()
        .flatten()
}
