// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! EGL displays and the process-wide display table.
//!
//! Both the table and each display's registries are guarded by a `ReentrantLock`, since native
//! event handlers may look up a display or one of its resources while a lookup on the same
//! thread is in progress. Removed resources are always handed back to the caller, so their
//! destructors run after the lock is released.

use std::fmt;
use std::fmt::Debug;
use std::mem;
use std::sync::Arc;

use log::debug;
use sync::ReentrantLock;

use crate::context::Context;
use crate::error::EglResult;
use crate::fence::Fence;
use crate::image::Image;
pub use crate::native::DisplayCaps;
use crate::resource::ClientHandle;
use crate::resource::HostHandle;
use crate::resource::Registry;
use crate::surface::Surface;

const BASE_EXTENSIONS: &str =
    "EGL_KHR_image_base EGL_KHR_lock_surface EGL_KHR_surfaceless_context ";
const PIXMAPS_EXTENSIONS: &str = "EGL_KHR_image EGL_KHR_image_pixmap EGL_NOK_texture_from_pixmap ";
const WL_BIND_WAYLAND_DISPLAY_EXTENSIONS: &str = "EGL_WL_bind_wayland_display ";
const BUFFER_AGE_EXTENSIONS: &str = "EGL_EXT_buffer_age ";
const FENCE_EXTENSIONS: &str = "EGL_KHR_fence_sync ";
const GL_TEXTURE_EXTENSIONS: &str = "EGL_KHR_gl_texture_2D_image ";
const TIZEN_EXTENSIONS: &str = "EGL_TIZEN_image_native_surface ";

#[derive(Default)]
struct DisplayState {
    prepared: bool,
    extensions: Option<String>,
    surfaces: Registry<Surface>,
    contexts: Registry<Context>,
    images: Registry<Image>,
    fences: Registry<Fence>,
}

/// Resources detached from a display by `terminate`.
pub struct Detached {
    pub surfaces: Vec<Arc<Surface>>,
    pub contexts: Vec<Arc<Context>>,
    pub images: Vec<Arc<Image>>,
    pub fences: Vec<Arc<Fence>>,
}

pub struct Display {
    display_id: u64,
    host_display: HostHandle,
    caps: DisplayCaps,
    state: ReentrantLock<DisplayState>,
}

impl Display {
    pub fn new(display_id: u64, host_display: HostHandle, caps: DisplayCaps) -> Arc<Display> {
        Arc::new(Display {
            display_id,
            host_display,
            caps,
            state: ReentrantLock::new(DisplayState::default()),
        })
    }

    /// The native display id this display was created for.
    pub fn display_id(&self) -> u64 {
        self.display_id
    }

    /// The host handle, which is also the `EGLDisplay` the application sees.
    pub fn host_handle(&self) -> HostHandle {
        self.host_display
    }

    pub fn caps(&self) -> DisplayCaps {
        self.caps
    }

    /// Marks the display initialized.
    pub fn prepare(&self) {
        self.state.lock().borrow_mut().prepared = true;
    }

    pub fn is_prepared(&self) -> bool {
        self.state.lock().borrow().prepared
    }

    /// Unlinks every resource of the display and marks it uninitialized. The resources are
    /// returned so they are released with the display lock dropped.
    pub fn terminate(&self) -> Detached {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.prepared = false;
        Detached {
            surfaces: state.surfaces.take_all(),
            contexts: state.contexts.take_all(),
            images: state.images.take_all(),
            fences: state.fences.take_all(),
        }
    }

    /// The `EGL_EXTENSIONS` string, built on first use.
    pub fn extensions(&self) -> String {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state
            .extensions
            .get_or_insert_with(|| build_extensions(&self.caps))
            .clone()
    }

    /// Extensions reported when no display is given.
    pub fn base_extensions() -> &'static str {
        BASE_EXTENSIONS
    }

    /// Registers `surface` under its client handle. Returns false if the handle is taken.
    pub fn add_surface(&self, surface: &Arc<Surface>) -> bool {
        self.state.lock().borrow_mut().surfaces.insert(surface)
    }

    pub fn surface(&self, handle: ClientHandle) -> Option<Arc<Surface>> {
        self.state.lock().borrow().surfaces.get(handle)
    }

    pub fn remove_surface(&self, handle: ClientHandle) -> Option<Arc<Surface>> {
        self.state.lock().borrow_mut().surfaces.remove(handle)
    }

    pub fn add_context(&self, context: &Arc<Context>) -> bool {
        self.state.lock().borrow_mut().contexts.insert(context)
    }

    pub fn context(&self, handle: HostHandle) -> Option<Arc<Context>> {
        self.state.lock().borrow().contexts.get(handle)
    }

    pub fn remove_context(&self, handle: HostHandle) -> Option<Arc<Context>> {
        self.state.lock().borrow_mut().contexts.remove(handle)
    }

    pub fn add_image(&self, image: &Arc<Image>) -> bool {
        self.state.lock().borrow_mut().images.insert(image)
    }

    pub fn image(&self, handle: ClientHandle) -> Option<Arc<Image>> {
        self.state.lock().borrow().images.get(handle)
    }

    pub fn remove_image(&self, handle: ClientHandle) -> Option<Arc<Image>> {
        self.state.lock().borrow_mut().images.remove(handle)
    }

    pub fn add_fence(&self, fence: &Arc<Fence>) -> bool {
        self.state.lock().borrow_mut().fences.insert(fence)
    }

    pub fn fence(&self, seq: u32) -> Option<Arc<Fence>> {
        self.state.lock().borrow().fences.get(seq)
    }

    pub fn remove_fence(&self, seq: u32) -> Option<Arc<Fence>> {
        self.state.lock().borrow_mut().fences.remove(seq)
    }

    /// Number of registered (surfaces, contexts, images, fences).
    pub fn resource_counts(&self) -> (usize, usize, usize, usize) {
        let guard = self.state.lock();
        let state = guard.borrow();
        (
            state.surfaces.len(),
            state.contexts.len(),
            state.images.len(),
            state.fences.len(),
        )
    }
}

impl Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Display")
            .field("display_id", &self.display_id)
            .field("host_display", &self.host_display)
            .finish()
    }
}

fn build_extensions(caps: &DisplayCaps) -> String {
    let mut extensions = String::from(BASE_EXTENSIONS);
    if caps.pixmaps {
        extensions.push_str(PIXMAPS_EXTENSIONS);
    }
    if caps.wl_bind {
        extensions.push_str(WL_BIND_WAYLAND_DISPLAY_EXTENSIONS);
    }
    if caps.buffer_age {
        extensions.push_str(BUFFER_AGE_EXTENSIONS);
    }
    if caps.fence {
        extensions.push_str(FENCE_EXTENSIONS);
    }
    extensions.push_str(GL_TEXTURE_EXTENSIONS);
    extensions.push_str(TIZEN_EXTENSIONS);
    extensions
}

#[derive(Default)]
struct TableState {
    displays: Vec<Arc<Display>>,
    fence_display: Option<Arc<Display>>,
}

/// All displays of the process, at most one per native display id.
#[derive(Default)]
pub struct DisplayTable {
    state: ReentrantLock<TableState>,
}

impl DisplayTable {
    pub fn new() -> DisplayTable {
        DisplayTable::default()
    }

    /// Returns the display for `display_id`, calling `create` if there is none yet.
    ///
    /// `create` runs with the table locked, so two threads never create the same display. The
    /// first display ever added becomes the fence display.
    pub fn add<F>(&self, display_id: u64, create: F) -> EglResult<Arc<Display>>
    where
        F: FnOnce() -> EglResult<Arc<Display>>,
    {
        let guard = self.state.lock();
        if let Some(display) = find(&guard.borrow().displays, |d| d.display_id == display_id) {
            return Ok(display);
        }

        let display = create()?;
        let mut state = guard.borrow_mut();
        state.displays.push(display.clone());
        if state.fence_display.is_none() {
            state.fence_display = Some(display.clone());
        }
        debug!("added display {:?}", display);
        Ok(display)
    }

    /// Looks a display up by its host handle.
    pub fn get(&self, host_handle: HostHandle) -> Option<Arc<Display>> {
        find(&self.state.lock().borrow().displays, |d| {
            d.host_display == host_handle
        })
    }

    pub fn get_by_id(&self, display_id: u64) -> Option<Arc<Display>> {
        find(&self.state.lock().borrow().displays, |d| {
            d.display_id == display_id
        })
    }

    /// The display fences are created on when the caller has none at hand.
    pub fn fence_display(&self) -> Option<Arc<Display>> {
        self.state.lock().borrow().fence_display.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().borrow().displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the table without running any destructor. Used in a forked child, where the
    /// displays belong to the parent's connections.
    pub fn forget_all(&self) {
        let guard = self.state.lock();
        let state = mem::take(&mut *guard.borrow_mut());
        mem::forget(state);
    }
}

fn find<P>(displays: &[Arc<Display>], predicate: P) -> Option<Arc<Display>>
where
    P: Fn(&Display) -> bool,
{
    displays.iter().find(|d| predicate(d)).cloned()
}
