// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! EGL surfaces.
//!
//! A `Surface` holds what every surface has in common: its handles, the native drawable of window
//! and pixmap surfaces, the `EGL_KHR_lock_surface` state, the texture binding of pbuffers, and
//! the current flag. Everything that depends on how pixels reach the host is behind
//! `SurfaceOps`, supplied by the backend.

use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::Weak;

use log::warn;
use sync::Mutex;

use crate::client::ClientImage;
use crate::client::ClientInterface;
use crate::display::Display;
use crate::error::EglResult;
use crate::native::NativeDrawable;
use crate::resource::ptr_eq_weak;
use crate::resource::ClientHandle;
use crate::resource::HostHandle;
use crate::resource::Registered;
use crate::runtime::Runtime;

pub const READ_SURFACE_BIT: i32 = 0x0001;
pub const WRITE_SURFACE_BIT: i32 = 0x0002;

/// The surface type, valued as the matching `EGL_*_BIT`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum SurfaceType {
    Pbuffer = 0x1,
    Pixmap = 0x2,
    Window = 0x4,
}

/// What a surface is created from.
pub enum SurfaceKind {
    Window(Box<dyn NativeDrawable>),
    Pixmap(Box<dyn NativeDrawable>),
    Pbuffer,
}

/// Pixels of a locked surface exposed to the application.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mapping {
    pub addr: usize,
    pub stride: u32,
}

/// Backend-specific surface operations.
///
/// These are called with the surface's state lock held and must not call back into the
/// `Surface` methods that take it (`lock`, `unlock`, `map`, `invalidate`, `mark_current`, and the
/// texture binding methods).
pub trait SurfaceOps: Send + Sync {
    /// Drops cached host state after the drawable may have changed.
    fn invalidate(&self, _rt: &Runtime, _surface: &Surface) {}

    fn swap_buffers(&self, rt: &Runtime, surface: &Surface) -> EglResult<()>;

    /// Copies the color buffer into `target`.
    fn copy_buffers(
        &self,
        rt: &Runtime,
        surface: &Surface,
        target: &dyn NativeDrawable,
    ) -> EglResult<()>;

    /// Waits for native rendering before GL rendering continues.
    fn wait_x(&self, _rt: &Runtime, _surface: &Surface) {}

    /// Waits for GL rendering before native rendering continues.
    fn wait_gl(&self, _rt: &Runtime, _surface: &Surface) {}

    fn map(&self, rt: &Runtime, surface: &Surface) -> Option<Mapping>;

    fn unmap(&self, rt: &Runtime, surface: &Surface);

    fn set_swap_interval(&self, _rt: &Runtime, _surface: &Surface, _interval: i32) {}

    /// Creates a client image sharing the surface's color buffer, for `eglBindTexImage`.
    fn create_image(
        &self,
        rt: &Runtime,
        surface: &Surface,
        iface: &dyn ClientInterface,
    ) -> EglResult<Arc<dyn ClientImage>>;
}

struct TexBinding {
    iface: Arc<dyn ClientInterface>,
    cookie: u64,
}

#[derive(Default)]
struct SurfaceState {
    /// 0 when unlocked, otherwise a combination of `READ_SURFACE_BIT` and `WRITE_SURFACE_BIT`.
    lock_hint: i32,
    /// Only set while locked.
    mapping: Option<Mapping>,
    binding: Option<TexBinding>,
    current: bool,
}

pub struct Surface {
    host_handle: HostHandle,
    host_display: HostHandle,
    display: Weak<Display>,
    ty: SurfaceType,
    native: Option<Box<dyn NativeDrawable>>,
    state: Mutex<SurfaceState>,
    ops: Box<dyn SurfaceOps>,
}

impl Surface {
    pub fn new(
        host_handle: HostHandle,
        display: &Arc<Display>,
        kind: SurfaceKind,
        ops: Box<dyn SurfaceOps>,
    ) -> Arc<Surface> {
        let (ty, native) = match kind {
            SurfaceKind::Window(window) => (SurfaceType::Window, Some(window)),
            SurfaceKind::Pixmap(pixmap) => (SurfaceType::Pixmap, Some(pixmap)),
            SurfaceKind::Pbuffer => (SurfaceType::Pbuffer, None),
        };
        Arc::new(Surface {
            host_handle,
            host_display: display.host_handle(),
            display: Arc::downgrade(display),
            ty,
            native,
            state: Mutex::new(SurfaceState::default()),
            ops,
        })
    }

    /// The `EGLSurface` the application sees.
    ///
    /// Window and pixmap surfaces are known by their native drawable id, so that every lookup for
    /// the same drawable resolves to the same surface. Pbuffers use the host handle.
    pub fn handle(&self) -> ClientHandle {
        match &self.native {
            Some(native) => native.id(),
            None => self.host_handle as ClientHandle,
        }
    }

    pub fn host_handle(&self) -> HostHandle {
        self.host_handle
    }

    pub fn host_display(&self) -> HostHandle {
        self.host_display
    }

    pub fn display(&self) -> Option<Arc<Display>> {
        self.display.upgrade()
    }

    pub fn belongs_to(&self, display: &Arc<Display>) -> bool {
        ptr_eq_weak(&self.display, display)
    }

    pub fn surface_type(&self) -> SurfaceType {
        self.ty
    }

    /// The window or pixmap, `None` for pbuffers.
    pub fn native(&self) -> Option<&dyn NativeDrawable> {
        self.native.as_deref()
    }

    pub fn mark_current(&self, current: bool) -> bool {
        let mut state = self.state.lock();
        if state.current == current {
            return false;
        }
        state.current = current;
        true
    }

    pub fn is_current(&self) -> bool {
        self.state.lock().current
    }

    /// Invalidates the surface unless it is locked.
    pub fn invalidate(&self, rt: &Runtime) {
        let state = self.state.lock();
        if state.lock_hint == 0 {
            self.ops.invalidate(rt, self);
        }
    }

    /// Locks the surface for CPU access. A hint without read or write bits means both. Returns
    /// false if the surface is already locked.
    pub fn lock(&self, hint: i32) -> bool {
        let mut state = self.state.lock();
        if state.lock_hint != 0 {
            return false;
        }
        state.lock_hint = hint & (READ_SURFACE_BIT | WRITE_SURFACE_BIT);
        if state.lock_hint == 0 {
            state.lock_hint = READ_SURFACE_BIT | WRITE_SURFACE_BIT;
        }
        true
    }

    pub fn locked(&self) -> bool {
        self.state.lock().lock_hint != 0
    }

    pub fn lock_hint(&self) -> i32 {
        self.state.lock().lock_hint
    }

    /// Unlocks the surface, unmapping it first if it was mapped. Returns false if it was not
    /// locked.
    pub fn unlock(&self, rt: &Runtime) -> bool {
        let mut state = self.state.lock();
        if state.lock_hint == 0 {
            return false;
        }
        if state.mapping.take().is_some() {
            self.ops.unmap(rt, self);
        }
        state.lock_hint = 0;
        true
    }

    /// Maps a locked surface. Returns `None` if it is not locked or cannot be mapped.
    pub fn map(&self, rt: &Runtime) -> Option<Mapping> {
        let mut state = self.state.lock();
        if state.lock_hint == 0 {
            return None;
        }
        if state.mapping.is_none() {
            state.mapping = self.ops.map(rt, self);
        }
        state.mapping
    }

    pub fn swap_buffers(&self, rt: &Runtime) -> EglResult<()> {
        self.ops.swap_buffers(rt, self)
    }

    pub fn copy_buffers(&self, rt: &Runtime, target: &dyn NativeDrawable) -> EglResult<()> {
        self.ops.copy_buffers(rt, self, target)
    }

    pub fn wait_x(&self, rt: &Runtime) {
        self.ops.wait_x(rt, self)
    }

    pub fn wait_gl(&self, rt: &Runtime) {
        self.ops.wait_gl(rt, self)
    }

    pub fn set_swap_interval(&self, rt: &Runtime, interval: i32) {
        self.ops.set_swap_interval(rt, self, interval)
    }

    pub fn create_image(
        &self,
        rt: &Runtime,
        iface: &dyn ClientInterface,
    ) -> EglResult<Arc<dyn ClientImage>> {
        self.ops.create_image(rt, self, iface)
    }

    /// Records a texture binding made through `iface`. Returns false if the surface is already
    /// bound, in which case the caller still owns `cookie`.
    pub fn bind_tex_image(&self, iface: Arc<dyn ClientInterface>, cookie: u64) -> bool {
        let mut state = self.state.lock();
        if state.binding.is_some() {
            return false;
        }
        state.binding = Some(TexBinding { iface, cookie });
        true
    }

    pub fn is_tex_bound(&self) -> bool {
        self.state.lock().binding.is_some()
    }

    /// Releases the texture binding through the client interface that made it.
    pub fn release_tex_image(&self) {
        let binding = self.state.lock().binding.take();
        // The client may call back into `unbind_tex_image`, so the state lock is not held here.
        if let Some(binding) = binding {
            binding.iface.release_tex_image(binding.cookie);
        }
    }

    /// Forgets the texture binding without telling the client.
    pub fn unbind_tex_image(&self) {
        self.state.lock().binding = None;
    }
}

impl Registered for Surface {
    type Key = ClientHandle;

    fn registry_key(&self) -> ClientHandle {
        self.handle()
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.lock_hint != 0 {
            warn!("surface {} destroyed while locked", self.host_handle);
        }
        if let Some(binding) = state.binding.take() {
            binding.iface.release_tex_image(binding.cookie);
        }
    }
}

impl Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Surface")
            .field("handle", &self.handle())
            .field("host_handle", &self.host_handle)
            .field("type", &self.ty)
            .finish()
    }
}
