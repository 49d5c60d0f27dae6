// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The rendering backend interface.
//!
//! Exactly one backend is active per runtime. It decides how surface pixels and images travel
//! between guest and host.

use std::sync::Arc;

use crate::client::ClientInterface;
use crate::context::Context;
use crate::display::Display;
use crate::error::EglError;
use crate::error::EglResult;
use crate::fence::Fence;
use crate::image::Image;
use crate::native::NativeDisplay;
use crate::native::NativeDrawable;
use crate::resource::HostHandle;
use crate::runtime::Runtime;
use crate::surface::Surface;

pub trait Backend: Send + Sync {
    /// Wraps a display the host knows as `host_display`.
    fn create_display(
        &self,
        native: &dyn NativeDisplay,
        host_display: HostHandle,
    ) -> Arc<Display> {
        let mut caps = native.caps();
        caps.fence = self.fence_supported();
        Display::new(native.id(), host_display, caps)
    }

    fn create_window_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        window: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> EglResult<Arc<Surface>>;

    fn create_pixmap_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        pixmap: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> EglResult<Arc<Surface>>;

    fn create_pbuffer_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        attribs: &[i32],
    ) -> EglResult<Arc<Surface>>;

    fn create_image_pixmap(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        pixmap: Box<dyn NativeDrawable>,
        iface: &dyn ClientInterface,
    ) -> EglResult<Arc<Image>>;

    fn create_image_wl_buffer(
        &self,
        _rt: &Runtime,
        _display: &Arc<Display>,
        _buffer: u64,
        _iface: &dyn ClientInterface,
    ) -> EglResult<Arc<Image>> {
        Err(EglError::BadParameter)
    }

    fn create_image_gl_texture_2d(
        &self,
        _rt: &Runtime,
        _display: &Arc<Display>,
        _context: &Arc<Context>,
        _texture: u32,
        _iface: &dyn ClientInterface,
    ) -> EglResult<Arc<Image>> {
        Err(EglError::BadParameter)
    }

    /// Creates a fence that is signaled once everything committed before it has executed.
    ///
    /// Called from inside the transport while it is committing, so implementations must not
    /// issue host calls.
    fn create_fence(&self, _display: &Arc<Display>) -> Option<Arc<Fence>> {
        None
    }

    /// Whether `create_fence` produces fences.
    fn fence_supported(&self) -> bool {
        false
    }

    /// Value reported for `EGL_Y_INVERTED_NOK`.
    fn y_inverted(&self) -> bool;
}
