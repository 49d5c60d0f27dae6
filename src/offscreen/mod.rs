// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The backend used when the host renders offscreen.
//!
//! Every surface is a guest pixel buffer the host renders into, and the guest copies finished
//! frames to the native drawable itself. There are no host fences.

mod image;
mod surface;

use std::sync::Arc;

use crate::backend::Backend;
use crate::client::ClientInterface;
use crate::display::Display;
use crate::error::EglResult;
use crate::image::Image;
use crate::native::NativeDrawable;
use crate::resource::HostHandle;
use crate::runtime::Runtime;
use crate::surface::Surface;

pub struct OffscreenBackend;

impl Backend for OffscreenBackend {
    fn create_window_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        window: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> EglResult<Arc<Surface>> {
        surface::create_window(rt, display, config, window, attribs)
    }

    fn create_pixmap_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        pixmap: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> EglResult<Arc<Surface>> {
        surface::create_pixmap(rt, display, config, pixmap, attribs)
    }

    fn create_pbuffer_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        attribs: &[i32],
    ) -> EglResult<Arc<Surface>> {
        surface::create_pbuffer(rt, display, config, attribs)
    }

    fn create_image_pixmap(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        pixmap: Box<dyn NativeDrawable>,
        iface: &dyn ClientInterface,
    ) -> EglResult<Arc<Image>> {
        image::create_pixmap_image(rt, display, pixmap, iface)
    }

    fn y_inverted(&self) -> bool {
        true
    }
}
