// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Offscreen surfaces.
//!
//! The host renders into a guest buffer, the backing image, pinned for as long as the host may
//! touch it. Swaps and copies wait for the host, then present the buffer to the native
//! drawable.

use std::sync::Arc;

use log::debug;
use log::error;
use sync::Mutex;

use crate::client::ClientImage;
use crate::client::ClientInterface;
use crate::display::Display;
use crate::egl::attrib_pairs;
use crate::egl::defs::EGL_HEIGHT;
use crate::egl::defs::EGL_WIDTH;
use crate::error::EglError;
use crate::error::EglResult;
use crate::fatal;
use crate::host_egl;
use crate::host_egl::EglFunc;
use crate::host_egl::OffscreenBuffer;
use crate::native::NativeDrawable;
use crate::native::NativeImage;
use crate::resource::HostHandle;
use crate::runtime::MemoryPin;
use crate::runtime::Runtime;
use crate::surface::Mapping;
use crate::surface::Surface;
use crate::surface::SurfaceKind;
use crate::surface::SurfaceOps;
use crate::surface::SurfaceType;

const PBUFFER_DEPTH: u32 = 24;

/// A native image pinned in guest memory.
struct BackingImage {
    image: NativeImage,
    pinner: Arc<dyn MemoryPin>,
}

impl BackingImage {
    fn new(rt: &Runtime, width: u32, height: u32, depth: u32) -> EglResult<BackingImage> {
        let image = NativeImage::new(width, height, depth).ok_or(EglError::BadAlloc)?;
        let pinner = rt.pinner();
        if !image.pixels().is_empty() {
            if let Err(e) = pinner.lock(image.pixels()) {
                fatal!("Unable to lock backing image memory: {}", e);
            }
        }
        Ok(BackingImage { image, pinner })
    }

    /// Describes the pixels to the host, which writes into them.
    fn buffer(&mut self) -> OffscreenBuffer {
        OffscreenBuffer {
            width: self.image.width(),
            height: self.image.height(),
            bpp: self.image.bpp(),
            pixels: self.image.pixels_mut().as_mut_ptr() as u64,
        }
    }
}

impl Drop for BackingImage {
    fn drop(&mut self) {
        if self.image.pixels().is_empty() {
            return;
        }
        if let Err(e) = self.pinner.unlock(self.image.pixels()) {
            error!("Unable to unlock backing image memory: {}", e);
        }
    }
}

struct OffscreenSurface {
    backing: Mutex<BackingImage>,
}

impl OffscreenSurface {
    /// Follows the window's geometry. Other surfaces never change size.
    fn resize(&self, rt: &Runtime, surface: &Surface) -> EglResult<()> {
        if surface.surface_type() != SurfaceType::Window {
            return Ok(());
        }
        let Some(window) = surface.native() else {
            return Ok(());
        };
        let (width, height, depth) = window.geometry();

        let mut backing = self.backing.lock();
        let old = &backing.image;
        if old.matches(width, height, depth) {
            return Ok(());
        }
        debug!(
            "surface {} resizing from {}x{}x{} to {}x{}x{}",
            surface.host_handle(),
            old.width(),
            old.height(),
            old.depth(),
            width,
            height,
            depth
        );

        let mut resized = BackingImage::new(rt, width, height, depth)?;
        let buffer = resized.buffer();
        rt.with_transport(|t| {
            host_egl::resize_offscreen_surface(
                t,
                surface.host_display(),
                surface.host_handle(),
                buffer,
            )
        })?;
        // The host accepted the new buffer, so it no longer reads the old one.
        *backing = resized;
        Ok(())
    }
}

impl SurfaceOps for OffscreenSurface {
    fn swap_buffers(&self, rt: &Runtime, surface: &Surface) -> EglResult<()> {
        self.resize(rt, surface)?;

        rt.with_transport(|t| {
            host_egl::swap_buffers(t, surface.host_display(), surface.host_handle());
            t.wait();
        });

        if let Some(native) = surface.native() {
            native.present(&self.backing.lock().image);
        }
        Ok(())
    }

    fn copy_buffers(
        &self,
        rt: &Runtime,
        surface: &Surface,
        target: &dyn NativeDrawable,
    ) -> EglResult<()> {
        let backing = self.backing.lock();
        if surface.surface_type() == SurfaceType::Window {
            if let Some(window) = surface.native() {
                let (width, height, depth) = window.geometry();
                // A window that changed size must be swapped before it can be copied.
                if !backing.image.matches(width, height, depth) {
                    return Err(EglError::BadMatch);
                }
            }
        }

        rt.with_transport(|t| {
            host_egl::copy_buffers(t, surface.host_display(), surface.host_handle());
            t.wait();
        });

        target.present(&backing.image);
        Ok(())
    }

    fn map(&self, _rt: &Runtime, _surface: &Surface) -> Option<Mapping> {
        let mut backing = self.backing.lock();
        Some(Mapping {
            addr: backing.image.pixels_mut().as_mut_ptr() as usize,
            stride: backing.image.stride(),
        })
    }

    fn unmap(&self, _rt: &Runtime, surface: &Surface) {
        match surface.surface_type() {
            SurfaceType::Pbuffer => {}
            SurfaceType::Window | SurfaceType::Pixmap => {
                if let Some(native) = surface.native() {
                    native.present(&self.backing.lock().image);
                }
            }
        }
    }

    fn create_image(
        &self,
        rt: &Runtime,
        surface: &Surface,
        iface: &dyn ClientInterface,
    ) -> EglResult<Arc<dyn ClientImage>> {
        let tex_global_name = rt.global_name();
        rt.with_transport(|t| {
            host_egl::create_image(t, tex_global_name, surface.host_display(), 0)
        })?;
        Ok(iface.create_image(tex_global_name))
    }
}

fn create(
    rt: &Runtime,
    display: &Arc<Display>,
    config: HostHandle,
    func: EglFunc,
    (width, height, depth): (u32, u32, u32),
    kind: SurfaceKind,
    attribs: &[i32],
) -> EglResult<Arc<Surface>> {
    let mut backing = BackingImage::new(rt, width, height, depth)?;
    let buffer = backing.buffer();
    let host_surface = rt.with_transport(|t| {
        host_egl::create_surface_offscreen(t, func, display.host_handle(), config, buffer, attribs)
    })?;
    let ops = OffscreenSurface {
        backing: Mutex::new(backing),
    };
    Ok(Surface::new(host_surface, display, kind, Box::new(ops)))
}

pub fn create_window(
    rt: &Runtime,
    display: &Arc<Display>,
    config: HostHandle,
    window: Box<dyn NativeDrawable>,
    attribs: &[i32],
) -> EglResult<Arc<Surface>> {
    let geometry = window.geometry();
    create(
        rt,
        display,
        config,
        EglFunc::CreateWindowSurfaceOffscreen,
        geometry,
        SurfaceKind::Window(window),
        attribs,
    )
}

pub fn create_pixmap(
    rt: &Runtime,
    display: &Arc<Display>,
    config: HostHandle,
    pixmap: Box<dyn NativeDrawable>,
    attribs: &[i32],
) -> EglResult<Arc<Surface>> {
    let geometry = pixmap.geometry();
    create(
        rt,
        display,
        config,
        EglFunc::CreatePixmapSurfaceOffscreen,
        geometry,
        SurfaceKind::Pixmap(pixmap),
        attribs,
    )
}

pub fn create_pbuffer(
    rt: &Runtime,
    display: &Arc<Display>,
    config: HostHandle,
    attribs: &[i32],
) -> EglResult<Arc<Surface>> {
    let (width, height) = pbuffer_size(attribs);
    create(
        rt,
        display,
        config,
        EglFunc::CreatePbufferSurfaceOffscreen,
        (width, height, PBUFFER_DEPTH),
        SurfaceKind::Pbuffer,
        attribs,
    )
}

/// Reads `EGL_WIDTH` and `EGL_HEIGHT` from a pbuffer attribute list. Both default to 0.
fn pbuffer_size(attribs: &[i32]) -> (u32, u32) {
    let (mut width, mut height) = (0, 0);
    for (name, value) in attrib_pairs(attribs) {
        match name {
            EGL_WIDTH => width = value.max(0) as u32,
            EGL_HEIGHT => height = value.max(0) as u32,
            _ => {}
        }
    }
    (width, height)
}
