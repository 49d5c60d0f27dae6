// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The native windowing system as seen by the runtime.
//!
//! Wrapping X11, Wayland or DRM objects is left to the platform glue. It hands the runtime
//! implementations of these traits.

/// What the native platform behind a display supports.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayCaps {
    pub pixmaps: bool,
    pub wl_bind: bool,
    pub buffer_age: bool,
    /// Filled in from the backend, not the platform.
    pub fence: bool,
    /// Native visual id and visual type, when the platform has visuals.
    pub visual: Option<(i32, i32)>,
}

pub trait NativeDisplay {
    /// The native display id, unique per platform display connection.
    fn id(&self) -> u64;

    fn caps(&self) -> DisplayCaps;
}

/// A window or pixmap.
pub trait NativeDrawable: Send + Sync {
    /// The native object id. Window and pixmap surfaces are known to the application by it.
    fn id(&self) -> u64;

    /// Returns (width, height, depth).
    fn geometry(&self) -> (u32, u32, u32);

    /// Draws `image` into the drawable.
    fn present(&self, image: &NativeImage);

    /// Reads back the top-left `width` x `height` pixels.
    fn read_pixels(&self, width: u32, height: u32) -> Option<NativeImage>;

    fn buffer_age(&self) -> i32 {
        0
    }

    fn set_swap_interval(&self, _interval: i32) {}

    /// Waits for native rendering to the drawable to finish.
    fn wait(&self) {}
}

/// A CPU-side pixel buffer.
pub struct NativeImage {
    width: u32,
    height: u32,
    depth: u32,
    bpp: u32,
    pixels: Box<[u8]>,
}

impl NativeImage {
    /// Allocates a zeroed image. Returns `None` for depths without a pixel format.
    pub fn new(width: u32, height: u32, depth: u32) -> Option<NativeImage> {
        let bpp = match depth {
            24 | 32 => 4,
            15 | 16 => 2,
            8 => 1,
            _ => return None,
        };
        let len = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(bpp as usize)?;
        Some(NativeImage {
            width,
            height,
            depth,
            bpp,
            pixels: vec![0u8; len].into_boxed_slice(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Bytes per pixel.
    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    pub fn stride(&self) -> u32 {
        self.width * self.bpp
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn matches(&self, width: u32, height: u32, depth: u32) -> bool {
        self.width == width && self.height == height && self.depth == depth
    }
}
