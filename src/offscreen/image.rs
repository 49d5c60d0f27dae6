// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::Arc;

use log::error;

use crate::client::ClientImage;
use crate::client::ClientInterface;
use crate::display::Display;
use crate::error::EglResult;
use crate::host_egl;
use crate::image::Image;
use crate::image::ImageOps;
use crate::native::NativeDrawable;
use crate::runtime::Runtime;

/// Copies the pixmap contents into the client image on every update.
struct PixmapImage {
    pixmap: Box<dyn NativeDrawable>,
    width: u32,
    height: u32,
}

impl ImageOps for PixmapImage {
    fn update(&self, _rt: &Runtime, client: &dyn ClientImage) {
        match self.pixmap.read_pixels(self.width, self.height) {
            Some(pixels) => client.update(
                pixels.width(),
                pixels.height(),
                pixels.bpp(),
                pixels.pixels(),
            ),
            None => error!("failed to read pixmap {:#x}", self.pixmap.id()),
        }
    }
}

/// Creates an image of `pixmap`, known to the application by the pixmap id.
pub fn create_pixmap_image(
    rt: &Runtime,
    display: &Arc<Display>,
    pixmap: Box<dyn NativeDrawable>,
    iface: &dyn ClientInterface,
) -> EglResult<Arc<Image>> {
    let tex_global_name = rt.global_name();
    rt.with_transport(|t| host_egl::create_image(t, tex_global_name, display.host_handle(), 0))?;
    let client = iface.create_image(tex_global_name);

    let (width, height, _) = pixmap.geometry();
    let handle = pixmap.id();
    let ops = PixmapImage {
        pixmap,
        width,
        height,
    };
    Ok(Image::new(handle, display, client, Box::new(ops)))
}
