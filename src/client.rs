// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interfaces implemented by the GLES layer.
//!
//! The runtime never looks inside client contexts or client images, it only decides how long they
//! live.

use std::sync::Arc;
use std::sync::Weak;

use crate::surface::Surface;

/// Client APIs a context can be created for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ClientApi {
    Gles1 = 2,
    Gles2 = 4,
    Gles3 = 8,
}

impl ClientApi {
    /// The value reported for `EGL_CONTEXT_CLIENT_VERSION`.
    pub fn version(self) -> i32 {
        match self {
            ClientApi::Gles1 => 1,
            ClientApi::Gles2 => 2,
            ClientApi::Gles3 => 3,
        }
    }

    pub fn from_version(version: i32) -> Option<ClientApi> {
        match version {
            1 => Some(ClientApi::Gles1),
            2 => Some(ClientApi::Gles2),
            3 => Some(ClientApi::Gles3),
            _ => None,
        }
    }
}

/// Per-context state of the GLES layer.
pub trait ClientContext: Send + Sync {
    fn api(&self) -> ClientApi;

    /// Called the first time the context becomes current.
    fn prepare(&self);

    /// Binds `image` to the current texture. On success returns a cookie that is handed back to
    /// `ClientInterface::release_tex_image`. The client keeps `binding` and calls
    /// `TexImageBinding::unbind` if it drops the binding on its own.
    fn bind_tex_image(&self, image: &Arc<dyn ClientImage>, binding: TexImageBinding)
        -> Option<u64>;
}

/// Pixel storage the GLES layer can sample from.
pub trait ClientImage: Send + Sync {
    /// Replaces the image contents with `pixels`, `width * height * bpp` bytes.
    fn update(&self, width: u32, height: u32, bpp: u32, pixels: &[u8]);
}

/// Entry point of one GLES library.
pub trait ClientInterface: Send + Sync {
    /// Creates a client context, sharing objects with `share` when given.
    fn create_ctx(&self, api: ClientApi, share: Option<&dyn ClientContext>)
        -> Box<dyn ClientContext>;

    /// Wraps the host texture `tex_global_name` as a client image.
    fn create_image(&self, tex_global_name: u32) -> Arc<dyn ClientImage>;

    fn release_tex_image(&self, cookie: u64);
}

/// The GLES libraries available to the process.
#[derive(Clone, Default)]
pub struct ClientInterfaces {
    pub gles1: Option<Arc<dyn ClientInterface>>,
    pub gles2: Option<Arc<dyn ClientInterface>>,
}

impl ClientInterfaces {
    /// GLES3 contexts are served by the GLES2 library.
    pub fn get(&self, api: ClientApi) -> Option<Arc<dyn ClientInterface>> {
        match api {
            ClientApi::Gles1 => self.gles1.clone(),
            ClientApi::Gles2 | ClientApi::Gles3 => self.gles2.clone(),
        }
    }

    pub fn any(&self) -> Option<Arc<dyn ClientInterface>> {
        self.get(ClientApi::Gles2).or_else(|| self.get(ClientApi::Gles1))
    }
}

/// Ties a texture binding made by the client to the pbuffer it samples from.
pub struct TexImageBinding {
    surface: Weak<Surface>,
}

impl TexImageBinding {
    pub(crate) fn new(surface: &Arc<Surface>) -> TexImageBinding {
        TexImageBinding {
            surface: Arc::downgrade(surface),
        }
    }

    /// Forgets the binding on the surface side. The client has already released it.
    pub fn unbind(&self) {
        if let Some(surface) = self.surface.upgrade() {
            surface.unbind_tex_image();
        }
    }
}
