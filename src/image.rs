// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::Weak;

use crate::client::ClientImage;
use crate::display::Display;
use crate::resource::ClientHandle;
use crate::resource::Registered;
use crate::runtime::Runtime;

/// Refreshes an image's client pixels from wherever the backend keeps them.
pub trait ImageOps: Send + Sync {
    fn update(&self, rt: &Runtime, client: &dyn ClientImage);
}

/// An `EGLImageKHR`.
pub struct Image {
    handle: ClientHandle,
    display: Weak<Display>,
    client: Arc<dyn ClientImage>,
    ops: Box<dyn ImageOps>,
}

impl Image {
    pub fn new(
        handle: ClientHandle,
        display: &Arc<Display>,
        client: Arc<dyn ClientImage>,
        ops: Box<dyn ImageOps>,
    ) -> Arc<Image> {
        Arc::new(Image {
            handle,
            display: Arc::downgrade(display),
            client,
            ops,
        })
    }

    /// The handle the application sees, derived from the buffer the image was created from.
    pub fn handle(&self) -> ClientHandle {
        self.handle
    }

    pub fn display(&self) -> Option<Arc<Display>> {
        self.display.upgrade()
    }

    pub fn client_image(&self) -> &Arc<dyn ClientImage> {
        &self.client
    }

    /// Brings the client image up to date. Consumers call this before each use.
    pub fn update(&self, rt: &Runtime) {
        self.ops.update(rt, self.client.as_ref());
    }
}

impl Registered for Image {
    type Key = ClientHandle;

    fn registry_key(&self) -> ClientHandle {
        self.handle
    }
}

impl Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Image").field("handle", &self.handle).finish()
    }
}
