// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Guest-side EGL runtime for YaGL.
//!
//! GLES and EGL calls are marshaled into a per-thread buffer shared with the host renderer
//! through the YaGL device. The EGL objects live in the guest and refer to their host
//! counterparts by handle.

#[macro_use]
mod macros;

pub mod backend;
pub mod client;
pub mod config;
pub mod context;
pub mod display;
pub mod egl;
pub mod egl_state;
mod error;
pub mod fence;
pub mod host_egl;
pub mod image;
mod names;
pub mod native;
pub mod offscreen;
pub mod resource;
pub mod runtime;
pub mod surface;
pub mod sys;
pub mod transport;

pub use crate::egl::Egl;
pub use crate::error::EglError;
pub use crate::error::EglResult;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::runtime::Runtime;
