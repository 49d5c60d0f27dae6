// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::io;

use enumn::N;
use remain::sorted;
use thiserror::Error as ThisError;

#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("bad host OpenGL version reported by kernel: {0}")]
    BadGlVersion(u32),
    #[error("bad render type reported by kernel: {0}")]
    BadRenderType(u32),
    #[error("bad user index: {0}")]
    BadUserIndex(u32),
    #[error("{0} ioctl failed: {1}")]
    Ioctl(&'static str, io::Error),
    #[error("unable to map {0}: {1}")]
    Map(&'static str, io::Error),
    #[error("unable to open {0}: {1}")]
    OpenDevice(String, io::Error),
    #[error("version mismatch: version is {found}, but {expected} is expected")]
    VersionMismatch { expected: u32, found: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// EGL error codes, as reported through `eglGetError`.
#[derive(ThisError, Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(i32)]
pub enum EglError {
    #[error("EGL_SUCCESS")]
    Success = 0x3000,
    #[error("EGL_NOT_INITIALIZED")]
    NotInitialized = 0x3001,
    #[error("EGL_BAD_ACCESS")]
    BadAccess = 0x3002,
    #[error("EGL_BAD_ALLOC")]
    BadAlloc = 0x3003,
    #[error("EGL_BAD_ATTRIBUTE")]
    BadAttribute = 0x3004,
    #[error("EGL_BAD_CONFIG")]
    BadConfig = 0x3005,
    #[error("EGL_BAD_CONTEXT")]
    BadContext = 0x3006,
    #[error("EGL_BAD_CURRENT_SURFACE")]
    BadCurrentSurface = 0x3007,
    #[error("EGL_BAD_DISPLAY")]
    BadDisplay = 0x3008,
    #[error("EGL_BAD_MATCH")]
    BadMatch = 0x3009,
    #[error("EGL_BAD_NATIVE_PIXMAP")]
    BadNativePixmap = 0x300A,
    #[error("EGL_BAD_NATIVE_WINDOW")]
    BadNativeWindow = 0x300B,
    #[error("EGL_BAD_PARAMETER")]
    BadParameter = 0x300C,
    #[error("EGL_BAD_SURFACE")]
    BadSurface = 0x300D,
    #[error("EGL_CONTEXT_LOST")]
    ContextLost = 0x300E,
}

impl EglError {
    /// Maps an error code written by the host into an `EglError`.
    ///
    /// The host is only asked for a code when a call failed, so a missing or unknown code is
    /// reported as `BadAlloc`.
    pub fn from_host(code: i32) -> EglError {
        match EglError::n(code) {
            Some(EglError::Success) | None => EglError::BadAlloc,
            Some(err) => err,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

pub type EglResult<T> = std::result::Result<T, EglError>;
