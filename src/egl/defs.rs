// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! EGL enumerants used by the runtime.

#![allow(dead_code)]

pub const EGL_FALSE: u32 = 0;
pub const EGL_TRUE: u32 = 1;

pub const EGL_NO_DISPLAY: u32 = 0;
pub const EGL_NO_CONTEXT: u32 = 0;
pub const EGL_NO_SURFACE: u64 = 0;
pub const EGL_NO_IMAGE_KHR: u64 = 0;
pub const EGL_NO_SYNC_KHR: u32 = 0;

pub const EGL_NATIVE_VISUAL_ID: i32 = 0x302E;
pub const EGL_NATIVE_VISUAL_TYPE: i32 = 0x302F;
pub const EGL_NONE: i32 = 0x3038;
pub const EGL_VENDOR: i32 = 0x3053;
pub const EGL_VERSION: i32 = 0x3054;
pub const EGL_EXTENSIONS: i32 = 0x3055;
pub const EGL_HEIGHT: i32 = 0x3056;
pub const EGL_WIDTH: i32 = 0x3057;
pub const EGL_DRAW: i32 = 0x3059;
pub const EGL_READ: i32 = 0x305A;
pub const EGL_Y_INVERTED_NOK: i32 = 0x307F;
pub const EGL_BACK_BUFFER: i32 = 0x3084;
pub const EGL_CLIENT_APIS: i32 = 0x308D;
pub const EGL_CONTEXT_CLIENT_TYPE: i32 = 0x3097;
pub const EGL_CONTEXT_CLIENT_VERSION: i32 = 0x3098;
pub const EGL_OPENGL_ES_API: u32 = 0x30A0;

pub const EGL_NATIVE_PIXMAP_KHR: u32 = 0x30B0;
pub const EGL_GL_TEXTURE_2D_KHR: u32 = 0x30B1;
pub const EGL_IMAGE_PRESERVED_KHR: i32 = 0x30D2;
pub const EGL_WAYLAND_BUFFER_WL: u32 = 0x31D5;
pub const EGL_WAYLAND_PLANE_WL: i32 = 0x31D6;

pub const EGL_READ_SURFACE_BIT_KHR: i32 = 0x0001;
pub const EGL_WRITE_SURFACE_BIT_KHR: i32 = 0x0002;
pub const EGL_MAP_PRESERVE_PIXELS_KHR: i32 = 0x30C4;
pub const EGL_LOCK_USAGE_HINT_KHR: i32 = 0x30C5;
pub const EGL_BITMAP_POINTER_KHR: i32 = 0x30C6;
pub const EGL_BITMAP_PITCH_KHR: i32 = 0x30C7;
pub const EGL_BITMAP_ORIGIN_KHR: i32 = 0x30C8;
pub const EGL_BITMAP_PIXEL_RED_OFFSET_KHR: i32 = 0x30C9;
pub const EGL_BITMAP_PIXEL_GREEN_OFFSET_KHR: i32 = 0x30CA;
pub const EGL_BITMAP_PIXEL_BLUE_OFFSET_KHR: i32 = 0x30CB;
pub const EGL_BITMAP_PIXEL_ALPHA_OFFSET_KHR: i32 = 0x30CC;
pub const EGL_BITMAP_PIXEL_LUMINANCE_OFFSET_KHR: i32 = 0x30CD;
pub const EGL_LOWER_LEFT_KHR: i32 = 0x30CE;
pub const EGL_UPPER_LEFT_KHR: i32 = 0x30CF;

pub const EGL_BUFFER_AGE_EXT: i32 = 0x313D;

pub const EGL_SYNC_PRIOR_COMMANDS_COMPLETE_KHR: i32 = 0x30F0;
pub const EGL_SYNC_STATUS_KHR: i32 = 0x30F1;
pub const EGL_SIGNALED_KHR: i32 = 0x30F2;
pub const EGL_UNSIGNALED_KHR: i32 = 0x30F3;
pub const EGL_TIMEOUT_EXPIRED_KHR: i32 = 0x30F5;
pub const EGL_CONDITION_SATISFIED_KHR: i32 = 0x30F6;
pub const EGL_SYNC_TYPE_KHR: i32 = 0x30F7;
pub const EGL_SYNC_CONDITION_KHR: i32 = 0x30F8;
pub const EGL_SYNC_FENCE_KHR: u32 = 0x30F9;
pub const EGL_FOREVER_KHR: u64 = u64::MAX;
