// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Kernel ABI of the `/dev/yagl` character device.

use std::os::raw::c_uint;
use std::os::raw::c_ulong;

/// Protocol version the device must report.
pub const YAGL_VERSION: u32 = 23;

pub const YAGL_IOC_MAGIC: u8 = b'Y';

pub const YAGL_DEVICE_PATH: &str = "/dev/yagl";

/// Registers of one user slot, in bytes.
pub const YAGL_REGS_SIZE: usize = 8;
#[allow(unused)]
pub const YAGL_REG_BUFFPTR: usize = 0;
pub const YAGL_REG_TRIGGER: usize = 4;

pub const YAGL_RENDER_TYPE_OFFSCREEN: u32 = 1;
pub const YAGL_RENDER_TYPE_ONSCREEN: u32 = 2;

pub const YAGL_GL_2: u32 = 0;
pub const YAGL_GL_3_1: u32 = 1;
pub const YAGL_GL_3_1_ES3: u32 = 2;
pub const YAGL_GL_3_2: u32 = 3;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct yagl_user_info {
    pub index: c_uint,
    pub render_type: c_uint,
    pub gl_version: c_uint,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct yagl_mlock_arg {
    pub address: c_ulong,
    pub size: c_uint,
}

#[cfg(any(target_os = "android", target_os = "linux"))]
mod ioctls {
    use std::os::raw::c_uint;
    use std::os::raw::c_ulong;

    use nix::ioctl_read;
    use nix::ioctl_write_ptr;

    use super::yagl_mlock_arg;
    use super::yagl_user_info;
    use super::YAGL_IOC_MAGIC;

    ioctl_read!(yagl_ioc_get_version, YAGL_IOC_MAGIC, 0, c_uint);
    ioctl_read!(yagl_ioc_get_user_info, YAGL_IOC_MAGIC, 1, yagl_user_info);
    ioctl_write_ptr!(yagl_ioc_mlock, YAGL_IOC_MAGIC, 2, yagl_mlock_arg);
    ioctl_write_ptr!(yagl_ioc_munlock, YAGL_IOC_MAGIC, 3, c_ulong);
}

#[cfg(any(target_os = "android", target_os = "linux"))]
pub use ioctls::*;
