// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Connections through the `/dev/yagl` character device.
//!
//! The device exposes a page of trigger registers at offset 0, one slot per user, and the
//! user's transfer buffer right after it.

use std::ffi::c_void;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::num::NonZeroUsize;
use std::os::raw::c_uint;
use std::os::raw::c_ulong;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::ptr;
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use log::debug;
use log::warn;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use yagl_sys::*;

use crate::error::Error;
use crate::error::Result;
use crate::runtime::Connection;
use crate::runtime::Connector;
use crate::runtime::MemoryPin;
use crate::runtime::UserInfo;
use crate::transport::HostChannel;

/// Safe wrapper for `sysconf(_SC_PAGESIZE)`.
fn pagesize() -> usize {
    // SAFETY: trivially safe
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// A shared mapping of part of the device.
struct DeviceMapping {
    addr: NonNull<c_void>,
    size: usize,
}

impl DeviceMapping {
    fn new(file: &File, size: usize, offset: usize, what: &'static str) -> Result<DeviceMapping> {
        let len = NonZeroUsize::new(size)
            .ok_or_else(|| Error::Map(what, io::Error::from(io::ErrorKind::InvalidInput)))?;
        // SAFETY: the kernel picks the address of a new mapping, no existing memory is touched.
        let addr = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                file,
                offset as libc::off_t,
            )
        }
        .map_err(|e| Error::Map(what, e.into()))?;
        Ok(DeviceMapping { addr, size })
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the mapping is `size` bytes long, readable and writable, and lives as long as
        // `self`.
        unsafe { slice::from_raw_parts_mut(self.addr.as_ptr() as *mut u8, self.size) }
    }
}

impl Drop for DeviceMapping {
    fn drop(&mut self) {
        // SAFETY: the mapping was created by `mmap` with this size and nothing borrows it anymore.
        if let Err(e) = unsafe { munmap(self.addr, self.size) } {
            warn!("failed to unmap {} bytes: {}", self.size, e);
        }
    }
}

/// The transfer buffer and trigger register of one user.
pub struct DeviceChannel {
    file: Arc<File>,
    regs: DeviceMapping,
    index: u32,
    buffer: Option<DeviceMapping>,
}

impl DeviceChannel {
    fn new(file: Arc<File>, index: u32) -> Result<DeviceChannel> {
        let regs = DeviceMapping::new(&file, pagesize(), 0, "regs")?;
        Ok(DeviceChannel {
            file,
            regs,
            index,
            buffer: None,
        })
    }
}

impl HostChannel for DeviceChannel {
    fn resize(&mut self, size: usize) -> Result<()> {
        // The new mapping covers the same device memory, so the old contents carry over.
        let buffer = DeviceMapping::new(&self.file, size, pagesize(), "buffer")?;
        self.buffer = Some(buffer);
        Ok(())
    }

    fn buffer(&mut self) -> &mut [u8] {
        match &mut self.buffer {
            Some(buffer) => buffer.as_mut_slice(),
            None => &mut [],
        }
    }

    fn commit(&mut self, sync: bool) {
        let offset = self.index as usize * YAGL_REGS_SIZE + YAGL_REG_TRIGGER;
        // SAFETY: `index` was checked against the page size when connecting, so the trigger
        // register lies inside the regs mapping.
        unsafe {
            let trigger = (self.regs.addr.as_ptr() as *mut u8).add(offset) as *mut u32;
            ptr::write_volatile(trigger, sync as u32);
        }
    }
}

/// Pins pages through the device so the host can access them at any time.
pub struct DevicePinner {
    file: Arc<File>,
}

impl MemoryPin for DevicePinner {
    fn lock(&self, data: &[u8]) -> Result<()> {
        let arg = yagl_mlock_arg {
            address: data.as_ptr() as c_ulong,
            size: data.len() as c_uint,
        };
        // SAFETY: the kernel only reads `arg`, which outlives the call.
        unsafe { yagl_ioc_mlock(self.file.as_raw_fd(), &arg) }
            .map_err(|e| Error::Ioctl("YAGL_IOC_MLOCK", e.into()))?;
        Ok(())
    }

    fn unlock(&self, data: &[u8]) -> Result<()> {
        let address = data.as_ptr() as c_ulong;
        // SAFETY: the kernel only reads `address`, which outlives the call.
        unsafe { yagl_ioc_munlock(self.file.as_raw_fd(), &address) }
            .map_err(|e| Error::Ioctl("YAGL_IOC_MUNLOCK", e.into()))?;
        Ok(())
    }
}

/// Opens a new device file for every connection.
pub struct DeviceConnector {
    path: PathBuf,
}

impl DeviceConnector {
    pub fn new() -> DeviceConnector {
        DeviceConnector::with_path(YAGL_DEVICE_PATH)
    }

    pub fn with_path<P: Into<PathBuf>>(path: P) -> DeviceConnector {
        DeviceConnector { path: path.into() }
    }
}

impl Default for DeviceConnector {
    fn default() -> Self {
        DeviceConnector::new()
    }
}

impl Connector for DeviceConnector {
    fn connect(&self) -> Result<Connection> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&self.path)
            .map_err(|e| Error::OpenDevice(self.path.display().to_string(), e))?;

        let mut version: c_uint = 0;
        // SAFETY: the kernel writes one `c_uint` into `version`.
        unsafe { yagl_ioc_get_version(file.as_raw_fd(), &mut version) }
            .map_err(|e| Error::Ioctl("YAGL_IOC_GET_VERSION", e.into()))?;
        if version != YAGL_VERSION {
            return Err(Error::VersionMismatch {
                expected: YAGL_VERSION,
                found: version,
            });
        }

        let mut raw = yagl_user_info::default();
        // SAFETY: the kernel writes one `yagl_user_info` into `raw`.
        unsafe { yagl_ioc_get_user_info(file.as_raw_fd(), &mut raw) }
            .map_err(|e| Error::Ioctl("YAGL_IOC_GET_USER_INFO", e.into()))?;
        if raw.index as usize >= pagesize() / YAGL_REGS_SIZE {
            return Err(Error::BadUserIndex(raw.index));
        }
        let info = UserInfo::from_raw(raw)?;

        let file = Arc::new(file);
        let channel = DeviceChannel::new(file.clone(), info.index)?;
        debug!("opened {} as user {}", self.path.display(), info.index);

        Ok(Connection {
            channel: Box::new(channel),
            pinner: Arc::new(DevicePinner { file }),
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::FileExt;

    use super::*;

    #[test]
    fn missing_device() {
        let connector = DeviceConnector::with_path("/nonexistent/yagl");
        assert!(matches!(connector.connect(), Err(Error::OpenDevice(..))));
    }

    #[test]
    fn regular_file_rejects_ioctls() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let connector = DeviceConnector::with_path(file.path());
        assert!(matches!(
            connector.connect(),
            Err(Error::Ioctl("YAGL_IOC_GET_VERSION", _))
        ));
    }

    #[test]
    fn buffer_survives_resize() {
        let page = pagesize();
        let file = tempfile::tempfile().unwrap();
        file.set_len((page * 4) as u64).unwrap();
        let mut channel = DeviceChannel::new(Arc::new(file), 0).unwrap();
        assert!(channel.buffer().is_empty());

        channel.resize(page).unwrap();
        channel.buffer()[..4].copy_from_slice(b"yagl");
        channel.resize(page * 2).unwrap();
        assert_eq!(channel.buffer().len(), page * 2);
        assert_eq!(&channel.buffer()[..4], b"yagl");
    }

    #[test]
    fn commit_writes_user_trigger() {
        let page = pagesize();
        let file = Arc::new(tempfile::tempfile().unwrap());
        file.set_len((page * 2) as u64).unwrap();
        let mut channel = DeviceChannel::new(file.clone(), 3).unwrap();

        let offset = (3 * YAGL_REGS_SIZE + YAGL_REG_TRIGGER) as u64;
        let mut trigger = [0u8; 4];
        channel.commit(true);
        file.read_exact_at(&mut trigger, offset).unwrap();
        assert_eq!(u32::from_ne_bytes(trigger), 1);

        channel.commit(false);
        file.read_exact_at(&mut trigger, offset).unwrap();
        assert_eq!(u32::from_ne_bytes(trigger), 0);
    }
}
