// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Call marshaling over the shared host buffer.
//!
//! Calls are encoded back to back into one buffer and only handed to the host when a call needs
//! results, when it carries out-of-band data, or when the buffer is full. Calls whose worst-case
//! encoding exceeds `max_call_size` switch to direct mode: their arrays are not copied, the host
//! instead reads and writes guest memory through the recorded addresses.
//!
//! A `Transport` is not shared between threads. Each thread owns its own connection, and the
//! `TransportCall` returned by `begin` borrows the transport mutably, so two calls can never be
//! interleaved on one instance.

mod wire;

use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr;
use std::sync::Arc;

use log::error;
use log::trace;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;

pub use self::wire::*;
use crate::config::TransportConfig;
use crate::fatal;
use crate::fence::Fence;
use crate::resource::HostHandle;

pub const PAGE_SIZE: usize = 4096;

/// Retry results tolerated before the transport is declared broken.
pub const MAX_RETRIES: u32 = 100;

/// API ids carried in each call header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ApiId {
    Egl = 1,
    Gles = 2,
}

/// The device side of a transport.
pub trait HostChannel {
    /// Remaps the shared buffer to `size` bytes, a multiple of the page size. Bytes below the old
    /// size are preserved.
    fn resize(&mut self, size: usize) -> crate::Result<()>;

    /// The currently mapped shared buffer.
    fn buffer(&mut self) -> &mut [u8];

    /// Signals the host that the buffer is ready. With `sync` the host drains all outstanding
    /// work before returning.
    fn commit(&mut self, sync: bool);
}

/// What a flush wants in terms of completion fences.
pub enum FenceRequest<'a> {
    /// Nothing, throttling is implicit.
    None,
    /// The caller submits its own fence.
    Existing(&'a Arc<Fence>),
    /// A new fence should be created and handed back.
    New(&'a mut Option<Arc<Fence>>),
}

/// Decides which fence, if any, accompanies a committed batch.
pub trait FlushHook {
    /// Returns the sequence number to place in the header, 0 for none.
    fn flush(&mut self, request: FenceRequest<'_>) -> u32;
}

/// A `FlushHook` that never produces fences.
pub struct NoFences;

impl FlushHook for NoFences {
    fn flush(&mut self, request: FenceRequest<'_>) -> u32 {
        match request {
            FenceRequest::Existing(fence) => fence.seq(),
            _ => 0,
        }
    }
}

pub struct Transport {
    channel: Box<dyn HostChannel>,
    hook: Box<dyn FlushHook>,
    max_buff_size: usize,
    max_call_size: usize,
    buff_size: usize,
    pos: usize,
}

impl Transport {
    pub fn new(
        channel: Box<dyn HostChannel>,
        hook: Box<dyn FlushHook>,
        config: TransportConfig,
    ) -> crate::Result<Transport> {
        let max_buff_size = config.max_buff_size.max(PAGE_SIZE).next_multiple_of(PAGE_SIZE);
        let mut transport = Transport {
            channel,
            hook,
            max_buff_size,
            max_call_size: config.max_call_size.min(max_buff_size),
            buff_size: 0,
            pos: HEADER_SIZE,
        };
        transport.channel.resize(PAGE_SIZE)?;
        transport.buff_size = PAGE_SIZE;
        Ok(transport)
    }

    pub fn max_buff_size(&self) -> usize {
        self.max_buff_size
    }

    pub fn max_call_size(&self) -> usize {
        self.max_call_size
    }

    pub fn buff_size(&self) -> usize {
        self.buff_size
    }

    /// Bytes of calls encoded but not yet handed to the host.
    pub fn batch_size(&self) -> usize {
        self.pos - HEADER_SIZE
    }

    pub fn channel_mut(&mut self) -> &mut dyn HostChannel {
        self.channel.as_mut()
    }

    /// Starts encoding a call. `min_data_size` and `max_data_size` bound the encoded size of the
    /// arguments, the minimum counting arrays as address and count slots only.
    pub fn begin<'a>(
        &mut self,
        api: ApiId,
        func_id: u32,
        min_data_size: usize,
        max_data_size: usize,
    ) -> TransportCall<'_, 'a> {
        let max_size = CALL_HEADER_SIZE + max_data_size + OUT_DA_RESERVE;
        let min_size = CALL_HEADER_SIZE + min_data_size + OUT_DA_RESERVE;

        let mut direct = max_size > self.max_call_size;
        let needed = if direct { min_size } else { max_size };

        if !self.fit(needed) {
            self.flush(None);
            if !self.fit(needed) {
                direct = true;
                if !self.fit(min_size) {
                    fatal!(
                        "call {}:{} needs {} bytes, transport limit is {}",
                        api as u32,
                        func_id,
                        min_size,
                        self.max_buff_size
                    );
                }
            }
        }

        trace!(
            "begin {}:{} direct = {} batch = {}",
            api as u32,
            func_id,
            direct,
            self.batch_size()
        );

        let mut call = TransportCall {
            transport: self,
            direct,
            in_args: Vec::new(),
            in_arrays: Vec::new(),
            in_da: Vec::new(),
            out_da: Vec::new(),
            _data: PhantomData,
        };
        call.put_out(api as u32);
        call.put_out(func_id);
        call.put_out(direct as u32);
        call
    }

    /// Hands all batched calls to the host. With a fence the host signals it once they complete.
    pub fn flush(&mut self, fence: Option<&Arc<Fence>>) {
        let batch_size = self.batch_size();
        if batch_size == 0 && fence.is_none() {
            return;
        }

        let request = match fence {
            Some(fence) => FenceRequest::Existing(fence),
            None => FenceRequest::None,
        };
        let fence_seq = self.hook.flush(request);
        self.update_header(fence_seq, batch_size, 0);
        self.commit_checked(false, false, |_| {});
        self.reset();
    }

    /// Blocks until the host has executed everything submitted so far.
    ///
    /// Pending calls go out without consulting the flush hook, so waiting never
    /// arms a new throttle fence.
    pub fn wait(&mut self) {
        let batch_size = self.batch_size();
        if batch_size > 0 {
            self.update_header(0, batch_size, 0);
            self.commit_checked(false, false, |_| {});
            self.reset();
        }
        self.update_header(0, 0, 0);
        self.commit_checked(true, false, |_| {});
    }

    fn resize(&mut self, size: usize) -> bool {
        let size = size.next_multiple_of(PAGE_SIZE);
        match self.channel.resize(size) {
            Ok(()) => {
                self.buff_size = size;
                true
            }
            Err(e) => {
                error!("unable to resize transport buffer to {}: {}", size, e);
                false
            }
        }
    }

    /// Makes room for `size` more bytes, growing the buffer up to `max_buff_size`.
    fn fit(&mut self, size: usize) -> bool {
        let new_size = self.pos + size;
        if new_size <= self.buff_size {
            return true;
        }
        new_size <= self.max_buff_size && self.resize(new_size)
    }

    fn reset(&mut self) {
        self.pos = HEADER_SIZE;
    }

    fn update_header(&mut self, fence_seq: u32, batch_size: usize, num_out_da: usize) {
        Header {
            result: 0,
            fence_seq,
            batch_size: batch_size as u32,
            num_out_da: num_out_da as u32,
        }
        .write(self.channel.buffer());
    }

    fn write<T: Scalar>(&mut self, value: T) {
        let pos = self.pos;
        write_slot(self.channel.buffer(), pos, value);
        self.pos += SLOT_SIZE;
    }

    fn write_bytes(&mut self, data: &[u8]) {
        let pos = self.pos;
        self.channel.buffer()[pos..pos + data.len()].copy_from_slice(data);
        self.pos += padded(data.len());
    }

    fn reserve(&mut self, len: usize) {
        self.pos += padded(len);
        assert!(self.pos <= self.buff_size);
    }

    /// Commits until the host stops asking for a retry. `before_commit` runs ahead of every
    /// attempt.
    fn commit_checked<F>(&mut self, sync: bool, direct: bool, mut before_commit: F)
    where
        F: FnMut(&mut Self),
    {
        let mut retry_count = 0;
        loop {
            before_commit(self);
            self.channel.commit(sync);
            if self.check_call_result(direct, &mut retry_count) {
                break;
            }
        }
    }

    fn check_call_result(&mut self, direct: bool, retry_count: &mut u32) -> bool {
        let buffer = self.channel.buffer();
        let result: u32 = read_slot(buffer, HEADER_RESULT);
        write_slot(buffer, HEADER_RESULT, 0u32);

        match result {
            RESULT_OK => {
                *retry_count = 0;
                true
            }
            RESULT_RETRY => {
                if !direct {
                    fatal!("Retry returned by host while not in direct mode!");
                }
                *retry_count += 1;
                if *retry_count >= MAX_RETRIES {
                    fatal!("Max retry count {} reached!", *retry_count);
                }
                false
            }
            _ => fatal!("Bad call result - {}!", result),
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct DataArray {
    addr: usize,
    size: usize,
}

struct InArg<'a> {
    dest: Option<&'a mut [u8]>,
    offset: usize,
}

struct InArray<'a> {
    dest: Option<&'a mut [u8]>,
    offset: usize,
    el_size: usize,
    count_offset: usize,
    ret_count: Option<&'a mut i32>,
}

/// One call being encoded. Arguments borrowed for `'a` must stay alive until `end`, since
/// direct-mode calls hand their addresses to the host.
#[must_use = "a call has no effect until end() is called"]
pub struct TransportCall<'t, 'a> {
    transport: &'t mut Transport,
    direct: bool,
    in_args: Vec<InArg<'a>>,
    in_arrays: Vec<InArray<'a>>,
    in_da: Vec<DataArray>,
    out_da: Vec<DataArray>,
    _data: PhantomData<&'a mut [u8]>,
}

impl<'t, 'a> TransportCall<'t, 'a> {
    pub fn is_direct(&self) -> bool {
        self.direct
    }

    /// Appends a by-value scalar.
    pub fn put_out<T: Scalar>(&mut self, value: T) {
        self.transport.write(value);
    }

    pub fn put_out_handle(&mut self, handle: HostHandle) {
        self.put_out(handle);
    }

    /// Appends a by-reference scalar. The host's value is copied into `dest` by `end`.
    pub fn put_in<T: Scalar>(&mut self, dest: Option<&'a mut T>) {
        assert!(self.in_args.len() < MAX_IN_ARGS, "too many in arguments");
        self.transport.write(address_of(dest.as_deref()));
        let offset = self.transport.pos;
        if let Some(value) = dest.as_deref() {
            self.transport.write(*value);
        }
        self.in_args.push(InArg {
            dest: dest.map(|dest| dest.as_mut_bytes()),
            offset,
        });
    }

    /// Appends an input array, copied inline or referenced by address in direct mode.
    pub fn put_out_array<T>(&mut self, data: Option<&'a [T]>)
    where
        T: IntoBytes + Immutable,
    {
        let count = data.map_or(0, <[T]>::len);
        self.transport
            .write(data.map_or(0u64, |data| data.as_ptr() as u64));
        self.transport.write(count as i32);

        let bytes = match data {
            Some(data) if count > 0 => data.as_bytes(),
            _ => return,
        };
        if self.direct {
            assert!(self.out_da.len() < MAX_OUT_DA, "too many out data arrays");
            self.out_da.push(DataArray {
                addr: bytes.as_ptr() as usize,
                size: bytes.len(),
            });
        } else {
            self.transport.write_bytes(bytes);
        }
    }

    /// Appends an output array with room for `data.len()` elements. After `end`, `ret_count`
    /// holds the element count the host produced.
    pub fn put_in_array<T>(&mut self, data: Option<&'a mut [T]>, ret_count: Option<&'a mut i32>)
    where
        T: IntoBytes + FromBytes,
    {
        assert!(self.in_arrays.len() < MAX_IN_ARRAYS, "too many in arrays");
        let maxcount = data.as_deref().map_or(0, <[T]>::len);
        self.transport
            .write(data.as_deref().map_or(0u64, |data| data.as_ptr() as u64));
        let count_offset = self.transport.pos;
        self.transport.write(maxcount as i32);
        let offset = self.transport.pos;

        let mut dest = data.map(|data| data.as_mut_bytes());
        let size = dest.as_deref().map_or(0, <[u8]>::len);
        if size > 0 {
            if self.direct {
                assert!(self.in_da.len() < MAX_IN_DA, "too many in data arrays");
                // The host writes straight into guest memory, nothing is copied back.
                let addr = dest.take().map_or(0, |bytes| bytes.as_mut_ptr() as usize);
                self.in_da.push(DataArray { addr, size });
            } else {
                self.transport.reserve(size);
            }
        }

        self.in_arrays.push(InArray {
            dest,
            offset,
            el_size: size_of::<T>(),
            count_offset,
            ret_count,
        });
    }

    /// Finishes the call, committing it and copying results back if it has any.
    pub fn end(self) {
        let TransportCall {
            transport,
            direct,
            in_args,
            in_arrays,
            in_da,
            out_da,
            _data,
        } = self;

        let have_ret = !in_args.is_empty() || !in_arrays.is_empty();

        if !have_ret && !direct {
            return;
        }

        let mut fence = None;
        let request = if have_ret {
            FenceRequest::New(&mut fence)
        } else {
            FenceRequest::None
        };
        let fence_seq = transport.hook.flush(request);
        let batch_size = transport.batch_size();
        transport.update_header(fence_seq, batch_size, out_da.len());

        for da in &out_da {
            transport.write(da.addr as u64);
            transport.write(da.size as u32);
        }

        transport.commit_checked(false, direct, |_| {
            for da in &out_da {
                touch_read(da);
            }
        });

        if !have_ret {
            transport.reset();
            return;
        }

        if let Some(fence) = fence.take() {
            fence.wait();
        }

        transport.commit_checked(true, direct, |_| {
            for da in &in_da {
                touch_write(da);
            }
        });

        let buffer = transport.channel.buffer();

        for arg in in_args {
            if let Some(dest) = arg.dest {
                let len = dest.len();
                dest.copy_from_slice(&buffer[arg.offset..arg.offset + len]);
            }
        }

        for array in in_arrays {
            let count: i32 = read_slot(buffer, array.count_offset);
            if !direct && count > 0 {
                if let Some(dest) = array.dest {
                    let len = (count as usize * array.el_size).min(dest.len());
                    dest[..len].copy_from_slice(&buffer[array.offset..array.offset + len]);
                }
            }
            if let Some(ret_count) = array.ret_count {
                *ret_count = count;
            }
        }

        transport.reset();
    }
}

fn address_of<T>(value: Option<&T>) -> u64 {
    value.map_or(0, |value| value as *const T as u64)
}

/// Touches one byte per page of `da` so the host never faults on it while holding locks.
fn touch_read(da: &DataArray) {
    if da.addr == 0 || da.size == 0 {
        return;
    }
    let mut offset = 0;
    while offset < da.size {
        // SAFETY: `da` describes a slice borrowed by the current call, so every offset below
        // `size` is readable.
        unsafe {
            ptr::read_volatile((da.addr + offset) as *const u8);
        }
        offset = if offset == 0 {
            PAGE_SIZE - (da.addr & (PAGE_SIZE - 1))
        } else {
            offset + PAGE_SIZE
        };
    }
}

/// Like `touch_read`, but also writes each touched byte back so the pages are faulted in
/// writable.
fn touch_write(da: &DataArray) {
    if da.addr == 0 || da.size == 0 {
        return;
    }
    let mut offset = 0;
    while offset < da.size {
        let byte = (da.addr + offset) as *mut u8;
        // SAFETY: `da` describes a mutable slice borrowed by the current call, and the byte is
        // written back unchanged.
        unsafe {
            ptr::write_volatile(byte, ptr::read_volatile(byte));
        }
        offset = if offset == 0 {
            PAGE_SIZE - (da.addr & (PAGE_SIZE - 1))
        } else {
            offset + PAGE_SIZE
        };
    }
}
