// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Binary layout of the shared transport buffer.
//!
//! ```text
//! offset 0   result        written by the host, 0xA ok, 0xB retry
//! offset 8   fence_seq     fence to signal once the batch completes, 0 for none
//! offset 16  batch_size    bytes of encoded calls following the header
//! offset 24  num_out_da    out-of-band descriptors appended after the batch
//! offset 32  calls...      {api_id, func_id, direct} followed by arguments
//! ```
//!
//! Every scalar occupies one 8-byte slot, zero-filled past its own width, so a host with a
//! different word size reads the same offsets. Array payloads are copied inline and padded to a
//! multiple of 8.

use std::mem::size_of;

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;

pub const SLOT_SIZE: usize = 8;

/// Size of the region header.
pub const HEADER_SIZE: usize = 4 * SLOT_SIZE;

/// Size of the per-call header.
pub const CALL_HEADER_SIZE: usize = 3 * SLOT_SIZE;

pub const HEADER_RESULT: usize = 0;
pub const HEADER_FENCE_SEQ: usize = SLOT_SIZE;
pub const HEADER_BATCH_SIZE: usize = 2 * SLOT_SIZE;
pub const HEADER_NUM_OUT_DA: usize = 3 * SLOT_SIZE;

pub const MAX_IN_ARGS: usize = 8;
pub const MAX_IN_ARRAYS: usize = 8;
pub const MAX_IN_DA: usize = 8;
pub const MAX_OUT_DA: usize = 8;

/// Space kept free after each call for its out-of-band descriptors.
pub const OUT_DA_RESERVE: usize = 2 * SLOT_SIZE * MAX_OUT_DA;

pub const RESULT_OK: u32 = 0xA;
pub const RESULT_RETRY: u32 = 0xB;

/// Values that fit in one slot.
pub trait Scalar: IntoBytes + FromBytes + Immutable + Copy {}

impl Scalar for u8 {}
impl Scalar for u32 {}
impl Scalar for i32 {}
impl Scalar for f32 {}
impl Scalar for u64 {}

/// Array payload size rounded up to whole slots.
pub const fn padded(len: usize) -> usize {
    (len + SLOT_SIZE - 1) & !(SLOT_SIZE - 1)
}

/// Worst-case encoded size of an array argument: address and count slots plus the padded data.
pub const fn array_size(count: usize, el_size: usize) -> usize {
    2 * SLOT_SIZE + padded(count * el_size)
}

/// Writes `value` into the slot at `offset`, zeroing the unused tail.
pub fn write_slot<T: Scalar>(buf: &mut [u8], offset: usize, value: T) {
    let slot = &mut buf[offset..offset + SLOT_SIZE];
    slot.fill(0);
    slot[..size_of::<T>()].copy_from_slice(value.as_bytes());
}

pub fn read_slot<T: Scalar>(buf: &[u8], offset: usize) -> T {
    let bytes = &buf[offset..offset + size_of::<T>()];
    match T::read_from_bytes(bytes) {
        Ok(value) => value,
        // The slice length is exactly size_of::<T>().
        Err(_) => unreachable!(),
    }
}

/// The region header as seen by either side.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub result: u32,
    pub fence_seq: u32,
    pub batch_size: u32,
    pub num_out_da: u32,
}

impl Header {
    pub fn read(buf: &[u8]) -> Header {
        Header {
            result: read_slot(buf, HEADER_RESULT),
            fence_seq: read_slot(buf, HEADER_FENCE_SEQ),
            batch_size: read_slot(buf, HEADER_BATCH_SIZE),
            num_out_da: read_slot(buf, HEADER_NUM_OUT_DA),
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        write_slot(buf, HEADER_RESULT, self.result);
        write_slot(buf, HEADER_FENCE_SEQ, self.fence_seq);
        write_slot(buf, HEADER_BATCH_SIZE, self.batch_size);
        write_slot(buf, HEADER_NUM_OUT_DA, self.num_out_da);
    }
}

/// Sequential reader over an encoded batch. Used by hosts and tests to decode calls.
pub struct SlotReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SlotReader<'a> {
    pub fn new(buf: &'a [u8], pos: usize) -> SlotReader<'a> {
        SlotReader { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next<T: Scalar>(&mut self) -> T {
        let value = read_slot(self.buf, self.pos);
        self.pos += SLOT_SIZE;
        value
    }

    /// Returns the next `len` payload bytes and skips their padding.
    pub fn bytes(&mut self, len: usize) -> &'a [u8] {
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += padded(len);
        bytes
    }
}
