// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Transport limits, overridable from the environment.

use std::env;

use log::warn;

use crate::transport::PAGE_SIZE;

pub const MAX_BUFF_SIZE_ENV: &str = "YAGL_MAX_BUFF_SIZE";
pub const MAX_CALL_SIZE_ENV: &str = "YAGL_MAX_CALL_SIZE";

pub const DEFAULT_MAX_BUFF_SIZE: usize = 1048576;
pub const DEFAULT_MAX_CALL_SIZE: usize = 1048576;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound for the shared buffer.
    pub max_buff_size: usize,
    /// Calls whose worst-case encoding exceeds this are sent in direct mode.
    pub max_call_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            max_buff_size: DEFAULT_MAX_BUFF_SIZE,
            max_call_size: DEFAULT_MAX_CALL_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn from_env() -> TransportConfig {
        TransportConfig::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> TransportConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str, default: usize| match lookup(name) {
            None => default,
            Some(value) => match parse_size(&value) {
                Some(size) => size,
                None => {
                    warn!("ignoring {}={:?}, using {}", name, value, default);
                    default
                }
            },
        };

        TransportConfig {
            max_buff_size: read(MAX_BUFF_SIZE_ENV, DEFAULT_MAX_BUFF_SIZE),
            max_call_size: read(MAX_CALL_SIZE_ENV, DEFAULT_MAX_CALL_SIZE),
        }
        .normalized()
    }

    /// Rounds the buffer limit up to whole pages and keeps both limits within
    /// `[PAGE_SIZE, max_buff_size]`.
    pub fn normalized(self) -> TransportConfig {
        let max_buff_size = self
            .max_buff_size
            .max(PAGE_SIZE)
            .next_multiple_of(PAGE_SIZE);
        let max_call_size = self.max_call_size.clamp(PAGE_SIZE, max_buff_size);
        TransportConfig {
            max_buff_size,
            max_call_size,
        }
    }
}

/// Accepts decimal or `0x` prefixed hex. Zero is rejected.
fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    let size = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok()?,
        None => value.parse().ok()?,
    };
    (size > 0).then_some(size)
}
