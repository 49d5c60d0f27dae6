// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Macros for yagl.

/// Reports an unrecoverable guest/host desync and terminates.
///
/// Release builds abort on panic, so the process exits with the message logged. Tests build with
/// unwinding and can observe the panic.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        ::log::error!("Critical error! {}", message);
        panic!("Critical error! {}", message)
    }};
}
