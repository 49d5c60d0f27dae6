// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod device;

pub use device::DeviceChannel;
pub use device::DeviceConnector;
pub use device::DevicePinner;
