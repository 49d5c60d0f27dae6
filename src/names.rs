// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use sync::Mutex;

/// Hands out process-wide object names. Zero is never returned.
#[derive(Debug)]
pub struct NameGenerator {
    next: Mutex<u32>,
}

impl NameGenerator {
    pub const fn new() -> NameGenerator {
        NameGenerator::starting_at(1)
    }

    const fn starting_at(next: u32) -> NameGenerator {
        NameGenerator {
            next: Mutex::new(next),
        }
    }

    pub fn next(&self) -> u32 {
        let mut next = self.next.lock();
        if *next == 0 {
            *next = 1;
        }
        let name = *next;
        *next = next.wrapping_add(1);
        name
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        NameGenerator::new()
    }
}
