// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::ptr::{read_volatile, write_volatile};

/// Word-granular view of memory used by the reset sequencer.
///
/// Accesses are infallible: on hardware an address outside the layout
/// contract is undefined behaviour, and simulated buses record it instead.
pub trait Bus {
    fn read_u32(&self, addr: usize) -> u32;
    fn write_u32(&mut self, addr: usize, value: u32);
}

/// Physical memory, accessed with volatile word loads and stores.
#[derive(Debug)]
pub struct RawBus {
    _private: (),
}

impl RawBus {
    /// # Safety
    ///
    /// Every address passed to this bus must be word aligned, mapped, and not
    /// referenced by any live Rust reference while the bus is in use.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Bus for RawBus {
    #[inline(always)]
    fn read_u32(&self, addr: usize) -> u32 {
        unsafe { read_volatile(addr as *const u32) }
    }

    #[inline(always)]
    fn write_u32(&mut self, addr: usize, value: u32) {
        unsafe { write_volatile(addr as *mut u32, value) }
    }
}
