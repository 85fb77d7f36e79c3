// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::ptr::{read_volatile, write_volatile};

/// UART data register on the reference board.
pub const DEFAULT_DATA_REGISTER: usize = 0x4000_C000;

/// Byte-wide I/O port behind `_write`, `__io_putchar` and `__io_getchar`.
pub trait Console {
    fn put(&self, byte: u8);
    fn get(&self) -> u8;
}

/// A memory-mapped data register. No ready bits are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRegister {
    addr: usize,
}

impl DataRegister {
    /// # Safety
    ///
    /// `addr` must be a device register that tolerates volatile byte access.
    pub const unsafe fn new(addr: usize) -> Self {
        Self { addr }
    }

    pub const fn addr(&self) -> usize {
        self.addr
    }
}

impl Console for DataRegister {
    fn put(&self, byte: u8) {
        unsafe { write_volatile(self.addr as *mut u8, byte) }
    }

    fn get(&self) -> u8 {
        unsafe { read_volatile(self.addr as *const u8) }
    }
}
