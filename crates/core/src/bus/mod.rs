// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::{LinearMemory, Segment};
use crate::peripherals::uart::Uart;
use crate::{Peripheral, SimResult, SimulationError};
use labwired_config::TargetDescriptor;

/// Width of the console window. Only offset 0 is a register.
pub const CONSOLE_WINDOW: u64 = 4;

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

#[derive(Debug)]
pub struct SystemBus {
    pub flash: LinearMemory,
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
}

impl SystemBus {
    pub fn new(flash: LinearMemory, ram: LinearMemory) -> Self {
        Self {
            flash,
            ram,
            peripherals: Vec::new(),
        }
    }

    /// Maps flash, RAM and the console UART where the descriptor puts them.
    pub fn from_target(target: &TargetDescriptor) -> SimResult<Self> {
        let flash_size = target.flash.bytes("flash")? as usize;
        let ram_size = target.ram.bytes("ram")? as usize;

        let mut bus = Self::new(
            LinearMemory::new("flash", flash_size, target.flash.base, false),
            LinearMemory::new("ram", ram_size, target.ram.base, true),
        );
        bus.peripherals.push(PeripheralEntry {
            name: "uart".to_string(),
            base: target.console,
            size: CONSOLE_WINDOW,
            dev: Box::new(Uart::new()),
        });

        tracing::debug!(
            "Mapped flash [{:#x}, {:#x}), ram [{:#x}, {:#x}), uart @ {:#x}",
            bus.flash.base_addr,
            bus.flash.end_addr(),
            bus.ram.base_addr,
            bus.ram.end_addr(),
            target.console
        );
        Ok(bus)
    }

    /// Places a segment in flash or RAM. Returns false when neither holds it.
    pub fn load_segment(&mut self, segment: &Segment) -> bool {
        self.flash.load_from_segment(segment) || self.ram.load_from_segment(segment)
    }

    pub fn peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
    }

    pub fn peripheral_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|any| any.downcast_mut::<T>())
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.peripheral::<Uart>("uart")
    }

    pub fn uart_mut(&mut self) -> Option<&mut Uart> {
        self.peripheral_mut::<Uart>("uart")
    }

    fn find_peripheral(&mut self, addr: u64) -> Option<(&mut PeripheralEntry, u64)> {
        self.peripherals
            .iter_mut()
            .find(|p| addr >= p.base && addr < p.base + p.size)
            .map(|p| {
                let offset = addr - p.base;
                (p, offset)
            })
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        if let Some(byte) = self.flash.read_u8(addr) {
            return Ok(byte);
        }
        if let Some(byte) = self.ram.read_u8(addr) {
            return Ok(byte);
        }
        if let Some((p, offset)) = self.find_peripheral(addr) {
            return p.dev.read(offset);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }
        if let Some((p, offset)) = self.find_peripheral(addr) {
            return p.dev.write(offset, value);
        }
        // Flash is read-only on the bus.
        Err(SimulationError::MemoryViolation(addr))
    }
}
