// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host-side board model for exercising the bring-up runtime.
//!
//! A [`board::Board`] maps flash, RAM and a UART data register from a target
//! descriptor, and runs the real `labwired_rt` reset sequencer and syscall
//! shim against that simulated memory.

pub mod board;
pub mod bus;
pub mod memory;
pub mod metrics;
pub mod peripherals;

use std::any::Any;

pub use board::{Board, BringUpReport, MemoryCheck, ResetVector};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Target '{0}' has no vector table")]
    NoVectorTable(String),
    #[error(transparent)]
    Config(#[from] labwired_config::ConfigError),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Bring-up phase a RAM write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ZeroFill,
    CopyData,
    CopyData2,
}

/// Trait for observing bring-up events in a modular way.
pub trait BringUpObserver: std::fmt::Debug + Send + Sync {
    fn on_bring_up_start(&self) {}
    fn on_bring_up_stop(&self, _exit_code: i32) {}
    fn on_word_written(&self, _phase: Phase, _addr: u64) {}
    fn on_console_byte(&self, _byte: u8) {}
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;

    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        // Little Endian
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }
}
