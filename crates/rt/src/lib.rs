// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Bare-metal bring-up runtime.
//!
//! Takes the core from reset to the application entry point: establishes the
//! stack, zeroes `.bss`, copies `.data` (and the auxiliary `.dat2` region)
//! from their load images, runs static constructors and calls `main`. It also
//! provides the Cortex-M vector table and the newlib syscall surface
//! (`_sbrk`, `_write`, `_fstat`, ...) backed by a single byte-wide data
//! register and a bounded heap arena.
//!
//! Everything that touches real hardware is compiled only for
//! `target_os = "none"`. On a host the same sequencing and shim logic runs
//! against any [`Bus`] and [`Console`], which is how the simulator and the
//! tests drive it.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod bus;
pub mod console;
pub mod layout;
pub mod reset;
pub mod syscalls;
pub mod vectors;

#[cfg(all(target_os = "none", not(feature = "newlib")))]
mod init_array;

pub use bus::Bus;
pub use console::Console;
pub use layout::{InitRegion, LayoutError, MemoryLayout, Region};
pub use reset::{Sequencer, Startup};
pub use syscalls::{Errno, HeapCursor, Shim, StatusCell, WritePacing};
pub use vectors::{Exception, Handlers, VectorTable};
