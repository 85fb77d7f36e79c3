// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Architecture-specific primitives, selected once at build time.
//!
//! [`Target`] names the implementation for the architecture being compiled
//! for. Host builds get [`Hosted`], which keeps the shim and sequencer usable
//! from the simulator and from tests.

/// Operations the runtime needs from the core it runs on.
pub trait Arch {
    /// Name used in target descriptors.
    const NAME: &'static str;

    /// Stops making progress, forever. There is no caller to return to.
    fn park() -> !;

    /// Busy-waits for roughly `cycles` core clock cycles.
    fn delay(cycles: u32);
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod arm;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::arm::{CortexM, Reset_Handler};
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub type Target = CortexM;

#[cfg(all(target_arch = "riscv32", target_os = "none"))]
mod riscv32;
#[cfg(all(target_arch = "riscv32", target_os = "none"))]
pub use self::riscv32::RiscV;
#[cfg(all(target_arch = "riscv32", target_os = "none"))]
pub type Target = RiscV;

#[cfg(not(target_os = "none"))]
mod hosted;
#[cfg(not(target_os = "none"))]
pub use self::hosted::Hosted;
#[cfg(not(target_os = "none"))]
pub type Target = Hosted;

#[cfg(all(
    target_os = "none",
    not(any(target_arch = "arm", target_arch = "riscv32"))
))]
compile_error!("labwired-rt supports ARM and RISC-V bare-metal targets only");
