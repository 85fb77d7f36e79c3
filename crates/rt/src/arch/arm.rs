// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::arch::global_asm;

/// ARMv6-M / ARMv7-M cores.
pub struct CortexM;

impl super::Arch for CortexM {
    const NAME: &'static str = "cortex-m";

    fn park() -> ! {
        loop {
            ::cortex_m::asm::nop();
        }
    }

    fn delay(cycles: u32) {
        ::cortex_m::asm::delay(cycles)
    }
}

// SP is reloaded even though hardware took it from slot 0, so a debugger
// jump to the reset handler starts from the same state. Thumb-1 has no
// literal load into SP.
global_asm!(
    ".section .text.Reset_Handler, \"ax\"",
    ".global Reset_Handler",
    ".type Reset_Handler, %function",
    ".thumb_func",
    "Reset_Handler:",
    "    ldr r0, =_estack",
    "    mov sp, r0",
    "    bl __labwired_start",
    "    b .",
);

extern "C" {
    /// Slot 1 of the vector table.
    #[allow(non_snake_case)]
    pub fn Reset_Handler() -> !;
}
