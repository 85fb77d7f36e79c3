// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::arch::global_asm;

/// RV32 harts.
pub struct RiscV;

impl super::Arch for RiscV {
    const NAME: &'static str = "riscv32";

    fn park() -> ! {
        loop {
            unsafe { ::riscv::asm::wfi() };
        }
    }

    fn delay(cycles: u32) {
        unsafe { ::riscv::asm::delay(cycles) }
    }
}

// The linker places `.init` at the reset address.
global_asm!(
    ".section .init, \"ax\"",
    ".global _start",
    "_start:",
    "    .option push",
    "    .option norelax",
    "    la gp, __global_pointer$",
    "    .option pop",
    "    la sp, _estack",
    "    mv fp, sp",
    "    call __labwired_start",
    "1:",
    "    j 1b",
);
