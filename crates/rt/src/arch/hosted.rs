// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Stand-in for host builds. Parking panics so non-returning paths stay observable.
pub struct Hosted;

impl super::Arch for Hosted {
    const NAME: &'static str = "hosted";

    fn park() -> ! {
        panic!("core parked: no supervisor to return to");
    }

    fn delay(cycles: u32) {
        for _ in 0..cycles {
            core::hint::spin_loop();
        }
    }
}
