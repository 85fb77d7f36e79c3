// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Static constructor walk for images linked without newlib's `crt0`.

use core::ptr::addr_of;

type Constructor = unsafe extern "C" fn();

extern "C" {
    static __preinit_array_start: Constructor;
    static __preinit_array_end: Constructor;
    static __init_array_start: Constructor;
    static __init_array_end: Constructor;
}

unsafe fn walk(start: *const Constructor, end: *const Constructor) {
    let mut entry = start;
    while entry < end {
        (*entry)();
        entry = entry.add(1);
    }
}

/// Runs `.preinit_array` then `.init_array`, each in link order.
///
/// # Safety
///
/// Must run once, after memory initialization and before `main`.
pub unsafe fn run() {
    walk(
        addr_of!(__preinit_array_start),
        addr_of!(__preinit_array_end),
    );
    walk(addr_of!(__init_array_start), addr_of!(__init_array_end));
}
