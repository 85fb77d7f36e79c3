// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Bring-up demo for the LM3S6965: exercises `.bss`, `.data`, `.dat2`, the
//! constructor walk, the heap and the console through the C syscall surface.

#![no_main]
#![no_std]

use core::ffi::{c_char, c_int, c_void};
use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use labwired_rt::vectors::{Exception, Handlers};
use panic_halt as _;

extern "C" {
    fn _write(file: c_int, ptr: *const c_char, len: c_int) -> c_int;
    fn _sbrk(incr: c_int) -> *mut c_void;
}

static TICKS: AtomicU32 = AtomicU32::new(0);
static CONSTRUCTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_systick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

labwired_rt::vector_table!(Handlers::new().with(Exception::SysTick, on_systick));

extern "C" fn construct() {
    CONSTRUCTED.store(true, Ordering::Relaxed);
}

#[used]
#[link_section = ".init_array"]
static CONSTRUCTOR: extern "C" fn() = construct;

static mut GLOBAL_BSS: [u8; 10] = [0; 10];
static mut GLOBAL_DATA: [u8; 14] = *b"Hello World #X";
#[link_section = ".dat2"]
static mut GLOBAL_DATA2: [u8; 14] = *b"Wello Horld #X";

fn print(bytes: &[u8]) {
    unsafe {
        _write(1, bytes.as_ptr().cast(), bytes.len() as c_int);
    }
}

fn print_line(label: &[u8], value: &[u8]) {
    print(label);
    print(b": ");
    print(value);
    print(b"\n");
}

#[no_mangle]
pub extern "C" fn main() -> c_int {
    if !CONSTRUCTED.load(Ordering::Relaxed) {
        print(b"constructors did not run\n");
        return 1;
    }

    let bss = unsafe { &mut *addr_of_mut!(GLOBAL_BSS) };
    if bss.iter().any(|&b| b != 0) {
        print(b".bss was not zeroed\n");
        return 2;
    }
    for (i, b) in bss.iter_mut().enumerate() {
        *b = i as u8 + 1;
    }

    let data = unsafe { &mut *addr_of_mut!(GLOBAL_DATA) };
    data[13] = b'5';
    print_line(b"global data string", data);

    let data2 = unsafe { &mut *addr_of_mut!(GLOBAL_DATA2) };
    data2[13] = b'5';
    print_line(b"global data string 2", data2);

    let block = unsafe { _sbrk(64) };
    if block as isize == -1 {
        print(b"sbrk failed\n");
        return 3;
    }
    print(b"heap ok\n");
    0
}
