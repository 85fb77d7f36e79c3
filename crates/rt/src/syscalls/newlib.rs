// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! C ABI entry points resolved by newlib at link time.

#![allow(non_upper_case_globals)]

use core::ffi::{c_char, c_int, c_void, CStr};
use core::ptr::{addr_of, null};

use super::{HeapCursor, Shim, Stat, StatusCell, WritePacing};
use crate::console::{DataRegister, DEFAULT_DATA_REGISTER};
use crate::layout::symbols::{__heap_end__, __heap_start__};

#[no_mangle]
pub static errno: StatusCell = StatusCell::new();

#[repr(transparent)]
pub struct Environ<T>(T);

unsafe impl<T> Sync for Environ<T> {}

/// Empty environment, a single null terminator.
#[no_mangle]
pub static __env: Environ<[*const c_char; 1]> = Environ([null()]);

#[no_mangle]
pub static environ: Environ<*const [*const c_char; 1]> = Environ(&__env.0);

static SHIM: Shim<'static, DataRegister> = Shim::new(
    unsafe { DataRegister::new(DEFAULT_DATA_REGISTER) },
    &errno,
    HeapCursor::new(
        unsafe { addr_of!(__heap_start__) }.cast_mut(),
        unsafe { addr_of!(__heap_end__) }.cast_mut(),
    ),
    WritePacing::from_features(),
);

/// Null paths are treated as empty strings.
unsafe fn c_str<'a>(ptr: *const c_char) -> &'a CStr {
    if ptr.is_null() {
        c""
    } else {
        CStr::from_ptr(ptr)
    }
}

#[no_mangle]
pub extern "C" fn initialise_monitor_handles() {}

#[no_mangle]
pub extern "C" fn __io_putchar(ch: c_int) -> c_int {
    SHIM.putchar(ch)
}

#[no_mangle]
pub extern "C" fn __io_getchar() -> c_int {
    SHIM.getchar()
}

#[no_mangle]
pub extern "C" fn _getpid() -> c_int {
    SHIM.getpid()
}

#[no_mangle]
pub extern "C" fn _kill(pid: c_int, sig: c_int) -> c_int {
    SHIM.kill(pid, sig)
}

#[no_mangle]
pub extern "C" fn _exit(status: c_int) -> ! {
    SHIM.exit(status)
}

#[no_mangle]
pub unsafe extern "C" fn _read(file: c_int, ptr: *mut c_char, len: c_int) -> c_int {
    if ptr.is_null() || len <= 0 {
        return SHIM.read(file, &mut []);
    }
    SHIM.read(
        file,
        core::slice::from_raw_parts_mut(ptr.cast(), len as usize),
    )
}

/// Negative lengths are rejected with `EINVAL`.
#[no_mangle]
pub unsafe extern "C" fn _write(file: c_int, ptr: *const c_char, len: c_int) -> c_int {
    if len < 0 {
        return SHIM.fail(super::Errno::InvalidArgument);
    }
    if ptr.is_null() || len == 0 {
        return SHIM.write(file, &[]) as c_int;
    }
    SHIM.write(file, core::slice::from_raw_parts(ptr.cast(), len as usize)) as c_int
}

#[no_mangle]
pub extern "C" fn _close(file: c_int) -> c_int {
    SHIM.close(file)
}

#[no_mangle]
pub unsafe extern "C" fn _fstat(file: c_int, st: *mut Stat) -> c_int {
    match st.as_mut() {
        Some(st) => SHIM.fstat(file, st),
        None => SHIM.fstat(file, &mut Stat::default()),
    }
}

#[no_mangle]
pub unsafe extern "C" fn _stat(file: *const c_char, st: *mut Stat) -> c_int {
    match st.as_mut() {
        Some(st) => SHIM.stat(c_str(file), st),
        None => SHIM.stat(c_str(file), &mut Stat::default()),
    }
}

#[no_mangle]
pub extern "C" fn _isatty(file: c_int) -> c_int {
    SHIM.isatty(file)
}

#[no_mangle]
pub extern "C" fn _lseek(file: c_int, ptr: c_int, dir: c_int) -> c_int {
    SHIM.lseek(file, ptr, dir)
}

#[no_mangle]
pub unsafe extern "C" fn _open(path: *const c_char, flags: c_int) -> c_int {
    SHIM.open(c_str(path), flags)
}

#[no_mangle]
pub unsafe extern "C" fn _wait(status: *mut c_int) -> c_int {
    SHIM.wait(status.as_mut())
}

#[no_mangle]
pub unsafe extern "C" fn _unlink(name: *const c_char) -> c_int {
    SHIM.unlink(c_str(name))
}

#[no_mangle]
pub extern "C" fn _times(_buf: *mut c_void) -> c_int {
    SHIM.times()
}

#[no_mangle]
pub unsafe extern "C" fn _link(old: *const c_char, new: *const c_char) -> c_int {
    SHIM.link(c_str(old), c_str(new))
}

#[no_mangle]
pub extern "C" fn _fork() -> c_int {
    SHIM.fork()
}

#[no_mangle]
pub unsafe extern "C" fn _execve(
    name: *const c_char,
    _argv: *const *const c_char,
    _env: *const *const c_char,
) -> c_int {
    SHIM.execve(c_str(name))
}

#[no_mangle]
pub extern "C" fn _sbrk(incr: c_int) -> *mut c_void {
    SHIM.sbrk(incr as isize).cast()
}

#[no_mangle]
pub extern "C" fn __cxa_pure_virtual() -> ! {
    super::pure_virtual_called()
}
