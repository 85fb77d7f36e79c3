// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The syscall surface newlib links against, with no OS underneath.
//!
//! | call      | result                      | status cell |
//! |-----------|-----------------------------|-------------|
//! | `getpid`  | 1                           | unchanged   |
//! | `kill`    | -1                          | `EINVAL`    |
//! | `exit`    | `kill`, then parks          | `EINVAL`    |
//! | `read`    | -1                          | unchanged   |
//! | `write`   | bytes accepted (= length)   | unchanged   |
//! | `close`   | -1                          | unchanged   |
//! | `fstat`, `stat` | 0, `S_IFCHR`          | unchanged   |
//! | `isatty`  | 1                           | unchanged   |
//! | `lseek`   | 0                           | unchanged   |
//! | `open`    | -1                          | unchanged   |
//! | `wait`    | -1                          | `ECHILD`    |
//! | `unlink`  | -1                          | `ENOENT`    |
//! | `times`   | -1                          | unchanged   |
//! | `link`    | -1                          | `EMLINK`    |
//! | `fork`    | -1                          | `EAGAIN`    |
//! | `execve`  | -1                          | `ENOMEM`    |
//! | `sbrk`    | previous top or `(void*)-1` | `ENOMEM`/`EINVAL` on failure |

pub mod errno;
pub mod heap;

#[cfg(target_os = "none")]
mod newlib;

use core::ffi::CStr;

pub use errno::{Errno, StatusCell};
pub use heap::HeapCursor;

use crate::arch::{Arch, Target};
use crate::console::Console;

/// The only process there is.
pub const PID: i32 = 1;

/// `_sbrk` failure sentinel, `(caddr_t)-1`.
pub const SBRK_FAILED: *mut u8 = usize::MAX as *mut u8;

/// Busy-wait cycles per pacing unit when `write-pacing` is enabled.
pub const DEFAULT_CYCLES_PER_UNIT: u32 = 8_000;

bitflags::bitflags! {
    /// `st_mode` file type bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileMode: u32 {
        const IFIFO = 0o010000;
        const IFCHR = 0o020000;
        const IFDIR = 0o040000;
        const IFBLK = 0o060000;
        const IFREG = 0o100000;
    }
}

/// `struct stat` as laid out by newlib for 32-bit EABI targets.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Stat {
    pub st_dev: i16,
    pub st_ino: u16,
    pub st_mode: u32,
    pub st_nlink: u16,
    pub st_uid: u16,
    pub st_gid: u16,
    pub st_rdev: i16,
    pub st_size: i32,
    pub st_atime: [i64; 2],
    pub st_mtime: [i64; 2],
    pub st_ctime: [i64; 2],
    pub st_blksize: i32,
    pub st_blocks: i32,
    pub st_spare4: [i32; 2],
}

/// Whether `write` waits for the serial line to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePacing {
    /// The delay is computed and discarded.
    #[default]
    Omit,
    /// Spin for `pacing_units(len) * cycles_per_unit` cycles after transmitting.
    BusyWait { cycles_per_unit: u32 },
}

impl WritePacing {
    /// Selected by the `write-pacing` cargo feature.
    pub const fn from_features() -> Self {
        if cfg!(feature = "write-pacing") {
            WritePacing::BusyWait {
                cycles_per_unit: DEFAULT_CYCLES_PER_UNIT,
            }
        } else {
            WritePacing::Omit
        }
    }
}

/// Minimum transmission time for `len` bytes, never less than one unit.
pub const fn pacing_units(len: usize) -> u32 {
    let units = len.saturating_mul(100) / 1000;
    if units == 0 {
        1
    } else if units > u32::MAX as usize {
        u32::MAX
    } else {
        units as u32
    }
}

/// Owns the process-wide cells the C library sees: the heap arena and the
/// console, plus a reference to the status cell (exported separately as `errno`).
#[derive(Debug)]
pub struct Shim<'s, C: Console> {
    console: C,
    status: &'s StatusCell,
    heap: HeapCursor,
    pacing: WritePacing,
}

impl<'s, C: Console> Shim<'s, C> {
    pub const fn new(
        console: C,
        status: &'s StatusCell,
        heap: HeapCursor,
        pacing: WritePacing,
    ) -> Self {
        Self {
            console,
            status,
            heap,
            pacing,
        }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn status(&self) -> &StatusCell {
        self.status
    }

    pub fn heap(&self) -> &HeapCursor {
        &self.heap
    }

    pub fn pacing(&self) -> WritePacing {
        self.pacing
    }

    pub(crate) fn fail(&self, errno: Errno) -> i32 {
        self.status.set(errno);
        -1
    }

    pub fn getpid(&self) -> i32 {
        PID
    }

    /// Signals are not supported.
    pub fn kill(&self, _pid: i32, _sig: i32) -> i32 {
        self.fail(Errno::InvalidArgument)
    }

    /// There is nothing to exit to.
    pub fn exit(&self, status: i32) -> ! {
        self.kill(status, -1);
        Target::park()
    }

    /// No input stream is wired up.
    pub fn read(&self, _fd: i32, _buf: &mut [u8]) -> i32 {
        -1
    }

    /// Transmits `buf` through the console and reports every byte accepted.
    pub fn write(&self, _fd: i32, buf: &[u8]) -> usize {
        for &byte in buf {
            self.console.put(byte);
        }
        let units = pacing_units(buf.len());
        if let WritePacing::BusyWait { cycles_per_unit } = self.pacing {
            Target::delay(units.saturating_mul(cycles_per_unit));
        }
        buf.len()
    }

    pub fn close(&self, _fd: i32) -> i32 {
        -1
    }

    /// Every descriptor is the serial console.
    pub fn fstat(&self, _fd: i32, st: &mut Stat) -> i32 {
        st.st_mode = FileMode::IFCHR.bits();
        0
    }

    pub fn stat(&self, _path: &CStr, st: &mut Stat) -> i32 {
        st.st_mode = FileMode::IFCHR.bits();
        0
    }

    pub fn isatty(&self, _fd: i32) -> i32 {
        1
    }

    pub fn lseek(&self, _fd: i32, _offset: i32, _whence: i32) -> i32 {
        0
    }

    pub fn open(&self, _path: &CStr, _flags: i32) -> i32 {
        -1
    }

    pub fn wait(&self, _status: Option<&mut i32>) -> i32 {
        self.fail(Errno::NoChild)
    }

    pub fn unlink(&self, _path: &CStr) -> i32 {
        self.fail(Errno::NoEntry)
    }

    pub fn times(&self) -> i32 {
        -1
    }

    pub fn link(&self, _old: &CStr, _new: &CStr) -> i32 {
        self.fail(Errno::TooManyLinks)
    }

    pub fn fork(&self) -> i32 {
        self.fail(Errno::TryAgain)
    }

    pub fn execve(&self, _path: &CStr) -> i32 {
        self.fail(Errno::OutOfMemory)
    }

    /// Grows the heap by `incr` bytes, returning the base of the new block
    /// or [`SBRK_FAILED`].
    pub fn sbrk(&self, incr: isize) -> *mut u8 {
        match self.heap.grow(incr) {
            Ok(prev) => prev,
            Err(errno) => {
                self.status.set(errno);
                SBRK_FAILED
            }
        }
    }

    pub fn putchar(&self, ch: i32) -> i32 {
        self.console.put(ch as u8);
        1
    }

    pub fn getchar(&self) -> i32 {
        i32::from(self.console.get())
    }
}

/// A call through an abstract virtual table slot. The image is corrupt.
pub fn pure_virtual_called() -> ! {
    Target::park()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    const HEAP: usize = 0x2000_4000;

    #[derive(Default)]
    struct Loopback {
        tx: RefCell<Vec<u8>>,
    }

    impl Console for Loopback {
        fn put(&self, byte: u8) {
            self.tx.borrow_mut().push(byte);
        }

        fn get(&self) -> u8 {
            b'x'
        }
    }

    fn shim(status: &StatusCell) -> Shim<'_, Loopback> {
        Shim::new(
            Loopback::default(),
            status,
            HeapCursor::new(HEAP as *mut u8, (HEAP + 0x400) as *mut u8),
            WritePacing::Omit,
        )
    }

    #[test]
    fn test_identity_is_fixed() {
        let status = StatusCell::new();
        assert_eq!(shim(&status).getpid(), 1);
        assert_eq!(status.get(), 0);
    }

    #[test]
    fn test_kill_always_fails_with_einval() {
        let status = StatusCell::new();
        let shim = shim(&status);
        for (pid, sig) in [(1, 9), (0, 0), (-1, 15), (i32::MAX, i32::MIN)] {
            assert_eq!(shim.kill(pid, sig), -1);
            assert_eq!(status.errno(), Some(Errno::InvalidArgument));
        }
    }

    #[test]
    fn test_unsupported_calls_report_fixed_codes() {
        let status = StatusCell::new();
        let shim = shim(&status);

        let cases: [(&str, fn(&Shim<'_, Loopback>) -> i32, Errno); 5] = [
            ("wait", |s| s.wait(None), Errno::NoChild),
            ("unlink", |s| s.unlink(c"/dev/null"), Errno::NoEntry),
            ("link", |s| s.link(c"a", c"b"), Errno::TooManyLinks),
            ("fork", |s| s.fork(), Errno::TryAgain),
            ("execve", |s| s.execve(c"/bin/sh"), Errno::OutOfMemory),
        ];
        for (name, call, errno) in cases {
            assert_eq!(call(&shim), -1, "{name}");
            assert_eq!(status.errno(), Some(errno), "{name}");
            assert_eq!(status.get(), errno.code(), "{name}");
        }

        let mut code = 0;
        assert_eq!(shim.wait(Some(&mut code)), -1);
        assert_eq!(code, 0);
    }

    #[test]
    fn test_silent_failures_leave_status_alone() {
        let status = StatusCell::new();
        let shim = shim(&status);
        let mut buf = [0u8; 8];

        assert_eq!(shim.read(0, &mut buf), -1);
        assert_eq!(shim.read(7, &mut []), -1);
        assert_eq!(shim.open(c"/tmp/log", 0o102), -1);
        assert_eq!(shim.close(1), -1);
        assert_eq!(shim.times(), -1);
        assert_eq!(status.get(), 0);
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn test_console_masquerades_as_character_device() {
        let status = StatusCell::new();
        let shim = shim(&status);

        let mut st = Stat::default();
        assert_eq!(shim.fstat(1, &mut st), 0);
        assert_eq!(FileMode::from_bits(st.st_mode), Some(FileMode::IFCHR));

        let mut st = Stat::default();
        assert_eq!(shim.stat(c"/anything", &mut st), 0);
        assert_eq!(st.st_mode, 0o020000);

        assert_eq!(shim.isatty(0), 1);
        assert_eq!(shim.isatty(42), 1);
        assert_eq!(shim.lseek(1, 100, 2), 0);
        assert_eq!(status.get(), 0);
    }

    #[test]
    fn test_write_returns_length_for_all_sizes() {
        let status = StatusCell::new();
        let shim = shim(&status);
        for len in [0usize, 1, 2, 63, 512] {
            let buf = vec![b'a'; len];
            assert_eq!(shim.write(1, &buf), len);
        }
        assert_eq!(shim.console().tx.borrow().len(), 1 + 2 + 63 + 512);
        assert_eq!(status.get(), 0);
    }

    #[test]
    fn test_write_with_busy_wait_pacing() {
        let status = StatusCell::new();
        let shim = Shim::new(
            Loopback::default(),
            &status,
            HeapCursor::new(HEAP as *mut u8, HEAP as *mut u8),
            WritePacing::BusyWait { cycles_per_unit: 4 },
        );
        assert_eq!(shim.write(2, b"paced\n"), 6);
        assert_eq!(*shim.console().tx.borrow(), b"paced\n".to_vec());
    }

    #[test]
    fn test_pacing_units() {
        assert_eq!(pacing_units(0), 1);
        assert_eq!(pacing_units(9), 1);
        assert_eq!(pacing_units(25), 2);
        assert_eq!(pacing_units(1000), 100);
        assert_eq!(pacing_units(40_000), 4_000);
    }

    #[test]
    fn test_byte_primitives() {
        let status = StatusCell::new();
        let shim = shim(&status);
        assert_eq!(shim.putchar(i32::from(b'Z')), 1);
        assert_eq!(shim.putchar(0x141), 1);
        assert_eq!(*shim.console().tx.borrow(), vec![b'Z', 0x41]);
        assert_eq!(shim.getchar(), i32::from(b'x'));
    }

    #[test]
    fn test_sbrk_reports_failure_through_status() {
        let status = StatusCell::new();
        let shim = shim(&status);

        assert_eq!(shim.sbrk(0x100) as usize, HEAP);
        assert_eq!(shim.sbrk(0x300) as usize, HEAP + 0x100);
        assert_eq!(status.get(), 0);

        assert_eq!(shim.sbrk(1), SBRK_FAILED);
        assert_eq!(status.errno(), Some(Errno::OutOfMemory));

        assert_eq!(shim.sbrk(-0x500), SBRK_FAILED);
        assert_eq!(status.errno(), Some(Errno::InvalidArgument));

        assert_eq!(shim.sbrk(-0x10) as usize, HEAP + 0x400);
        assert_eq!(shim.sbrk(0x10) as usize, HEAP + 0x3F0);
    }

    #[test]
    fn test_exit_signals_then_parks() {
        let status = StatusCell::new();
        let shim = shim(&status);
        let parked = catch_unwind(AssertUnwindSafe(|| {
            shim.exit(3);
        }));
        assert!(parked.is_err());
        assert_eq!(status.errno(), Some(Errno::InvalidArgument));
    }

    #[test]
    #[should_panic(expected = "core parked")]
    fn test_pure_virtual_call_parks() {
        pure_virtual_called();
    }

    #[test]
    fn test_pacing_from_features_defaults_to_omit() {
        if cfg!(feature = "write-pacing") {
            assert!(matches!(
                WritePacing::from_features(),
                WritePacing::BusyWait { .. }
            ));
        } else {
            assert_eq!(WritePacing::from_features(), WritePacing::Omit);
        }
    }
}
