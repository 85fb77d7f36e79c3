// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::sync::atomic::{AtomicI32, Ordering};

/// Failure reasons the shim reports, with newlib's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Errno {
    /// `ENOENT`
    NoEntry = 2,
    /// `ECHILD`
    NoChild = 10,
    /// `EAGAIN`
    TryAgain = 11,
    /// `ENOMEM`
    OutOfMemory = 12,
    /// `EINVAL`
    InvalidArgument = 22,
    /// `EMLINK`
    TooManyLinks = 31,
}

impl Errno {
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// The C macro name.
    pub const fn name(self) -> &'static str {
        match self {
            Errno::NoEntry => "ENOENT",
            Errno::NoChild => "ECHILD",
            Errno::TryAgain => "EAGAIN",
            Errno::OutOfMemory => "ENOMEM",
            Errno::InvalidArgument => "EINVAL",
            Errno::TooManyLinks => "EMLINK",
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            2 => Some(Errno::NoEntry),
            10 => Some(Errno::NoChild),
            11 => Some(Errno::TryAgain),
            12 => Some(Errno::OutOfMemory),
            22 => Some(Errno::InvalidArgument),
            31 => Some(Errno::TooManyLinks),
            _ => None,
        }
    }
}

/// Process-wide "last failure" cell. Written on failure, never cleared.
///
/// Layout-compatible with a C `int`, so it can be exported as `errno`.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct StatusCell(AtomicI32);

impl StatusCell {
    pub const fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    pub fn set(&self, errno: Errno) {
        self.0.store(errno.code(), Ordering::Relaxed);
    }

    /// Raw value; 0 until the first failure.
    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn errno(&self) -> Option<Errno> {
        Errno::from_code(self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_newlib() {
        let table = [
            (Errno::NoEntry, 2, "ENOENT"),
            (Errno::NoChild, 10, "ECHILD"),
            (Errno::TryAgain, 11, "EAGAIN"),
            (Errno::OutOfMemory, 12, "ENOMEM"),
            (Errno::InvalidArgument, 22, "EINVAL"),
            (Errno::TooManyLinks, 31, "EMLINK"),
        ];
        for (errno, code, name) in table {
            assert_eq!(errno.code(), code);
            assert_eq!(errno.name(), name);
            assert_eq!(Errno::from_code(code), Some(errno));
        }
        assert_eq!(Errno::from_code(0), None);
    }

    #[test]
    fn test_status_cell_keeps_last_failure() {
        let cell = StatusCell::new();
        assert_eq!(cell.get(), 0);
        assert_eq!(cell.errno(), None);

        cell.set(Errno::TryAgain);
        cell.set(Errno::NoChild);
        assert_eq!(cell.get(), 10);
        assert_eq!(cell.errno(), Some(Errno::NoChild));
    }
}
