// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The `_sbrk` arena.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use super::Errno;

/// Top of the dynamically grown heap, bounded by `[start, end]`.
///
/// Unset (null) until the first growth request. Not reentrant: callers such
/// as `malloc` serialize access through their own locks.
#[derive(Debug)]
pub struct HeapCursor {
    start: *mut u8,
    end: *mut u8,
    cursor: AtomicPtr<u8>,
}

// The boundaries are never written and the cursor is atomic.
unsafe impl Sync for HeapCursor {}
unsafe impl Send for HeapCursor {}

impl HeapCursor {
    pub const fn new(start: *mut u8, end: *mut u8) -> Self {
        Self {
            start,
            end,
            cursor: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn start(&self) -> *mut u8 {
        self.start
    }

    pub fn end(&self) -> *mut u8 {
        self.end
    }

    /// Current top, or `None` before the first request.
    pub fn cursor(&self) -> Option<*mut u8> {
        let cursor = self.cursor.load(Ordering::Relaxed);
        (!cursor.is_null()).then_some(cursor)
    }

    /// Moves the top by `incr` bytes and returns the previous top.
    ///
    /// Growing past `end` fails with [`Errno::OutOfMemory`]; shrinking below
    /// `start` fails with [`Errno::InvalidArgument`]. A failed request leaves
    /// the cursor where it was.
    pub fn grow(&self, incr: isize) -> Result<*mut u8, Errno> {
        let mut prev = self.cursor.load(Ordering::Relaxed);
        if prev.is_null() {
            prev = self.start;
            self.cursor.store(prev, Ordering::Relaxed);
        }

        match (prev as usize).checked_add_signed(incr) {
            Some(next) if next > self.end as usize => Err(Errno::OutOfMemory),
            Some(next) if next < self.start as usize => Err(Errno::InvalidArgument),
            Some(_) => {
                self.cursor
                    .store(prev.wrapping_offset(incr), Ordering::Relaxed);
                Ok(prev)
            }
            None if incr < 0 => Err(Errno::InvalidArgument),
            None => Err(Errno::OutOfMemory),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: usize = 0x2000_1000;
    const SIZE: usize = 0x100;

    fn arena() -> HeapCursor {
        HeapCursor::new(START as *mut u8, (START + SIZE) as *mut u8)
    }

    fn addr(p: Result<*mut u8, Errno>) -> Result<usize, Errno> {
        p.map(|p| p as usize)
    }

    #[test]
    fn test_first_request_returns_heap_start() {
        let heap = arena();
        assert_eq!(heap.cursor(), None);
        assert_eq!(addr(heap.grow(0x40)), Ok(START));
        assert_eq!(heap.cursor().map(|p| p as usize), Some(START + 0x40));
    }

    #[test]
    fn test_growth_up_to_exact_end() {
        let heap = arena();
        assert_eq!(addr(heap.grow(0x40)), Ok(START));
        assert_eq!(addr(heap.grow((SIZE - 0x40) as isize)), Ok(START + 0x40));
        assert_eq!(heap.cursor().map(|p| p as usize), Some(START + SIZE));
        assert_eq!(addr(heap.grow(1)), Err(Errno::OutOfMemory));
    }

    #[test]
    fn test_failed_growth_leaves_cursor() {
        let heap = arena();
        assert_eq!(addr(heap.grow(0x80)), Ok(START));
        assert_eq!(addr(heap.grow(0x81)), Err(Errno::OutOfMemory));
        assert_eq!(addr(heap.grow(0x10)), Ok(START + 0x80));
        assert_eq!(addr(heap.grow(isize::MAX)), Err(Errno::OutOfMemory));
        assert_eq!(addr(heap.grow(0)), Ok(START + 0x90));
    }

    #[test]
    fn test_failed_first_request_still_sets_cursor() {
        let heap = arena();
        assert_eq!(addr(heap.grow((SIZE + 1) as isize)), Err(Errno::OutOfMemory));
        assert_eq!(heap.cursor().map(|p| p as usize), Some(START));
    }

    #[test]
    fn test_shrink_down_to_start_only() {
        let heap = arena();
        assert_eq!(addr(heap.grow(0x20)), Ok(START));
        assert_eq!(addr(heap.grow(-0x10)), Ok(START + 0x20));
        assert_eq!(addr(heap.grow(-0x11)), Err(Errno::InvalidArgument));
        assert_eq!(addr(heap.grow(isize::MIN)), Err(Errno::InvalidArgument));
        assert_eq!(addr(heap.grow(-0x10)), Ok(START + 0x10));
        assert_eq!(heap.cursor().map(|p| p as usize), Some(START));
    }
}
