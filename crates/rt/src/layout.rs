// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Memory region descriptors supplied by the linker script.

use core::fmt;

/// Copy unit of the sequencer, in bytes.
pub const WORD: usize = core::mem::size_of::<u32>();

/// Half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn empty() -> Self {
        Self::new(0, 0)
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Number of whole words in the region.
    pub const fn words(&self) -> usize {
        self.len() / WORD
    }

    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Empty regions never overlap anything.
    pub const fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    pub const fn is_word_aligned(&self) -> bool {
        self.start % WORD == 0 && self.end % WORD == 0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x})", self.start, self.end)
    }
}

/// Initialized-data region: runtime destination plus the address of its load image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitRegion {
    pub dest: Region,
    pub source: usize,
}

impl InitRegion {
    pub const fn new(start: usize, end: usize, source: usize) -> Self {
        Self {
            dest: Region::new(start, end),
            source,
        }
    }

    pub const fn empty() -> Self {
        Self::new(0, 0, 0)
    }

    /// The load image, sized like the destination.
    pub const fn source_region(&self) -> Region {
        Region::new(self.source, self.source + self.dest.len())
    }

    /// Executing from RAM links the image in place and nothing needs copying.
    pub const fn is_in_place(&self) -> bool {
        self.dest.start == self.source
    }
}

/// The boundaries the bring-up consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    pub bss: Region,
    pub data: InitRegion,
    /// Auxiliary initialized region for globals placed in `.dat2`.
    pub data2: InitRegion,
    pub heap: Region,
    pub stack_top: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Bss,
    Data,
    Data2,
    Heap,
}

impl RegionKind {
    pub const fn name(self) -> &'static str {
        match self {
            RegionKind::Bss => ".bss",
            RegionKind::Data => ".data",
            RegionKind::Data2 => ".dat2",
            RegionKind::Heap => "heap",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A violation of the layout contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    Inverted { region: RegionKind, start: usize, end: usize },
    Misaligned { region: RegionKind, addr: usize },
    Overlap { first: RegionKind, second: RegionKind },
    SourceOverlap { region: RegionKind },
    SourceClobbered { region: RegionKind, by: RegionKind },
    HeapAboveStack { heap_end: usize, stack_top: usize },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Inverted { region, start, end } => {
                write!(f, "{region} ends at {end:#x} before it starts at {start:#x}")
            }
            LayoutError::Misaligned { region, addr } => {
                write!(f, "{region} boundary {addr:#x} is not word aligned")
            }
            LayoutError::Overlap { first, second } => write!(f, "{first} overlaps {second}"),
            LayoutError::SourceOverlap { region } => {
                write!(f, "{region} load image partially overlaps its destination")
            }
            LayoutError::SourceClobbered { region, by } => {
                write!(f, "{region} load image lies in {by}, which is written before it is read")
            }
            LayoutError::HeapAboveStack {
                heap_end,
                stack_top,
            } => write!(
                f,
                "heap end {heap_end:#x} lies above the initial stack pointer {stack_top:#x}"
            ),
        }
    }
}

impl core::error::Error for LayoutError {}

impl MemoryLayout {
    /// Checks the contract the sequencer relies on. Never called on the reset path.
    pub fn check(&self) -> Result<(), LayoutError> {
        let regions = [
            (RegionKind::Bss, self.bss),
            (RegionKind::Data, self.data.dest),
            (RegionKind::Data2, self.data2.dest),
            (RegionKind::Heap, self.heap),
        ];

        for (kind, region) in regions {
            if region.end < region.start {
                return Err(LayoutError::Inverted {
                    region: kind,
                    start: region.start,
                    end: region.end,
                });
            }
        }

        // The heap is handed out byte-wise, everything else is copied in words.
        for (kind, region) in &regions[..3] {
            if region.start % WORD != 0 {
                return Err(LayoutError::Misaligned {
                    region: *kind,
                    addr: region.start,
                });
            }
            if region.end % WORD != 0 {
                return Err(LayoutError::Misaligned {
                    region: *kind,
                    addr: region.end,
                });
            }
        }

        for (kind, init) in [
            (RegionKind::Data, &self.data),
            (RegionKind::Data2, &self.data2),
        ] {
            if init.dest.is_empty() || init.is_in_place() {
                continue;
            }
            if init.source % WORD != 0 {
                return Err(LayoutError::Misaligned {
                    region: kind,
                    addr: init.source,
                });
            }
            if init.source_region().overlaps(&init.dest) {
                return Err(LayoutError::SourceOverlap { region: kind });
            }
        }

        // Zero-fill runs before `.data` is copied, and `.data` before `.dat2`.
        // The heap belongs to the application.
        let before_data = [(RegionKind::Bss, self.bss), (RegionKind::Heap, self.heap)];
        let before_data2 = [
            (RegionKind::Bss, self.bss),
            (RegionKind::Data, self.data.dest),
            (RegionKind::Heap, self.heap),
        ];
        for (kind, init, written) in [
            (RegionKind::Data, &self.data, &before_data[..]),
            (RegionKind::Data2, &self.data2, &before_data2[..]),
        ] {
            if init.dest.is_empty() || init.is_in_place() {
                continue;
            }
            let image = init.source_region();
            for (by, region) in written {
                if image.overlaps(region) {
                    return Err(LayoutError::SourceClobbered {
                        region: kind,
                        by: *by,
                    });
                }
            }
        }

        for (i, (first, a)) in regions.iter().enumerate() {
            for (second, b) in &regions[i + 1..] {
                if a.overlaps(b) {
                    return Err(LayoutError::Overlap {
                        first: *first,
                        second: *second,
                    });
                }
            }
        }

        if !self.heap.is_empty() && self.heap.end > self.stack_top {
            return Err(LayoutError::HeapAboveStack {
                heap_end: self.heap.end,
                stack_top: self.stack_top,
            });
        }

        Ok(())
    }
}

/// Boundary symbols defined by the linker script.
#[cfg(target_os = "none")]
#[doc(hidden)]
pub mod symbols {
    extern "C" {
        pub static mut _sbss: u32;
        pub static mut _ebss: u32;
        pub static mut _sdata: u32;
        pub static mut _edata: u32;
        pub static _sidata: u32;
        pub static mut _sdata2: u32;
        pub static mut _edata2: u32;
        pub static _sidata2: u32;
        pub static mut __heap_start__: u8;
        pub static mut __heap_end__: u8;
        pub static _estack: u32;
    }
}

/// The layout the image was linked with.
#[cfg(target_os = "none")]
pub fn linked() -> MemoryLayout {
    use core::ptr::{addr_of, addr_of_mut};
    use symbols::*;

    unsafe {
        MemoryLayout {
            bss: Region::new(addr_of_mut!(_sbss) as usize, addr_of_mut!(_ebss) as usize),
            data: InitRegion::new(
                addr_of_mut!(_sdata) as usize,
                addr_of_mut!(_edata) as usize,
                addr_of!(_sidata) as usize,
            ),
            data2: InitRegion::new(
                addr_of_mut!(_sdata2) as usize,
                addr_of_mut!(_edata2) as usize,
                addr_of!(_sidata2) as usize,
            ),
            heap: Region::new(
                addr_of_mut!(__heap_start__) as usize,
                addr_of_mut!(__heap_end__) as usize,
            ),
            stack_top: addr_of!(_estack) as usize,
        }
    }
}
