// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Reset sequence: memory image initialization and hand-off to `main`.
//!
//! The per-architecture stub (see [`crate::arch`]) loads the stack pointer and
//! jumps to `__labwired_start`, which runs the [`Sequencer`] over physical
//! memory and parks the core if `main` ever returns.

use crate::bus::Bus;
use crate::layout::{InitRegion, MemoryLayout, Region, WORD};

/// Writes zero to every word in `[region.start, region.end)`.
pub fn zero_fill<B: Bus + ?Sized>(bus: &mut B, region: Region) {
    let mut addr = region.start;
    while addr < region.end {
        bus.write_u32(addr, 0);
        addr += WORD;
    }
}

/// Copies the load image of `region` into its destination, lowest address first.
pub fn copy_init<B: Bus + ?Sized>(bus: &mut B, region: &InitRegion) {
    let mut dst = region.dest.start;
    let mut src = region.source;
    while dst < region.dest.end {
        let word = bus.read_u32(src);
        bus.write_u32(dst, word);
        dst += WORD;
        src += WORD;
    }
}

/// What runs once the memory image is in place.
pub trait Startup {
    /// Runs every registered static constructor exactly once.
    fn static_init(&mut self);

    /// Application entry point.
    fn main(&mut self) -> i32;
}

pub struct Sequencer<'b, B: Bus + ?Sized> {
    bus: &'b mut B,
    layout: MemoryLayout,
}

impl<'b, B: Bus + ?Sized> Sequencer<'b, B> {
    pub fn new(bus: &'b mut B, layout: MemoryLayout) -> Self {
        Self { bus, layout }
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Zeroes `.bss`, then copies `.data` and `.dat2`, in that order.
    pub fn initialize_memory(&mut self) {
        zero_fill(&mut *self.bus, self.layout.bss);
        copy_init(&mut *self.bus, &self.layout.data);
        copy_init(&mut *self.bus, &self.layout.data2);
    }

    /// Initializes memory, runs the constructors and calls `main`, returning its result.
    pub fn run<S: Startup + ?Sized>(mut self, startup: &mut S) -> i32 {
        self.initialize_memory();
        startup.static_init();
        startup.main()
    }
}

#[cfg(target_os = "none")]
struct Linked;

#[cfg(target_os = "none")]
impl Startup for Linked {
    fn static_init(&mut self) {
        #[cfg(feature = "newlib")]
        {
            extern "C" {
                fn __libc_init_array();
            }
            unsafe { __libc_init_array() }
        }
        #[cfg(not(feature = "newlib"))]
        unsafe {
            crate::init_array::run()
        }
    }

    fn main(&mut self) -> i32 {
        extern "C" {
            fn main() -> core::ffi::c_int;
        }
        unsafe { main() }
    }
}

/// Rust half of the reset entry, called with a valid stack and nothing else.
///
/// # Safety
///
/// Only the reset stub may call this, exactly once, before anything reads a static.
#[cfg(target_os = "none")]
#[no_mangle]
pub unsafe extern "C" fn __labwired_start() -> ! {
    use crate::arch::{Arch, Target};

    let mut bus = crate::bus::RawBus::new();
    let _ = Sequencer::new(&mut bus, crate::layout::linked()).run(&mut Linked);
    Target::park()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Console;
    use crate::syscalls::{HeapCursor, Shim, StatusCell, WritePacing};
    use std::cell::RefCell;
    use std::rc::Rc;

    const BASE: usize = 0x2000_0000;
    const GARBAGE: u32 = 0xDEAD_BEEF;

    /// RAM window shared between the bus and whoever inspects it mid-sequence.
    #[derive(Clone)]
    struct Ram {
        words: Rc<RefCell<Vec<u32>>>,
        writes: Rc<RefCell<Vec<usize>>>,
    }

    impl Ram {
        fn new(words: usize, fill: u32) -> Self {
            Self {
                words: Rc::new(RefCell::new(vec![fill; words])),
                writes: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn word(&self, addr: usize) -> u32 {
            self.words.borrow()[(addr - BASE) / WORD]
        }

        fn set(&self, addr: usize, value: u32) {
            self.words.borrow_mut()[(addr - BASE) / WORD] = value;
        }

        fn range(&self, region: Region) -> Vec<u32> {
            (region.start..region.end)
                .step_by(WORD)
                .map(|a| self.word(a))
                .collect()
        }
    }

    impl Bus for Ram {
        fn read_u32(&self, addr: usize) -> u32 {
            self.word(addr)
        }

        fn write_u32(&mut self, addr: usize, value: u32) {
            self.writes.borrow_mut().push(addr);
            self.set(addr, value);
        }
    }

    fn layout() -> MemoryLayout {
        MemoryLayout {
            bss: Region::new(BASE + 0x10, BASE + 0x20),
            data: InitRegion::new(BASE + 0x20, BASE + 0x28, BASE + 0x80),
            data2: InitRegion::new(BASE + 0x30, BASE + 0x38, BASE + 0x90),
            heap: Region::new(BASE + 0x40, BASE + 0x80),
            stack_top: BASE + 0x100,
        }
    }

    #[test]
    fn test_zero_fill_stays_in_bounds() {
        let mut ram = Ram::new(16, GARBAGE);
        let bss = Region::new(BASE + 0x8, BASE + 0x18);
        zero_fill(&mut ram, bss);

        assert_eq!(ram.range(bss), vec![0; 4]);
        assert_eq!(ram.word(BASE + 0x4), GARBAGE);
        assert_eq!(ram.word(BASE + 0x18), GARBAGE);
    }

    #[test]
    fn test_zero_fill_empty_region_is_noop() {
        let mut ram = Ram::new(4, GARBAGE);
        zero_fill(&mut ram, Region::new(BASE + 0x8, BASE + 0x8));
        assert!(ram.writes.borrow().is_empty());
        assert_eq!(ram.range(Region::new(BASE, BASE + 0x10)), vec![GARBAGE; 4]);
    }

    #[test]
    fn test_copy_init_is_ordered_and_idempotent() {
        let mut ram = Ram::new(32, GARBAGE);
        let image = [0x0102_0304, 0x0506_0708, 0x090A_0B0C];
        for (i, w) in image.iter().enumerate() {
            ram.set(BASE + 0x40 + i * WORD, *w);
        }
        let region = InitRegion::new(BASE + 0x10, BASE + 0x1C, BASE + 0x40);

        copy_init(&mut ram, &region);
        assert_eq!(ram.range(region.dest), image.to_vec());
        assert_eq!(
            *ram.writes.borrow(),
            vec![BASE + 0x10, BASE + 0x14, BASE + 0x18]
        );
        assert_eq!(ram.word(BASE + 0x1C), GARBAGE);

        copy_init(&mut ram, &region);
        assert_eq!(ram.range(region.dest), image.to_vec());
        assert_eq!(ram.range(region.source_region()), image.to_vec());
    }

    #[test]
    fn test_initialize_memory_phase_order() {
        let mut ram = Ram::new(64, GARBAGE);
        let layout = layout();
        Sequencer::new(&mut ram, layout).initialize_memory();

        let writes = ram.writes.borrow();
        let phase = |addr: &usize| {
            if layout.bss.contains(*addr) {
                0
            } else if layout.data.dest.contains(*addr) {
                1
            } else {
                2
            }
        };
        let phases: Vec<_> = writes.iter().map(phase).collect();
        assert_eq!(phases, vec![0, 0, 0, 0, 1, 1, 2, 2]);
    }

    struct Recorder {
        ram: Ram,
        layout: MemoryLayout,
        events: Vec<&'static str>,
    }

    impl Startup for Recorder {
        fn static_init(&mut self) {
            assert_eq!(self.ram.range(self.layout.bss), vec![0; 4]);
            assert_eq!(self.ram.range(self.layout.data2.dest), vec![7, 8]);
            self.events.push("static_init");
        }

        fn main(&mut self) -> i32 {
            self.events.push("main");
            42
        }
    }

    #[test]
    fn test_run_calls_constructors_before_main() {
        let mut ram = Ram::new(64, GARBAGE);
        let layout = layout();
        ram.set(BASE + 0x90, 7);
        ram.set(BASE + 0x94, 8);

        let mut recorder = Recorder {
            ram: ram.clone(),
            layout,
            events: Vec::new(),
        };
        let code = Sequencer::new(&mut ram, layout).run(&mut recorder);

        assert_eq!(code, 42);
        assert_eq!(recorder.events, vec!["static_init", "main"]);
    }

    #[derive(Default)]
    struct Port(RefCell<Vec<u8>>);

    impl Console for Port {
        fn put(&self, byte: u8) {
            self.0.borrow_mut().push(byte);
        }

        fn get(&self) -> u8 {
            0
        }
    }

    struct App<'a> {
        ram: Ram,
        layout: MemoryLayout,
        shim: &'a Shim<'a, Port>,
        written: Option<usize>,
    }

    impl Startup for App<'_> {
        fn static_init(&mut self) {}

        fn main(&mut self) -> i32 {
            assert_eq!(self.ram.range(self.layout.bss), vec![0; 4]);
            assert_eq!(
                self.ram.range(self.layout.data.dest),
                vec![0x1122_3344, 0x5566_7788]
            );
            self.written = Some(self.shim.write(1, b"!"));
            0
        }
    }

    #[test]
    fn test_bring_up_end_to_end() {
        let mut ram = Ram::new(64, GARBAGE);
        let mut layout = layout();
        layout.data2 = InitRegion::empty();
        ram.set(BASE + 0x80, 0x1122_3344);
        ram.set(BASE + 0x84, 0x5566_7788);

        let status = StatusCell::new();
        let heap = HeapCursor::new(
            layout.heap.start as *mut u8,
            layout.heap.end as *mut u8,
        );
        let shim = Shim::new(Port::default(), &status, heap, WritePacing::Omit);

        let mut app = App {
            ram: ram.clone(),
            layout,
            shim: &shim,
            written: None,
        };
        let code = Sequencer::new(&mut ram, layout).run(&mut app);

        assert_eq!(code, 0);
        assert_eq!(app.written, Some(1));
        assert_eq!(*shim.console().0.borrow(), b"!".to_vec());
        assert_eq!(status.get(), 0);
    }
}
