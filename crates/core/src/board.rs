// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use crate::memory::{ProgramImage, Segment};
use crate::{BringUpObserver, Bus, Phase, SimResult, SimulationError};
use labwired_config::TargetDescriptor;
use labwired_rt::layout::WORD;
use labwired_rt::{Console, HeapCursor, InitRegion, MemoryLayout, Region, Sequencer, Shim};
use labwired_rt::{Startup, StatusCell};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Byte pattern RAM holds before bring-up, so stale contents stay visible.
pub const RAM_FILL: u8 = 0xA5;

/// Entries 0 and 1 of the vector table, as the core fetches them out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetVector {
    pub stack_top: u32,
    pub entry: u32,
}

/// State of the memory image at the moment the entry point is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemoryCheck {
    pub bss_zeroed: bool,
    pub data_copied: bool,
    pub data2_copied: bool,
}

impl MemoryCheck {
    pub fn passed(&self) -> bool {
        self.bss_zeroed && self.data_copied && self.data2_copied
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BringUpReport {
    pub target: String,
    pub exit_code: i32,
    pub console: String,
    /// Raw status cell value after the application returned.
    pub status: i32,
    pub errno: Option<&'static str>,
    pub heap_cursor: Option<u64>,
    pub memory: MemoryCheck,
    pub reset_vector: Option<ResetVector>,
}

type SharedBus = Rc<RefCell<SystemBus>>;

/// Console backed by the UART data register on the simulated bus.
#[derive(Debug)]
pub struct BusConsole {
    bus: SharedBus,
    addr: u64,
    observers: Vec<Arc<dyn BringUpObserver>>,
}

impl Console for BusConsole {
    fn put(&self, byte: u8) {
        match self.bus.borrow_mut().write_u8(self.addr, byte) {
            Ok(()) => {
                for observer in &self.observers {
                    observer.on_console_byte(byte);
                }
            }
            Err(e) => warn!("Console write dropped: {}", e),
        }
    }

    fn get(&self) -> u8 {
        self.bus.borrow_mut().read_u8(self.addr).unwrap_or_else(|e| {
            warn!("Console read failed: {}", e);
            0
        })
    }
}

/// Word view the sequencer drives. The first faulting address is kept and the
/// access itself reads as zero.
struct SequencerBus<'a> {
    bus: &'a RefCell<SystemBus>,
    layout: MemoryLayout,
    observers: &'a [Arc<dyn BringUpObserver>],
    violation: &'a Cell<Option<u64>>,
    phase: Cell<Option<Phase>>,
}

impl<'a> SequencerBus<'a> {
    fn new(
        bus: &'a RefCell<SystemBus>,
        layout: MemoryLayout,
        observers: &'a [Arc<dyn BringUpObserver>],
        violation: &'a Cell<Option<u64>>,
    ) -> Self {
        Self {
            bus,
            layout,
            observers,
            violation,
            phase: Cell::new(None),
        }
    }

    fn record(&self, err: SimulationError, addr: u64) {
        warn!("Bring-up access failed: {}", err);
        if self.violation.get().is_none() {
            self.violation.set(Some(addr));
        }
    }

    fn phase_of(&self, addr: usize) -> Option<Phase> {
        if self.layout.bss.contains(addr) {
            Some(Phase::ZeroFill)
        } else if self.layout.data.dest.contains(addr) {
            Some(Phase::CopyData)
        } else if self.layout.data2.dest.contains(addr) {
            Some(Phase::CopyData2)
        } else {
            None
        }
    }
}

impl labwired_rt::Bus for SequencerBus<'_> {
    fn read_u32(&self, addr: usize) -> u32 {
        match self.bus.borrow_mut().read_u32(addr as u64) {
            Ok(word) => word,
            Err(e) => {
                self.record(e, addr as u64);
                0
            }
        }
    }

    fn write_u32(&mut self, addr: usize, value: u32) {
        if let Err(e) = self.bus.borrow_mut().write_u32(addr as u64, value) {
            self.record(e, addr as u64);
            return;
        }
        let Some(phase) = self.phase_of(addr) else {
            return;
        };
        if self.phase.get() != Some(phase) {
            debug!("{:?} begins at {:#x}", phase, addr);
            self.phase.set(Some(phase));
        }
        for observer in self.observers {
            observer.on_word_written(phase, addr as u64);
        }
    }
}

fn region_words(bus: &mut SystemBus, region: Region) -> Option<Vec<u32>> {
    (region.start..region.end)
        .step_by(WORD)
        .map(|addr| bus.read_u32(addr as u64).ok())
        .collect()
}

/// Load images as they were before reset, so a clobbered image is not
/// compared against itself.
#[derive(Debug, Default)]
struct LoadImages {
    data: Option<Vec<u32>>,
    data2: Option<Vec<u32>>,
}

impl LoadImages {
    fn capture(bus: &mut SystemBus, layout: &MemoryLayout) -> Self {
        Self {
            data: region_words(bus, layout.data.source_region()),
            data2: region_words(bus, layout.data2.source_region()),
        }
    }
}

fn is_copied(bus: &mut SystemBus, init: &InitRegion, image: Option<&[u32]>) -> bool {
    if init.dest.is_empty() || init.is_in_place() {
        return true;
    }
    match (region_words(bus, init.dest), image) {
        (Some(dest), Some(image)) => dest == image,
        _ => false,
    }
}

struct BoardStartup<'a, S, A> {
    bus: &'a RefCell<SystemBus>,
    layout: MemoryLayout,
    images: LoadImages,
    violation: &'a Cell<Option<u64>>,
    shim: &'a Shim<'a, BusConsole>,
    static_init: S,
    app: Option<A>,
    memory: MemoryCheck,
}

impl<S, A> Startup for BoardStartup<'_, S, A>
where
    S: FnMut(),
    A: FnOnce(&Shim<'_, BusConsole>) -> i32,
{
    fn static_init(&mut self) {
        debug!("Running static constructors");
        (self.static_init)();
    }

    fn main(&mut self) -> i32 {
        if let Some(addr) = self.violation.get() {
            warn!("Application skipped after access fault at {:#x}", addr);
            return -1;
        }
        {
            let mut bus = self.bus.borrow_mut();
            self.memory = MemoryCheck {
                bss_zeroed: region_words(&mut bus, self.layout.bss)
                    .is_some_and(|words| words.iter().all(|&w| w == 0)),
                data_copied: is_copied(
                    &mut bus,
                    &self.layout.data,
                    self.images.data.as_deref(),
                ),
                data2_copied: is_copied(
                    &mut bus,
                    &self.layout.data2,
                    self.images.data2.as_deref(),
                ),
            };
        }
        debug!("Entering application: {:?}", self.memory);
        match self.app.take() {
            Some(app) => app(self.shim),
            None => 0,
        }
    }
}

/// A simulated board wired from a target descriptor.
#[derive(Debug)]
pub struct Board {
    target: TargetDescriptor,
    layout: MemoryLayout,
    bus: SharedBus,
    observers: Vec<Arc<dyn BringUpObserver>>,
}

impl Board {
    pub fn from_descriptor(target: &TargetDescriptor) -> SimResult<Self> {
        target.validate()?;
        let layout = target.layout()?;
        let mut bus = SystemBus::from_target(target)?;
        bus.ram.fill(RAM_FILL);

        info!("Board '{}' ({})", target.name, target.arch.as_str());
        Ok(Self {
            target: target.clone(),
            layout,
            bus: Rc::new(RefCell::new(bus)),
            observers: Vec::new(),
        })
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BringUpObserver>) {
        self.observers.push(observer);
    }

    /// Places every segment of `image` in flash or RAM.
    pub fn load(&mut self, image: &ProgramImage) -> SimResult<()> {
        let mut bus = self.bus.borrow_mut();
        for segment in &image.segments {
            if !bus.load_segment(segment) {
                warn!(
                    "Failed to load segment at {:#x} - outside of memory map",
                    segment.start_addr
                );
            }
        }
        info!(
            "Loaded {} bytes in {} segments",
            image.total_bytes(),
            image.segments.len()
        );
        Ok(())
    }

    /// Writes `words` at `addr` the way a programmer would, flash included.
    pub fn program_words(&mut self, addr: u64, words: &[u32]) -> SimResult<()> {
        let segment = Segment {
            start_addr: addr,
            data: words.iter().flat_map(|w| w.to_le_bytes()).collect(),
        };
        if self.bus.borrow_mut().load_segment(&segment) {
            Ok(())
        } else {
            Err(SimulationError::MemoryViolation(addr))
        }
    }

    pub fn read_u32(&self, addr: u64) -> SimResult<u32> {
        self.bus.borrow_mut().read_u32(addr)
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.bus.borrow_mut().write_u32(addr, value)
    }

    /// Queues bytes for `__io_getchar`.
    pub fn push_input(&mut self, bytes: &[u8]) {
        if let Some(uart) = self.bus.borrow_mut().uart_mut() {
            uart.push_input(bytes);
        }
    }

    pub fn console_output(&self) -> Vec<u8> {
        self.bus
            .borrow()
            .uart()
            .map(|uart| uart.transmitted().to_vec())
            .unwrap_or_default()
    }

    pub fn reset_vector(&self) -> SimResult<ResetVector> {
        if !self.target.arch.has_vector_table() {
            return Err(SimulationError::NoVectorTable(self.target.name.clone()));
        }
        let base = self.target.vector_table;
        let mut bus = self.bus.borrow_mut();
        Ok(ResetVector {
            stack_top: bus.read_u32(base)?,
            entry: bus.read_u32(base + WORD as u64)?,
        })
    }

    /// Runs the reset sequence over simulated memory, then `app` with a shim
    /// whose console is the board's UART.
    ///
    /// `static_init` stands in for the constructor arrays. Calling `exit` from
    /// `app` parks the core, which on the host is a panic.
    pub fn bring_up<S, A>(&mut self, static_init: S, app: A) -> SimResult<BringUpReport>
    where
        S: FnMut(),
        A: FnOnce(&Shim<'_, BusConsole>) -> i32,
    {
        let reset_vector = self.reset_vector().ok();
        if let Some(vector) = &reset_vector {
            if vector.stack_top as u64 != self.layout.stack_top as u64 {
                warn!(
                    "Vector table stack pointer {:#x} differs from layout stack top {:#x}",
                    vector.stack_top, self.layout.stack_top
                );
            }
        }

        let status = StatusCell::new();
        let heap = HeapCursor::new(
            self.layout.heap.start as *mut u8,
            self.layout.heap.end as *mut u8,
        );
        let console = BusConsole {
            bus: self.bus.clone(),
            addr: self.target.console,
            observers: self.observers.clone(),
        };
        let shim = Shim::new(console, &status, heap, self.target.pacing());

        for observer in &self.observers {
            observer.on_bring_up_start();
        }
        info!(
            "Bring-up: bss {}, data {} <- {:#x}, data2 {} <- {:#x}",
            self.layout.bss,
            self.layout.data.dest,
            self.layout.data.source,
            self.layout.data2.dest,
            self.layout.data2.source
        );

        let images = LoadImages::capture(&mut self.bus.borrow_mut(), &self.layout);
        let violation = Cell::new(None);
        let mut seq_bus =
            SequencerBus::new(&self.bus, self.layout, &self.observers, &violation);
        let mut startup = BoardStartup {
            bus: &self.bus,
            layout: self.layout,
            images,
            violation: &violation,
            shim: &shim,
            static_init,
            app: Some(app),
            memory: MemoryCheck::default(),
        };
        let exit_code = Sequencer::new(&mut seq_bus, self.layout).run(&mut startup);

        for observer in &self.observers {
            observer.on_bring_up_stop(exit_code);
        }
        if let Some(addr) = violation.get() {
            return Err(SimulationError::MemoryViolation(addr));
        }

        let console = self
            .bus
            .borrow_mut()
            .uart_mut()
            .map(|uart| uart.take_transmitted())
            .unwrap_or_default();
        let report = BringUpReport {
            target: self.target.name.clone(),
            exit_code,
            console: String::from_utf8_lossy(&console).into_owned(),
            status: status.get(),
            errno: status.errno().map(|e| e.name()),
            heap_cursor: shim.heap().cursor().map(|p| p as usize as u64),
            memory: startup.memory,
            reset_vector,
        };
        info!(
            "Application returned {} (status {}, {} console bytes)",
            report.exit_code,
            report.status,
            console.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::BringUpMetrics;
    use std::sync::Mutex;

    const TARGET: &str = r#"
name: test-board
arch: cortex-m
flash: { base: 0x0, size: "4 KiB" }
ram: { base: 0x20000000, size: "4 KiB" }
layout:
  stack_top: 0x20001000
  bss: { start: 0x20000010, end: 0x20000020 }
  data: { start: 0x20000000, end: 0x20000008, load: 0x00000400 }
  heap: { start: 0x20000100, end: 0x20000200 }
"#;

    fn board() -> Board {
        let target = TargetDescriptor::from_yaml(TARGET).unwrap();
        let mut board = Board::from_descriptor(&target).unwrap();
        board
            .program_words(0x400, &[0x1122_3344, 0x5566_7788])
            .unwrap();
        board
    }

    #[test]
    fn test_bring_up_end_to_end() {
        let mut board = board();
        assert_eq!(board.read_u32(0x2000_0010).unwrap(), 0xA5A5_A5A5);

        let mut seen = None;
        let report = board
            .bring_up(
                || {},
                |shim| {
                    seen = Some(shim.write(1, b"!"));
                    0
                },
            )
            .unwrap();

        assert_eq!(seen, Some(1));
        assert!(report.memory.passed());
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.console, "!");
        assert_eq!(report.status, 0);
        assert_eq!(report.errno, None);
        assert_eq!(board.read_u32(0x2000_0000).unwrap(), 0x1122_3344);
        assert_eq!(board.read_u32(0x2000_0004).unwrap(), 0x5566_7788);
        for addr in (0x2000_0010..0x2000_0020).step_by(4) {
            assert_eq!(board.read_u32(addr).unwrap(), 0);
        }
    }

    #[test]
    fn test_static_init_runs_before_application() {
        let mut board = board();
        let events = RefCell::new(Vec::new());
        board
            .bring_up(
                || events.borrow_mut().push("static_init"),
                |_| {
                    events.borrow_mut().push("main");
                    7
                },
            )
            .unwrap();
        assert_eq!(*events.borrow(), vec!["static_init", "main"]);
    }

    #[test]
    fn test_heap_and_status_reach_the_report() {
        let mut board = board();
        let report = board
            .bring_up(
                || {},
                |shim| {
                    assert_eq!(shim.sbrk(0x40) as usize, 0x2000_0100);
                    assert_eq!(shim.sbrk(0x1000), labwired_rt::syscalls::SBRK_FAILED);
                    shim.fork()
                },
            )
            .unwrap();
        assert_eq!(report.exit_code, -1);
        assert_eq!(report.heap_cursor, Some(0x2000_0140));
        assert_eq!(report.status, 11);
        assert_eq!(report.errno, Some("EAGAIN"));
    }

    #[test]
    fn test_console_input_reaches_getchar() {
        let mut board = board();
        board.push_input(b"hi");
        let report = board
            .bring_up(
                || {},
                |shim| {
                    let a = shim.getchar();
                    let b = shim.getchar();
                    shim.putchar(b);
                    shim.putchar(a);
                    shim.getchar()
                },
            )
            .unwrap();
        assert_eq!(report.console, "ih");
        assert_eq!(report.exit_code, 0);
    }

    #[test]
    fn test_metrics_observer_counts_phases() {
        let mut board = board();
        let metrics = Arc::new(BringUpMetrics::new());
        board.add_observer(metrics.clone());
        board
            .bring_up(
                || {},
                |shim| {
                    shim.write(1, b"abc");
                    0
                },
            )
            .unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.zeroed_words, 4);
        assert_eq!(snapshot.copied_words, 2);
        assert_eq!(snapshot.console_bytes, 3);
    }

    #[test]
    fn test_reset_vector_from_flash() {
        let mut board = board();
        board.program_words(0x0, &[0x2000_1000, 0x0000_0101]).unwrap();
        assert_eq!(
            board.reset_vector().unwrap(),
            ResetVector {
                stack_top: 0x2000_1000,
                entry: 0x101
            }
        );

        let report = board.bring_up(|| {}, |_| 0).unwrap();
        assert_eq!(report.reset_vector.map(|v| v.entry), Some(0x101));
    }

    #[test]
    fn test_report_serializes_for_tooling() {
        let mut board = board();
        let report = board.bring_up(|| {}, |shim| shim.kill(1, 9)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["target"], "test-board");
        assert_eq!(json["exit_code"], -1);
        assert_eq!(json["errno"], "EINVAL");
        assert_eq!(json["memory"]["bss_zeroed"], true);
        assert!(json["heap_cursor"].is_null());
    }

    #[test]
    fn test_riscv_has_no_vector_table() {
        let yaml = TARGET.replace("arch: cortex-m", "arch: riscv32");
        let target = TargetDescriptor::from_yaml(&yaml).unwrap();
        let board = Board::from_descriptor(&target).unwrap();
        assert!(matches!(
            board.reset_vector(),
            Err(SimulationError::NoVectorTable(_))
        ));
    }

    #[test]
    fn test_flash_rejects_program_outside_map() {
        let mut board = board();
        assert!(matches!(
            board.program_words(0x1000_0000, &[1]),
            Err(SimulationError::MemoryViolation(0x1000_0000))
        ));
    }

    #[test]
    fn test_sequencer_bus_keeps_first_violation() {
        let board = board();
        let layout = *board.layout();
        let violation = Cell::new(None);
        let mut bus = SequencerBus::new(&board.bus, layout, &[], &violation);

        labwired_rt::Bus::write_u32(&mut bus, 0x3000_0000, 1);
        assert_eq!(labwired_rt::Bus::read_u32(&bus, 0x3000_0010), 0);
        assert_eq!(violation.get(), Some(0x3000_0000));

        // Flash is not writable from the sequencer either.
        let fresh_violation = Cell::new(None);
        let mut fresh = SequencerBus::new(&board.bus, layout, &[], &fresh_violation);
        labwired_rt::Bus::write_u32(&mut fresh, 0x400, 0);
        assert_eq!(fresh_violation.get(), Some(0x400));
    }

    #[derive(Debug, Default)]
    struct StopRecorder {
        exit_code: Mutex<Option<i32>>,
    }

    impl BringUpObserver for StopRecorder {
        fn on_bring_up_stop(&self, exit_code: i32) {
            *self.exit_code.lock().unwrap() = Some(exit_code);
        }
    }

    #[test]
    fn test_access_fault_skips_application() {
        let mut board = board();
        board.layout.bss = Region::new(0x3000_0000, 0x3000_0010);
        let recorder = Arc::new(StopRecorder::default());
        board.add_observer(recorder.clone());

        let mut ran = false;
        let result = board.bring_up(
            || {},
            |_| {
                ran = true;
                0
            },
        );

        assert!(matches!(
            result,
            Err(SimulationError::MemoryViolation(0x3000_0000))
        ));
        assert!(!ran);
        assert_eq!(*recorder.exit_code.lock().unwrap(), Some(-1));
    }

    #[test]
    fn test_clobbered_load_image_fails_memory_check() {
        let mut board = board();
        board.layout.data = InitRegion::new(0x2000_0000, 0x2000_0008, 0x2000_0010);
        board
            .program_words(0x2000_0010, &[0x1122_3344, 0x5566_7788])
            .unwrap();

        let report = board.bring_up(|| {}, |_| 0).unwrap();

        assert_eq!(board.read_u32(0x2000_0000).unwrap(), 0);
        assert!(report.memory.bss_zeroed);
        assert!(!report.memory.data_copied);
        assert!(report.memory.data2_copied);
        assert!(!report.memory.passed());
    }
}
