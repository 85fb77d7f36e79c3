// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Cortex-M exception vector table and its fallback policy.
//!
//! Handlers are bound at compile time. A [`Handlers`] registry is built in a
//! `const` context, every unregistered slot resolves to the shared fallback
//! for its [`Class`], and [`vector_table!`](crate::vector_table) emits the
//! result as a `static` in `.vectortable.isr`. Nothing is decided at run time.

use core::fmt;
use core::mem::size_of;

use crate::arch::{Arch, Target};

/// An exception entry point.
pub type Handler = unsafe extern "C" fn();

/// The reset entry point. It never returns.
pub type ResetHandler = unsafe extern "C" fn() -> !;

/// Number of words in the table.
pub const TABLE_LEN: usize = 32;

/// Section the table is linked into, at the architecture's vector base.
pub const SECTION: &str = ".vectortable.isr";

/// Which fallback an unregistered slot gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// Unrecoverable. The fallback parks the core.
    Fault,
    /// Spurious or unused. The fallback returns immediately.
    Benign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    NonMaskableInt,
    HardFault,
    MemoryManagement,
    BusFault,
    UsageFault,
    SVCall,
    DebugMonitor,
    PendSV,
    SysTick,
}

impl Exception {
    pub const ALL: [Exception; 9] = [
        Exception::NonMaskableInt,
        Exception::HardFault,
        Exception::MemoryManagement,
        Exception::BusFault,
        Exception::UsageFault,
        Exception::SVCall,
        Exception::DebugMonitor,
        Exception::PendSV,
        Exception::SysTick,
    ];

    /// Position in the vector table.
    pub const fn slot(self) -> usize {
        match self {
            Exception::NonMaskableInt => 2,
            Exception::HardFault => 3,
            Exception::MemoryManagement => 4,
            Exception::BusFault => 5,
            Exception::UsageFault => 6,
            Exception::SVCall => 11,
            Exception::DebugMonitor => 12,
            Exception::PendSV => 14,
            Exception::SysTick => 15,
        }
    }

    pub const fn from_slot(slot: usize) -> Option<Exception> {
        let mut i = 0;
        while i < Self::ALL.len() {
            if Self::ALL[i].slot() == slot {
                return Some(Self::ALL[i]);
            }
            i += 1;
        }
        None
    }

    pub const fn class(self) -> Class {
        match self {
            Exception::NonMaskableInt
            | Exception::HardFault
            | Exception::MemoryManagement
            | Exception::BusFault
            | Exception::UsageFault => Class::Fault,
            Exception::SVCall
            | Exception::DebugMonitor
            | Exception::PendSV
            | Exception::SysTick => Class::Benign,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Exception::NonMaskableInt => "NMI",
            Exception::HardFault => "HardFault",
            Exception::MemoryManagement => "MemManage",
            Exception::BusFault => "BusFault",
            Exception::UsageFault => "UsageFault",
            Exception::SVCall => "SVC",
            Exception::DebugMonitor => "DebugMon",
            Exception::PendSV => "PendSV",
            Exception::SysTick => "SysTick",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared fallback for benign exceptions.
#[cfg_attr(target_os = "none", export_name = "Default_Handler")]
pub extern "C" fn default_handler() {}

/// Shared fallback for faults: a halted processor.
#[cfg_attr(target_os = "none", export_name = "Fault_Handler")]
pub extern "C" fn fault_handler() {
    unhandled_fault()
}

/// The terminal state behind [`fault_handler`]. Nothing runs after it.
pub fn unhandled_fault() -> ! {
    Target::park()
}

/// Compile-time handler registry. A registered handler wins over the class fallback;
/// registering the same exception twice keeps the later one.
#[derive(Clone, Copy)]
pub struct Handlers {
    slots: [Option<Handler>; Exception::ALL.len()],
}

impl Handlers {
    pub const fn new() -> Self {
        Self {
            slots: [None; Exception::ALL.len()],
        }
    }

    pub const fn with(mut self, exception: Exception, handler: Handler) -> Self {
        self.slots[exception.index()] = Some(handler);
        self
    }

    pub const fn is_overridden(&self, exception: Exception) -> bool {
        self.slots[exception.index()].is_some()
    }

    pub const fn resolve(&self, exception: Exception) -> Handler {
        match self.slots[exception.index()] {
            Some(handler) => handler,
            None => match exception.class() {
                Class::Fault => fault_handler,
                Class::Benign => default_handler,
            },
        }
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for exception in Exception::ALL {
            let binding = if self.is_overridden(exception) {
                "registered"
            } else {
                match exception.class() {
                    Class::Fault => "Fault_Handler",
                    Class::Benign => "Default_Handler",
                }
            };
            map.entry(&exception.name(), &binding);
        }
        map.finish()
    }
}

/// One table word.
#[derive(Clone, Copy)]
#[repr(C)]
pub union Vector {
    stack: *const u32,
    reset: ResetHandler,
    handler: Handler,
    reserved: usize,
}

/// Decoded view of a table word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    StackTop(*const u32),
    Reset(ResetHandler),
    Handler(Exception, Handler),
    Reserved,
}

#[repr(C)]
pub struct VectorTable {
    entries: [Vector; TABLE_LEN],
}

const _: () = assert!(size_of::<VectorTable>() == TABLE_LEN * size_of::<usize>());

unsafe impl Sync for VectorTable {}

impl VectorTable {
    pub const fn new(stack_top: *const u32, reset: ResetHandler, handlers: &Handlers) -> Self {
        let mut entries = [Vector { reserved: 0 }; TABLE_LEN];
        entries[0] = Vector { stack: stack_top };
        entries[1] = Vector { reset };

        let mut i = 0;
        while i < Exception::ALL.len() {
            let exception = Exception::ALL[i];
            entries[exception.slot()] = Vector {
                handler: handlers.resolve(exception),
            };
            i += 1;
        }

        Self { entries }
    }

    pub fn stack_top(&self) -> *const u32 {
        unsafe { self.entries[0].stack }
    }

    pub fn reset(&self) -> ResetHandler {
        unsafe { self.entries[1].reset }
    }

    pub fn handler(&self, exception: Exception) -> Handler {
        unsafe { self.entries[exception.slot()].handler }
    }

    pub fn entry(&self, slot: usize) -> Option<Entry> {
        let vector = self.entries.get(slot)?;
        let entry = match slot {
            0 => Entry::StackTop(unsafe { vector.stack }),
            1 => Entry::Reset(unsafe { vector.reset }),
            _ => match Exception::from_slot(slot) {
                Some(exception) => Entry::Handler(exception, unsafe { vector.handler }),
                None => Entry::Reserved,
            },
        };
        Some(entry)
    }

    pub fn is_reserved(&self, slot: usize) -> bool {
        matches!(self.entry(slot), Some(Entry::Reserved))
    }

    /// Raw word as the core fetches it.
    pub fn word(&self, slot: usize) -> Option<usize> {
        self.entries.get(slot).map(|v| unsafe { v.reserved })
    }
}

/// Emits the image's vector table from a `const` [`Handlers`] expression.
///
/// ```ignore
/// labwired_rt::vector_table!(Handlers::new().with(Exception::SysTick, on_tick));
/// ```
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[macro_export]
macro_rules! vector_table {
    ($handlers:expr) => {
        #[link_section = ".vectortable.isr"]
        #[no_mangle]
        #[used]
        pub static isr_vector: $crate::vectors::VectorTable = $crate::vectors::VectorTable::new(
            unsafe { ::core::ptr::addr_of!($crate::layout::symbols::_estack) },
            $crate::arch::Reset_Handler,
            &$handlers,
        );
    };
}
