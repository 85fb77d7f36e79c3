// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn end_addr(&self) -> u64 {
        self.start_addr + self.data.len() as u64
    }

    pub fn contains(&self, addr: u64, len: u64) -> bool {
        addr >= self.start_addr && addr.saturating_add(len) <= self.end_addr()
    }
}

/// Loadable contents of a firmware file, placed by physical address.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProgramImage {
    pub entry_point: u64,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u64) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    /// Little-endian word at `addr`, if a single segment covers it.
    pub fn read_u32(&self, addr: u64) -> Option<u32> {
        let segment = self.segments.iter().find(|s| s.contains(addr, 4))?;
        let offset = (addr - segment.start_addr) as usize;
        let bytes: [u8; 4] = segment.data[offset..offset + 4].try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    pub fn total_bytes(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }
}

/// A flat memory window. Flash rejects bus writes and is filled by [`LinearMemory::load_from_segment`].
#[derive(Debug)]
pub struct LinearMemory {
    pub name: &'static str,
    pub base_addr: u64,
    pub data: Vec<u8>,
    pub writable: bool,
}

impl LinearMemory {
    pub fn new(name: &'static str, size: usize, base_addr: u64, writable: bool) -> Self {
        Self {
            name,
            base_addr,
            data: vec![0; size],
            writable,
        }
    }

    pub fn end_addr(&self) -> u64 {
        self.base_addr + self.data.len() as u64
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base_addr && addr < self.end_addr()
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if self.contains(addr) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        if self.writable && self.contains(addr) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    /// Fills every byte with `value`, as RAM looks before anything has run.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        if segment.start_addr >= self.base_addr && segment.end_addr() <= self.end_addr() {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}
