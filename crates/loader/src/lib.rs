// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use labwired_core::memory::ProgramImage;
use labwired_rt::{InitRegion, MemoryLayout, Region};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Boundary symbols every image must define.
pub const REQUIRED_SYMBOLS: [&str; 8] = [
    "_sbss",
    "_ebss",
    "_sdata",
    "_edata",
    "_sidata",
    "__heap_start__",
    "__heap_end__",
    "_estack",
];

/// Auxiliary region symbols. All three or none.
pub const DATA2_SYMBOLS: [&str; 3] = ["_sdata2", "_edata2", "_sidata2"];

/// A firmware file with everything the bring-up needs from it.
#[derive(Debug, Clone)]
pub struct Firmware {
    pub image: ProgramImage,
    pub layout: MemoryLayout,
    pub symbols: HashMap<String, u64>,
}

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    parse_elf(&buffer)
}

pub fn parse_elf(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    info!("ELF Entry Point: {:#x}", elf.entry);

    let mut program_image = ProgramImage::new(elf.entry);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }
        // Physical address (LMA): initialized data is placed at its load image.
        let start_addr = ph.p_paddr;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let end = offset
            .checked_add(size)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;
        program_image.add_segment(start_addr, buffer[offset..end].to_vec());
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

/// Named symbols from `.symtab`.
pub fn symbols(buffer: &[u8]) -> Result<HashMap<String, u64>> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;
    let mut table = HashMap::new();
    for sym in elf.syms.iter() {
        if let Some(name) = elf.strtab.get_at(sym.st_name) {
            if !name.is_empty() {
                table.insert(name.to_string(), sym.st_value);
            }
        }
    }
    debug!("Read {} symbols", table.len());
    Ok(table)
}

fn addr(value: u64, name: &str) -> Result<usize> {
    usize::try_from(value).with_context(|| format!("Symbol '{}' = {:#x} is out of range", name, value))
}

/// Builds the memory layout from linker boundary symbols.
pub fn layout_from_symbols<F>(lookup: F) -> Result<MemoryLayout>
where
    F: Fn(&str) -> Option<u64>,
{
    let get = |name: &str| -> Result<usize> {
        let value = lookup(name).ok_or_else(|| anyhow!("Missing linker symbol '{}'", name))?;
        addr(value, name)
    };

    let data2 = match DATA2_SYMBOLS.map(|name| lookup(name)) {
        [None, None, None] => InitRegion::empty(),
        [Some(start), Some(end), Some(load)] => InitRegion::new(
            addr(start, DATA2_SYMBOLS[0])?,
            addr(end, DATA2_SYMBOLS[1])?,
            addr(load, DATA2_SYMBOLS[2])?,
        ),
        found => {
            let missing: Vec<_> = DATA2_SYMBOLS
                .iter()
                .zip(found)
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();
            bail!(
                "Auxiliary data region is partially defined, missing {}",
                missing.join(", ")
            );
        }
    };

    Ok(MemoryLayout {
        bss: Region::new(get("_sbss")?, get("_ebss")?),
        data: InitRegion::new(get("_sdata")?, get("_edata")?, get("_sidata")?),
        data2,
        heap: Region::new(get("__heap_start__")?, get("__heap_end__")?),
        stack_top: get("_estack")?,
    })
}

pub fn layout_from_elf(path: &Path) -> Result<MemoryLayout> {
    Ok(load_firmware(path)?.layout)
}

pub fn load_firmware(path: &Path) -> Result<Firmware> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    let image = parse_elf(&buffer)?;
    let symbols = symbols(&buffer)?;
    let layout = layout_from_symbols(|name| symbols.get(name).copied())
        .with_context(|| format!("Invalid bring-up symbols in {:?}", path))?;
    info!(
        "Layout: bss {}, data {}, heap {}, stack top {:#x}",
        layout.bss, layout.data.dest, layout.heap, layout.stack_top
    );
    Ok(Firmware {
        image,
        layout,
        symbols,
    })
}
