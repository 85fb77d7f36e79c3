// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use labwired_rt::{InitRegion, LayoutError, MemoryLayout, Region, WritePacing};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Size of the Cortex-M table the bring-up emits.
pub const VECTOR_TABLE_BYTES: u64 = labwired_rt::vectors::TABLE_LEN as u64 * 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid size '{value}' for {field}: {reason}")]
    InvalidSize {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("Memory '{0}' has zero size")]
    EmptyMemory(&'static str),
    #[error("{region} [{start:#x}, {end:#x}) lies outside {memory}")]
    OutsideMemory {
        region: &'static str,
        start: u64,
        end: u64,
        memory: &'static str,
    },
    #[error("Address {0:#x} does not fit the host address width")]
    AddressOverflow(u64),
    #[error("Invalid layout: {0}")]
    Layout(#[from] LayoutError),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Arch {
    CortexM,
    Riscv32,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::CortexM => "cortex-m",
            Arch::Riscv32 => "riscv32",
        }
    }

    /// Only Cortex-M reads its initial stack pointer and reset entry from a table.
    pub fn has_vector_table(&self) -> bool {
        matches!(self, Arch::CortexM)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64 KiB"
}

impl MemoryRange {
    pub fn bytes(&self, field: &'static str) -> Result<u64, ConfigError> {
        let bytes = parse_size(&self.size).map_err(|reason| ConfigError::InvalidSize {
            field,
            value: self.size.clone(),
            reason,
        })?;
        if bytes == 0 {
            return Err(ConfigError::EmptyMemory(field));
        }
        Ok(bytes)
    }

    pub fn contains(&self, start: u64, end: u64) -> bool {
        match parse_size(&self.size) {
            Ok(size) => start >= self.base && end <= self.base.saturating_add(size),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RegionSpec {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InitRegionSpec {
    pub start: u64,
    pub end: u64,
    /// Load address of the image in flash (or RAM when executing in place).
    pub load: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LayoutSpec {
    pub stack_top: u64,
    pub bss: RegionSpec,
    pub data: InitRegionSpec,
    #[serde(default)]
    pub data2: Option<InitRegionSpec>,
    pub heap: RegionSpec,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PacingConfig {
    #[default]
    Omit,
    BusyWait { cycles_per_unit: u32 },
}

impl From<PacingConfig> for WritePacing {
    fn from(config: PacingConfig) -> Self {
        match config {
            PacingConfig::Omit => WritePacing::Omit,
            PacingConfig::BusyWait { cycles_per_unit } => {
                WritePacing::BusyWait { cycles_per_unit }
            }
        }
    }
}

fn default_console() -> u64 {
    labwired_rt::console::DEFAULT_DATA_REGISTER as u64
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TargetDescriptor {
    pub name: String,
    pub arch: Arch,
    pub flash: MemoryRange,
    pub ram: MemoryRange,
    /// Byte-wide data register behind the console.
    #[serde(default = "default_console")]
    pub console: u64,
    #[serde(default)]
    pub vector_table: u64,
    pub layout: LayoutSpec,
    #[serde(default)]
    pub pacing: PacingConfig,
}

impl TargetDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open target descriptor at {:?}", path.as_ref()))?;
        let target: Self =
            serde_yaml::from_reader(f).context("Failed to parse Target Descriptor YAML")?;
        target.validate()?;
        Ok(target)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let target: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Target Descriptor YAML")?;
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.flash.bytes("flash")?;
        self.ram.bytes("ram")?;

        let l = &self.layout;
        let mut in_ram = vec![
            (".bss", l.bss.start, l.bss.end),
            (".data", l.data.start, l.data.end),
            ("heap", l.heap.start, l.heap.end),
        ];
        if let Some(data2) = &l.data2 {
            in_ram.push((".dat2", data2.start, data2.end));
        }
        for (region, start, end) in in_ram {
            if start < end && !self.ram.contains(start, end) {
                return Err(ConfigError::OutsideMemory {
                    region,
                    start,
                    end,
                    memory: "ram",
                });
            }
        }

        let images = std::iter::once((".data image", l.data)).chain(
            l.data2
                .iter()
                .map(|data2| (".dat2 image", *data2)),
        );
        for (region, init) in images {
            let start = init.load;
            let end = init.load.saturating_add(init.end.saturating_sub(init.start));
            if start < end && !self.flash.contains(start, end) && !self.ram.contains(start, end) {
                return Err(ConfigError::OutsideMemory {
                    region,
                    start,
                    end,
                    memory: "flash or ram",
                });
            }
        }

        // The initial stack pointer is one past the top of the stack.
        if !self.ram.contains(l.stack_top.saturating_sub(1), l.stack_top) {
            return Err(ConfigError::OutsideMemory {
                region: "stack top",
                start: l.stack_top,
                end: l.stack_top,
                memory: "ram",
            });
        }

        if self.arch.has_vector_table() {
            let end = self.vector_table.saturating_add(VECTOR_TABLE_BYTES);
            if !self.flash.contains(self.vector_table, end)
                && !self.ram.contains(self.vector_table, end)
            {
                return Err(ConfigError::OutsideMemory {
                    region: "vector table",
                    start: self.vector_table,
                    end,
                    memory: "flash or ram",
                });
            }
        }

        self.layout()?.check()?;
        Ok(())
    }

    /// The runtime view of the layout section.
    pub fn layout(&self) -> Result<MemoryLayout, ConfigError> {
        let l = &self.layout;
        let data2 = match &l.data2 {
            Some(d) => InitRegion::new(addr(d.start)?, addr(d.end)?, addr(d.load)?),
            None => InitRegion::empty(),
        };
        Ok(MemoryLayout {
            bss: Region::new(addr(l.bss.start)?, addr(l.bss.end)?),
            data: InitRegion::new(addr(l.data.start)?, addr(l.data.end)?, addr(l.data.load)?),
            data2,
            heap: Region::new(addr(l.heap.start)?, addr(l.heap.end)?),
            stack_top: addr(l.stack_top)?,
        })
    }

    pub fn pacing(&self) -> WritePacing {
        self.pacing.into()
    }
}

fn addr(value: u64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|_| ConfigError::AddressOverflow(value))
}

pub fn parse_size(size_str: &str) -> Result<u64, String> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| format!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
