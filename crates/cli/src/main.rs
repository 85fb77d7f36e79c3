// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use labwired_config::TargetDescriptor;
use labwired_core::metrics::BringUpMetrics;
use labwired_core::{Board, BringUpReport};
use labwired_rt::syscalls::SBRK_FAILED;
use labwired_rt::{InitRegion, MemoryLayout};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Words written to each load image when simulating without firmware.
const PATTERN_BASE: u32 = 0xC0DE_0000;

#[derive(Parser, Debug)]
#[command(name = "labwired-boot", author, version, about, long_about = None)]
struct Cli {
    /// Enable per-phase tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a target descriptor and print its memory layout
    Check {
        /// Path to the target descriptor (YAML)
        target: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// Read the bring-up symbols and vector table of a firmware ELF
    Inspect {
        /// Path to the firmware ELF file
        firmware: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// Run the reset sequence on a simulated board and write a message through the syscall shim
    Simulate {
        /// Path to the target descriptor (YAML)
        #[arg(short, long)]
        target: PathBuf,

        /// Firmware ELF whose load images are placed before reset
        #[arg(short, long)]
        firmware: Option<PathBuf>,

        /// Bytes the application writes to the console
        #[arg(short, long, default_value = "hello from labwired\n")]
        message: String,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so `--json` output stays parseable.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { target, json } => check(&target, json),
        Commands::Inspect { firmware, json } => inspect(&firmware, json),
        Commands::Simulate {
            target,
            firmware,
            message,
            json,
        } => simulate(&target, firmware.as_deref(), &message, json),
    }
}

fn layout_json(layout: &MemoryLayout) -> serde_json::Value {
    let init = |r: &InitRegion| {
        json!({
            "start": format!("{:#010x}", r.dest.start),
            "end": format!("{:#010x}", r.dest.end),
            "load": format!("{:#010x}", r.source),
        })
    };
    json!({
        "bss": {
            "start": format!("{:#010x}", layout.bss.start),
            "end": format!("{:#010x}", layout.bss.end),
        },
        "data": init(&layout.data),
        "data2": init(&layout.data2),
        "heap": {
            "start": format!("{:#010x}", layout.heap.start),
            "end": format!("{:#010x}", layout.heap.end),
        },
        "stack_top": format!("{:#010x}", layout.stack_top),
    })
}

fn print_layout(layout: &MemoryLayout) {
    println!("  .bss   {} ({} words)", layout.bss, layout.bss.words());
    println!(
        "  .data  {} <- {:#010x}",
        layout.data.dest, layout.data.source
    );
    if layout.data2.dest.is_empty() {
        println!("  .dat2  (empty)");
    } else {
        println!(
            "  .dat2  {} <- {:#010x}",
            layout.data2.dest, layout.data2.source
        );
    }
    println!("  heap   {} ({} bytes)", layout.heap, layout.heap.len());
    println!("  stack  top {:#010x}", layout.stack_top);
}

fn check(path: &Path, json: bool) -> Result<()> {
    info!("Loading target descriptor: {:?}", path);
    let target = TargetDescriptor::from_file(path)?;
    let layout = target.layout()?;

    if json {
        let out = json!({
            "name": target.name,
            "arch": target.arch.as_str(),
            "console": format!("{:#010x}", target.console),
            "layout": layout_json(&layout),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} ({}): OK", target.name, target.arch.as_str());
        print_layout(&layout);
        println!("  console {:#010x}", target.console);
    }
    Ok(())
}

fn inspect(path: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let sha256 = format!("{:x}", Sha256::digest(&bytes));
    let firmware = labwired_loader::load_firmware(path)?;
    let layout = firmware.layout;

    let table = firmware.symbols.get("isr_vector").copied().unwrap_or(0);
    let stack_top = firmware.image.read_u32(table);
    let reset = firmware.image.read_u32(table + 4);
    let layout_error = layout.check().err().map(|e| e.to_string());
    let stack_matches = stack_top.map(|sp| sp as u64 == layout.stack_top as u64);

    if stack_matches == Some(false) {
        warn!("Vector table stack pointer does not match _estack");
    }

    if json {
        let out = json!({
            "file": path.display().to_string(),
            "sha256": sha256,
            "entry_point": format!("{:#010x}", firmware.image.entry_point),
            "segments": firmware.image.segments.len(),
            "layout": layout_json(&layout),
            "layout_error": layout_error,
            "vector_table": {
                "base": format!("{:#010x}", table),
                "stack_top": stack_top.map(|v| format!("{:#010x}", v)),
                "reset": reset.map(|v| format!("{:#010x}", v)),
                "stack_matches_layout": stack_matches,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", path.display());
        println!("  sha256 {}", sha256);
        println!("  entry  {:#010x}", firmware.image.entry_point);
        print_layout(&layout);
        match layout_error {
            Some(e) => println!("  layout INVALID: {}", e),
            None => println!("  layout OK"),
        }
        match (stack_top, reset) {
            (Some(sp), Some(pc)) => println!("  vector[0] {:#010x}  vector[1] {:#010x}", sp, pc),
            _ => println!("  vector table not found at {:#010x}", table),
        }
    }
    Ok(())
}

fn fill_pattern(board: &mut Board, init: &InitRegion, seed: u32) -> Result<()> {
    if init.dest.is_empty() || init.is_in_place() {
        return Ok(());
    }
    let words: Vec<u32> = (0..init.dest.words() as u32)
        .map(|i| PATTERN_BASE | (seed << 12) | i)
        .collect();
    board
        .program_words(init.source as u64, &words)
        .with_context(|| format!("Failed to place load image at {:#x}", init.source))?;
    Ok(())
}

fn simulate(target: &Path, firmware: Option<&Path>, message: &str, json: bool) -> Result<()> {
    info!("Loading target descriptor: {:?}", target);
    let descriptor = TargetDescriptor::from_file(target)?;
    let mut board = Board::from_descriptor(&descriptor)?;
    let metrics = Arc::new(BringUpMetrics::new());
    board.add_observer(metrics.clone());

    let layout = *board.layout();
    match firmware {
        Some(path) => {
            info!("Loading firmware: {:?}", path);
            let firmware = labwired_loader::load_firmware(path)?;
            if firmware.layout != layout {
                warn!("Firmware was linked with a different layout than {:?}", target);
            }
            board.load(&firmware.image)?;
        }
        None => {
            fill_pattern(&mut board, &layout.data, 1)?;
            fill_pattern(&mut board, &layout.data2, 2)?;
        }
    }

    let payload = message.as_bytes();
    let report = board.bring_up(
        || {},
        |shim| {
            if shim.sbrk(payload.len() as isize) == SBRK_FAILED {
                warn!("Heap arena too small for a {}-byte buffer", payload.len());
            }
            let written = shim.write(1, payload);
            if written == payload.len() {
                0
            } else {
                1
            }
        },
    )?;

    let counts = metrics.snapshot();
    if json {
        let mut out = serde_json::to_value(&report)?;
        out["metrics"] = serde_json::to_value(counts)?;
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&report);
        println!(
            "  words  {} zeroed, {} copied",
            counts.zeroed_words, counts.copied_words
        );
    }

    if !report.memory.passed() {
        bail!("Memory image was not initialized before the entry point: {:?}", report.memory);
    }
    Ok(())
}

fn print_report(report: &BringUpReport) {
    println!("{}: exit code {}", report.target, report.exit_code);
    println!("  console {:?}", report.console);
    match report.errno {
        Some(name) => println!("  status  {} ({})", report.status, name),
        None => println!("  status  {}", report.status),
    }
    match report.heap_cursor {
        Some(cursor) => println!("  heap    {:#010x}", cursor),
        None => println!("  heap    untouched"),
    }
    println!(
        "  memory  bss zeroed: {}, data copied: {}, dat2 copied: {}",
        report.memory.bss_zeroed, report.memory.data_copied, report.memory.data2_copied
    );
    if let Some(vector) = &report.reset_vector {
        println!(
            "  reset   sp {:#010x} pc {:#010x}",
            vector.stack_top, vector.entry
        );
    }
}
