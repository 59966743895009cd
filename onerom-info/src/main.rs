// Copyright (C) 2025 One ROM Project
//
// MIT License

//! Inspects One ROM firmware images: dumps metadata, answers GPIO/address
//! lookup queries, and runs the validator round-trip.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use onerom_image::{
    mangle_address, parse_image, validate_all, LineLevels, ParsedImage, RomSetInput,
    RomSourceDescriptor,
};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "onerom-info", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity; repeat for more detail.
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dumps the full parsed structure of a firmware image.
    Info { firmware: PathBuf },

    /// Resolves a raw GPIO-port table value to a byte, bypassing addressing.
    LookupRaw {
        firmware: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        set: u8,
        /// Raw table index to look up (hex, e.g. 0x1000)
        #[arg(short, long, value_parser = parse_hex)]
        addr: u32,
        /// Output the mangled byte instead of the demangled one
        #[arg(long)]
        output_mangled: bool,
        #[arg(long)]
        hw_rev: String,
    },

    /// Resolves a logical address (plus CS/X line states) to a byte or
    /// byte range.
    Lookup {
        firmware: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        set: u8,
        #[arg(short, long, value_parser = parse_hex)]
        addr: Option<u32>,
        #[arg(short, long, value_parser = parse_range)]
        range: Option<(u32, u32)>,
        /// Raw chip-select 1 GPIO level (0 or 1); whether this asserts the
        /// line depends on the ROM's declared polarity.
        #[arg(long, default_value = "1", value_parser = parse_bit, action = clap::ArgAction::Set)]
        cs1: bool,
        /// Chip-select 2 line state (0 or 1); ignored for chips without a CS2 line.
        #[arg(long, value_parser = parse_bit, action = clap::ArgAction::Set)]
        cs2: Option<bool>,
        /// Chip-select 3 line state (0 or 1); ignored for chips without a CS3 line.
        #[arg(long, value_parser = parse_bit, action = clap::ArgAction::Set)]
        cs3: Option<bool>,
        /// X1 jumper-pin state (0 or 1); only meaningful for multi/banked sets.
        #[arg(long, value_parser = parse_bit, action = clap::ArgAction::Set)]
        x1: Option<bool>,
        /// X2 jumper-pin state (0 or 1); only meaningful for multi/banked sets.
        #[arg(long, value_parser = parse_bit, action = clap::ArgAction::Set)]
        x2: Option<bool>,
        #[arg(long)]
        output_mangled: bool,
        #[arg(long)]
        output_binary: bool,
        #[arg(long)]
        hw_rev: String,
    },

    /// Runs the full validator round-trip and reports pass/fail.
    Validate {
        firmware: PathBuf,
        #[arg(long)]
        hw_rev: String,
    },
}

fn parse_bit(s: &str) -> Result<bool, String> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(format!("expected 0 or 1, got '{other}'")),
    }
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let cleaned = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('$'))
        .unwrap_or(s);
    u32::from_str_radix(cleaned, 16).map_err(|_| format!("invalid hex value: {s}"))
}

fn parse_range(s: &str) -> Result<(u32, u32), String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| "range format must be start-end".to_string())?;
    let start = parse_hex(start)?;
    let end = parse_hex(end)?;
    if start > end {
        return Err("range start must be <= end".to_string());
    }
    Ok((start, end))
}

fn load_image(path: &Path) -> Result<ParsedImage> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let header_offset = if data.len() >= 4 && data[0..4] == [0x7f, b'E', b'L', b'F'] {
        Some(
            onerom_image::elf::locate_metadata_offset(&data)
                .context("locating metadata header in ELF")?,
        )
    } else {
        None
    };
    parse_image(&data, header_offset).context("parsing image")
}

fn print_info(parsed: &ParsedImage) {
    println!("version: {}", parsed.version);
    println!("header_offset: 0x{:x}", parsed.header_offset);
    println!("rom_set_count: {}", parsed.rom_sets.len());
    for (i, set) in parsed.rom_sets.iter().enumerate() {
        println!("rom_set[{i}]:");
        println!("  serve_mode: {:?}", set.mode);
        println!("  table_size: {}", set.table.len());
        println!("  roms:");
        for (j, rom) in set.roms.iter().enumerate() {
            println!(
                "    [{j}] chip={} cs1={} cs2={} cs3={} filename={:?}",
                rom.chip_type.name(),
                rom.cs1,
                rom.cs2,
                rom.cs3,
                rom.filename
            );
        }
        if let Some(fw) = &set.firmware_overrides {
            println!("  firmware_overrides: {fw:?}");
        }
        if let Some(params) = &set.serve_alg_params {
            println!("  serve_alg_params: {params:02x?}");
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Info { firmware } => {
            let parsed = load_image(&firmware)?;
            print_info(&parsed);
        }

        Commands::LookupRaw {
            firmware,
            set,
            addr,
            output_mangled,
            hw_rev,
        } => {
            let parsed = load_image(&firmware)?;
            let pin_map = onerom_common::hw::lookup_pcb(&hw_rev)
                .with_context(|| format!("looking up hw rev '{hw_rev}'"))?;
            let rom_set = parsed
                .rom_sets
                .get(set as usize)
                .with_context(|| format!("no rom set {set}"))?;
            let raw = *rom_set
                .table
                .get(addr as usize)
                .with_context(|| format!("0x{addr:x} out of range for table of size {}", rom_set.table.len()))?;
            let out = if output_mangled {
                raw
            } else {
                onerom_image::demangle_byte(&pin_map, raw, pin_map.d_mod_8())
            };
            println!("0x{out:02x}");
        }

        Commands::Lookup {
            firmware,
            set,
            addr,
            range,
            cs1,
            cs2,
            cs3,
            x1,
            x2,
            output_mangled,
            output_binary,
            hw_rev,
        } => {
            if addr.is_some() == range.is_some() {
                bail!("specify exactly one of --addr or --range");
            }
            let parsed = load_image(&firmware)?;
            let pin_map = onerom_common::hw::lookup_pcb(&hw_rev)
                .with_context(|| format!("looking up hw rev '{hw_rev}'"))?;
            let rom_set = parsed
                .rom_sets
                .get(set as usize)
                .with_context(|| format!("no rom set {set}"))?;
            let chip = rom_set.roms.first().context("rom set has no descriptors")?.chip_type;
            let multi_or_bank = !matches!(rom_set.mode, onerom_image::ServeMode::Single);

            let levels = LineLevels {
                cs1,
                cs2: cs2.unwrap_or(false),
                cs3: cs3.unwrap_or(false),
                x1: multi_or_bank.then_some(x1.unwrap_or(false)),
                x2: multi_or_bank.then_some(x2.unwrap_or(false)),
            };

            let (start, end) = range.unwrap_or_else(|| (addr.unwrap(), addr.unwrap()));
            let mut bytes = Vec::new();
            for a in start..=end {
                let idx = mangle_address(&pin_map, chip, a, levels, multi_or_bank)?;
                let raw = *rom_set
                    .table
                    .get(idx as usize)
                    .with_context(|| format!("mangled index {idx} out of range"))?;
                bytes.push(if output_mangled {
                    raw
                } else {
                    onerom_image::demangle_byte(&pin_map, raw, pin_map.d_mod_8())
                });
            }

            if output_binary {
                std::io::stdout().write_all(&bytes)?;
            } else {
                for (a, b) in (start..=end).zip(bytes.iter()) {
                    println!("0x{a:04x}: 0x{b:02x}");
                }
            }
        }

        Commands::Validate { firmware, hw_rev } => {
            let parsed = load_image(&firmware)?;
            let pin_map = onerom_common::hw::lookup_pcb(&hw_rev)
                .with_context(|| format!("looking up hw rev '{hw_rev}'"))?;

            let mut sets = Vec::with_capacity(parsed.rom_sets.len());
            let mut tables = Vec::with_capacity(parsed.rom_sets.len());
            for (set_index, set) in parsed.rom_sets.iter().enumerate() {
                let mut roms = Vec::with_capacity(set.roms.len());
                for (i, rom) in set.roms.iter().enumerate() {
                    let source = parsed
                        .demangle_rom(set_index, i, &pin_map, pin_map.d_mod_8())
                        .context("recovering rom bytes")?;
                    roms.push(RomSourceDescriptor {
                        chip_type: rom.chip_type,
                        cs1: rom.cs1,
                        cs2: rom.cs2,
                        cs3: rom.cs3,
                        filename: rom.filename.clone(),
                        source,
                    });
                }
                sets.push(RomSetInput {
                    mode: set.mode,
                    roms,
                    firmware_overrides: set.firmware_overrides.clone(),
                    serve_alg_params: set.serve_alg_params,
                });
                tables.push(set.table.clone());
            }

            let reports = validate_all(&pin_map, &sets, &tables, pin_map.d_mod_8());

            let mut failed = false;
            for (i, report) in reports.iter().enumerate() {
                println!(
                    "rom_set[{i}]: {} tuples checked, {} mismatches",
                    report.tuples_checked,
                    report.mismatches.len()
                );
                for m in &report.mismatches {
                    println!("  {m:?}");
                }
                if !report.is_clean() {
                    failed = true;
                }
            }
            if failed {
                bail!("validation failed");
            }
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        let report = serde_json::json!({"error": "inspect_failed", "detail": format!("{e:#}")});
        eprintln!("{report}");
        std::process::exit(1);
    }
}
