// Copyright (C) 2025 One ROM Project
//
// MIT License

mod config;
mod fetch;

use crate::config::{apply_transforms, parse_chip_type, parse_polarity, resolve_source, RomGenConfig, RomSetType};
use crate::fetch::{HttpFetcher, SourceFetcher};
use anyhow::{bail, Context, Result};
use clap::Parser;
use onerom_common::chip::Polarity;
use onerom_image::{ComposeInput, FireServeMode, FirmwareOverrides, RomSetInput, RomSourceDescriptor, ServeMode};
use std::io::{self, Write};
use std::path::PathBuf;

/// Composes a One ROM firmware image from a firmware binary and a
/// declarative ROM-set config document.
#[derive(Parser, Debug)]
#[command(name = "onerom-gen", version, about)]
struct Args {
    /// Path to the opaque firmware binary forming the image's code region.
    #[arg(long)]
    fw_image: PathBuf,

    /// Path to the JSON ROM-set config document.
    #[arg(long)]
    json: PathBuf,

    /// Path to write the composed image to.
    #[arg(long)]
    out: PathBuf,

    /// Hardware revision identifier (looked up in the PCB pin-map catalog).
    #[arg(long)]
    hw_rev: String,

    /// Skip the interactive ROM-license confirmation prompt.
    #[arg(short = 'y', long)]
    yes: bool,

    /// Overwrite an existing output file.
    #[arg(long)]
    overwrite: bool,

    /// Include ROM filenames in the image (increases size; aids boot
    /// logging).
    #[arg(long)]
    include_filenames: bool,

    /// Increase logging verbosity; repeat for more detail.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
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

fn confirm_licenses(urls: &[&str], auto_accept: bool) -> Result<()> {
    if urls.is_empty() {
        return Ok(());
    }
    println!("This config references the following ROM licenses:");
    for url in urls {
        println!("  {url}");
    }
    if auto_accept {
        tracing::info!(count = urls.len(), "license confirmation auto-accepted via --yes");
        return Ok(());
    }
    print!("Proceed? [y/N] ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    if !matches!(line.trim().to_lowercase().as_str(), "y" | "yes") {
        bail!("license confirmation declined");
    }
    Ok(())
}

fn build_rom_set(set_cfg: &config::RomSetConfig, fetcher: &dyn SourceFetcher) -> Result<RomSetInput> {
    let mode = match set_cfg.set_type {
        RomSetType::Single => ServeMode::Single,
        RomSetType::Multi => ServeMode::MultiAnyCs,
        RomSetType::Banked => ServeMode::BankSwitched,
    };

    let mut roms = Vec::with_capacity(set_cfg.roms.len());
    for entry in &set_cfg.roms {
        let chip = parse_chip_type(&entry.chip_type)?;
        let raw = resolve_source(entry, fetcher).with_context(|| format!("resolving source for '{}'", entry.file))?;
        let source = apply_transforms(raw, entry, chip)?;

        roms.push(RomSourceDescriptor {
            chip_type: chip,
            cs1: parse_polarity("roms[].cs1", &entry.cs1)?,
            cs2: entry
                .cs2
                .as_deref()
                .map(|s| parse_polarity("roms[].cs2", s))
                .transpose()?
                .unwrap_or(Polarity::NotUsed),
            cs3: entry
                .cs3
                .as_deref()
                .map(|s| parse_polarity("roms[].cs3", s))
                .transpose()?
                .unwrap_or(Polarity::NotUsed),
            filename: entry.description.clone(),
            source,
        });
    }

    let firmware_overrides = set_cfg.firmware_overrides.as_ref().map(build_overrides).transpose()?.flatten();
    let serve_alg_params = set_cfg
        .serve_alg_params
        .as_ref()
        .map(|p| -> Result<[u8; 8]> {
            p.params
                .clone()
                .try_into()
                .map_err(|v: Vec<u8>| anyhow::anyhow!("serve_alg_params.params must be exactly 8 bytes, got {}", v.len()))
        })
        .transpose()?;

    Ok(RomSetInput {
        mode,
        roms,
        firmware_overrides,
        serve_alg_params,
    })
}

fn build_overrides(cfg: &config::FirmwareOverridesConfig) -> Result<Option<FirmwareOverrides>> {
    let mut out = FirmwareOverrides::default();
    let mut any = false;

    if let Some(ice) = &cfg.ice {
        if let Some(freq) = &ice.cpu_freq {
            out.ice_cpu_freq = Some(resolve_freq(freq));
            any = true;
        }
        if let Some(oc) = ice.overclock {
            out.ice_overclock = Some(oc);
            any = true;
        }
    }
    if let Some(fire) = &cfg.fire {
        if let Some(freq) = &fire.cpu_freq {
            out.fire_cpu_freq = Some(resolve_freq(freq));
            any = true;
        }
        if let Some(oc) = fire.overclock {
            out.fire_overclock = Some(oc);
            any = true;
        }
        if let Some(vreg) = &fire.vreg {
            out.fire_vreg = Some(resolve_vreg(vreg)?);
            any = true;
        }
        if let Some(mode) = &fire.serve_mode {
            out.fire_serve_mode = Some(match mode.to_lowercase().as_str() {
                "cpu" => FireServeMode::Cpu,
                "pio" => FireServeMode::Pio,
                other => bail!("unknown fire.serve_mode '{other}', expected cpu|pio"),
            });
            any = true;
        }
    }
    if let Some(led) = &cfg.led
        && let Some(enabled) = led.enabled
    {
        out.led_enabled = Some(enabled);
        any = true;
    }
    if let Some(swd) = &cfg.swd
        && let Some(enabled) = swd.swd_enabled
    {
        out.swd_enabled = Some(enabled);
        any = true;
    }

    Ok(any.then_some(out))
}

fn resolve_freq(freq: &config::FreqValue) -> u16 {
    match freq {
        config::FreqValue::Stock(_) => 0,
        config::FreqValue::Mhz(mhz) => *mhz,
    }
}

fn resolve_vreg(v: &config::VoltageValue) -> Result<u8> {
    match v {
        config::VoltageValue::Stock(_) => Ok(0),
        config::VoltageValue::Voltage(s) => onerom_image::FIRE_VREG_TABLE
            .iter()
            .position(|&t| t == s)
            .map(|i| i as u8)
            .ok_or_else(|| anyhow::anyhow!("unknown fire.vreg voltage '{s}'")),
    }
}

fn run(args: Args) -> Result<()> {
    if args.out.exists() && !args.overwrite {
        bail!("{} already exists (pass --overwrite to replace it)", args.out.display());
    }

    let pin_map = onerom_common::hw::lookup_pcb(&args.hw_rev).with_context(|| format!("looking up hw rev '{}'", args.hw_rev))?;
    let firmware_code = std::fs::read(&args.fw_image).with_context(|| format!("reading {}", args.fw_image.display()))?;
    let json = std::fs::read_to_string(&args.json).with_context(|| format!("reading {}", args.json.display()))?;
    let cfg = RomGenConfig::parse(&json)?;
    tracing::info!(version = cfg.version, description = %cfg.description, rom_sets = cfg.rom_sets.len(), "config loaded");

    confirm_licenses(&cfg.license_urls(), args.yes)?;

    let fetcher = HttpFetcher::new();
    let mut rom_sets = Vec::with_capacity(cfg.rom_sets.len());
    for set_cfg in &cfg.rom_sets {
        rom_sets.push(build_rom_set(set_cfg, &fetcher)?);
    }

    let d_mod_8 = pin_map.d_mod_8();
    let input = ComposeInput {
        firmware_code,
        pin_map,
        d_mod_8,
        include_filenames: args.include_filenames,
        rom_sets,
    };

    let image = onerom_image::compose_image(&input).context("composing image")?;
    onerom_image::io::write_image_atomically(&args.out, &image).context("writing image")?;

    tracing::info!(path = %args.out.display(), bytes = image.len(), "image written");
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        let report = serde_json::json!({"error": "compose_failed", "detail": format!("{e:#}")});
        eprintln!("{report}");
        std::process::exit(1);
    }
}
