// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The declarative ROM-set config document (C3): schema, source
//! resolution, and the slice -> duplicate -> pad/truncate transform
//! pipeline that turns a config entry into canonical source bytes (§4.2,
//! §6).

use crate::fetch::{extract_zip_member, SourceFetcher};
use onerom_common::chip::{ChipType, Polarity};
use onerom_common::error::InputError;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RomSetType {
    Single,
    Multi,
    Banked,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RomEntryConfig {
    pub file: String,
    pub zip_member: Option<String>,
    #[serde(rename = "type")]
    pub chip_type: String,
    pub cs1: String,
    #[serde(default)]
    pub cs2: Option<String>,
    #[serde(default)]
    pub cs3: Option<String>,
    pub offset: Option<u64>,
    pub length: Option<u64>,
    pub pad_to: Option<u64>,
    pub duplicate_to: Option<u64>,
    pub truncate_to: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FireOverridesConfig {
    pub cpu_freq: Option<FreqValue>,
    pub overclock: Option<bool>,
    pub vreg: Option<VoltageValue>,
    pub serve_mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IceOverridesConfig {
    pub cpu_freq: Option<FreqValue>,
    pub overclock: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedOverridesConfig {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwdOverridesConfig {
    pub swd_enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FirmwareOverridesConfig {
    pub ice: Option<IceOverridesConfig>,
    pub fire: Option<FireOverridesConfig>,
    pub led: Option<LedOverridesConfig>,
    pub swd: Option<SwdOverridesConfig>,
}

/// `"Stock"` or an explicit MHz integer (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FreqValue {
    Stock(StockLiteral),
    Mhz(u16),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StockLiteral {
    Stock,
}

/// `"Stock"` or a closed-set voltage string (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VoltageValue {
    Stock(StockLiteral),
    Voltage(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServeAlgParamsConfig {
    pub params: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RomSetConfig {
    #[serde(rename = "type")]
    pub set_type: RomSetType,
    pub roms: Vec<RomEntryConfig>,
    #[serde(default)]
    pub firmware_overrides: Option<FirmwareOverridesConfig>,
    #[serde(default)]
    pub serve_alg_params: Option<ServeAlgParamsConfig>,
    #[serde(default)]
    pub licenses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RomGenConfig {
    pub version: u8,
    pub description: String,
    pub rom_sets: Vec<RomSetConfig>,
}

impl RomGenConfig {
    pub fn parse(json: &str) -> Result<Self, InputError> {
        serde_json::from_str(json).map_err(|e| InputError::SchemaViolation {
            path: "<config>".to_string(),
            detail: e.to_string(),
        })
    }

    /// All `licenses` URLs across every ROM set, for the confirmation gate
    /// (§4.2).
    pub fn license_urls(&self) -> Vec<&str> {
        self.rom_sets.iter().flat_map(|s| s.licenses.iter().map(String::as_str)).collect()
    }
}

pub fn parse_polarity(field: &str, s: &str) -> Result<Polarity, InputError> {
    Polarity::try_from_str(s).ok_or_else(|| InputError::SchemaViolation {
        path: field.to_string(),
        detail: format!("invalid polarity '{s}', expected active_low|active_high|not_used"),
    })
}

pub fn parse_chip_type(s: &str) -> Result<ChipType, InputError> {
    ChipType::try_from_str(s).ok_or_else(|| InputError::SchemaViolation {
        path: "roms[].type".to_string(),
        detail: format!("unknown chip type '{s}'"),
    })
}

/// Resolves one ROM entry's `file`/`zip_member` reference to bytes via the
/// injected fetcher (§9).
pub fn resolve_source(entry: &RomEntryConfig, fetcher: &dyn SourceFetcher) -> Result<Vec<u8>, InputError> {
    let raw = if entry.file.starts_with("http://") || entry.file.starts_with("https://") {
        fetcher.fetch(&entry.file)
    } else {
        fetcher.open_local(&PathBuf::from(&entry.file))
    }
    .map_err(|e| InputError::SchemaViolation {
        path: "roms[].file".to_string(),
        detail: e.to_string(),
    })?;

    match &entry.zip_member {
        Some(member) => extract_zip_member(&raw, member).map_err(|e| InputError::SchemaViolation {
            path: "roms[].zip_member".to_string(),
            detail: e.to_string(),
        }),
        None => Ok(raw),
    }
}

/// Applies the transform pipeline in order slice -> duplicate ->
/// pad/truncate (§4.2, §6) and checks the result matches the chip's
/// declared capacity.
pub fn apply_transforms(
    mut bytes: Vec<u8>,
    entry: &RomEntryConfig,
    chip: ChipType,
) -> Result<Vec<u8>, InputError> {
    // Slice: offset/length.
    if entry.offset.is_some() || entry.length.is_some() {
        let offset = entry.offset.unwrap_or(0) as usize;
        let len = entry.length.map(|l| l as usize).unwrap_or(bytes.len().saturating_sub(offset));
        if offset + len > bytes.len() {
            return Err(InputError::SchemaViolation {
                path: "roms[].offset/length".to_string(),
                detail: format!(
                    "slice [{offset}, {offset}+{len}) exceeds source length {}",
                    bytes.len()
                ),
            });
        }
        bytes = bytes[offset..offset + len].to_vec();
    }

    // Duplicate.
    if let Some(target) = entry.duplicate_to {
        let target = target as usize;
        if target < bytes.len() {
            return Err(InputError::DuplicateToTooSmall {
                source_len: bytes.len(),
                target,
            });
        }
        if bytes.is_empty() || !target.is_multiple_of(bytes.len()) {
            return Err(InputError::SchemaViolation {
                path: "roms[].duplicate_to".to_string(),
                detail: format!("{target} is not an exact multiple of source length {}", bytes.len()),
            });
        }
        bytes = bytes.repeat(target / bytes.len());
    }

    // Pad/truncate.
    if let Some(target) = entry.pad_to {
        let target = target as usize;
        if target > chip.capacity_bytes() {
            return Err(InputError::PadToExceedsCapacity {
                target,
                capacity: chip.capacity_bytes(),
            });
        }
        bytes.resize(target, 0xAA);
    }
    if let Some(target) = entry.truncate_to {
        bytes.truncate(target as usize);
    }

    if bytes.len() != chip.capacity_bytes() {
        return Err(InputError::SizeMismatch {
            chip_type: chip.name().to_string(),
            expected: chip.capacity_bytes(),
            got: bytes.len(),
        });
    }

    Ok(bytes)
}
