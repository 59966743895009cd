// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The hardware descriptor (C1): per-PCB-revision pin maps, loaded from
//! declarative JSON documents under a well-known directory, exactly as the
//! chip catalog (C2) is a pure lookup table.

use crate::chip::ChipType;
use crate::error::CatalogError;
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum GPIO pin number addressable within a 64-bit port/bank identifier.
const MAX_PIN_NUM: u8 = 63;

/// Sentinel pin index meaning "this logical line is not wired on this
/// revision".
pub const PIN_UNUSED: u8 = 0xFF;

/// Top-level directories searched for hardware configuration files.
pub const HW_CONFIG_DIRS: [&str; 2] = ["onerom-hw-config", "../onerom-hw-config"];

/// Subdirectories within a hardware configuration directory that overlay
/// the revisions found there (later directories win ties only if the name
/// differs; exact duplicates across directories are rejected).
pub const HW_CONFIG_SUB_DIRS: [&str; 2] = ["user", "third-party"];

/// Owning GPIO port/bank identifier for a group of pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    None,
    A,
    B,
    C,
    D,
}

impl Port {
    fn try_from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NONE" => Some(Port::None),
            "A" => Some(Port::A),
            "B" => Some(Port::B),
            "C" => Some(Port::C),
            "D" => Some(Port::D),
            _ => None,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::None => write!(f, "None"),
            Port::A => write!(f, "A"),
            Port::B => write!(f, "B"),
            Port::C => write!(f, "C"),
            Port::D => write!(f, "D"),
        }
    }
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Port::try_from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid port: {s}, must be None, A, B, C or D")))
    }
}

/// MCU family a PCB revision targets. Determines byte-mangling conventions
/// that differ at the runtime level, such as the `mod 8` data-pin
/// projection RP2350 ("Fire") needs and STM32 ("Ice") does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum McuFamily {
    Ice,
    Fire,
}

impl McuFamily {
    fn try_from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ICE" => Some(McuFamily::Ice),
            "FIRE" => Some(McuFamily::Fire),
            _ => None,
        }
    }
}

impl fmt::Display for McuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McuFamily::Ice => write!(f, "Ice"),
            McuFamily::Fire => write!(f, "Fire"),
        }
    }
}

impl<'de> Deserialize<'de> for McuFamily {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        McuFamily::try_from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid mcu family: {s}, must be Ice or Fire")))
    }
}

fn deserialize_chip_map<'de, D>(deserializer: D) -> Result<HashMap<ChipType, u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let string_map: HashMap<String, u8> = HashMap::deserialize(deserializer)?;
    let mut out = HashMap::new();
    for (key, value) in string_map {
        let chip = ChipType::try_from_str(&key)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid chip type: {key}")))?;
        out.insert(chip, value);
    }
    Ok(out)
}

/// Pin assignment for the logical lines of one PCB revision.
///
/// Array/map indices are logical bit positions (Ax/Dx); values are physical
/// GPIO pin numbers, or [`PIN_UNUSED`] when the line isn't wired.
#[derive(Debug, Clone, Deserialize)]
pub struct PinMap {
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub mcu_family: McuFamily,
    pub data_port: Port,
    pub addr_port: Port,
    pub cs_port: Port,
    pub sel_port: Port,
    pub status_port: Port,

    pub data: Vec<u8>,
    pub addr: Vec<u8>,

    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub cs1: HashMap<ChipType, u8>,
    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub cs2: HashMap<ChipType, u8>,
    #[serde(default, deserialize_with = "deserialize_chip_map")]
    pub cs3: HashMap<ChipType, u8>,

    pub x1: Option<u8>,
    pub x2: Option<u8>,

    /// Up to 7 image-select jumper pins.
    pub sel: Vec<u8>,
    /// Bit i: does closing SEL jumper i read as logical 1?
    #[serde(default)]
    pub sel_jumper_pull: u8,

    pub status_led: Option<u8>,
    pub vbus_detect: Option<u8>,
    pub swdio: Option<u8>,
    pub swclk: Option<u8>,
}

impl PinMap {
    /// Whether this revision's byte mangling needs the RP2350 "Fire" `mod 8`
    /// data-pin projection.
    pub fn d_mod_8(&self) -> bool {
        matches!(self.mcu_family, McuFamily::Fire)
    }

    pub fn pin_cs1(&self, chip: ChipType) -> u8 {
        self.cs1.get(&chip).copied().unwrap_or(PIN_UNUSED)
    }

    pub fn pin_cs2(&self, chip: ChipType) -> u8 {
        self.cs2.get(&chip).copied().unwrap_or(PIN_UNUSED)
    }

    pub fn pin_cs3(&self, chip: ChipType) -> u8 {
        self.cs3.get(&chip).copied().unwrap_or(PIN_UNUSED)
    }

    pub fn pin_for_cs_line(&self, chip: ChipType, line: u8) -> u8 {
        match line {
            0 => self.pin_cs1(chip),
            1 => self.pin_cs2(chip),
            2 => self.pin_cs3(chip),
            _ => PIN_UNUSED,
        }
    }

    pub fn pin_x1(&self) -> u8 {
        self.x1.unwrap_or(PIN_UNUSED)
    }

    pub fn pin_x2(&self) -> u8 {
        self.x2.unwrap_or(PIN_UNUSED)
    }

    pub fn pin_sel(&self, index: usize) -> u8 {
        self.sel.get(index).copied().unwrap_or(PIN_UNUSED)
    }

    /// Whether SEL jumper `index`, when closed, reads as logical 1 on this
    /// revision.
    pub fn sel_closed_reads_high(&self, index: usize) -> bool {
        (self.sel_jumper_pull & (1 << index)) != 0
    }

    /// Revisions exposing X1 and X2 can serve multi-ROM and bank-switched
    /// sets; others are limited to single-ROM sets.
    pub fn supports_extension_pins(&self) -> bool {
        self.x1.is_some_and(|p| p < 64) && self.x2.is_some_and(|p| p < 64)
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

fn validate_pin(pin: u8, pin_name: &str, revision: &str) -> Result<(), CatalogError> {
    if pin > MAX_PIN_NUM && pin != PIN_UNUSED {
        return Err(CatalogError::InvalidPinMap {
            revision: revision.to_string(),
            detail: format!("{pin_name}: pin {pin} out of range 0-{MAX_PIN_NUM} (or {PIN_UNUSED} for unused)"),
        });
    }
    Ok(())
}

fn validate_contiguous(pins: &[u8], line_name: &str, revision: &str) -> Result<(), CatalogError> {
    let used: Vec<u8> = pins.iter().copied().filter(|&p| p != PIN_UNUSED).collect();
    if used.is_empty() {
        return Ok(());
    }
    let mut sorted = used.clone();
    sorted.sort_unstable();
    let mut seen = HashSet::new();
    for &p in &sorted {
        if !seen.insert(p) {
            return Err(CatalogError::InvalidPinMap {
                revision: revision.to_string(),
                detail: format!("{line_name}: duplicate pin {p}"),
            });
        }
    }
    let min = sorted[0];
    let max = *sorted.last().unwrap();
    if (max - min) as usize + 1 != sorted.len() {
        return Err(CatalogError::InvalidPinMap {
            revision: revision.to_string(),
            detail: format!("{line_name}: pins {sorted:?} are not contiguous within their port"),
        });
    }
    Ok(())
}

fn validate_pin_map(revision: &str, pm: &PinMap) -> Result<(), CatalogError> {
    if pm.data.len() != 8 && pm.data.len() != 16 {
        return Err(CatalogError::InvalidPinMap {
            revision: revision.to_string(),
            detail: format!("data pins must be 8 or 16, found {}", pm.data.len()),
        });
    }
    if pm.addr.len() > 20 {
        return Err(CatalogError::InvalidPinMap {
            revision: revision.to_string(),
            detail: format!("addr pins must be at most 20, found {}", pm.addr.len()),
        });
    }
    if pm.sel.len() > 7 {
        return Err(CatalogError::InvalidPinMap {
            revision: revision.to_string(),
            detail: format!("sel pins must be at most 7, found {}", pm.sel.len()),
        });
    }

    for &pin in &pm.data {
        validate_pin(pin, "data", revision)?;
    }
    for &pin in &pm.addr {
        validate_pin(pin, "addr", revision)?;
    }
    for &pin in &pm.sel {
        validate_pin(pin, "sel", revision)?;
    }
    for (chip, &pin) in pm.cs1.iter().chain(pm.cs2.iter()).chain(pm.cs3.iter()) {
        validate_pin(pin, &format!("cs[{chip}]"), revision)?;
    }
    if let Some(pin) = pm.x1 {
        validate_pin(pin, "x1", revision)?;
    }
    if let Some(pin) = pm.x2 {
        validate_pin(pin, "x2", revision)?;
    }

    // Data pins for a given set must be contiguous GPIOs within a single
    // port; address pins similarly.
    validate_contiguous(&pm.data, "data", revision)?;
    validate_contiguous(&pm.addr, "addr", revision)?;

    // On ports where data shares address space, data occupies either the
    // low or high byte - never straddles.
    if pm.data_port == pm.addr_port {
        let data_used: Vec<u8> = pm.data.iter().copied().filter(|&p| p != PIN_UNUSED).collect();
        if !data_used.is_empty() {
            let all_low = data_used.iter().all(|&p| p < 8);
            let all_high = data_used.iter().all(|&p| (8..16).contains(&p));
            if !all_low && !all_high {
                return Err(CatalogError::InvalidPinMap {
                    revision: revision.to_string(),
                    detail: "data pins straddle the low/high byte boundary of a shared address/data port".into(),
                });
            }
        }
    }

    Ok(())
}

/// Finds the configuration directories rooted at `base`, so tests can point
/// the search at a tempdir instead of mutating the process-wide cwd.
fn config_dirs_in(base: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let root = HW_CONFIG_DIRS
        .iter()
        .map(|dir| base.join(dir))
        .find(|path| path.exists())
        .ok_or_else(|| CatalogError::UnknownRevision(format!(
            "no hardware configuration directories found, searched: {HW_CONFIG_DIRS:?}"
        )))?;

    let mut dirs = vec![root.clone()];
    for subdir in HW_CONFIG_SUB_DIRS {
        let subdir_path = root.join(subdir);
        if subdir_path.exists() {
            dirs.push(subdir_path);
        }
    }
    Ok(dirs)
}

/// Enumerates every hardware revision visible across the configuration
/// directories rooted at `base` (revision name, description) pairs sorted by
/// name.
fn list_available_revisions_in(base: &Path) -> Result<Vec<(String, String)>, CatalogError> {
    let dirs = config_dirs_in(base)?;
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut out = Vec::new();

    for dir in dirs {
        let entries = fs::read_dir(&dir).map_err(|e| CatalogError::UnknownRevision(format!(
            "failed to read {}: {e}", dir.display()
        )))?;
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::UnknownRevision(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| CatalogError::UnknownRevision(format!("invalid filename {}", path.display())))?;
            let normalized = normalize_name(stem);
            if normalized != stem {
                return Err(CatalogError::InvalidPinMap {
                    revision: stem.to_string(),
                    detail: "revision filenames must be lower-case with dashes, not underscores".into(),
                });
            }
            if let Some(first) = seen.get(&normalized) {
                return Err(CatalogError::InvalidPinMap {
                    revision: normalized,
                    detail: format!("duplicate revision found in {} and {}", first.display(), path.display()),
                });
            }
            seen.insert(normalized.clone(), path.clone());

            let content = fs::read_to_string(&path).map_err(|e| CatalogError::UnknownRevision(e.to_string()))?;
            let pin_map: PinMap = serde_json::from_str(&content).map_err(|e| CatalogError::InvalidPinMap {
                revision: normalized.clone(),
                detail: e.to_string(),
            })?;
            out.push((normalized, pin_map.description));
        }
    }

    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// Enumerates every hardware revision visible across the configuration
/// directories, returning (revision name, description) pairs sorted by name.
pub fn list_available_revisions() -> Result<Vec<(String, String)>, CatalogError> {
    list_available_revisions_in(Path::new("."))
}

/// Loads and validates one PCB revision's pin map by name, searching the
/// configuration directories rooted at `base`.
fn lookup_pcb_in(base: &Path, rev_id: &str) -> Result<PinMap, CatalogError> {
    let normalized = normalize_name(rev_id);
    let dirs = config_dirs_in(base)?;

    for dir in dirs {
        let path = dir.join(format!("{normalized}.json"));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => continue,
        };
        let mut pin_map: PinMap = serde_json::from_str(&content).map_err(|e| CatalogError::InvalidPinMap {
            revision: normalized.clone(),
            detail: e.to_string(),
        })?;
        pin_map.name = normalized.clone();
        validate_pin_map(&normalized, &pin_map)?;
        return Ok(pin_map);
    }

    Err(CatalogError::UnknownRevision(normalized))
}

/// Loads and validates one PCB revision's pin map by name.
pub fn lookup_pcb(rev_id: &str) -> Result<PinMap, CatalogError> {
    lookup_pcb_in(Path::new("."), rev_id)
}
