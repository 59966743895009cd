// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The parser (C8): inverse of the composer. Locates the metadata header
//! (by magic-scan or ELF symbol), walks the offset table, and exposes
//! ROM-set descriptors and (optionally) de-mangled ROM images.

use crate::format::{
    CsStateWire, FirmwareOverridesWire, ImageHeaderWire, RomDescriptorFixedWire,
    RomSetRecordFixedWire, ServeModeWire, ABSENT, FIRMWARE_OVERRIDES_SIZE, MAGIC,
    MAX_VERSION, ROM_DESCRIPTOR_FIXED_SIZE, ROM_SET_RECORD_FIXED_SIZE, SERVE_ALG_PARAMS_LEN,
};
use crate::mangle::{self, LineLevels};
use crate::model::{FirmwareOverrides, RomDescriptor, ServeMode};
use deku::prelude::*;
use onerom_common::error::IntegrityError;
use onerom_common::hw::PinMap;

/// Upper bound on how far into the image we'll scan for the magic before
/// giving up (§4.7).
pub const MAGIC_SCAN_LIMIT: usize = 4 * 1024 * 1024;

/// One parsed ROM set: serving mode, descriptors, and the raw mangled
/// table (still pin-permuted - use [`ParsedImage::demangle_rom`] to
/// recover logical bytes).
#[derive(Debug, Clone)]
pub struct ParsedRomSet {
    pub mode: ServeMode,
    pub roms: Vec<RomDescriptor>,
    pub table: Vec<u8>,
    pub firmware_overrides: Option<FirmwareOverrides>,
    pub serve_alg_params: Option<[u8; SERVE_ALG_PARAMS_LEN]>,
}

/// A fully parsed image (C8 output).
#[derive(Debug, Clone)]
pub struct ParsedImage {
    pub version: u8,
    pub header_offset: usize,
    pub rom_sets: Vec<ParsedRomSet>,
}

fn find_magic(data: &[u8]) -> Result<usize, IntegrityError> {
    let scan_len = data.len().min(MAGIC_SCAN_LIMIT);
    data[..scan_len]
        .windows(MAGIC.len())
        .position(|w| w == MAGIC.as_slice())
        .ok_or(IntegrityError::BadMagic { scanned: scan_len })
}

fn serve_mode_from_wire(mode: ServeModeWire) -> ServeMode {
    match mode {
        ServeModeWire::Single => ServeMode::Single,
        ServeModeWire::MultiAnyCs => ServeMode::MultiAnyCs,
        ServeModeWire::BankSwitched => ServeMode::BankSwitched,
    }
}

fn read_cstr(data: &[u8], offset: usize) -> Result<String, IntegrityError> {
    let end = data[offset..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(IntegrityError::TruncatedImage {
            offset,
            needed: 1,
            have: data.len() - offset,
        })?;
    Ok(String::from_utf8_lossy(&data[offset..offset + end]).into_owned())
}

fn need(data: &[u8], offset: usize, len: usize) -> Result<(), IntegrityError> {
    if offset + len > data.len() {
        return Err(IntegrityError::TruncatedImage {
            offset,
            needed: len,
            have: data.len().saturating_sub(offset),
        });
    }
    Ok(())
}

/// Parses an image, either from a raw binary buffer (magic-scanned) or
/// with an explicit header offset hint (e.g. one resolved from an ELF
/// symbol - see [`crate::elf`]).
pub fn parse_image(data: &[u8], header_offset_hint: Option<usize>) -> Result<ParsedImage, IntegrityError> {
    let header_offset = match header_offset_hint {
        Some(o) => {
            need(data, o, MAGIC.len())?;
            if &data[o..o + MAGIC.len()] != MAGIC.as_slice() {
                return Err(IntegrityError::BadMagic { scanned: o + MAGIC.len() });
            }
            o
        }
        None => find_magic(data)?,
    };

    need(data, header_offset, 20)?;
    let (_, header) = ImageHeaderWire::from_bytes((&data[header_offset..], 0))
        .map_err(|_| IntegrityError::TruncatedImage { offset: header_offset, needed: 20, have: data.len() - header_offset })?;

    if header.version > MAX_VERSION {
        return Err(IntegrityError::UnsupportedVersion {
            found: header.version,
            max: MAX_VERSION,
        });
    }

    let include_filenames = header.flags & 1 != 0;

    let mut rom_sets = Vec::with_capacity(header.offsets.len());
    for (set_id, &rel_offset) in header.offsets.iter().enumerate() {
        let set_offset = header_offset + rel_offset as usize;
        need(data, set_offset, ROM_SET_RECORD_FIXED_SIZE)?;
        let (_, fixed) = RomSetRecordFixedWire::from_bytes((&data[set_offset..], 0))
            .map_err(|_| IntegrityError::InconsistentOffset {
                set_id,
                offset: rel_offset,
                image_size: data.len(),
            })?;

        let offsets_start = set_offset + ROM_SET_RECORD_FIXED_SIZE;
        need(data, offsets_start, 4 * fixed.rom_count as usize)?;
        let mut roms = Vec::with_capacity(fixed.rom_count as usize);
        for i in 0..fixed.rom_count as usize {
            let o = offsets_start + i * 4;
            let rom_offset = header_offset
                + u32::from_le_bytes(data[o..o + 4].try_into().unwrap()) as usize;
            need(data, rom_offset, ROM_DESCRIPTOR_FIXED_SIZE)?;
            let (_, desc) = RomDescriptorFixedWire::from_bytes((&data[rom_offset..], 0))
                .map_err(|_| IntegrityError::InconsistentOffset { set_id, offset: rom_offset as u32, image_size: data.len() })?;
            let filename = if include_filenames {
                Some(read_cstr(data, rom_offset + ROM_DESCRIPTOR_FIXED_SIZE)?)
            } else {
                None
            };
            roms.push(RomDescriptor {
                chip_type: desc.chip_type.into(),
                cs1: CsStateWire::into(desc.cs1_state),
                cs2: CsStateWire::into(desc.cs2_state),
                cs3: CsStateWire::into(desc.cs3_state),
                filename,
            });
        }

        let firmware_overrides = if fixed.firmware_overrides_offset != ABSENT {
            let o = header_offset + fixed.firmware_overrides_offset as usize;
            need(data, o, FIRMWARE_OVERRIDES_SIZE)?;
            let (_, wire) = FirmwareOverridesWire::from_bytes((&data[o..], 0))
                .map_err(|_| IntegrityError::InconsistentOffset { set_id, offset: fixed.firmware_overrides_offset, image_size: data.len() })?;
            Some(FirmwareOverrides::from_wire(&wire))
        } else {
            None
        };

        let serve_alg_params = if fixed.serve_alg_params_offset != ABSENT {
            let o = header_offset + fixed.serve_alg_params_offset as usize;
            need(data, o, SERVE_ALG_PARAMS_LEN)?;
            let mut bytes = [0u8; SERVE_ALG_PARAMS_LEN];
            bytes.copy_from_slice(&data[o..o + SERVE_ALG_PARAMS_LEN]);
            Some(bytes)
        } else {
            None
        };

        let table_offset = header_offset + fixed.table_offset as usize;
        need(data, table_offset, fixed.size as usize)?;
        let table = data[table_offset..table_offset + fixed.size as usize].to_vec();

        rom_sets.push(ParsedRomSet {
            mode: serve_mode_from_wire(fixed.serve_mode),
            roms,
            table,
            firmware_overrides,
            serve_alg_params,
        });
    }

    Ok(ParsedImage {
        version: header.version,
        header_offset,
        rom_sets,
    })
}

impl ParsedImage {
    /// De-mangles one ROM from a parsed set: picks the representative
    /// all-CS-active combination, iterates every address, and reads the
    /// logical byte back through the same permutation the composer used
    /// (§4.7).
    ///
    /// `rom_index` selects which ROM within the set to recover, using the
    /// same `(x2<<1)|x1` slot convention [`crate::romset::select_rom`] uses
    /// to pick a ROM for a given X1/X2 level pair.
    pub fn demangle_rom(
        &self,
        set_index: usize,
        rom_index: usize,
        pin_map: &PinMap,
        d_mod_8: bool,
    ) -> Option<Vec<u8>> {
        let set = self.rom_sets.get(set_index)?;
        let rom = set.roms.get(rom_index)?;
        let chip = rom.chip_type;
        let width = chip.addr_bits();
        let multi_or_bank = !matches!(set.mode, ServeMode::Single);

        let active_level = |polarity: onerom_common::chip::Polarity| {
            matches!(polarity, onerom_common::chip::Polarity::ActiveHigh)
        };
        let x1 = multi_or_bank && rom_index & 1 != 0;
        let x2 = multi_or_bank && rom_index & 2 != 0;
        let levels = LineLevels {
            cs1: active_level(rom.chip_type.fixed_cs_polarity(0).unwrap_or(rom.cs1)),
            cs2: active_level(rom.chip_type.fixed_cs_polarity(1).unwrap_or(rom.cs2)),
            cs3: active_level(rom.cs3),
            x1: multi_or_bank.then_some(x1),
            x2: multi_or_bank.then_some(x2),
        };

        let mut out = Vec::with_capacity(1usize << width);
        for addr in 0u32..(1u32 << width) {
            let idx = mangle::mangle_address(pin_map, chip, addr, levels, multi_or_bank).ok()?;
            let byte = *set.table.get(idx as usize)?;
            out.push(mangle::demangle_byte(pin_map, byte, d_mod_8));
        }
        Some(out)
    }
}
