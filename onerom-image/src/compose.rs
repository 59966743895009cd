// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The composer (C7): assembles the firmware code region, metadata
//! header, ROM-set records, ROM descriptors, firmware overrides,
//! serve-alg params and mangled tables into one flashable image.

use crate::format::{
    ChipTypeWire, CsStateWire, ImageHeaderWire, RomDescriptorFixedWire, RomSetRecordFixedWire,
    ServeModeWire, ABSENT, MAX_VERSION, ROM_SET_RECORD_FIXED_SIZE, SERVE_ALG_FRAME_BYTE,
    SERVE_ALG_PARAMS_LEN, SERVE_ALG_TAIL_BYTE,
};
use crate::model::{FirmwareOverrides, RomSourceDescriptor, ServeMode};
use crate::romset;
use deku::prelude::*;
use onerom_common::error::{InputError, LayoutError};

fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

fn serve_mode_wire(mode: ServeMode) -> ServeModeWire {
    match mode {
        ServeMode::Single => ServeModeWire::Single,
        ServeMode::MultiAnyCs => ServeModeWire::MultiAnyCs,
        ServeMode::BankSwitched => ServeModeWire::BankSwitched,
    }
}

/// One ROM set as composed: serving mode, source ROMs, and optional
/// per-set overrides/params (§3).
#[derive(Debug, Clone)]
pub struct RomSetInput {
    pub mode: ServeMode,
    pub roms: Vec<RomSourceDescriptor>,
    pub firmware_overrides: Option<FirmwareOverrides>,
    pub serve_alg_params: Option<[u8; SERVE_ALG_PARAMS_LEN]>,
}

/// Everything the composer needs to build one image.
#[derive(Debug, Clone)]
pub struct ComposeInput {
    /// Opaque firmware binary; copied verbatim as the image's code region.
    pub firmware_code: Vec<u8>,
    pub pin_map: onerom_common::hw::PinMap,
    /// Whether data pins require the RP2350 GPIO-relative-to-8-bit-store
    /// projection in the byte mangler.
    pub d_mod_8: bool,
    /// Whether ROM descriptors carry inline filenames (boot-logging build).
    pub include_filenames: bool,
    pub rom_sets: Vec<RomSetInput>,
}

fn validate_serve_alg_params(bytes: &[u8; SERVE_ALG_PARAMS_LEN]) -> Result<(), InputError> {
    if bytes[0] != SERVE_ALG_FRAME_BYTE || bytes[6] != SERVE_ALG_FRAME_BYTE || bytes[7] != SERVE_ALG_TAIL_BYTE {
        return Err(InputError::BadServeAlgFraming {
            detail: format!(
                "expected byte[0]=byte[6]=0x{SERVE_ALG_FRAME_BYTE:02x}, byte[7]=0x{SERVE_ALG_TAIL_BYTE:02x}, got {bytes:02x?}"
            ),
        });
    }
    Ok(())
}

struct DescriptorRegion {
    offsets: Vec<Vec<u32>>,
    bytes: Vec<u8>,
}

fn build_descriptor_region(
    region_start: usize,
    sets: &[RomSetInput],
    include_filenames: bool,
) -> DescriptorRegion {
    let mut offsets = Vec::with_capacity(sets.len());
    let mut bytes = Vec::new();

    for set in sets {
        let mut set_offsets = Vec::with_capacity(set.roms.len());
        for rom in &set.roms {
            set_offsets.push((region_start + bytes.len()) as u32);
            let wire = RomDescriptorFixedWire {
                chip_type: ChipTypeWire::from(rom.chip_type),
                cs1_state: CsStateWire::from(rom.cs1),
                cs2_state: CsStateWire::from(rom.cs2),
                cs3_state: CsStateWire::from(rom.cs3),
            };
            bytes.extend(wire.to_bytes().expect("fixed-size descriptor always encodes"));
            if include_filenames {
                if let Some(name) = &rom.filename {
                    bytes.extend(name.as_bytes());
                }
                bytes.push(0);
            }
        }
        offsets.push(set_offsets);
    }

    DescriptorRegion { offsets, bytes }
}

/// Composes a complete image from validated input, returning the final
/// byte vector. Does not touch the filesystem - see
/// [`crate::io::write_image_atomically`] for the temp-file-then-rename
/// write path (§4.6, §5).
pub fn compose_image(input: &ComposeInput) -> Result<Vec<u8>, InputError> {
    if input.rom_sets.len() > u8::MAX as usize {
        return Err(InputError::TooManyBanks { set_id: input.rom_sets.len() });
    }

    // Validate + build each set's mangled table up front.
    let mut tables = Vec::with_capacity(input.rom_sets.len());
    for (set_id, set) in input.rom_sets.iter().enumerate() {
        if let Some(params) = &set.serve_alg_params {
            validate_serve_alg_params(params)?;
        }
        let table = romset::build_table(set_id, &input.pin_map, set.mode, &set.roms, input.d_mod_8)?;
        tables.push(table);
    }

    let header_size = 20 + 4 * input.rom_sets.len();
    let rom_set_record_sizes: Vec<usize> = input
        .rom_sets
        .iter()
        .map(|s| ROM_SET_RECORD_FIXED_SIZE + 4 * s.roms.len())
        .collect();
    let rom_set_records_start = header_size;
    let mut rom_set_offsets = Vec::with_capacity(input.rom_sets.len());
    let mut cursor = rom_set_records_start;
    for size in &rom_set_record_sizes {
        rom_set_offsets.push(cursor as u32);
        cursor += size;
    }

    let descriptors = build_descriptor_region(cursor, &input.rom_sets, input.include_filenames);
    cursor += descriptors.bytes.len();

    let mut firmware_overrides_offsets = Vec::with_capacity(input.rom_sets.len());
    let mut firmware_overrides_bytes = Vec::new();
    for set in &input.rom_sets {
        if let Some(fw) = &set.firmware_overrides {
            firmware_overrides_offsets.push(Some(cursor as u32 + firmware_overrides_bytes.len() as u32));
            let wire = fw.to_wire();
            firmware_overrides_bytes.extend(wire.to_bytes().expect("fixed-size record always encodes"));
        } else {
            firmware_overrides_offsets.push(None);
        }
    }
    cursor += firmware_overrides_bytes.len();

    let mut serve_alg_offsets = Vec::with_capacity(input.rom_sets.len());
    let mut serve_alg_bytes = Vec::new();
    for set in &input.rom_sets {
        if let Some(params) = &set.serve_alg_params {
            serve_alg_offsets.push(Some(cursor as u32 + serve_alg_bytes.len() as u32));
            serve_alg_bytes.extend_from_slice(params);
        } else {
            serve_alg_offsets.push(None);
        }
    }
    cursor += serve_alg_bytes.len();

    // Mangled tables: each aligned to a power-of-two boundary equal to its
    // own size.
    let mut table_offsets = Vec::with_capacity(tables.len());
    let mut table_region = Vec::new();
    for table in tables.iter() {
        let align = table.len().next_power_of_two();
        let aligned_start = align_up(cursor + table_region.len(), align);
        let pad = aligned_start - (cursor + table_region.len());
        table_region.resize(table_region.len() + pad, 0);
        table_offsets.push(aligned_start as u32);
        table_region.extend_from_slice(table);
    }

    // Assemble the header.
    let flags = if input.include_filenames { 1u8 } else { 0u8 };
    let header = ImageHeaderWire {
        version: MAX_VERSION,
        rom_set_count: input.rom_sets.len() as u8,
        flags,
        offsets: rom_set_offsets.clone(),
    };
    let mut out = input.firmware_code.clone();
    let pad_to_header = align_up(out.len(), 16);
    out.resize(pad_to_header, 0);
    debug_assert_eq!(out.len() % 16, 0);
    let header_bytes = header.to_bytes().expect("header always encodes");
    debug_assert_eq!(header_bytes.len(), header_size);
    out.extend_from_slice(&header_bytes);

    // ROM-set records.
    for (i, set) in input.rom_sets.iter().enumerate() {
        let extra_info = u8::from(set.firmware_overrides.is_some() || set.serve_alg_params.is_some());
        let fixed = RomSetRecordFixedWire {
            rom_count: set.roms.len() as u8,
            serve_mode: serve_mode_wire(set.mode),
            extra_info,
            size: tables[i].len() as u32,
            table_offset: table_offsets[i],
            firmware_overrides_offset: firmware_overrides_offsets[i].unwrap_or(ABSENT),
            serve_alg_params_offset: serve_alg_offsets[i].unwrap_or(ABSENT),
        };
        out.extend_from_slice(&fixed.to_bytes().expect("fixed-size record always encodes"));
        for &offset in &descriptors.offsets[i] {
            out.extend_from_slice(&offset.to_le_bytes());
        }
    }

    out.extend_from_slice(&descriptors.bytes);
    out.extend_from_slice(&firmware_overrides_bytes);
    out.extend_from_slice(&serve_alg_bytes);
    out.extend_from_slice(&table_region);

    Ok(out)
}

/// Verifies every mangled table's image offset is a multiple of its own
/// size (P3), for use after composition as a defensive check.
pub fn check_alignment(table_offset: usize, table_size: usize) -> Result<(), LayoutError> {
    if !table_offset.is_multiple_of(table_size.next_power_of_two()) {
        return Err(LayoutError::AlignmentUnsatisfiable {
            size: table_size,
            budget: table_offset,
        });
    }
    Ok(())
}
