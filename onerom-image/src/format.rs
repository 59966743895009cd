// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The wire format (§4.6/§4.7): declarative `deku` structs giving a single
//! source of truth for the metadata header, ROM-set records, ROM
//! descriptors, firmware-overrides record and serve-alg-params framing,
//! used by both the composer (write) and parser (read).

use deku::prelude::*;
use onerom_common::chip::{ChipType, Polarity};
use static_assertions::const_assert_eq;

pub(crate) const MAGIC: &[u8; 16] = b"ONEROM_METADATA\0";
pub(crate) const MAX_VERSION: u8 = 1;

/// Byte signature bracketing the opaque serve-alg-params payload (§4.6
/// item 6). The composer validates only this framing; the inner bytes are
/// interpreted solely by the on-MCU PIO runtime.
pub(crate) const SERVE_ALG_PARAMS_LEN: usize = 8;
pub(crate) const SERVE_ALG_FRAME_BYTE: u8 = 0xFE;
pub(crate) const SERVE_ALG_TAIL_BYTE: u8 = 0xFF;

/// Sentinel offset meaning "this optional record is absent".
pub(crate) const ABSENT: u32 = 0xFFFF_FFFF;

/// Chip type as it appears on the wire - mirrors [`ChipType`]'s 21-member
/// closed set with an explicit, versioned discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(id_type = "u8")]
pub(crate) enum ChipTypeWire {
    #[deku(id = "0")]
    Rom2316,
    #[deku(id = "1")]
    Rom2332,
    #[deku(id = "2")]
    Rom2364,
    #[deku(id = "3")]
    Rom2516,
    #[deku(id = "4")]
    Rom2532,
    #[deku(id = "5")]
    Rom2564,
    #[deku(id = "6")]
    Rom2704,
    #[deku(id = "7")]
    Rom2708,
    #[deku(id = "8")]
    Rom2716,
    #[deku(id = "9")]
    Rom2732,
    #[deku(id = "10")]
    Rom2732A,
    #[deku(id = "11")]
    Rom2758,
    #[deku(id = "12")]
    Rom2764,
    #[deku(id = "13")]
    Rom27128,
    #[deku(id = "14")]
    Rom27256,
    #[deku(id = "15")]
    Rom27512,
    #[deku(id = "16")]
    Rom27C256,
    #[deku(id = "17")]
    Rom27C512,
    #[deku(id = "18")]
    Rom6116,
    #[deku(id = "19")]
    Rom231024,
    #[deku(id = "20")]
    Rom27C400,
}

impl From<ChipType> for ChipTypeWire {
    fn from(c: ChipType) -> Self {
        match c {
            ChipType::Rom2316 => ChipTypeWire::Rom2316,
            ChipType::Rom2332 => ChipTypeWire::Rom2332,
            ChipType::Rom2364 => ChipTypeWire::Rom2364,
            ChipType::Rom2516 => ChipTypeWire::Rom2516,
            ChipType::Rom2532 => ChipTypeWire::Rom2532,
            ChipType::Rom2564 => ChipTypeWire::Rom2564,
            ChipType::Rom2704 => ChipTypeWire::Rom2704,
            ChipType::Rom2708 => ChipTypeWire::Rom2708,
            ChipType::Rom2716 => ChipTypeWire::Rom2716,
            ChipType::Rom2732 => ChipTypeWire::Rom2732,
            ChipType::Rom2732A => ChipTypeWire::Rom2732A,
            ChipType::Rom2758 => ChipTypeWire::Rom2758,
            ChipType::Rom2764 => ChipTypeWire::Rom2764,
            ChipType::Rom27128 => ChipTypeWire::Rom27128,
            ChipType::Rom27256 => ChipTypeWire::Rom27256,
            ChipType::Rom27512 => ChipTypeWire::Rom27512,
            ChipType::Rom27C256 => ChipTypeWire::Rom27C256,
            ChipType::Rom27C512 => ChipTypeWire::Rom27C512,
            ChipType::Rom6116 => ChipTypeWire::Rom6116,
            ChipType::Rom231024 => ChipTypeWire::Rom231024,
            ChipType::Rom27C400 => ChipTypeWire::Rom27C400,
        }
    }
}

impl From<ChipTypeWire> for ChipType {
    fn from(c: ChipTypeWire) -> Self {
        match c {
            ChipTypeWire::Rom2316 => ChipType::Rom2316,
            ChipTypeWire::Rom2332 => ChipType::Rom2332,
            ChipTypeWire::Rom2364 => ChipType::Rom2364,
            ChipTypeWire::Rom2516 => ChipType::Rom2516,
            ChipTypeWire::Rom2532 => ChipType::Rom2532,
            ChipTypeWire::Rom2564 => ChipType::Rom2564,
            ChipTypeWire::Rom2704 => ChipType::Rom2704,
            ChipTypeWire::Rom2708 => ChipType::Rom2708,
            ChipTypeWire::Rom2716 => ChipType::Rom2716,
            ChipTypeWire::Rom2732 => ChipType::Rom2732,
            ChipTypeWire::Rom2732A => ChipType::Rom2732A,
            ChipTypeWire::Rom2758 => ChipType::Rom2758,
            ChipTypeWire::Rom2764 => ChipType::Rom2764,
            ChipTypeWire::Rom27128 => ChipType::Rom27128,
            ChipTypeWire::Rom27256 => ChipType::Rom27256,
            ChipTypeWire::Rom27512 => ChipType::Rom27512,
            ChipTypeWire::Rom27C256 => ChipType::Rom27C256,
            ChipTypeWire::Rom27C512 => ChipType::Rom27C512,
            ChipTypeWire::Rom6116 => ChipType::Rom6116,
            ChipTypeWire::Rom231024 => ChipType::Rom231024,
            ChipTypeWire::Rom27C400 => ChipType::Rom27C400,
        }
    }
}

/// Active-polarity state of one control line, as stored in a ROM
/// descriptor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(id_type = "u8")]
pub(crate) enum CsStateWire {
    #[deku(id = "0")]
    ActiveLow,
    #[deku(id = "1")]
    ActiveHigh,
    #[deku(id = "2")]
    NotUsed,
}

impl From<Polarity> for CsStateWire {
    fn from(p: Polarity) -> Self {
        match p {
            Polarity::ActiveLow => CsStateWire::ActiveLow,
            Polarity::ActiveHigh => CsStateWire::ActiveHigh,
            Polarity::NotUsed => CsStateWire::NotUsed,
        }
    }
}

impl From<CsStateWire> for Polarity {
    fn from(c: CsStateWire) -> Self {
        match c {
            CsStateWire::ActiveLow => Polarity::ActiveLow,
            CsStateWire::ActiveHigh => Polarity::ActiveHigh,
            CsStateWire::NotUsed => Polarity::NotUsed,
        }
    }
}

/// Serving mode discriminator persisted per ROM-set record (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(id_type = "u8")]
pub enum ServeModeWire {
    #[deku(id = "0")]
    Single,
    #[deku(id = "1")]
    MultiAnyCs,
    #[deku(id = "2")]
    BankSwitched,
}

/// Metadata header (§4.6 item 2). `flags` bit 0 records whether ROM
/// descriptors in this image carry inline filenames (a boot-logging
/// build); the remaining 7 bits and the trailing pad byte are reserved.
///
/// The offset table entries are byte offsets from the start of this
/// header (immediately following the magic) to each ROM-set record.
#[derive(Debug, DekuRead, DekuWrite)]
#[deku(endian = "little", magic = b"ONEROM_METADATA\0")]
pub(crate) struct ImageHeaderWire {
    pub version: u8,
    pub rom_set_count: u8,
    pub flags: u8,
    #[deku(pad_bytes_before = "1")]
    #[deku(count = "rom_set_count")]
    pub offsets: Vec<u32>,
}

pub(crate) const ROM_SET_RECORD_FIXED_SIZE: usize = 20;

/// Fixed-size prefix of a ROM-set record (§4.6 item 3). The `rom_count`
/// trailing 4-byte offsets are read/written separately since deku cannot
/// size-assert a struct containing a `Vec`.
///
/// `table_offset` is a byte offset from the start of the metadata header
/// (same base as every other offset in this format) to this set's mangled
/// table.
#[derive(Debug, Clone, DekuRead, DekuWrite)]
pub(crate) struct RomSetRecordFixedWire {
    pub rom_count: u8,
    pub serve_mode: ServeModeWire,
    pub extra_info: u8,
    #[deku(pad_bytes_before = "1", endian = "little")]
    pub size: u32,
    #[deku(endian = "little")]
    pub table_offset: u32,
    #[deku(endian = "little")]
    pub firmware_overrides_offset: u32,
    #[deku(endian = "little")]
    pub serve_alg_params_offset: u32,
}
const_assert_eq!(
    ROM_SET_RECORD_FIXED_SIZE,
    core::mem::size_of::<RomSetRecordFixedWire>()
);

pub(crate) const ROM_DESCRIPTOR_FIXED_SIZE: usize = 4;

/// Fixed-size prefix of a ROM descriptor (§4.6 item 4). An optional
/// null-terminated filename follows immediately when the header's
/// `flags` bit 0 is set.
#[derive(Debug, DekuRead, DekuWrite)]
pub(crate) struct RomDescriptorFixedWire {
    pub chip_type: ChipTypeWire,
    pub cs1_state: CsStateWire,
    pub cs2_state: CsStateWire,
    pub cs3_state: CsStateWire,
}
const_assert_eq!(
    ROM_DESCRIPTOR_FIXED_SIZE,
    core::mem::size_of::<RomDescriptorFixedWire>()
);

pub(crate) const FIRMWARE_OVERRIDES_SIZE: usize = 16;

/// Firmware-overrides record (§4.6 item 5). The named fields sum to 7
/// bytes; `reserved` is sized to 9 bytes to reach the declared 16-byte
/// total (see DESIGN.md).
#[derive(Debug, Clone, DekuRead, DekuWrite)]
pub(crate) struct FirmwareOverridesWire {
    pub override_present: u8,
    pub override_value: u8,
    #[deku(endian = "little")]
    pub ice_freq: u16,
    #[deku(endian = "little")]
    pub fire_freq: u16,
    pub fire_vreg: u8,
    pub reserved: [u8; 9],
}
const_assert_eq!(
    FIRMWARE_OVERRIDES_SIZE,
    core::mem::size_of::<FirmwareOverridesWire>()
);

/// Bit positions within [`FirmwareOverridesWire::override_present`] /
/// `override_value` (§6 "Firmware overrides").
pub mod override_bits {
    pub const ICE_CPU_FREQ: u8 = 0;
    pub const ICE_OVERCLOCK: u8 = 1;
    pub const FIRE_CPU_FREQ: u8 = 2;
    pub const FIRE_OVERCLOCK: u8 = 3;
    pub const FIRE_VREG: u8 = 4;
    pub const FIRE_SERVE_MODE: u8 = 5;
    pub const LED_ENABLED: u8 = 6;
    pub const SWD_ENABLED: u8 = 7;
}
