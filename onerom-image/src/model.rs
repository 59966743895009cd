// Copyright (C) 2025 One ROM Project
//
// MIT License

//! Public data model shared by the ROM-set builder (C6), composer (C7) and
//! parser (C8): the in-memory shapes that sit either side of the wire
//! format in `format.rs`.

use crate::format::{override_bits, FirmwareOverridesWire};
use onerom_common::chip::{ChipType, Polarity};

/// Serving mode for one ROM set (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    Single,
    MultiAnyCs,
    BankSwitched,
}

impl ServeMode {
    /// Whether X1/X2 participate in address mangling for this mode.
    pub fn uses_extension_pins(&self) -> bool {
        !matches!(self, ServeMode::Single)
    }
}

/// FIRE MCU serve-mode override (§6): CPU loop vs PIO state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireServeMode {
    Cpu,
    Pio,
}

/// Sentinel ICE/FIRE frequency codes meaning "use the stock default"
/// (§3 "Firmware overrides").
pub const FREQ_STOCK_ZERO: u16 = 0;
pub const FREQ_STOCK_FFFF: u16 = 0xFFFF;

fn freq_is_stock(freq: u16) -> bool {
    freq == FREQ_STOCK_ZERO || freq == FREQ_STOCK_FFFF
}

/// The closed set of 32 FIRE VREG voltage codes, in ascending order
/// starting at 0.55V with a 0.05V step. Derived from the worked example
/// in the literal test scenarios ("1.20V" == code 0x0D); see DESIGN.md.
pub const FIRE_VREG_TABLE: [&str; 32] = [
    "0.55V", "0.60V", "0.65V", "0.70V", "0.75V", "0.80V", "0.85V", "0.90V", "0.95V", "1.00V",
    "1.05V", "1.10V", "1.15V", "1.20V", "1.25V", "1.30V", "1.35V", "1.40V", "1.45V", "1.50V",
    "1.55V", "1.60V", "1.65V", "1.70V", "1.75V", "1.80V", "1.85V", "1.90V", "1.95V", "2.00V",
    "2.05V", "2.10V",
];

pub fn fire_vreg_code(voltage: &str) -> Option<u8> {
    FIRE_VREG_TABLE
        .iter()
        .position(|&v| v == voltage)
        .map(|i| i as u8)
}

pub fn fire_vreg_name(code: u8) -> Option<&'static str> {
    FIRE_VREG_TABLE.get(code as usize).copied()
}

/// Firmware overrides record (§3, §6, §4.6 item 5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareOverrides {
    pub ice_cpu_freq: Option<u16>,
    pub ice_overclock: Option<bool>,
    pub fire_cpu_freq: Option<u16>,
    pub fire_overclock: Option<bool>,
    pub fire_vreg: Option<u8>,
    pub fire_serve_mode: Option<FireServeMode>,
    pub led_enabled: Option<bool>,
    pub swd_enabled: Option<bool>,
}

impl FirmwareOverrides {
    /// True if the given frequency override resolves to "use the stock
    /// clock", per either sentinel value.
    pub fn freq_is_stock(freq: u16) -> bool {
        freq_is_stock(freq)
    }

    /// Which of the eight override bits are set, for test/display use.
    pub fn present_bits(&self) -> Vec<u8> {
        let mut bits = Vec::new();
        if self.ice_cpu_freq.is_some() {
            bits.push(override_bits::ICE_CPU_FREQ);
        }
        if self.ice_overclock.is_some() {
            bits.push(override_bits::ICE_OVERCLOCK);
        }
        if self.fire_cpu_freq.is_some() {
            bits.push(override_bits::FIRE_CPU_FREQ);
        }
        if self.fire_overclock.is_some() {
            bits.push(override_bits::FIRE_OVERCLOCK);
        }
        if self.fire_vreg.is_some() {
            bits.push(override_bits::FIRE_VREG);
        }
        if self.fire_serve_mode.is_some() {
            bits.push(override_bits::FIRE_SERVE_MODE);
        }
        if self.led_enabled.is_some() {
            bits.push(override_bits::LED_ENABLED);
        }
        if self.swd_enabled.is_some() {
            bits.push(override_bits::SWD_ENABLED);
        }
        bits
    }

    pub(crate) fn to_wire(&self) -> FirmwareOverridesWire {
        let mut present = 0u8;
        let mut value = 0u8;
        let mut set = |bit: u8, flag: Option<bool>| {
            if let Some(v) = flag {
                present |= 1 << bit;
                if v {
                    value |= 1 << bit;
                }
            }
        };
        set(override_bits::ICE_OVERCLOCK, self.ice_overclock);
        set(override_bits::FIRE_OVERCLOCK, self.fire_overclock);
        set(override_bits::LED_ENABLED, self.led_enabled);
        set(override_bits::SWD_ENABLED, self.swd_enabled);
        set(
            override_bits::FIRE_SERVE_MODE,
            self.fire_serve_mode.map(|m| matches!(m, FireServeMode::Pio)),
        );
        if self.ice_cpu_freq.is_some() {
            present |= 1 << override_bits::ICE_CPU_FREQ;
        }
        if self.fire_cpu_freq.is_some() {
            present |= 1 << override_bits::FIRE_CPU_FREQ;
        }
        if self.fire_vreg.is_some() {
            present |= 1 << override_bits::FIRE_VREG;
        }

        FirmwareOverridesWire {
            override_present: present,
            override_value: value,
            ice_freq: self.ice_cpu_freq.unwrap_or(FREQ_STOCK_ZERO),
            fire_freq: self.fire_cpu_freq.unwrap_or(FREQ_STOCK_ZERO),
            fire_vreg: self.fire_vreg.unwrap_or(0),
            reserved: [0; 9],
        }
    }

    pub(crate) fn from_wire(wire: &FirmwareOverridesWire) -> Self {
        let present = wire.override_present;
        let value = wire.override_value;
        let bit = |b: u8| (present & (1 << b)) != 0;
        let flag = |b: u8| bit(b).then(|| (value & (1 << b)) != 0);

        FirmwareOverrides {
            ice_cpu_freq: bit(override_bits::ICE_CPU_FREQ).then_some(wire.ice_freq),
            ice_overclock: flag(override_bits::ICE_OVERCLOCK),
            fire_cpu_freq: bit(override_bits::FIRE_CPU_FREQ).then_some(wire.fire_freq),
            fire_overclock: flag(override_bits::FIRE_OVERCLOCK),
            fire_vreg: bit(override_bits::FIRE_VREG).then_some(wire.fire_vreg),
            fire_serve_mode: flag(override_bits::FIRE_SERVE_MODE).map(|pio| {
                if pio {
                    FireServeMode::Pio
                } else {
                    FireServeMode::Cpu
                }
            }),
            led_enabled: flag(override_bits::LED_ENABLED),
            swd_enabled: flag(override_bits::SWD_ENABLED),
        }
    }
}

/// A ROM descriptor as it appears when assembling a set (C3/C6 input):
/// chip identity, per-line polarity, optional filename, and the
/// already-validated, already-sized canonical source bytes.
#[derive(Debug, Clone)]
pub struct RomSourceDescriptor {
    pub chip_type: ChipType,
    pub cs1: Polarity,
    pub cs2: Polarity,
    pub cs3: Polarity,
    pub filename: Option<String>,
    pub source: Vec<u8>,
}

impl RomSourceDescriptor {
    pub fn cs_polarity(&self, line: u8) -> Polarity {
        match line {
            0 => self.cs1,
            1 => self.cs2,
            2 => self.cs3,
            _ => Polarity::NotUsed,
        }
    }
}

/// A ROM descriptor as parsed back out of a composed image (C8 output):
/// no source bytes - those live in the set's mangled table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomDescriptor {
    pub chip_type: ChipType,
    pub cs1: Polarity,
    pub cs2: Polarity,
    pub cs3: Polarity,
    pub filename: Option<String>,
}

impl RomDescriptor {
    pub fn cs_polarity(&self, line: u8) -> Polarity {
        match line {
            0 => self.cs1,
            1 => self.cs2,
            2 => self.cs3,
            _ => Polarity::NotUsed,
        }
    }
}
