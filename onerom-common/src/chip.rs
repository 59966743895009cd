// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The chip catalog (C2): immutable, pure lookup data describing every ROM
//! type One ROM knows how to impersonate.

use crate::error::CatalogError;
use std::fmt;

/// Active-polarity semantics for a single control line (CS/CE/OE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
    NotUsed,
}

impl Polarity {
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active_low" => Some(Polarity::ActiveLow),
            "active_high" => Some(Polarity::ActiveHigh),
            "not_used" => Some(Polarity::NotUsed),
            _ => None,
        }
    }

    /// Is `level` (the raw GPIO bit) the asserted/active level for this
    /// polarity?
    pub fn is_active(&self, level: bool) -> bool {
        match self {
            Polarity::ActiveLow => !level,
            Polarity::ActiveHigh => level,
            Polarity::NotUsed => true,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::ActiveLow => write!(f, "active_low"),
            Polarity::ActiveHigh => write!(f, "active_high"),
            Polarity::NotUsed => write!(f, "not_used"),
        }
    }
}

/// Closed set of 21 chip types the catalog knows how to impersonate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChipType {
    Rom2316,
    Rom2332,
    Rom2364,
    Rom2516,
    Rom2532,
    Rom2564,
    Rom2704,
    Rom2708,
    Rom2716,
    Rom2732,
    Rom2732A,
    Rom2758,
    Rom2764,
    Rom27128,
    Rom27256,
    Rom27512,
    Rom27C256,
    Rom27C512,
    Rom6116,
    Rom231024,
    Rom27C400,
}

impl ChipType {
    pub const ALL: [ChipType; 21] = [
        ChipType::Rom2316,
        ChipType::Rom2332,
        ChipType::Rom2364,
        ChipType::Rom2516,
        ChipType::Rom2532,
        ChipType::Rom2564,
        ChipType::Rom2704,
        ChipType::Rom2708,
        ChipType::Rom2716,
        ChipType::Rom2732,
        ChipType::Rom2732A,
        ChipType::Rom2758,
        ChipType::Rom2764,
        ChipType::Rom27128,
        ChipType::Rom27256,
        ChipType::Rom27512,
        ChipType::Rom27C256,
        ChipType::Rom27C512,
        ChipType::Rom6116,
        ChipType::Rom231024,
        ChipType::Rom27C400,
    ];

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "2316" => Some(ChipType::Rom2316),
            "2332" => Some(ChipType::Rom2332),
            "2364" => Some(ChipType::Rom2364),
            "2516" => Some(ChipType::Rom2516),
            "2532" => Some(ChipType::Rom2532),
            "2564" => Some(ChipType::Rom2564),
            "2704" => Some(ChipType::Rom2704),
            "2708" => Some(ChipType::Rom2708),
            "2716" => Some(ChipType::Rom2716),
            "2732" => Some(ChipType::Rom2732),
            "2732a" => Some(ChipType::Rom2732A),
            "2758" => Some(ChipType::Rom2758),
            "2764" => Some(ChipType::Rom2764),
            "27128" => Some(ChipType::Rom27128),
            "27256" => Some(ChipType::Rom27256),
            "27512" => Some(ChipType::Rom27512),
            "27c256" => Some(ChipType::Rom27C256),
            "27c512" => Some(ChipType::Rom27C512),
            "6116" => Some(ChipType::Rom6116),
            "231024" => Some(ChipType::Rom231024),
            "27c400" => Some(ChipType::Rom27C400),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChipType::Rom2316 => "2316",
            ChipType::Rom2332 => "2332",
            ChipType::Rom2364 => "2364",
            ChipType::Rom2516 => "2516",
            ChipType::Rom2532 => "2532",
            ChipType::Rom2564 => "2564",
            ChipType::Rom2704 => "2704",
            ChipType::Rom2708 => "2708",
            ChipType::Rom2716 => "2716",
            ChipType::Rom2732 => "2732",
            ChipType::Rom2732A => "2732A",
            ChipType::Rom2758 => "2758",
            ChipType::Rom2764 => "2764",
            ChipType::Rom27128 => "27128",
            ChipType::Rom27256 => "27256",
            ChipType::Rom27512 => "27512",
            ChipType::Rom27C256 => "27C256",
            ChipType::Rom27C512 => "27C512",
            ChipType::Rom6116 => "6116",
            ChipType::Rom231024 => "231024",
            ChipType::Rom27C400 => "27C400",
        }
    }

    /// Number of DIP pins the package uses: 24, 28 or 40.
    pub fn pin_count(&self) -> u8 {
        match self {
            ChipType::Rom2316
            | ChipType::Rom2332
            | ChipType::Rom2364
            | ChipType::Rom2516
            | ChipType::Rom2532
            | ChipType::Rom2564
            | ChipType::Rom2704
            | ChipType::Rom2708
            | ChipType::Rom2716
            | ChipType::Rom2732
            | ChipType::Rom2732A
            | ChipType::Rom2758
            | ChipType::Rom2764 => 24,
            ChipType::Rom27128
            | ChipType::Rom27256
            | ChipType::Rom27512
            | ChipType::Rom27C256
            | ChipType::Rom27C512
            | ChipType::Rom6116
            | ChipType::Rom231024 => 28,
            ChipType::Rom27C400 => 40,
        }
    }

    /// Capacity of the chip in bytes (logical data width 8 bits, except
    /// [`ChipType::Rom27C400`] which is 16 bits wide - see
    /// [`ChipType::data_width_bits`]).
    pub fn capacity_bytes(&self) -> usize {
        match self {
            ChipType::Rom2704 => 512,
            ChipType::Rom2708 | ChipType::Rom2758 => 1024,
            ChipType::Rom2316 | ChipType::Rom2516 | ChipType::Rom2716 | ChipType::Rom6116 => 2048,
            ChipType::Rom2332 | ChipType::Rom2532 | ChipType::Rom2732 | ChipType::Rom2732A => 4096,
            ChipType::Rom2364 | ChipType::Rom2564 | ChipType::Rom2764 => 8192,
            ChipType::Rom27128 => 16384,
            ChipType::Rom27256 | ChipType::Rom27C256 => 32768,
            ChipType::Rom27512 | ChipType::Rom27C512 => 65536,
            ChipType::Rom231024 => 131072,
            ChipType::Rom27C400 => 524288,
        }
    }

    pub fn addr_bits(&self) -> u32 {
        self.capacity_bytes().trailing_zeros()
    }

    /// 8 for every chip except the 16-bit-wide 27C400.
    pub fn data_width_bits(&self) -> u8 {
        match self {
            ChipType::Rom27C400 => 16,
            _ => 8,
        }
    }

    /// Number of control (CS/CE/OE) lines the chip exposes, 1..=3.
    pub fn cs_lines_count(&self) -> u8 {
        match self {
            ChipType::Rom2364 | ChipType::Rom2704 | ChipType::Rom2708 | ChipType::Rom6116 => 1,
            ChipType::Rom2332
            | ChipType::Rom2516
            | ChipType::Rom2532
            | ChipType::Rom2564
            | ChipType::Rom2716
            | ChipType::Rom2732
            | ChipType::Rom2732A
            | ChipType::Rom2758
            | ChipType::Rom2764
            | ChipType::Rom27128
            | ChipType::Rom27256
            | ChipType::Rom27512
            | ChipType::Rom27C256
            | ChipType::Rom27C512
            | ChipType::Rom231024
            | ChipType::Rom27C400 => 2,
            ChipType::Rom2316 => 3,
        }
    }

    /// EPROM-class parts wire CE/OE as two control lines with polarity fixed
    /// by the catalog (see [`ChipType::fixed_cs_polarity`]), rather than
    /// user-configurable CS lines as mask ROMs have.
    pub fn is_27_series(&self) -> bool {
        !matches!(
            self,
            ChipType::Rom2316 | ChipType::Rom2332 | ChipType::Rom2364 | ChipType::Rom6116 | ChipType::Rom231024
        )
    }

    /// For 27-series EPROM-class chips, CE and OE are always active-low -
    /// config-level overrides for those lines are rejected. Returns `None`
    /// for chips where polarity is user-configurable.
    pub fn fixed_cs_polarity(&self, line: u8) -> Option<Polarity> {
        if self.is_27_series() && line < self.cs_lines_count() {
            Some(Polarity::ActiveLow)
        } else {
            None
        }
    }

    /// Whether GPIO-index computation must swap the A11/A12 pin assignment
    /// before mangling (see the address mangler's 2732 special case).
    pub fn swaps_a11_a12(&self) -> bool {
        matches!(self, ChipType::Rom2732 | ChipType::Rom2732A)
    }

    /// True if table generation for this chip type is supported by this
    /// core - only the 40-pin 27C400 is excluded pending a runtime contract.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ChipType::Rom27C400)
    }

    pub fn lookup(name: &str) -> Result<ChipType, CatalogError> {
        Self::try_from_str(name).ok_or_else(|| CatalogError::UnknownChipType(name.to_string()))
    }
}

impl fmt::Display for ChipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_name() {
        for chip in ChipType::ALL {
            assert_eq!(ChipType::try_from_str(chip.name()), Some(chip));
        }
    }

    #[test]
    fn cs_lines_match_spec_examples() {
        assert_eq!(ChipType::Rom2364.cs_lines_count(), 1);
        assert_eq!(ChipType::Rom2332.cs_lines_count(), 2);
        assert_eq!(ChipType::Rom2316.cs_lines_count(), 3);
    }

    #[test]
    fn capacities_match_pin_count_expectations() {
        assert_eq!(ChipType::Rom2364.capacity_bytes(), 8192);
        assert_eq!(ChipType::Rom27256.capacity_bytes(), 32768);
        assert_eq!(ChipType::Rom231024.capacity_bytes(), 131072);
    }

    #[test]
    fn only_2732_family_swaps_a11_a12() {
        assert!(ChipType::Rom2732.swaps_a11_a12());
        assert!(ChipType::Rom2732A.swaps_a11_a12());
        assert!(!ChipType::Rom2764.swaps_a11_a12());
    }

    #[test]
    fn rom27c400_is_unsupported() {
        assert!(!ChipType::Rom27C400.is_supported());
        assert!(ChipType::Rom2364.is_supported());
    }

    #[test]
    fn twenty_seven_series_fixes_polarity() {
        assert_eq!(
            ChipType::Rom27256.fixed_cs_polarity(0),
            Some(Polarity::ActiveLow)
        );
        assert_eq!(ChipType::Rom2364.fixed_cs_polarity(0), None);
    }
}
