// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The validator (C9): exhaustively walks every legal
//! `(address, cs1, cs2, cs3, x1, x2)` tuple for a ROM set, re-derives the
//! expected byte from the source ROM(s), and compares it against what the
//! mangled table actually holds (P1, P5).

use crate::compose::RomSetInput;
use crate::mangle::{self, LineLevels, FILL_BYTE};
use crate::romset::select_rom;
use onerom_common::chip::ChipType;
use onerom_common::hw::PinMap;

/// One observed mismatch between expected and actual table contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub addr: u32,
    pub cs1: bool,
    pub cs2: bool,
    pub cs3: bool,
    pub x1: bool,
    pub x2: bool,
    pub expected: u8,
    pub actual: u8,
}

/// Result of validating one ROM set's mangled table.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub tuples_checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

const MAX_REPORTED_MISMATCHES: usize = 5;

/// Validates one ROM set's already-built mangled `table` against its
/// source input, trying every legal control-line combination.
pub fn validate_rom_set(
    pin_map: &PinMap,
    set: &RomSetInput,
    table: &[u8],
    d_mod_8: bool,
) -> ValidationReport {
    let chip: ChipType = set.roms[0].chip_type;
    let width = chip.addr_bits();
    let num_cs = if chip.pin_count() == 24 { chip.cs_lines_count() } else { 0 };
    let multi_or_bank = set.mode.uses_extension_pins();

    let cs_range = 1u8 << num_cs;
    let x_range: u8 = if multi_or_bank { 4 } else { 1 };

    let mut tuples_checked = 0usize;
    let mut mismatches = Vec::new();

    for addr in 0u32..(1u32 << width) {
        for cs_bits in 0..cs_range {
            let cs1 = cs_bits & 1 != 0;
            let cs2 = num_cs > 1 && (cs_bits >> 1) & 1 != 0;
            let cs3 = num_cs > 2 && (cs_bits >> 2) & 1 != 0;

            for x_bits in 0..x_range {
                let x1 = multi_or_bank && x_bits & 1 != 0;
                let x2 = multi_or_bank && (x_bits >> 1) & 1 != 0;

                let rom = if set.roms.len() > 1 {
                    select_rom(&set.roms, x1, x2)
                } else {
                    &set.roms[0]
                };

                let activated = rom.chip_type.fixed_cs_polarity(0).unwrap_or(rom.cs1).is_active(cs1)
                    && (num_cs < 2 || rom.chip_type.fixed_cs_polarity(1).unwrap_or(rom.cs2).is_active(cs2))
                    && (num_cs < 3 || rom.cs3.is_active(cs3));

                let expected = if activated { rom.source[addr as usize] } else { FILL_BYTE };

                let levels = LineLevels {
                    cs1,
                    cs2,
                    cs3,
                    x1: multi_or_bank.then_some(x1),
                    x2: multi_or_bank.then_some(x2),
                };
                let Ok(idx) = mangle::mangle_address(pin_map, chip, addr, levels, multi_or_bank) else {
                    continue;
                };
                let actual_mangled = table.get(idx as usize).copied().unwrap_or(0);
                let actual = if activated {
                    mangle::demangle_byte(pin_map, actual_mangled, d_mod_8)
                } else {
                    actual_mangled
                };

                tuples_checked += 1;
                if actual != expected && mismatches.len() < MAX_REPORTED_MISMATCHES {
                    mismatches.push(Mismatch {
                        addr,
                        cs1,
                        cs2,
                        cs3,
                        x1,
                        x2,
                        expected,
                        actual,
                    });
                }
            }
        }
    }

    ValidationReport {
        tuples_checked,
        mismatches,
    }
}

/// Validates every ROM set in a composed input, returning one report per
/// set in input order.
pub fn validate_all(
    pin_map: &PinMap,
    sets: &[RomSetInput],
    tables: &[Vec<u8>],
    d_mod_8: bool,
) -> Vec<ValidationReport> {
    sets.iter()
        .zip(tables.iter())
        .map(|(set, table)| validate_rom_set(pin_map, set, table, d_mod_8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::RomSetInput;
    use crate::model::{RomSourceDescriptor, ServeMode};
    use crate::romset::build_table;
    use onerom_common::chip::Polarity;
    use onerom_common::hw::Port;
    use std::collections::HashMap;

    fn pin_map_2364() -> PinMap {
        let mut cs1 = HashMap::new();
        cs1.insert(ChipType::Rom2364, 13u8);
        PinMap {
            name: "test".into(),
            description: "test".into(),
        mcu_family: onerom_common::hw::McuFamily::Ice,
            data_port: Port::A,
            addr_port: Port::C,
            cs_port: Port::C,
            sel_port: Port::B,
            status_port: Port::B,
            data: vec![0, 1, 2, 3, 4, 5, 6, 7],
            addr: vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            cs1,
            cs2: HashMap::new(),
            cs3: HashMap::new(),
            x1: None,
            x2: None,
            sel: vec![0, 1, 2, 3],
            sel_jumper_pull: 0,
            status_led: Some(5),
            vbus_detect: None,
            swdio: None,
            swclk: None,
        }
    }

    #[test]
    fn clean_table_reports_no_mismatches() {
        let pm = pin_map_2364();
        let mut source = vec![0u8; 8192];
        source[100] = 0x77;
        let rom = RomSourceDescriptor {
            chip_type: ChipType::Rom2364,
            cs1: Polarity::ActiveLow,
            cs2: Polarity::NotUsed,
            cs3: Polarity::NotUsed,
            filename: None,
            source,
        };
        let set = RomSetInput {
            mode: ServeMode::Single,
            roms: vec![rom],
            firmware_overrides: None,
            serve_alg_params: None,
        };
        let table = build_table(0, &pm, ServeMode::Single, &set.roms, false).unwrap();
        let report = validate_rom_set(&pm, &set, &table, false);
        assert!(report.is_clean(), "unexpected mismatches: {:?}", report.mismatches);
        assert_eq!(report.tuples_checked, 8192 * 2);
    }

    #[test]
    fn corrupted_table_is_caught() {
        let pm = pin_map_2364();
        let rom = RomSourceDescriptor {
            chip_type: ChipType::Rom2364,
            cs1: Polarity::ActiveLow,
            cs2: Polarity::NotUsed,
            cs3: Polarity::NotUsed,
            filename: None,
            source: vec![0u8; 8192],
        };
        let set = RomSetInput {
            mode: ServeMode::Single,
            roms: vec![rom],
            firmware_overrides: None,
            serve_alg_params: None,
        };
        let mut table = build_table(0, &pm, ServeMode::Single, &set.roms, false).unwrap();
        table[1 << 13] = 0x99;
        let report = validate_rom_set(&pm, &set, &table, false);
        assert!(!report.is_clean());
    }
}
