// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The ROM-set builder (C6): combines one ROM, a multi-CS group, or a
//! bank-switched group into a single mangled table honoring the
//! chip-select/X-pin selection matrix.

use crate::mangle::{self, LineLevels, FILL_BYTE};
use crate::model::{RomSourceDescriptor, ServeMode};
use onerom_common::chip::{ChipType, Polarity};
use onerom_common::error::InputError;
use onerom_common::hw::PinMap;

/// Maximum ROMs in a bank-switched set (2-bit `(X2<<1)|X1` selector).
pub const MAX_BANKS: usize = 4;
/// Maximum ROMs in a multi-CS set sharing one socket family.
pub const MAX_MULTI_ROMS: usize = 3;

fn validate_roms(
    set_id: usize,
    mode: ServeMode,
    pin_map: &PinMap,
    roms: &[RomSourceDescriptor],
) -> Result<(), InputError> {
    if roms.is_empty() {
        return Err(InputError::EmptyConfig);
    }

    let chip_type = roms[0].chip_type;
    for rom in roms {
        for line in 0..3u8 {
            let declared = rom.cs_polarity(line);
            if let Some(fixed) = rom.chip_type.fixed_cs_polarity(line)
                && declared != Polarity::NotUsed
                && declared != fixed
            {
                return Err(InputError::CsPolarityNotOverridable {
                    chip_type: rom.chip_type.name().to_string(),
                    line: cs_line_name(line),
                    requested: format!("{declared}"),
                });
            }
        }
        let active_lines = (0..3).filter(|&l| rom.cs_polarity(l) != Polarity::NotUsed).count() as u8;
        if active_lines != rom.chip_type.cs_lines_count() {
            return Err(InputError::WrongCsLineCount {
                chip_type: rom.chip_type.name().to_string(),
                expected: rom.chip_type.cs_lines_count(),
                got: active_lines,
            });
        }
    }

    if matches!(mode, ServeMode::Single) && roms.len() != 1 {
        return Err(InputError::WrongCsLineCount {
            chip_type: chip_type.name().to_string(),
            expected: 1,
            got: roms.len() as u8,
        });
    }

    if mode.uses_extension_pins() {
        if !pin_map.supports_extension_pins() {
            return Err(InputError::MissingExtensionPins { set_id });
        }
        if matches!(mode, ServeMode::BankSwitched) && roms.len() > MAX_BANKS {
            return Err(InputError::TooManyBanks { set_id });
        }
        if matches!(mode, ServeMode::MultiAnyCs) && roms.len() > MAX_MULTI_ROMS {
            return Err(InputError::WrongCsLineCount {
                chip_type: chip_type.name().to_string(),
                expected: MAX_MULTI_ROMS as u8,
                got: roms.len() as u8,
            });
        }
    }

    // All ROMs sharing one table must be the same chip type and agree on
    // every line's declared polarity - they share one physical socket.
    for rom in &roms[1..] {
        if rom.chip_type != chip_type {
            return Err(InputError::InconsistentPolarity {
                set_id,
                chip_type: chip_type.name().to_string(),
                line: 0,
            });
        }
    }

    Ok(())
}

fn cs_line_name(line: u8) -> &'static str {
    match line {
        0 => "cs1/ce",
        1 => "cs2/oe",
        2 => "cs3",
        _ => "cs?",
    }
}

/// Size in bytes of the mangled table this chip type/serving mode pair
/// produces (§4.3).
pub fn table_size(chip: ChipType, mode: ServeMode) -> usize {
    let width = chip.addr_bits();
    if chip.pin_count() == 24 {
        let mut bits = width + chip.cs_lines_count() as u32;
        if mode.uses_extension_pins() {
            bits += 2;
        }
        1usize << bits
    } else {
        1usize << width
    }
}

/// Picks which ROM in the set (if any) responds to a given `(x1, x2)`
/// level pair, wrapping by modulo when fewer ROMs than selector slots are
/// declared (§4.3 tie-break (b), §4.4 "which ROM answers").
pub(crate) fn select_rom(roms: &[RomSourceDescriptor], x1: bool, x2: bool) -> &RomSourceDescriptor {
    let slot = ((x2 as usize) << 1) | (x1 as usize);
    &roms[slot % roms.len()]
}

/// Builds the mangled table for one ROM set (C6), delegating per-tuple
/// permutation to the address/byte manglers (C4/C5).
pub fn build_table(
    set_id: usize,
    pin_map: &PinMap,
    mode: ServeMode,
    roms: &[RomSourceDescriptor],
    d_mod_8: bool,
) -> Result<Vec<u8>, InputError> {
    validate_roms(set_id, mode, pin_map, roms)?;

    let chip = roms[0].chip_type;
    let size = table_size(chip, mode);
    let mut table = vec![FILL_BYTE; size];
    let width = chip.addr_bits();
    let num_cs = if chip.pin_count() == 24 {
        chip.cs_lines_count()
    } else {
        0
    };
    let multi_or_bank = mode.uses_extension_pins();

    let cs_range = 1u8 << num_cs;
    let x_range: u8 = if multi_or_bank { 4 } else { 1 };

    for addr in 0u32..(1u32 << width) {
        for cs_bits in 0..cs_range {
            let cs1 = cs_bits & 1 != 0;
            let cs2 = num_cs > 1 && (cs_bits >> 1) & 1 != 0;
            let cs3 = num_cs > 2 && (cs_bits >> 2) & 1 != 0;

            for x_bits in 0..x_range {
                let x1 = multi_or_bank && x_bits & 1 != 0;
                let x2 = multi_or_bank && (x_bits >> 1) & 1 != 0;

                let rom = if roms.len() > 1 {
                    Some(select_rom(roms, x1, x2))
                } else {
                    Some(&roms[0])
                };

                let activated = rom.is_some_and(|r| {
                    r.chip_type.fixed_cs_polarity(0).unwrap_or(r.cs1).is_active(cs1)
                        && (num_cs < 2 || r.chip_type.fixed_cs_polarity(1).unwrap_or(r.cs2).is_active(cs2))
                        && (num_cs < 3 || r.cs3.is_active(cs3))
                });

                let levels = LineLevels {
                    cs1,
                    cs2,
                    cs3,
                    x1: multi_or_bank.then_some(x1),
                    x2: multi_or_bank.then_some(x2),
                };
                let idx = mangle::mangle_address(pin_map, chip, addr, levels, multi_or_bank)
                    .map_err(|e| InputError::BadServeAlgFraming { detail: e.to_string() })?;

                table[idx as usize] = if activated {
                    let rom = rom.unwrap();
                    mangle::mangle_byte(pin_map, rom.source[addr as usize], d_mod_8)
                } else {
                    FILL_BYTE
                };
            }
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn single_2364_table_is_16kib() {
        assert_eq!(table_size(ChipType::Rom2364, ServeMode::Single), 16384);
    }

    #[test]
    fn single_2364_rom_round_trips_at_address_zero() {
        let pm = pin_map_2364();
        let mut source = vec![0u8; 8192];
        source[0] = 0x42;
        let rom = RomSourceDescriptor {
            chip_type: ChipType::Rom2364,
            cs1: Polarity::ActiveLow,
            cs2: Polarity::NotUsed,
            cs3: Polarity::NotUsed,
            filename: None,
            source,
        };
        let table = build_table(0, &pm, ServeMode::Single, &[rom], false).unwrap();
        assert_eq!(table[0], 0x42);
        assert_eq!(table[1 << 13], FILL_BYTE);
    }

    #[test]
    fn multi_set_without_extension_pins_is_rejected() {
        let pm = pin_map_2364();
        let rom = RomSourceDescriptor {
            chip_type: ChipType::Rom2364,
            cs1: Polarity::ActiveLow,
            cs2: Polarity::NotUsed,
            cs3: Polarity::NotUsed,
            filename: None,
            source: vec![0u8; 8192],
        };
        let err = build_table(0, &pm, ServeMode::MultiAnyCs, &[rom.clone(), rom], false);
        assert!(matches!(err, Err(InputError::MissingExtensionPins { .. })));
    }

    #[test]
    fn wrong_cs_line_count_is_rejected() {
        let pm = pin_map_2364();
        let rom = RomSourceDescriptor {
            chip_type: ChipType::Rom2364,
            cs1: Polarity::ActiveLow,
            cs2: Polarity::ActiveLow,
            cs3: Polarity::NotUsed,
            filename: None,
            source: vec![0u8; 8192],
        };
        let err = build_table(0, &pm, ServeMode::Single, &[rom], false);
        assert!(matches!(err, Err(InputError::WrongCsLineCount { .. })));
    }
}
