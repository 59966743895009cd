// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The address mangler (C4) and byte (de)mangler (C5): pure permutation
//! math mapping logical ROM address/CS/bank-select bits and logical data
//! bytes to their GPIO-port-indexed representations.

use onerom_common::chip::ChipType;
use onerom_common::error::LayoutError;
use onerom_common::hw::PinMap;

/// Byte written into a mangled table entry that no tuple of
/// (address, CS, X) combinations activates.
pub const FILL_BYTE: u8 = 0xAA;

/// Width of one GPIO port's read register. A 24-pin chip's address, CS and
/// extension-select lines always sum to exactly this many bits - one full
/// port read becomes the mangled table index with no further arithmetic.
const PIN_MAP_SIZE: usize = 16;

/// The electrical level of every control/extension line considered while
/// building one mangled-table index.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineLevels {
    pub cs1: bool,
    pub cs2: bool,
    pub cs3: bool,
    pub x1: Option<bool>,
    pub x2: Option<bool>,
}

/// For a given pin map and chip type, builds the map from physical pin
/// index (0..16) to the logical address bit it carries, applying the 2732
/// A11/A12 swap and the 28-pin CS-exclusion/repack rule.
///
/// Returns `(pin_to_addr_map, addr_mask)` where `addr_mask` covers exactly
/// the address bits that participate in the index (address bits narrowed
/// for 28-pin chips where CS lines are handled by the runtime directly).
fn build_pin_to_addr_map(pin_map: &PinMap, chip: ChipType) -> [Option<u8>; PIN_MAP_SIZE] {
    let mut addr = pin_map.addr.clone();
    if chip.swaps_a11_a12() && addr.len() > 12 {
        addr.swap(11, 12);
    }

    let mut map = [None; PIN_MAP_SIZE];
    let is_24_pin = chip.pin_count() == 24;

    if is_24_pin {
        for (bit, &pin) in addr.iter().enumerate() {
            if pin != onerom_common::hw::PIN_UNUSED && (pin as usize) < PIN_MAP_SIZE {
                map[pin as usize] = Some(bit as u8);
            }
        }
    } else {
        // 28-pin: CS lines never enter the index; address pins are
        // repacked densely from bit 0 using only the pins actually wired.
        let min_pin = addr
            .iter()
            .copied()
            .filter(|&p| p != onerom_common::hw::PIN_UNUSED)
            .min()
            .unwrap_or(0);
        for (bit, &pin) in addr.iter().enumerate() {
            if pin != onerom_common::hw::PIN_UNUSED {
                let repacked = pin - min_pin;
                if (repacked as usize) < PIN_MAP_SIZE {
                    map[repacked as usize] = Some(bit as u8);
                }
            }
        }
    }

    map
}

/// Places the CS/X pins for a 24-pin chip into the pin-to-addr map,
/// assigning each a synthetic address bit above the chip's natural address
/// width (CS1 at `address_width`, CS2 at `address_width+1`, and so on,
/// matching the reference firmware's bit assignment order).
fn place_control_pins(
    pin_map: &PinMap,
    chip: ChipType,
    multi_or_bank: bool,
    map: &mut [Option<u8>; PIN_MAP_SIZE],
) -> (u8, u8, u8) {
    let width = chip.addr_bits() as u8;
    let num_cs = chip.cs_lines_count();

    let mut next_bit = width;
    let mut cs_bits = (0u8, 0u8, 0u8);
    for line in 0..num_cs {
        let pin = pin_map.pin_for_cs_line(chip, line);
        if pin != onerom_common::hw::PIN_UNUSED && (pin as usize) < PIN_MAP_SIZE {
            map[pin as usize] = Some(next_bit);
        }
        match line {
            0 => cs_bits.0 = next_bit,
            1 => cs_bits.1 = next_bit,
            2 => cs_bits.2 = next_bit,
            _ => {}
        }
        next_bit += 1;
    }

    if multi_or_bank {
        let x1 = pin_map.pin_x1();
        let x2 = pin_map.pin_x2();
        if x1 != onerom_common::hw::PIN_UNUSED && (x1 as usize) < PIN_MAP_SIZE {
            map[x1 as usize] = Some(next_bit);
        }
        next_bit += 1;
        if x2 != onerom_common::hw::PIN_UNUSED && (x2 as usize) < PIN_MAP_SIZE {
            map[x2 as usize] = Some(next_bit);
        }
    }

    cs_bits
}

/// Whether data and address pins share one GPIO port with data in the low
/// byte, which requires every other participating pin index to shift down
/// by 8 before building the table index.
fn low_byte_shared_port(pin_map: &PinMap) -> bool {
    pin_map.data_port == pin_map.addr_port
        && pin_map
            .data
            .iter()
            .copied()
            .filter(|&p| p != onerom_common::hw::PIN_UNUSED)
            .all(|p| p < 8)
}

/// Maps a logical source address plus control-line levels to the mangled
/// table index the runtime will see on its GPIO port.
///
/// `multi_or_bank` selects whether X1/X2 participate (multi-CS and
/// bank-switched sets) or are ignored (single-ROM sets).
pub fn mangle_address(
    pin_map: &PinMap,
    chip: ChipType,
    addr: u32,
    levels: LineLevels,
    multi_or_bank: bool,
) -> Result<u32, LayoutError> {
    let width = chip.addr_bits();
    if addr >> width != 0 {
        return Err(LayoutError::AddressOverflow {
            chip_type: chip.name().to_string(),
            addr,
        });
    }

    let is_24_pin = chip.pin_count() == 24;
    let mut map = build_pin_to_addr_map(pin_map, chip);
    let cs_bits = if is_24_pin {
        place_control_pins(pin_map, chip, multi_or_bank, &mut map)
    } else {
        (0, 0, 0)
    };
    let num_cs = if is_24_pin { u32::from(chip.cs_lines_count()) } else { 0 };

    let shift = if low_byte_shared_port(pin_map) { 8 } else { 0 };

    let mut result: u32 = 0;
    for (pin, bit) in map.iter().enumerate() {
        let Some(bit) = bit else { continue };
        let active = if is_24_pin && u32::from(*bit) >= width {
            match u32::from(*bit) - width {
                offset if offset == 0 && num_cs > 0 => levels.cs1,
                offset if offset == 1 && num_cs > 1 => levels.cs2,
                offset if offset == 2 && num_cs > 2 => levels.cs3,
                offset if offset == num_cs => levels.x1.unwrap_or(false),
                offset if offset == num_cs + 1 => levels.x2.unwrap_or(false),
                _ => false,
            }
        } else {
            (addr & (1 << bit)) != 0
        };
        if active {
            let pin_u32 = pin as u32;
            if pin_u32 >= shift {
                result |= 1 << (pin_u32 - shift);
            }
        }
    }

    let _ = cs_bits;
    Ok(result)
}

/// Mangles a logical data byte into the bit-permuted form stored in the
/// table, per the pin map's data-line assignment.
///
/// `d_mod_8` replicates the RP2350 GPIO16..23-relative-to-an-8-bit-store
/// projection; pass `false` for the STM32 path where data pins are already
/// 0..7 within their port.
pub fn mangle_byte(pin_map: &PinMap, byte: u8, d_mod_8: bool) -> u8 {
    let mut out = 0u8;
    for (bit, &pin) in pin_map.data.iter().enumerate() {
        if bit >= 8 || pin == onerom_common::hw::PIN_UNUSED {
            continue;
        }
        if (byte & (1 << bit)) != 0 {
            let phys = if d_mod_8 { pin % 8 } else { pin };
            if phys < 8 {
                out |= 1 << phys;
            }
        }
    }
    out
}

/// Inverse of [`mangle_byte`]: recovers the logical byte from a table
/// entry.
pub fn demangle_byte(pin_map: &PinMap, byte: u8, d_mod_8: bool) -> u8 {
    let mut out = 0u8;
    for (bit, &pin) in pin_map.data.iter().enumerate() {
        if bit >= 8 || pin == onerom_common::hw::PIN_UNUSED {
            continue;
        }
        let phys = if d_mod_8 { pin % 8 } else { pin };
        if phys < 8 && (byte & (1 << phys)) != 0 {
            out |= 1 << bit;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use onerom_common::hw::Port;
    use std::collections::HashMap;

    /// A 2364 has 13 address lines and 1 CS line, which together with 2
    /// extension-select pins exactly fill one 16-bit GPIO port (pins 0-12
    /// address, 13 CS1, 14/15 X1/X2) - mirrors the real hardware wiring.
    fn pin_map_24(swap_check: bool) -> PinMap {
        let mut cs1 = HashMap::new();
        cs1.insert(ChipType::Rom2364, 13u8);
        cs1.insert(ChipType::Rom2732, 13u8);
        cs1.insert(ChipType::Rom2732A, 13u8);

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
            addr: if swap_check {
                // A11 on pin 14, A12 on pin 12 - distinct from each other and
                // from CS1 at pin 13 - so the swap is observable.
                vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 14, 12]
            } else {
                vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
            },
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
    fn single_2364_address_zero_with_cs_inactive() {
        let pm = pin_map_24(false);
        let idx = mangle_address(&pm, ChipType::Rom2364, 0, LineLevels::default(), false).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn single_2364_cs1_asserted_sets_its_pin_bit() {
        let pm = pin_map_24(false);
        let levels = LineLevels {
            cs1: true,
            ..Default::default()
        };
        let idx = mangle_address(&pm, ChipType::Rom2364, 0, levels, false).unwrap();
        assert_eq!(idx, 1 << 13);
    }

    #[test]
    fn overflowing_address_is_rejected() {
        let pm = pin_map_24(false);
        let err = mangle_address(&pm, ChipType::Rom2364, 1 << 13, LineLevels::default(), false);
        assert!(err.is_err());
    }

    #[test]
    fn byte_mangle_round_trips() {
        let pm = pin_map_24(false);
        for b in 0..=255u8 {
            let mangled = mangle_byte(&pm, b, false);
            assert_eq!(demangle_byte(&pm, mangled, false), b);
        }
    }

    #[test]
    fn byte_mangle_is_identity_when_pins_match_bit_order() {
        let pm = pin_map_24(false);
        assert_eq!(mangle_byte(&pm, 0b1010_0001, false), 0b1010_0001);
    }

    #[test]
    fn pin_2732_swaps_a11_a12_positions() {
        let pm = pin_map_24(true);
        let map_2732 = build_pin_to_addr_map(&pm, ChipType::Rom2732);
        let map_2364 = build_pin_to_addr_map(&pm, ChipType::Rom2364);
        assert_eq!(map_2732[12], Some(11));
        assert_eq!(map_2364[14], Some(11));
    }
}
