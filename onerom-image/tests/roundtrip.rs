// Copyright (C) 2025 One ROM Project
//
// MIT License

//! Property-based round-trip tests (P1-P6) and the literal end-to-end
//! scenarios, exercising the composer, parser and validator together.

use onerom_common::chip::{ChipType, Polarity};
use onerom_common::hw::{PinMap, Port};
use onerom_image::compose::check_alignment;
use onerom_image::{
    build_table, compose_image, mangle_address, parse_image, table_size, validate_rom_set,
    ComposeInput, FireServeMode, FirmwareOverrides, LineLevels, RomSetInput, RomSourceDescriptor,
    ServeMode,
};
use std::collections::HashMap;

fn pin_map_24(swap_check: bool) -> PinMap {
    let mut cs1 = HashMap::new();
    for chip in [ChipType::Rom2364, ChipType::Rom2732, ChipType::Rom2732A] {
        cs1.insert(chip, 13u8);
    }
    PinMap {
        name: "test-24".into(),
        description: "test fixture".into(),
        mcu_family: onerom_common::hw::McuFamily::Ice,
        data_port: Port::A,
        addr_port: Port::C,
        cs_port: Port::C,
        sel_port: Port::B,
        status_port: Port::B,
        data: vec![0, 1, 2, 3, 4, 5, 6, 7],
        addr: if swap_check {
            vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 14, 12]
        } else {
            vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        },
        cs1,
        cs2: HashMap::new(),
        cs3: HashMap::new(),
        x1: Some(14),
        x2: Some(15),
        sel: vec![0, 1, 2, 3],
        sel_jumper_pull: 0,
        status_led: Some(5),
        vbus_detect: None,
        swdio: None,
        swclk: None,
    }
}

fn pin_map_28() -> PinMap {
    PinMap {
        name: "test-28".into(),
        description: "test fixture".into(),
        mcu_family: onerom_common::hw::McuFamily::Ice,
        data_port: Port::A,
        addr_port: Port::C,
        cs_port: Port::C,
        sel_port: Port::B,
        status_port: Port::B,
        data: vec![0, 1, 2, 3, 4, 5, 6, 7],
        addr: (0..15u8).collect(),
        cs1: HashMap::new(),
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

fn rom_2364(source: Vec<u8>) -> RomSourceDescriptor {
    RomSourceDescriptor {
        chip_type: ChipType::Rom2364,
        cs1: Polarity::ActiveLow,
        cs2: Polarity::NotUsed,
        cs3: Polarity::NotUsed,
        filename: None,
        source,
    }
}

/// P1: compose -> parse -> demangle recovers the original source bytes.
#[test]
fn p1_round_trip_recovers_source() {
    let pm = pin_map_24(false);
    let mut source = vec![0u8; 8192];
    for (i, b) in source.iter_mut().enumerate() {
        *b = (i % 256) as u8;
    }
    let rom = rom_2364(source.clone());
    let input = ComposeInput {
        firmware_code: vec![0xDE, 0xAD, 0xBE, 0xEF],
        pin_map: pm.clone(),
        d_mod_8: false,
        include_filenames: false,
        rom_sets: vec![RomSetInput {
            mode: ServeMode::Single,
            roms: vec![rom],
            firmware_overrides: None,
            serve_alg_params: None,
        }],
    };
    let image = compose_image(&input).unwrap();
    let parsed = parse_image(&image, None).unwrap();
    assert_eq!(parsed.rom_sets.len(), 1);
    let recovered = parsed.demangle_rom(0, 0, &pm, false).unwrap();
    assert_eq!(recovered, source);
}

/// P2: composing the same input twice yields identical bytes.
#[test]
fn p2_compose_is_deterministic() {
    let pm = pin_map_24(false);
    let rom = rom_2364(vec![0x11; 8192]);
    let input = ComposeInput {
        firmware_code: vec![1, 2, 3],
        pin_map: pm,
        d_mod_8: false,
        include_filenames: false,
        rom_sets: vec![RomSetInput {
            mode: ServeMode::Single,
            roms: vec![rom],
            firmware_overrides: None,
            serve_alg_params: None,
        }],
    };
    let a = compose_image(&input).unwrap();
    let b = compose_image(&input).unwrap();
    assert_eq!(a, b);
}

/// P3: every mangled table's image offset is a multiple of its own size.
#[test]
fn p3_table_alignment_holds() {
    let pm = pin_map_24(false);
    let rom = rom_2364(vec![0x22; 8192]);
    let input = ComposeInput {
        firmware_code: vec![0; 7],
        pin_map: pm.clone(),
        d_mod_8: false,
        include_filenames: false,
        rom_sets: vec![RomSetInput {
            mode: ServeMode::Single,
            roms: vec![rom],
            firmware_overrides: None,
            serve_alg_params: None,
        }],
    };
    let image = compose_image(&input).unwrap();
    let parsed = parse_image(&image, None).unwrap();
    let set = &parsed.rom_sets[0];
    let table_offset_in_image = image.len() - set.table.len();
    // table_offset relative to header is what check_alignment expects.
    let rel_offset = table_offset_in_image - parsed.header_offset;
    check_alignment(rel_offset, set.table.len()).unwrap();
}

/// P4: a non-activating CS tuple demangles to the fill byte.
#[test]
fn p4_inactive_tuple_is_fill_byte() {
    let pm = pin_map_24(false);
    let rom = rom_2364(vec![0x33; 8192]);
    let table = build_table(0, &pm, ServeMode::Single, &[rom], false).unwrap();
    let levels = LineLevels {
        cs1: true,
        ..Default::default()
    };
    let idx = mangle_address(&pm, ChipType::Rom2364, 0, levels, false).unwrap();
    assert_eq!(
        onerom_image::demangle_byte(&pm, table[idx as usize], false),
        onerom_image::FILL_BYTE
    );
}

/// P5: a clean validator report implies the round-trip holds by
/// construction.
#[test]
fn p5_clean_validation_implies_round_trip() {
    let pm = pin_map_24(false);
    let mut source = vec![0u8; 8192];
    source[42] = 0x99;
    let rom = rom_2364(source.clone());
    let set = RomSetInput {
        mode: ServeMode::Single,
        roms: vec![rom],
        firmware_overrides: None,
        serve_alg_params: None,
    };
    let table = build_table(0, &pm, ServeMode::Single, &set.roms, false).unwrap();
    let report = validate_rom_set(&pm, &set, &table, false);
    assert!(report.is_clean());

    let levels = LineLevels::default();
    let idx = mangle_address(&pm, ChipType::Rom2364, 42, levels, false).unwrap();
    let byte = onerom_image::demangle_byte(&pm, table[idx as usize], false);
    assert_eq!(byte, source[42]);
}

/// P6: a 2732's A11/A12 pin assignment is swapped relative to a 2364 on
/// the same pin map.
#[test]
fn p6_2732_swaps_a11_a12() {
    let pm = pin_map_24(true);
    let idx_2364 = mangle_address(&pm, ChipType::Rom2364, 1 << 11, LineLevels::default(), false).unwrap();
    let idx_2732 = mangle_address(&pm, ChipType::Rom2732, 1 << 11, LineLevels::default(), false).unwrap();
    assert_ne!(idx_2364, idx_2732);

    let idx_2364_a12 = mangle_address(&pm, ChipType::Rom2364, 1 << 12, LineLevels::default(), false).unwrap();
    let idx_2732_a11 = mangle_address(&pm, ChipType::Rom2732, 1 << 11, LineLevels::default(), false).unwrap();
    assert_eq!(idx_2364_a12, idx_2732_a11);
}

/// Boundary: zero ROM sets compose to an empty set list and a clean parse.
#[test]
fn empty_config_round_trips() {
    let input = ComposeInput {
        firmware_code: vec![0xAA; 16],
        pin_map: pin_map_24(false),
        d_mod_8: false,
        include_filenames: false,
        rom_sets: vec![],
    };
    let image = compose_image(&input).unwrap();
    let parsed = parse_image(&image, None).unwrap();
    assert!(parsed.rom_sets.is_empty());
}

/// Boundary: a bank-switched set with 3 ROMs wraps bank 3 to ROM 0.
#[test]
fn bank_switched_wraps_modulo_rom_count() {
    let pm = pin_map_24(false);
    let roms: Vec<_> = (0..3u8).map(|i| rom_2364(vec![i; 8192])).collect();
    let table = build_table(0, &pm, ServeMode::BankSwitched, &roms, false).unwrap();

    let levels_bank3 = LineLevels {
        cs1: false,
        x1: Some(true),
        x2: Some(true),
        ..Default::default()
    };
    let idx = mangle_address(&pm, ChipType::Rom2364, 0, levels_bank3, true).unwrap();
    assert_eq!(table[idx as usize], 0);
}

/// Literal scenario 1: single 2364 kernal.
#[test]
fn scenario_single_2364_kernal() {
    let pm = pin_map_24(false);
    let mut source = vec![0u8; 8192];
    source[0] = 0x4C;
    let rom = rom_2364(source.clone());
    let set = RomSetInput {
        mode: ServeMode::Single,
        roms: vec![rom],
        firmware_overrides: None,
        serve_alg_params: None,
    };
    assert_eq!(table_size(ChipType::Rom2364, ServeMode::Single), 16384);
    let table = build_table(0, &pm, ServeMode::Single, &set.roms, false).unwrap();

    let active = mangle_address(&pm, ChipType::Rom2364, 0, LineLevels::default(), false).unwrap();
    assert_eq!(active, 0);
    assert_eq!(table[active as usize], source[0]);

    let inactive_levels = LineLevels {
        cs1: true,
        ..Default::default()
    };
    let inactive = mangle_address(&pm, ChipType::Rom2364, 0, inactive_levels, false).unwrap();
    assert_eq!(table[inactive as usize], onerom_image::FILL_BYTE);
}

/// Literal scenario 4: 27256 with CE/OE both active-low, only the
/// all-active tuple activates the ROM.
#[test]
fn scenario_27256_ce_oe_gating() {
    let pm = pin_map_28();
    let mut source = vec![0u8; 32768];
    source[7] = 0x5A;
    let rom = RomSourceDescriptor {
        chip_type: ChipType::Rom27256,
        cs1: Polarity::ActiveLow,
        cs2: Polarity::ActiveLow,
        cs3: Polarity::NotUsed,
        filename: None,
        source: source.clone(),
    };
    let set = RomSetInput {
        mode: ServeMode::Single,
        roms: vec![rom],
        firmware_overrides: None,
        serve_alg_params: None,
    };
    let table = build_table(0, &pm, ServeMode::Single, &set.roms, false).unwrap();
    let idx = mangle_address(&pm, ChipType::Rom27256, 7, LineLevels::default(), false).unwrap();
    assert_eq!(table[idx as usize], 0x5A);

    let report = validate_rom_set(&pm, &set, &table, false);
    assert!(report.is_clean());
}

/// Literal scenario 5: FIRE override bits and voltage code resolve as
/// documented.
#[test]
fn scenario_firmware_override_bits_and_vreg() {
    let overrides = FirmwareOverrides {
        fire_cpu_freq: Some(300),
        fire_overclock: Some(true),
        fire_vreg: onerom_image::FIRE_VREG_TABLE.iter().position(|&v| v == "1.20V").map(|i| i as u8),
        fire_serve_mode: Some(FireServeMode::Cpu),
        ..Default::default()
    };
    assert_eq!(overrides.fire_vreg, Some(0x0D));

    let pm = pin_map_24(false);
    let rom = rom_2364(vec![0u8; 8192]);
    let input = ComposeInput {
        firmware_code: vec![0; 4],
        pin_map: pm,
        d_mod_8: false,
        include_filenames: false,
        rom_sets: vec![RomSetInput {
            mode: ServeMode::Single,
            roms: vec![rom],
            firmware_overrides: Some(overrides),
            serve_alg_params: None,
        }],
    };
    let image = compose_image(&input).unwrap();
    let parsed = parse_image(&image, None).unwrap();
    let fw = parsed.rom_sets[0].firmware_overrides.as_ref().unwrap();
    assert_eq!(fw.fire_cpu_freq, Some(300));
    assert_eq!(fw.fire_overclock, Some(true));
    assert_eq!(fw.fire_vreg, Some(0x0D));
    let mut bits = fw.present_bits();
    bits.sort();
    assert_eq!(bits, vec![2, 3, 4, 5]);
}

/// Literal scenario 2: a five-single-set image preserves declaration
/// order, so selecting among them (e.g. via jumpers) is a simple index.
#[test]
fn scenario_five_single_sets_preserve_order() {
    let pm = pin_map_24(false);
    let rom_sets: Vec<RomSetInput> = (0..5u8)
        .map(|i| RomSetInput {
            mode: ServeMode::Single,
            roms: vec![rom_2364(vec![i; 8192])],
            firmware_overrides: None,
            serve_alg_params: None,
        })
        .collect();
    let input = ComposeInput {
        firmware_code: vec![0; 4],
        pin_map: pm.clone(),
        d_mod_8: false,
        include_filenames: false,
        rom_sets,
    };
    let image = compose_image(&input).unwrap();
    let parsed = parse_image(&image, None).unwrap();
    assert_eq!(parsed.rom_sets.len(), 5);
    for (i, set) in parsed.rom_sets.iter().enumerate() {
        let recovered = parsed.demangle_rom(i, 0, &pm, false).unwrap();
        assert!(recovered.iter().all(|&b| b == i as u8));
        assert_eq!(set.mode, ServeMode::Single);
    }
}

/// Literal scenario 3: a 4-ROM bank-switched character-ROM set selects
/// the right bank via the X1/X2 slot formula `(x2<<1)|x1`.
#[test]
fn scenario_bank_switched_character_roms() {
    let pm = pin_map_24(false);
    let roms: Vec<_> = (0..4u8).map(|i| rom_2364(vec![i * 0x10; 8192])).collect();
    let table = build_table(0, &pm, ServeMode::BankSwitched, &roms, false).unwrap();

    // x1=1, x2=0 selects bank 1.
    let levels = LineLevels {
        cs1: false,
        x1: Some(true),
        x2: Some(false),
        ..Default::default()
    };
    let idx = mangle_address(&pm, ChipType::Rom2364, 7, levels, true).unwrap();
    assert_eq!(table[idx as usize], 0x10);
}

/// Literal scenario 6 (validator half): an empty config's validator run
/// (vacuously, zero sets) reports zero tuples checked and passes.
#[test]
fn scenario_empty_config_validates_clean() {
    let reports = onerom_image::validate_all(&pin_map_24(false), &[], &[], false);
    assert!(reports.is_empty());
}

/// `demangle_rom`'s rom-index parameter recovers every bank of a real
/// compose -> parse round trip, not just the first.
#[test]
fn demangle_rom_recovers_every_bank() {
    let pm = pin_map_24(false);
    let roms: Vec<_> = (0..4u8).map(|i| rom_2364(vec![i.wrapping_mul(0x11); 8192])).collect();
    let input = ComposeInput {
        firmware_code: vec![0; 4],
        pin_map: pm.clone(),
        d_mod_8: false,
        include_filenames: false,
        rom_sets: vec![RomSetInput {
            mode: ServeMode::BankSwitched,
            roms: roms.clone(),
            firmware_overrides: None,
            serve_alg_params: None,
        }],
    };
    let image = compose_image(&input).unwrap();
    let parsed = parse_image(&image, None).unwrap();

    for (i, rom) in roms.iter().enumerate() {
        let recovered = parsed.demangle_rom(0, i, &pm, false).unwrap();
        assert_eq!(recovered, rom.source, "bank {i} did not round-trip");
    }
}
