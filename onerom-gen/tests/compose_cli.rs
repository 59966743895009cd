// Copyright (C) 2025 One ROM Project
//
// MIT License

//! End-to-end CLI test: a hardware revision, firmware binary and JSON
//! config on disk, composed via the binary, then parsed back and
//! validated.

use assert_cmd::Command;
use std::fs;

const PIN_MAP_JSON: &str = r#"{
    "description": "test fixture",
    "mcu_family": "Ice",
    "data_port": "A",
    "addr_port": "C",
    "cs_port": "C",
    "sel_port": "B",
    "status_port": "B",
    "data": [0, 1, 2, 3, 4, 5, 6, 7],
    "addr": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
    "cs1": {"2364": 13},
    "x1": 14,
    "x2": 15,
    "sel": [0, 1, 2, 3],
    "status_led": 5,
    "vbus_detect": null,
    "swdio": null,
    "swclk": null
}"#;

#[test]
fn composes_and_parses_single_2364_set() {
    let dir = tempfile::tempdir().unwrap();
    let hw_dir = dir.path().join("onerom-hw-config");
    fs::create_dir_all(&hw_dir).unwrap();
    fs::write(hw_dir.join("test-rev.json"), PIN_MAP_JSON).unwrap();

    let rom_path = dir.path().join("kernal.bin");
    fs::write(&rom_path, vec![0x42u8; 8192]).unwrap();

    let fw_path = dir.path().join("fw.bin");
    fs::write(&fw_path, vec![0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

    let config_json = format!(
        r#"{{
            "version": 1,
            "description": "test set",
            "rom_sets": [
                {{
                    "type": "single",
                    "roms": [
                        {{"file": "{}", "type": "2364", "cs1": "active_low"}}
                    ]
                }}
            ]
        }}"#,
        rom_path.display()
    );
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, config_json).unwrap();

    let out_path = dir.path().join("image.bin");

    let mut cmd = Command::cargo_bin("onerom-gen").unwrap();
    cmd.current_dir(dir.path())
        .arg("--fw-image")
        .arg(&fw_path)
        .arg("--json")
        .arg(&config_path)
        .arg("--out")
        .arg(&out_path)
        .arg("--hw-rev")
        .arg("test-rev")
        .arg("--yes");
    cmd.assert().success();

    let image = fs::read(&out_path).unwrap();
    let parsed = onerom_image::parse_image(&image, None).unwrap();
    assert_eq!(parsed.rom_sets.len(), 1);
    assert_eq!(parsed.rom_sets[0].roms[0].chip_type, onerom_common::chip::ChipType::Rom2364);

    let pin_map: onerom_common::hw::PinMap = serde_json::from_str(PIN_MAP_JSON).unwrap();
    let recovered = parsed.demangle_rom(0, 0, &pin_map, false).unwrap();
    assert_eq!(recovered, vec![0x42u8; 8192]);
}

#[test]
fn refuses_to_overwrite_without_flag() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("image.bin");
    fs::write(&out_path, b"existing").unwrap();

    let config_path = dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"version": 1, "description": "empty", "rom_sets": []}"#,
    )
    .unwrap();
    let fw_path = dir.path().join("fw.bin");
    fs::write(&fw_path, [0u8; 4]).unwrap();

    let mut cmd = Command::cargo_bin("onerom-gen").unwrap();
    cmd.current_dir(dir.path())
        .arg("--fw-image")
        .arg(&fw_path)
        .arg("--json")
        .arg(&config_path)
        .arg("--out")
        .arg(&out_path)
        .arg("--hw-rev")
        .arg("test-rev")
        .arg("--yes");
    cmd.assert().failure();
}
