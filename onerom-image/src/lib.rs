// Copyright (C) 2025 One ROM Project
//
// MIT License

//! onerom-image
//!
//! Composes and parses One ROM firmware images: address mangling, byte
//! mangling, ROM-set building and the binary framing that ties them
//! together.
//!
//! Typically used like this, to compose an image:
//!
//! ```rust ignore
//! use onerom_image::compose::{compose_image, ComposeInput};
//! let bytes = compose_image(&input)?;
//! onerom_image::io::write_image_atomically(&out_path, &bytes)?;
//! ```
//!
//! and like this, to parse one back:
//!
//! ```rust ignore
//! use onerom_image::parse::parse_image;
//! let parsed = parse_image(&firmware_bytes, None)?;
//! ```

pub mod compose;
pub mod elf;
pub mod format;
pub mod io;
pub mod mangle;
pub mod model;
pub mod parse;
pub mod romset;
pub mod validate;

pub use compose::{compose_image, ComposeInput, RomSetInput};
pub use mangle::{demangle_byte, mangle_address, mangle_byte, LineLevels, FILL_BYTE};
pub use model::{
    FireServeMode, FirmwareOverrides, RomDescriptor, RomSourceDescriptor, ServeMode,
    FIRE_VREG_TABLE,
};
pub use parse::{parse_image, ParsedImage, ParsedRomSet};
pub use romset::{build_table, table_size};
pub use validate::{validate_all, validate_rom_set, Mismatch, ValidationReport};
