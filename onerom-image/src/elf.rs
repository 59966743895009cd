// Copyright (C) 2025 One ROM Project
//
// MIT License

//! ELF support for the parser (C8): locates the metadata header by symbol
//! name rather than magic-scanning, for firmware images still carrying
//! debug symbols.

use crate::parse::{parse_image, ParsedImage};
use goblin::elf::Elf;
use onerom_common::error::IntegrityError;

/// Name of the linker symbol the composer's build step is expected to
/// attach to the metadata header.
pub const METADATA_SYMBOL: &str = "onerom_metadata";

/// Finds `METADATA_SYMBOL` in the ELF's symbol table and returns the
/// header's file offset, computed from the symbol's section-relative
/// virtual address.
pub fn locate_metadata_offset(elf_data: &[u8]) -> Result<usize, IntegrityError> {
    let elf = Elf::parse(elf_data).map_err(|_| IntegrityError::ElfSymbolMissing {
        symbol: METADATA_SYMBOL.to_string(),
    })?;

    let sym = elf
        .syms
        .iter()
        .find(|sym| elf.strtab.get_at(sym.st_name) == Some(METADATA_SYMBOL))
        .ok_or_else(|| IntegrityError::ElfSymbolMissing {
            symbol: METADATA_SYMBOL.to_string(),
        })?;

    let section = elf
        .section_headers
        .get(sym.st_shndx)
        .ok_or_else(|| IntegrityError::ElfSectionMissing {
            section: format!("index {}", sym.st_shndx),
        })?;

    let offset_in_section = sym.st_value - section.sh_addr;
    Ok((section.sh_offset + offset_in_section) as usize)
}

/// Loads and parses an image from an ELF file's bytes, locating the
/// metadata header via [`METADATA_SYMBOL`] rather than a magic-scan.
pub fn parse_elf_image(elf_data: &[u8]) -> Result<ParsedImage, IntegrityError> {
    let offset = locate_metadata_offset(elf_data)?;
    parse_image(elf_data, Some(offset))
}
