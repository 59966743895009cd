// Copyright (C) 2025 One ROM Project
//
// MIT License

//! The error taxonomy from spec §7, expressed as closed `thiserror` enums
//! rather than ad-hoc strings.

use thiserror::Error;

/// Errors raised by the chip/hardware catalogs (C1/C2).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown chip type: {0}")]
    UnknownChipType(String),

    #[error("unknown hardware revision: {0}")]
    UnknownRevision(String),

    #[error("{revision}: {detail}")]
    InvalidPinMap { revision: String, detail: String },
}

/// Input/config validation errors (C3).
#[derive(Debug, Error)]
pub enum InputError {
    #[error("schema violation at {path}: {detail}")]
    SchemaViolation { path: String, detail: String },

    #[error("ROM {chip_type} expects {expected} bytes after transforms, got {got}")]
    SizeMismatch {
        chip_type: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate_to target {target} is smaller than source length {source_len}")]
    DuplicateToTooSmall { source_len: usize, target: usize },

    #[error("pad_to target {target} exceeds chip capacity {capacity}")]
    PadToExceedsCapacity { target: usize, capacity: usize },

    #[error("CS line {line} on {chip_type} disagrees across ROMs in set {set_id}")]
    InconsistentPolarity {
        set_id: usize,
        chip_type: String,
        line: u8,
    },

    #[error("{chip_type} requires {expected} CS line(s), config supplies {got}")]
    WrongCsLineCount {
        chip_type: String,
        expected: u8,
        got: u8,
    },

    #[error("27-series chip {chip_type} fixes {line} to active_low, config requested {requested}")]
    CsPolarityNotOverridable {
        chip_type: String,
        line: &'static str,
        requested: String,
    },

    #[error("ROM set {set_id} requires hardware revision with X1/X2 extension pins")]
    MissingExtensionPins { set_id: usize },

    #[error("bank-switched set {set_id} exceeds the maximum of 4 ROMs")]
    TooManyBanks { set_id: usize },

    #[error("serve_alg_params framing invalid: {detail}")]
    BadServeAlgFraming { detail: String },

    #[error("at least one ROM set must be provided")]
    EmptyConfig,
}

/// Errors fetching/decoding ROM source bytes (C3).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch {url}: {kind}")]
    FetchFailed { url: String, kind: String },

    #[error("zip archive member '{member}' not found")]
    ArchiveMemberMissing { member: String },

    #[error("failed to open zip archive: {0}")]
    ArchiveOpenFailed(String),

    #[error("local file I/O failed for {path}: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Layout errors raised while composing the final image (C7).
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("mangled table of size {size} cannot be aligned within flash budget {budget}")]
    AlignmentUnsatisfiable { size: usize, budget: usize },

    #[error("offset table overflow: {count} ROM sets exceeds representable offsets")]
    OffsetTableOverflow { count: usize },

    #[error("firmware code region ({code_size} bytes) overlaps metadata header placement")]
    CodeRegionOverlap { code_size: usize },

    #[error("requested address 0x{addr:08x} overflows the address space for chip type {chip_type}")]
    AddressOverflow { chip_type: String, addr: u32 },
}

/// Errors raised while parsing a previously composed image (C8).
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("magic bytes not found within first {scanned} bytes")]
    BadMagic { scanned: usize },

    #[error("unsupported metadata schema version {found}, max understood is {max}")]
    UnsupportedVersion { found: u8, max: u8 },

    #[error("image truncated: need {needed} bytes at offset {offset}, have {have}")]
    TruncatedImage {
        offset: usize,
        needed: usize,
        have: usize,
    },

    #[error("ROM set {set_id} offset {offset} is inconsistent with image size {image_size}")]
    InconsistentOffset {
        set_id: usize,
        offset: u32,
        image_size: usize,
    },

    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("{symbol} symbol not found in ELF")]
    ElfSymbolMissing { symbol: String },

    #[error("ELF section {section} not found")]
    ElfSectionMissing { section: String },
}

/// Catalog/runtime capability gaps - chip or revision recognized by name but
/// not (yet) supported end to end.
#[derive(Debug, Error)]
pub enum UnsupportedError {
    #[error("chip type {0} is not supported for table generation (see open question in design notes)")]
    ChipType(String),

    #[error("hardware revision {0} is not in the catalog")]
    Revision(String),
}
