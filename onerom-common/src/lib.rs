// Copyright (C) 2025 One ROM Project
//
// MIT License

//! Shared types for the One ROM image composer/mangler core: the chip
//! catalog, hardware pin maps, and the error taxonomy both depend on.

pub mod chip;
pub mod error;
pub mod hw;

pub use chip::{ChipType, Polarity};
pub use error::{CatalogError, InputError, IntegrityError, LayoutError, SourceError, UnsupportedError};
pub use hw::{PinMap, Port, PIN_UNUSED};
