// Copyright (C) 2025 One ROM Project
//
// MIT License

//! Atomic image writes (§4.6, §5): composition writes to a temporary path
//! alongside the requested output and renames into place only once every
//! byte has been written and fsynced, so a crash mid-write never leaves a
//! partial file at the final path.

use onerom_common::error::SourceError;
use std::io::Write;
use std::path::Path;

pub fn write_image_atomically(path: &Path, bytes: &[u8]) -> Result<(), SourceError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SourceError::LocalIo {
        path: dir.display().to_string(),
        source: e,
    })?;

    tmp.write_all(bytes).map_err(|e| SourceError::LocalIo {
        path: path.display().to_string(),
        source: e,
    })?;
    tmp.as_file_mut().sync_all().map_err(|e| SourceError::LocalIo {
        path: path.display().to_string(),
        source: e,
    })?;

    tmp.persist(path).map_err(|e| SourceError::LocalIo {
        path: path.display().to_string(),
        source: e.error,
    })?;

    Ok(())
}
