// Copyright (C) 2025 One ROM Project
//
// MIT License

//! Source resolution for the config loader (C3): a `SourceFetcher`
//! capability abstracts network/filesystem I/O so tests can inject an
//! in-memory implementation instead of touching the network (§9).

use onerom_common::error::SourceError;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Resolves ROM source references to bytes: either a local file read or an
/// HTTPS fetch. Production uses [`HttpFetcher`]; tests use
/// [`InMemoryFetcher`].
pub trait SourceFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
    fn open_local(&self, path: &Path) -> Result<Vec<u8>, SourceError>;
}

/// Bounded retry budget for [`HttpFetcher::fetch`] (§4.2, §5): up to 3
/// attempts with exponential backoff, abandoned past a 60s total deadline.
const MAX_FETCH_ATTEMPTS: u32 = 3;
const FETCH_DEADLINE: Duration = Duration::from_secs(60);

/// Production fetcher: blocking HTTPS client plus local filesystem reads.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let deadline = Instant::now() + FETCH_DEADLINE;
        let mut last_err = None;

        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            if Instant::now() >= deadline {
                break;
            }
            match self.client.get(url).send().and_then(|r| r.error_for_status()).and_then(|r| r.bytes()) {
                Ok(bytes) => return Ok(bytes.to_vec()),
                Err(e) => {
                    tracing::warn!(url, attempt, error = %e, "fetch attempt failed, retrying");
                    last_err = Some(e.to_string());
                    if attempt < MAX_FETCH_ATTEMPTS {
                        std::thread::sleep(Duration::from_millis(250 * 2u64.pow(attempt - 1)));
                    }
                }
            }
        }

        Err(SourceError::FetchFailed {
            url: url.to_string(),
            kind: last_err.unwrap_or_else(|| "deadline exceeded".to_string()),
        })
    }

    fn open_local(&self, path: &Path) -> Result<Vec<u8>, SourceError> {
        std::fs::read(path).map_err(|e| SourceError::LocalIo {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Extracts one named member from a zip archive's bytes (§4.2).
pub fn extract_zip_member(archive_bytes: &[u8], member: &str) -> Result<Vec<u8>, SourceError> {
    let cursor = std::io::Cursor::new(archive_bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| SourceError::ArchiveOpenFailed(e.to_string()))?;
    let mut file = archive
        .by_name(member)
        .map_err(|_| SourceError::ArchiveMemberMissing { member: member.to_string() })?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).map_err(|e| SourceError::LocalIo {
        path: member.to_string(),
        source: e,
    })?;
    Ok(contents)
}

/// Test/integration-test fetcher: resolves URLs and paths from in-memory
/// maps rather than touching the network or filesystem (§9).
#[derive(Debug, Clone, Default)]
pub struct InMemoryFetcher {
    pub urls: HashMap<String, Vec<u8>>,
    pub files: HashMap<PathBuf, Vec<u8>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.urls.insert(url.into(), bytes);
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        self.files.insert(path.into(), bytes);
        self
    }
}

impl SourceFetcher for InMemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.urls.get(url).cloned().ok_or_else(|| SourceError::FetchFailed {
            url: url.to_string(),
            kind: "not registered with test fetcher".to_string(),
        })
    }

    fn open_local(&self, path: &Path) -> Result<Vec<u8>, SourceError> {
        self.files.get(path).cloned().ok_or_else(|| SourceError::LocalIo {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_fetcher_resolves_registered_url() {
        let f = InMemoryFetcher::new().with_url("https://example.test/rom.bin", vec![1, 2, 3]);
        assert_eq!(f.fetch("https://example.test/rom.bin").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn in_memory_fetcher_rejects_unregistered_url() {
        let f = InMemoryFetcher::new();
        assert!(f.fetch("https://nope").is_err());
    }

    #[test]
    fn zip_member_round_trips() {
        let mut buf = Vec::new();
        {
            let mut zw = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zw.start_file::<_, ()>("kernal.bin", zip::write::FileOptions::default()).unwrap();
            std::io::Write::write_all(&mut zw, &[0xAA; 8192]).unwrap();
            zw.finish().unwrap();
        }
        let extracted = extract_zip_member(&buf, "kernal.bin").unwrap();
        assert_eq!(extracted.len(), 8192);
        assert!(extract_zip_member(&buf, "missing.bin").is_err());
    }
}
