#![forbid(unsafe_code)]

//! PMTiles v3 header and metadata reading over range requests.
//!
//! Only the fixed 127-byte header and the JSON metadata block are read;
//! tile directories are never touched.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::fetch::{FetchResult, Fetcher};

pub const SCHEME: &str = "pmtiles://";
pub const HEADER_LEN: u64 = 127;
const MAGIC: &[u8; 7] = b"PMTiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Unknown,
    None,
    Gzip,
    Brotli,
    Zstd,
}

impl Compression {
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unknown,
            1 => Self::None,
            2 => Self::Gzip,
            3 => Self::Brotli,
            4 => Self::Zstd,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub metadata_offset: u64,
    pub metadata_length: u64,
    pub internal_compression: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Header {
    /// Parse a v3 header. `url` is used for error messages only.
    pub fn parse(bytes: &[u8], url: &str) -> FetchResult<Self> {
        let invalid = || FetchError::InvalidArchive {
            url: url.to_string(),
        };
        if bytes.len() < HEADER_LEN as usize || &bytes[..7] != MAGIC || bytes[7] != 3 {
            return Err(invalid());
        }
        let u64_at = |at: usize| -> FetchResult<u64> {
            let raw: [u8; 8] = bytes[at..at + 8].try_into().map_err(|_| invalid())?;
            Ok(u64::from_le_bytes(raw))
        };
        Ok(Self {
            version: bytes[7],
            metadata_offset: u64_at(24)?,
            metadata_length: u64_at(32)?,
            internal_compression: bytes[97],
            min_zoom: bytes[100],
            max_zoom: bytes[101],
        })
    }
}

/// The archive URL behind a `pmtiles://` source URL.
#[must_use]
pub fn archive_url(source_url: &str) -> Option<&str> {
    source_url.strip_prefix(SCHEME)
}

/// Read the header and JSON metadata of the archive at `url`.
pub fn read_metadata(fetcher: &dyn Fetcher, url: &str) -> FetchResult<Value> {
    let header_bytes = fetcher.fetch_range(url, 0, HEADER_LEN)?;
    let header = Header::parse(&header_bytes, url)?;
    debug!(
        url,
        metadata_offset = header.metadata_offset,
        metadata_length = header.metadata_length,
        "read PMTiles header"
    );
    let raw = fetcher.fetch_range(url, header.metadata_offset, header.metadata_length)?;
    let json = match Compression::from_code(header.internal_compression) {
        Some(Compression::None | Compression::Unknown) => raw,
        Some(Compression::Gzip) => {
            let mut out = Vec::new();
            GzDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
            out
        }
        _ => {
            return Err(FetchError::UnsupportedCompression {
                url: url.to_string(),
                code: header.internal_compression,
            });
        }
    };
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
pub(crate) fn build_archive(metadata: &Value, gzip: bool) -> Vec<u8> {
    use flate2::Compression as Level;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut body = serde_json::to_vec(metadata).expect("metadata serializes");
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Level::default());
        encoder.write_all(&body).expect("gzip write");
        body = encoder.finish().expect("gzip finish");
    }
    let mut archive = vec![0u8; HEADER_LEN as usize];
    archive[..7].copy_from_slice(MAGIC);
    archive[7] = 3;
    archive[24..32].copy_from_slice(&HEADER_LEN.to_le_bytes());
    archive[32..40].copy_from_slice(&(body.len() as u64).to_le_bytes());
    archive[97] = if gzip { 2 } else { 1 };
    archive[101] = 14;
    archive.extend_from_slice(&body);
    archive
}
