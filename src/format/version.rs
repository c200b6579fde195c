// src/format/version.rs

//! On-disk record version detection.
//!
//! Chunk files carry no framing beyond the first record's leading bytes:
//! a little-endian u32 tag for the binary formats, or hex text for the
//! legacy format (which predates version headers entirely). The tag is
//! decided once per blob and carried as an explicit enum, never re-checked
//! per record.

use crate::error::{PipelineError, Result};

/// Little-endian magic for a chunk invalidated by a historical generation
/// bug. The whole blob must be discarded.
pub const INVALIDATED_MAGIC: u32 = 1;
/// Little-endian magic of the V2 binary format.
pub const V2_MAGIC: u32 = 2;
/// Little-endian magic of the V3 binary format.
pub const V3_MAGIC: u32 = 3;

/// Record format of one chunk blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// Corrupt-by-construction marker; yields no records.
    Invalidated,
    /// Packed binary, old policy encoding (8604-byte records).
    V2,
    /// Packed binary, new policy encoding (8280-byte records).
    V3,
    /// Newline-delimited text, 121 lines per record.
    LegacyText,
}

impl FormatVersion {
    /// Decide the format of a blob from its leading bytes.
    ///
    /// Anything that is not a known binary magic is treated as legacy
    /// text; the text decoder reports its own errors if that guess is
    /// wrong. An empty blob is a decode error.
    pub fn detect(blob: &[u8]) -> Result<Self> {
        if blob.is_empty() {
            return Err(PipelineError::decode("empty chunk blob"));
        }
        if blob.len() < 4 {
            return Err(PipelineError::decode(format!(
                "chunk blob of {} bytes is too short for any record",
                blob.len()
            )));
        }
        let magic = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
        Ok(match magic {
            INVALIDATED_MAGIC => Self::Invalidated,
            V2_MAGIC => Self::V2,
            V3_MAGIC => Self::V3,
            _ => Self::LegacyText,
        })
    }

    /// Fixed record length in bytes for the binary formats.
    #[must_use]
    pub fn record_len(self) -> Option<usize> {
        match self {
            Self::V2 => Some(super::v2::RECORD_BYTES),
            Self::V3 => Some(super::v3::RECORD_BYTES),
            Self::Invalidated | Self::LegacyText => None,
        }
    }
}
