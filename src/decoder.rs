// src/decoder.rs

//! Chunk blob decoding.
//!
//! A chunk blob holds a run of records all in one format. [`ChunkDecoder`]
//! detects the format from the blob's leading bytes once, then yields
//! records lazily: the binary formats are fixed-size windows sliced without
//! copying, legacy text is parsed line by line and re-packed to V2.
//! Downsampling happens here, before records ever reach a channel, so a
//! high sampling rate cuts decode work as well as downstream traffic.

use bytes::Bytes;

use crate::error::{PipelineError, Result};
use crate::format::{text, FormatVersion};
use crate::rng::PipelineRng;

/// Streaming decoder for chunk blobs.
///
/// Holds the worker's RNG so sampling decisions stay reproducible per
/// worker. One decoder serves many blobs.
pub struct ChunkDecoder {
    sample: u32,
    rng: PipelineRng,
}

impl ChunkDecoder {
    /// `sample`: keep one record in `sample` on average (1 = keep all).
    #[must_use]
    pub fn new(sample: u32, rng: PipelineRng) -> Self {
        Self { sample, rng }
    }

    /// Iterate the records of one blob.
    ///
    /// # Errors
    ///
    /// Fails immediately for a blob too short to classify. Per-record
    /// failures surface as `Err` items from the iterator instead; after
    /// one, the iterator is exhausted (record boundaries cannot be
    /// trusted past a malformed record).
    pub fn records<'a>(&'a mut self, blob: &'a Bytes) -> Result<RecordIter<'a>> {
        let version = FormatVersion::detect(blob)?;
        Ok(RecordIter {
            blob,
            version,
            pos: 0,
            failed: false,
            sample: self.sample,
            rng: &mut self.rng,
        })
    }
}

/// Lazy iterator over the records of one chunk blob.
///
/// Items are whole packed records: V2 or V3 bytes as stored for the binary
/// formats, freshly packed V2 bytes for legacy text.
pub struct RecordIter<'a> {
    blob: &'a Bytes,
    version: FormatVersion,
    pos: usize,
    failed: bool,
    sample: u32,
    rng: &'a mut PipelineRng,
}

impl<'a> RecordIter<'a> {
    fn next_binary(&mut self, record_len: usize) -> Option<Result<Bytes>> {
        loop {
            if self.pos >= self.blob.len() {
                return None;
            }
            if self.pos + record_len > self.blob.len() {
                self.failed = true;
                return Some(Err(PipelineError::decode(format!(
                    "trailing {} bytes are not a whole {record_len}-byte record",
                    self.blob.len() - self.pos
                ))));
            }
            let start = self.pos;
            self.pos += record_len;
            if self.rng.keep_one_in(self.sample) {
                return Some(Ok(self.blob.slice(start..start + record_len)));
            }
        }
    }

    /// Collect the next 121 non-empty lines, or report a truncated tail.
    fn next_text_lines(&mut self) -> Option<Result<Vec<&'a [u8]>>> {
        let mut lines = Vec::with_capacity(text::RECORD_LINES);
        while lines.len() < text::RECORD_LINES {
            if self.pos >= self.blob.len() {
                if lines.is_empty() {
                    return None;
                }
                self.failed = true;
                return Some(Err(PipelineError::decode(format!(
                    "text chunk ends mid-record after {} lines",
                    lines.len()
                ))));
            }
            let rest = &self.blob[self.pos..];
            let end = rest
                .iter()
                .position(|&b| b == b'\n')
                .unwrap_or(rest.len());
            let line = &self.blob[self.pos..self.pos + end];
            self.pos += end + 1;
            if !line.is_empty() {
                lines.push(line);
            }
        }
        Some(Ok(lines))
    }

    fn next_text(&mut self) -> Option<Result<Bytes>> {
        loop {
            let lines = match self.next_text_lines()? {
                Ok(lines) => lines,
                Err(e) => return Some(Err(e)),
            };
            // Sample before parsing: skipped records cost only the line scan.
            if !self.rng.keep_one_in(self.sample) {
                continue;
            }
            match text::decode_record(&lines) {
                Ok(Some(record)) => return Some(Ok(record.into_bytes())),
                // NaN policy, drop the record and keep going
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.version {
            FormatVersion::Invalidated => None,
            FormatVersion::V2 | FormatVersion::V3 => {
                // record_len is Some for both binary formats
                let len = self.version.record_len()?;
                self.next_binary(len)
            }
            FormatVersion::LegacyText => self.next_text(),
        }
    }
}
