// src/pipeline/batch.rs

//! Record-to-tensor unpacking and batch assembly.
//!
//! The trainer consumes three flat byte buffers per batch: input planes,
//! policy targets and game outcomes. Bit-packed occupancy planes expand to
//! one byte per square here, on the CPU side, so the trainer can view the
//! buffer as a `[batch, 120, 64]` uint8 tensor directly. Policy floats are
//! already in wire order and pass through untouched.

use bytes::Bytes;

use crate::error::{PipelineError, Result};
use crate::format::{v2, v3};

/// Unpacked planes per position: 112 occupancy planes plus 8 scalar planes
/// (castling rights, side to move, rule-50, move count, one all-zero).
pub const INPUT_PLANES: usize = v2::NUM_PLANES + 8; // 120
/// Bytes of unpacked plane data per position.
pub const PLANES_TENSOR_BYTES: usize = INPUT_PLANES * 64; // 7680

/// One training batch: per-field concatenation of `len` positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// `len * 7680` bytes, one byte per square per input plane.
    pub planes: Vec<u8>,
    /// `len * 7696` bytes, 1924 little-endian f32 per position.
    pub probs: Vec<u8>,
    /// `len * 4` bytes, one little-endian f32 outcome per position.
    pub outcomes: Vec<u8>,
    pub len: usize,
}

/// Accumulates shuffled records into fixed-size batches.
///
/// Only V2 records are accepted at this stage: the shuffle buffer holds
/// raw bytes, so the version check here is the last line of defense
/// against a V3 record slipping into a training run built for the old
/// policy head.
pub struct Batcher {
    batch_size: usize,
    planes: Vec<u8>,
    probs: Vec<u8>,
    outcomes: Vec<u8>,
    count: usize,
}

impl Batcher {
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            planes: Vec::with_capacity(batch_size * PLANES_TENSOR_BYTES),
            probs: Vec::with_capacity(batch_size * v2::PROBS_BYTES),
            outcomes: Vec::with_capacity(batch_size * 4),
            count: 0,
        }
    }

    /// Add one raw record; returns a full batch once `batch_size` records
    /// have accumulated. A trailing partial batch is never emitted; it is
    /// simply dropped with the batcher.
    ///
    /// # Errors
    ///
    /// `Version` for a record that is not V2, `Invariant` for an outcome
    /// outside {-1, 0, 1}.
    pub fn push(&mut self, raw: Bytes) -> Result<Option<Batch>> {
        if raw.len() == v3::RECORD_BYTES {
            return Err(PipelineError::version(crate::format::V3_MAGIC));
        }
        let record = v2::Record::parse(raw)?;
        let outcome = record.outcome();
        if !matches!(outcome, -1 | 0 | 1) {
            return Err(PipelineError::invariant(format!(
                "outcome {outcome} not in {{-1, 0, 1}}"
            )));
        }

        unpack_planes(&record, &mut self.planes);
        self.probs.extend_from_slice(record.probs_bytes());
        self.outcomes
            .extend_from_slice(&f32::from(outcome).to_le_bytes());
        self.count += 1;

        if self.count < self.batch_size {
            return Ok(None);
        }
        let batch = Batch {
            planes: std::mem::replace(
                &mut self.planes,
                Vec::with_capacity(self.batch_size * PLANES_TENSOR_BYTES),
            ),
            probs: std::mem::replace(
                &mut self.probs,
                Vec::with_capacity(self.batch_size * v2::PROBS_BYTES),
            ),
            outcomes: std::mem::replace(&mut self.outcomes, Vec::with_capacity(self.batch_size * 4)),
            len: self.count,
        };
        self.count = 0;
        Ok(Some(batch))
    }
}

/// Expand one record's planes to tensor bytes: each bitboard byte becomes
/// eight squares MSB-first, then the eight constant scalar planes.
fn unpack_planes(record: &v2::Record, out: &mut Vec<u8>) {
    for &byte in record.planes_bytes() {
        for bit in (0..8).rev() {
            out.push((byte >> bit) & 1);
        }
    }
    for value in [
        record.us_ooo(),
        record.us_oo(),
        record.them_ooo(),
        record.them_oo(),
        record.side_to_move(),
        record.rule50_count(),
        record.move_count(),
        0,
    ] {
        out.extend(std::iter::repeat(value).take(64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> v2::Record {
        v2::tests::sample_fields().pack().unwrap()
    }

    #[test]
    fn test_batch_emitted_at_batch_size() {
        let mut batcher = Batcher::new(2);
        assert!(batcher.push(sample_record().into_bytes()).unwrap().is_none());
        let batch = batcher.push(sample_record().into_bytes()).unwrap().unwrap();
        assert_eq!(batch.len, 2);
        assert_eq!(batch.planes.len(), 2 * PLANES_TENSOR_BYTES);
        assert_eq!(batch.probs.len(), 2 * v2::PROBS_BYTES);
        assert_eq!(batch.outcomes.len(), 2 * 4);
    }

    #[test]
    fn test_partial_batch_not_emitted() {
        let mut batcher = Batcher::new(3);
        assert!(batcher.push(sample_record().into_bytes()).unwrap().is_none());
        assert!(batcher.push(sample_record().into_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_batcher_resets_between_batches() {
        let mut batcher = Batcher::new(1);
        for _ in 0..3 {
            let batch = batcher.push(sample_record().into_bytes()).unwrap().unwrap();
            assert_eq!(batch.len, 1);
            assert_eq!(batch.planes.len(), PLANES_TENSOR_BYTES);
        }
    }

    #[test]
    fn test_plane_bits_unpack_msb_first() {
        let mut fields = v2::tests::sample_fields();
        fields.planes = vec![0; v2::NUM_PLANES];
        // a8..h8 from the top byte of a big-endian bitboard
        fields.planes[0] = 0x8100_0000_0000_0000;
        let mut batcher = Batcher::new(1);
        let batch = batcher
            .push(fields.pack().unwrap().into_bytes())
            .unwrap()
            .unwrap();

        let first_plane = &batch.planes[..64];
        assert_eq!(first_plane[0], 1);
        assert_eq!(first_plane[7], 1);
        assert_eq!(first_plane[1..7], [0; 6]);
        assert_eq!(first_plane[8..], [0; 56]);
    }

    #[test]
    fn test_scalar_planes_are_constant() {
        let fields = v2::tests::sample_fields();
        let mut batcher = Batcher::new(1);
        let batch = batcher
            .push(fields.pack().unwrap().into_bytes())
            .unwrap()
            .unwrap();

        let scalars = &batch.planes[v2::NUM_PLANES * 64..];
        assert_eq!(scalars.len(), 8 * 64);
        let expected = [
            fields.us_ooo,
            fields.us_oo,
            fields.them_ooo,
            fields.them_oo,
            fields.side_to_move,
            fields.rule50_count,
            fields.move_count,
            0,
        ];
        for (i, &value) in expected.iter().enumerate() {
            assert!(
                scalars[i * 64..(i + 1) * 64].iter().all(|&b| b == value),
                "scalar plane {i}"
            );
        }
    }

    #[test]
    fn test_outcome_encoded_as_f32() {
        let mut fields = v2::tests::sample_fields();
        fields.outcome = -1;
        let mut batcher = Batcher::new(1);
        let batch = batcher
            .push(fields.pack().unwrap().into_bytes())
            .unwrap()
            .unwrap();
        let outcome = f32::from_le_bytes(batch.outcomes[..4].try_into().unwrap());
        assert!((outcome + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_probs_pass_through_verbatim() {
        let record = sample_record();
        let mut batcher = Batcher::new(1);
        let batch = batcher.push(record.clone().into_bytes()).unwrap().unwrap();
        assert_eq!(batch.probs, record.probs_bytes());
    }

    #[test]
    fn test_v3_record_is_version_error() {
        let mut raw = vec![0u8; v3::RECORD_BYTES];
        raw[..4].copy_from_slice(&crate::format::V3_MAGIC.to_le_bytes());
        let mut batcher = Batcher::new(1);
        let err = batcher.push(raw.into()).unwrap_err();
        assert!(matches!(err, PipelineError::Version { .. }));
    }

    #[test]
    fn test_bad_outcome_is_invariant_error() {
        let mut raw = sample_record().into_bytes().to_vec();
        raw[v2::SCALARS_OFFSET + 7] = 7;
        let mut batcher = Batcher::new(1);
        let err = batcher.push(raw.into()).unwrap_err();
        assert!(matches!(err, PipelineError::Invariant { .. }));
    }
}
